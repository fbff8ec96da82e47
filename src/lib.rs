//! Client-credentials token broker and typed OData CRUD client for Dataverse accounts and
//! contacts, with single-flight token caching and per-request header attachment.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod request;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ClientId, TenantId},
		client::EntityClient,
		config::ClientConfig,
		http::ReqwestHttpClient,
		token::TokenProvider,
	};

	/// Tenant identifier shared by integration tests.
	pub const TEST_TENANT: &str = "tenant-under-test";
	/// Client identifier shared by integration tests.
	pub const TEST_CLIENT_ID: &str = "client-under-test";
	/// Client secret shared by integration tests.
	pub const TEST_CLIENT_SECRET: &str = "secret-under-test";
	/// API version shared by integration tests.
	pub const TEST_API_VERSION: &str = "9.2";

	/// Path of the token endpoint that [`test_config`] points at.
	pub fn test_token_path() -> String {
		format!("/{TEST_TENANT}/oauth2/v2.0/token")
	}

	/// Path of an entity set under the API root used by [`test_config`].
	pub fn test_entity_path(entity_set: &str) -> String {
		format!("/api/data/v{TEST_API_VERSION}/{entity_set}")
	}

	/// Builds a reqwest client that accepts the self-signed certificates produced by `httpmock`
	/// during tests.
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Builds a configuration whose authority and API base both point at `base_url`.
	pub fn test_config(base_url: &str) -> ClientConfig {
		let base = Url::parse(base_url).expect("Mock server base URL should parse.");

		ClientConfig::builder()
			.tenant_id(TenantId::new(TEST_TENANT).expect("Test tenant should be valid."))
			.client_id(ClientId::new(TEST_CLIENT_ID).expect("Test client should be valid."))
			.client_secret(TEST_CLIENT_SECRET)
			.authority(base.clone())
			.api_base_url(base)
			.api_version(TEST_API_VERSION)
			.build()
			.expect("Test configuration should build.")
	}

	/// Constructs an [`EntityClient`] and its shared [`TokenProvider`] wired to the insecure test
	/// transport.
	pub fn build_test_client(config: &ClientConfig) -> (EntityClient, Arc<TokenProvider>) {
		let http = test_reqwest_client();
		let tokens = Arc::new(
			TokenProvider::from_config(config, ReqwestHttpClient::with_client(http.clone()))
				.expect("Test token provider should build."),
		);
		let client = EntityClient::with_parts(config, tokens.clone(), http);

		(client, tokens)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
