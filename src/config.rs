//! Validated client configuration and its builder.
//!
//! [`ClientConfig`] gathers the five opaque values the integration needs (tenant, client id,
//! client secret, API base URL, API version) plus an optional authority host and token safety
//! margin. The builder rejects incomplete or insecure input up front and precomputes the token
//! endpoint and the versioned API root so later request paths are simple relative joins.
//! Loading the values (files, environment, vaults) is left to the caller; the builder also
//! implements [`Deserialize`] so any serde-based loader can feed it directly.

// std
use std::net::IpAddr;
// crates.io
use url::Host;
// self
use crate::{
	_prelude::*,
	auth::{ClientId, Credentials, TenantId, TokenSecret},
	error::ConfigError,
};

/// Default identity authority host.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Validated configuration consumed by [`TokenProvider`] and [`EntityClient`].
///
/// [`TokenProvider`]: crate::token::TokenProvider
/// [`EntityClient`]: crate::client::EntityClient
#[derive(Clone, Deserialize)]
#[serde(try_from = "ClientConfigBuilder")]
pub struct ClientConfig {
	credentials: Credentials,
	authority: Url,
	api_version: String,
	token_endpoint: Url,
	api_root: Url,
	token_safety_margin: Duration,
}
impl ClientConfig {
	/// Default window before expiry in which a cached token is no longer handed out.
	pub const DEFAULT_TOKEN_SAFETY_MARGIN: Duration = Duration::seconds(60);

	/// Creates a new builder.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Returns the credential set used for the client-credentials exchange.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	/// Returns the authority host (without the tenant segment).
	pub fn authority(&self) -> &Url {
		&self.authority
	}

	/// Returns the configured API version (e.g. `9.2`).
	pub fn api_version(&self) -> &str {
		&self.api_version
	}

	/// Returns `<authority>/<tenant>/oauth2/v2.0/token`.
	pub fn token_endpoint(&self) -> &Url {
		&self.token_endpoint
	}

	/// Returns `<api base>/api/data/v<version>/`, the root every entity path is joined onto.
	pub fn api_root(&self) -> &Url {
		&self.api_root
	}

	/// Returns the `<api base>/.default` scope requested from the authority.
	pub fn scope(&self) -> String {
		self.credentials.scope()
	}

	/// Returns the window before expiry in which cached tokens are refreshed.
	pub fn token_safety_margin(&self) -> Duration {
		self.token_safety_margin
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("credentials", &self.credentials)
			.field("authority", &self.authority.as_str())
			.field("api_root", &self.api_root.as_str())
			.field("token_safety_margin", &self.token_safety_margin)
			.finish()
	}
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfigBuilder {
	tenant_id: Option<TenantId>,
	client_id: Option<ClientId>,
	client_secret: Option<TokenSecret>,
	api_base_url: Option<Url>,
	api_version: Option<String>,
	authority: Option<Url>,
	#[serde(with = "margin_seconds")]
	token_safety_margin: Option<Duration>,
}
impl ClientConfigBuilder {
	/// Sets the directory tenant.
	pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
		self.tenant_id = Some(tenant_id);

		self
	}

	/// Sets the application (client) identifier.
	pub fn client_id(mut self, client_id: ClientId) -> Self {
		self.client_id = Some(client_id);

		self
	}

	/// Sets the confidential client secret.
	pub fn client_secret(mut self, secret: impl Into<TokenSecret>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the environment base URL (e.g. `https://org.crm.dynamics.com`).
	pub fn api_base_url(mut self, url: Url) -> Self {
		self.api_base_url = Some(url);

		self
	}

	/// Sets the Web API version (e.g. `9.2`).
	pub fn api_version(mut self, version: impl Into<String>) -> Self {
		self.api_version = Some(version.into());

		self
	}

	/// Overrides the authority host (defaults to [`DEFAULT_AUTHORITY`]).
	pub fn authority(mut self, url: Url) -> Self {
		self.authority = Some(url);

		self
	}

	/// Overrides the token safety margin; negative values are clamped to zero.
	pub fn token_safety_margin(mut self, margin: Duration) -> Self {
		self.token_safety_margin = Some(margin);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let tenant_id = self.tenant_id.ok_or(ConfigError::MissingField { field: "tenant_id" })?;
		let client_id = self.client_id.ok_or(ConfigError::MissingField { field: "client_id" })?;
		let client_secret =
			self.client_secret.ok_or(ConfigError::MissingField { field: "client_secret" })?;
		let api_base_url =
			self.api_base_url.ok_or(ConfigError::MissingField { field: "api_base_url" })?;
		let api_version =
			self.api_version.ok_or(ConfigError::MissingField { field: "api_version" })?;
		let authority = match self.authority {
			Some(url) => url,
			None => Url::parse(DEFAULT_AUTHORITY)
				.map_err(|source| ConfigError::InvalidUrl { endpoint: "authority", source })?,
		};

		if client_secret.is_empty() {
			return Err(ConfigError::EmptyClientSecret);
		}

		validate_api_version(&api_version)?;

		let authority = directory_url("authority", authority)?;
		let api_base_url = directory_url("api base", api_base_url)?;
		let token_endpoint = authority
			.join(&format!("{tenant_id}/oauth2/v2.0/token"))
			.map_err(|source| ConfigError::InvalidUrl { endpoint: "token", source })?;
		let api_root = api_base_url
			.join(&format!("api/data/v{api_version}/"))
			.map_err(|source| ConfigError::InvalidUrl { endpoint: "api root", source })?;
		let margin = self.token_safety_margin.unwrap_or(ClientConfig::DEFAULT_TOKEN_SAFETY_MARGIN);
		let token_safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		Ok(ClientConfig {
			credentials: Credentials::new(tenant_id, client_id, client_secret, api_base_url),
			authority,
			api_version,
			token_endpoint,
			api_root,
			token_safety_margin,
		})
	}
}
impl TryFrom<ClientConfigBuilder> for ClientConfig {
	type Error = ConfigError;

	fn try_from(builder: ClientConfigBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}
impl Debug for ClientConfigBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfigBuilder")
			.field("tenant_id", &self.tenant_id)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("api_base_url", &self.api_base_url)
			.field("api_version", &self.api_version)
			.field("authority", &self.authority)
			.finish()
	}
}

mod margin_seconds {
	// self
	use crate::_prelude::*;

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::seconds))
	}
}

/// Checks scheme and base-ability, then normalizes the path to end with `/` so relative joins
/// append instead of replacing the last segment.
fn directory_url(endpoint: &'static str, mut url: Url) -> Result<Url, ConfigError> {
	if url.cannot_be_a_base() {
		return Err(ConfigError::CannotBeBase { endpoint });
	}
	if url.scheme() != "https" && !is_loopback(&url) {
		return Err(ConfigError::InsecureEndpoint { endpoint, url: url.to_string() });
	}

	url.set_query(None);
	url.set_fragment(None);

	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
		Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
		None => false,
	}
}

fn validate_api_version(version: &str) -> Result<(), ConfigError> {
	let valid = !version.is_empty()
		&& version.split('.').all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));

	if valid { Ok(()) } else { Err(ConfigError::InvalidApiVersion { version: version.to_owned() }) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	fn builder() -> ClientConfigBuilder {
		ClientConfig::builder()
			.tenant_id(TenantId::new("contoso").expect("Tenant fixture should be valid."))
			.client_id(ClientId::new("app-1").expect("Client fixture should be valid."))
			.client_secret("secret")
			.api_base_url(url("https://org.crm.dynamics.com"))
			.api_version("9.2")
	}

	#[test]
	fn derives_endpoints_from_parts() {
		let config = builder().build().expect("Complete configuration should build.");

		assert_eq!(
			config.token_endpoint().as_str(),
			"https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
		);
		assert_eq!(config.api_root().as_str(), "https://org.crm.dynamics.com/api/data/v9.2/");
		assert_eq!(config.scope(), "https://org.crm.dynamics.com/.default");
		assert_eq!(config.token_safety_margin(), ClientConfig::DEFAULT_TOKEN_SAFETY_MARGIN);
	}

	#[test]
	fn authority_with_path_keeps_its_prefix() {
		let config = builder()
			.authority(url("https://login.example.com/custom"))
			.build()
			.expect("Authority with a path prefix should build.");

		assert_eq!(
			config.token_endpoint().as_str(),
			"https://login.example.com/custom/contoso/oauth2/v2.0/token"
		);
	}

	#[test]
	fn rejects_missing_and_insecure_values() {
		let err = ClientConfig::builder().build().expect_err("Empty builder must fail.");

		assert!(matches!(err, ConfigError::MissingField { field: "tenant_id" }));

		let err = builder()
			.api_base_url(url("http://org.crm.dynamics.com"))
			.build()
			.expect_err("Plain http must be rejected for remote hosts.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { endpoint: "api base", .. }));

		builder()
			.api_base_url(url("http://127.0.0.1:8080"))
			.authority(url("http://localhost:9090"))
			.build()
			.expect("Loopback hosts may use plain http.");
	}

	#[test]
	fn rejects_bad_versions_and_empty_secrets() {
		for version in ["", "v9.2", "9..2", "9.2-beta"] {
			let err = builder().api_version(version).build().expect_err("Version must be rejected.");

			assert!(matches!(err, ConfigError::InvalidApiVersion { .. }), "{version}");
		}

		let err = builder().client_secret("").build().expect_err("Empty secret must fail.");

		assert!(matches!(err, ConfigError::EmptyClientSecret));
	}

	#[test]
	fn negative_margin_is_clamped() {
		let config = builder()
			.token_safety_margin(Duration::seconds(-30))
			.build()
			.expect("Negative margins should be clamped, not rejected.");

		assert_eq!(config.token_safety_margin(), Duration::ZERO);
	}

	#[test]
	fn deserializes_through_builder_validation() {
		let config: ClientConfig = serde_json::from_value(serde_json::json!({
			"tenant_id": "contoso",
			"client_id": "app-1",
			"client_secret": "secret",
			"api_base_url": "https://org.crm.dynamics.com",
			"api_version": "9.1",
			"token_safety_margin": 120,
		}))
		.expect("Complete JSON configuration should deserialize.");

		assert_eq!(config.api_root().as_str(), "https://org.crm.dynamics.com/api/data/v9.1/");
		assert_eq!(config.token_safety_margin(), Duration::seconds(120));
		assert!(!format!("{config:?}").contains("\"secret\""));

		let err = serde_json::from_value::<ClientConfig>(serde_json::json!({
			"tenant_id": "contoso",
			"client_id": "app-1",
		}))
		.err()
		.expect("Incomplete JSON configuration must fail.");

		assert!(err.to_string().contains("client_secret"));
	}
}
