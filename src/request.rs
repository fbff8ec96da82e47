//! Per-request construction of authenticated OData calls.
//!
//! Headers are attached to each [`Request`] individually. Nothing is installed as a default header
//! on the shared [`ReqwestClient`].

// crates.io
use reqwest::{
	Body, Method, Request,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
// self
use crate::{_prelude::*, auth::AccessToken, error::ConfigError};

/// `OData-MaxVersion` header name.
pub const ODATA_MAX_VERSION: &str = "odata-maxversion";
/// `OData-Version` header name.
pub const ODATA_VERSION: &str = "odata-version";

const ODATA_PROTOCOL: &str = "4.0";
const JSON: &str = "application/json";
const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Builds requests against the API root with the bearer token and OData headers attached.
#[derive(Clone, Debug)]
pub struct AuthenticatedRequestBuilder {
	api_root: Url,
}
impl AuthenticatedRequestBuilder {
	/// Creates a builder resolving relative paths against `api_root`, which must end with `/`.
	pub fn new(api_root: Url) -> Self {
		Self { api_root }
	}

	/// Returns the API root requests are resolved against.
	pub fn api_root(&self) -> &Url {
		&self.api_root
	}

	/// Resolves a path such as `accounts?$select=name` against the API root.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		self.api_root.join(path).map_err(|source| ConfigError::InvalidUrl { endpoint: "entity", source })
	}

	/// Builds a body-less request.
	pub fn build(
		&self,
		token: &AccessToken,
		method: Method,
		path: &str,
	) -> Result<Request, ConfigError> {
		let mut request = Request::new(method, self.resolve(path)?);

		attach_headers(request.headers_mut(), token, false)?;

		Ok(request)
	}

	/// Builds a request carrying `body` serialized as JSON.
	pub fn build_json<B>(
		&self,
		token: &AccessToken,
		method: Method,
		path: &str,
		body: &B,
	) -> Result<Request, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		let payload = serde_json::to_vec(body).map_err(ConfigError::BodyEncode)?;
		let mut request = Request::new(method, self.resolve(path)?);

		attach_headers(request.headers_mut(), token, true)?;
		*request.body_mut() = Some(Body::from(payload));

		Ok(request)
	}
}

fn attach_headers(
	headers: &mut HeaderMap,
	token: &AccessToken,
	has_body: bool,
) -> Result<(), ConfigError> {
	let mut authorization = HeaderValue::from_str(&token.bearer())
		.map_err(|source| ConfigError::InvalidHeader { name: "authorization", source })?;

	authorization.set_sensitive(true);
	headers.insert(AUTHORIZATION, authorization);
	headers.insert(HeaderName::from_static(ODATA_MAX_VERSION), HeaderValue::from_static(ODATA_PROTOCOL));
	headers.insert(HeaderName::from_static(ODATA_VERSION), HeaderValue::from_static(ODATA_PROTOCOL));
	headers.insert(ACCEPT, HeaderValue::from_static(JSON));

	if has_body {
		headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
	}

	Ok(())
}
