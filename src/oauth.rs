//! Client-credentials facade over the `oauth2` crate.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId as OAuthClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credentials},
	error::{AuthError, ConfigError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + 'a + Send>>;

/// Maps transport failures raised during the identity exchange into [`AuthError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into an [`AuthError`].
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> AuthError;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> AuthError {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => AuthError::Unexpected {
				message: format!("HTTP client error: {message}"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			},
			_ => AuthError::Unexpected {
				message: "HTTP client error".into(),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			},
		}
	}
}

/// Performs `grant_type=client_credentials` exchanges for one credential set.
pub(crate) struct ClientCredentialsFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	scope: String,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> ClientCredentialsFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a facade that posts the client id and secret in the form body, as Entra expects.
	pub(crate) fn new(
		credentials: &Credentials,
		token_endpoint: &Url,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidUrl { endpoint: "token", source })?;
		let oauth_client = BasicClient::new(OAuthClientId::new(credentials.client_id.to_string()))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(token_url);

		Ok(Self { oauth_client, scope: credentials.scope(), http_client, error_mapper })
	}

	/// Requests a fresh token; never consults or touches any cache.
	pub(crate) fn exchange(&self) -> FacadeFuture<'_, AccessToken> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = self
				.oauth_client
				.exchange_client_credentials()
				.add_scope(Scope::new(self.scope.clone()))
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

			map_token_response(response)
		})
	}
}

fn map_token_response(response: BasicTokenResponse) -> Result<AccessToken, AuthError> {
	let expires_in = response.expires_in().ok_or(AuthError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| AuthError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(AuthError::NonPositiveExpiresIn);
	}

	if expires_in > MAX_EXPIRES_IN_SECS {
		return Err(AuthError::ExpiresInOutOfRange);
	}

	Ok(AccessToken::builder()
		.value(response.access_token().secret().to_owned())
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(Duration::seconds(expires_in))
		.build()?)
}

// One year; anything longer is treated as a malformed response.
const MAX_EXPIRES_IN_SECS: i64 = 366 * 24 * 60 * 60;

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> AuthError
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, _body) =>
			AuthError::ResponseParse { source: error, status: meta_status(meta_ref) },
		RequestTokenError::Other(message) => AuthError::Unexpected {
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		},
	}
}

fn map_server_response(response: BasicErrorResponse, meta: Option<&ResponseMetadata>) -> AuthError {
	let code = response.error().as_ref().to_owned();
	let reason = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code,
	};

	AuthError::Rejected { reason, status: meta_status(meta) }
}

fn map_reqwest_error(err: ReqwestError) -> AuthError {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{ClientId, TenantId},
		http::ReqwestHttpClient,
	};

	fn credentials() -> Credentials {
		Credentials::new(
			TenantId::new("tenant").expect("Tenant fixture should be valid."),
			ClientId::new("client").expect("Client fixture should be valid."),
			"secret",
			Url::parse("https://org.crm.dynamics.com").expect("Resource fixture should parse."),
		)
	}

	#[test]
	fn builds_facade_with_derived_scope() {
		let endpoint = Url::parse("https://login.microsoftonline.com/tenant/oauth2/v2.0/token")
			.expect("Token endpoint fixture should parse.");
		let facade = <ClientCredentialsFacade<ReqwestHttpClient, ReqwestTransportErrorMapper>>::new(
			&credentials(),
			&endpoint,
			Arc::new(ReqwestHttpClient::default()),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.expect("Facade should build for a valid endpoint.");

		assert_eq!(facade.scope, "https://org.crm.dynamics.com/.default");
	}

	#[test]
	fn token_response_validation() {
		let parse = |body: &str| -> BasicTokenResponse {
			serde_json::from_str(body).expect("Token response fixture should parse.")
		};
		let token = map_token_response(parse(
			r#"{"access_token":"abc","token_type":"Bearer","expires_in":3599,"ext_expires_in":3599}"#,
		))
		.expect("Complete responses should map to a token.");

		assert_eq!(token.secret.expose(), "abc");
		assert_eq!(token.expires_at - token.issued_at, Duration::seconds(3599));
		assert!(matches!(
			map_token_response(parse(r#"{"access_token":"abc","token_type":"Bearer"}"#)),
			Err(AuthError::MissingExpiresIn)
		));
		assert!(matches!(
			map_token_response(parse(r#"{"access_token":"abc","token_type":"Bearer","expires_in":0}"#)),
			Err(AuthError::NonPositiveExpiresIn)
		));
		assert!(matches!(
			map_token_response(parse(r#"{"access_token":"","token_type":"Bearer","expires_in":60}"#)),
			Err(AuthError::InvalidToken(_))
		));
	}
}
