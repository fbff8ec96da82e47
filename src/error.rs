//! Crate-level error taxonomy shared by the token provider and the entity client.

// self
use crate::{_prelude::*, client::Operation};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Every variant raised while running an entity operation carries the [`Operation`], so callers
/// can tell "could not authenticate" apart from "authenticated but the remote rejected the call"
/// without matching on messages.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem detected while constructing a client.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token acquisition failed before the operation could be sent.
	#[error("Could not authenticate for {operation}: {source}")]
	Auth {
		/// Operation that needed the token.
		operation: Operation,
		/// Underlying identity exchange failure.
		#[source]
		source: AuthError,
	},
	/// Remote service answered with a non-success status.
	#[error(transparent)]
	Remote(#[from] RemoteError),
	/// Response body did not match the expected envelope or entity shape.
	#[error("Response for {operation} could not be decoded.")]
	Decoding {
		/// Operation whose response was malformed.
		operation: Operation,
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Network-level failure while talking to the remote service.
	#[error("Transport failed during {operation}.")]
	Transport {
		/// Operation that was in flight.
		operation: Operation,
		/// Underlying network failure.
		#[source]
		source: TransportError,
	},
	/// The outgoing request could not be constructed.
	#[error("Request for {operation} could not be built.")]
	Request {
		/// Operation being prepared.
		operation: Operation,
		/// Underlying construction failure.
		#[source]
		source: ConfigError,
	},
}
impl Error {
	/// Returns the entity operation that failed, when the failure happened inside one.
	pub fn operation(&self) -> Option<Operation> {
		match self {
			Self::Config(_) => None,
			Self::Remote(err) => Some(err.operation),
			Self::Auth { operation, .. }
			| Self::Decoding { operation, .. }
			| Self::Transport { operation, .. }
			| Self::Request { operation, .. } => Some(*operation),
		}
	}

	/// Returns the HTTP status attached to the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Remote(err) => Some(err.status),
			Self::Auth { source, .. } => source.status(),
			_ => None,
		}
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required builder field was not supplied.
	#[error("Configuration is missing the required `{field}` value.")]
	MissingField {
		/// Builder field name.
		field: &'static str,
	},
	/// A configured URL is not `https` and does not point at a loopback host.
	#[error("The {endpoint} URL must use https: {url}.")]
	InsecureEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// Offending URL.
		url: String,
	},
	/// A configured URL could not be parsed or joined.
	#[error("The {endpoint} URL is invalid.")]
	InvalidUrl {
		/// Endpoint label.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The configured URL cannot be used as a base for relative paths.
	#[error("The {endpoint} URL cannot be used as a base URL.")]
	CannotBeBase {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// API version does not look like `9.2`.
	#[error("API version `{version}` must be dot-separated digits.")]
	InvalidApiVersion {
		/// Supplied version string.
		version: String,
	},
	/// Client secret was empty.
	#[error("Client secret cannot be empty.")]
	EmptyClientSecret,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Token exchange request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A header value contained characters HTTP does not allow.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
		/// Underlying validation failure.
		#[source]
		source: reqwest::header::InvalidHeaderValue,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodyEncode(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Identity exchange failures returned by [`TokenProvider::get_token`].
///
/// [`TokenProvider::get_token`]: crate::token::TokenProvider::get_token
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Authority rejected the exchange (bad credentials, unknown tenant, missing consent).
	#[error("Authority rejected the client credentials: {reason}.")]
	Rejected {
		/// Diagnostic supplied by the authority.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Authority responded with something that is neither a token nor an OAuth error.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Unexpected {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from the authority, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// A concurrent exchange this caller waited on failed; carries that exchange's diagnostic.
	#[error("Concurrent token exchange failed: {reason}")]
	SharedFailure {
		/// Rendered error of the exchange that failed.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Authority could not be reached.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Exchange request could not be constructed.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token response carried an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token response carried a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token response carried an empty access token.
	#[error("Token endpoint returned an unusable access token.")]
	InvalidToken(#[from] crate::auth::AccessTokenBuilderError),
}
impl AuthError {
	/// Returns the HTTP status observed on the token endpoint, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::Unexpected { status, .. }
			| Self::ResponseParse { status, .. }
			| Self::SharedFailure { status, .. } => *status,
			_ => None,
		}
	}
}

/// Non-success response from the remote entity service.
///
/// The display message is the fixed per-operation summary; the status, retry hint, and body are
/// kept as fields for diagnostics.
#[derive(Clone, Debug, ThisError)]
#[error("{}", .operation.failure_message())]
pub struct RemoteError {
	/// Operation that was rejected.
	pub operation: Operation,
	/// HTTP status code returned by the service.
	pub status: u16,
	/// Retry-After hint, if the service supplied one.
	pub retry_after: Option<Duration>,
	/// Response body, when non-empty.
	pub body: Option<String>,
}
impl RemoteError {
	/// Returns the fixed summary for the failed operation.
	pub fn message(&self) -> &'static str {
		self.operation.failure_message()
	}
}

/// Transport-level failures (network, timeouts, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the remote endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request did not complete in time.
	#[error("Request timed out while calling the remote endpoint.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the remote endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}
