// self
use dataverse_broker::{
	_preludet::*,
	auth::{ClientId, Credentials, TenantId},
	error::{AuthError, ConfigError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
	token::{TokenProvider, TokenState},
};

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Copy)]
struct ThrottledHttpClient {
	retry_after: Duration,
}
impl TokenHttpClient for ThrottledHttpClient {
	type Handle = ThrottledHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ThrottledHandle { slot, retry_after: self.retry_after }
	}
}

struct ThrottledHandle {
	slot: ResponseMetadataSlot,
	retry_after: Duration,
}
impl<'a> AsyncHttpClient<'a> for ThrottledHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let retry_after = self.retry_after;
		let body = String::from_utf8_lossy(request.body()).into_owned();

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);
			assert!(
				body.contains("grant_type=client_credentials"),
				"Exchange body should carry the client-credentials grant: {body}."
			);
			slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

			Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	metadata: Arc<Mutex<Vec<Option<ResponseMetadata>>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded_metadata(&self) -> Vec<Option<ResponseMetadata>> {
		self.metadata.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> AuthError {
		let status = meta.and_then(|value| value.status);
		let retry_after = meta.and_then(|value| value.retry_after);

		self.metadata.lock().push(meta.cloned());

		match err {
			HttpClientError::Reqwest(inner) => AuthError::Unexpected {
				message: format!("Fake transport error: {inner}"),
				status,
				retry_after,
			},
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => AuthError::Unexpected {
				message: format!("Unhandled HTTP client error: {other:?}"),
				status,
				retry_after,
			},
		}
	}
}

fn throttled_provider(
	retry_after: Duration,
	mapper: RecordingTransportErrorMapper,
) -> TokenProvider<ThrottledHttpClient, RecordingTransportErrorMapper> {
	let credentials = Credentials::new(
		TenantId::new("fake-tenant").expect("Failed to build fake tenant identifier."),
		ClientId::new("fake-client").expect("Failed to build fake client identifier."),
		"fake-secret",
		Url::parse("https://org.crm.dynamics.com").expect("Failed to parse fake resource URL."),
	);
	let endpoint = Url::parse("https://login.example.com/fake-tenant/oauth2/v2.0/token")
		.expect("Failed to parse fake token endpoint URL.");

	TokenProvider::with_http_client(
		&credentials,
		&endpoint,
		ThrottledHttpClient { retry_after },
		mapper,
	)
	.expect("Failed to build provider over the fake transport.")
}

#[tokio::test]
async fn fake_token_http_client_surfaces_metadata() {
	let provider =
		throttled_provider(Duration::seconds(5), RecordingTransportErrorMapper::default());
	let err = provider.get_token().await.expect_err("Exchange should be throttled with HTTP 429.");

	match err {
		AuthError::Unexpected { status, retry_after, .. } => {
			assert_eq!(status, Some(429));
			assert_eq!(retry_after, Some(Duration::seconds(5)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert_eq!(provider.state(), TokenState::Unset, "Failed exchanges must not populate the cache.");
	assert_eq!(provider.metrics().failures(), 1);
}

#[tokio::test]
async fn fake_mapper_captures_response_metadata() {
	let mapper = RecordingTransportErrorMapper::default();
	let provider = throttled_provider(Duration::seconds(30), mapper.clone());
	let _ = provider.get_token().await.expect_err("Exchange should be throttled with HTTP 429.");
	let observed = mapper.recorded_metadata();

	assert_eq!(observed.len(), 1, "Mapper must record a single request.");

	let meta = observed
		.first()
		.and_then(|value| value.clone())
		.expect("Response metadata should be recorded exactly once.");

	assert_eq!(meta.status, Some(429));
	assert_eq!(meta.retry_after, Some(Duration::seconds(30)));
}

#[tokio::test]
async fn failed_exchange_is_retried_by_the_next_caller() {
	let mapper = RecordingTransportErrorMapper::default();
	let provider = throttled_provider(Duration::seconds(1), mapper.clone());

	for _ in 0..2 {
		let _ = provider.get_token().await.expect_err("Every exchange should be throttled.");
	}

	assert_eq!(mapper.recorded_metadata().len(), 2, "Sequential callers must not reuse failures.");
	assert_eq!(provider.metrics().exchanges(), 2);
}
