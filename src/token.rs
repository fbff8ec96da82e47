//! Client-credentials token acquisition with caching and singleflight guards.
//!
//! [`TokenProvider::get_token`] hands out the cached token while it stays outside the safety
//! margin of its expiry and otherwise performs one `grant_type=client_credentials` exchange.
//! Callers that arrive while an exchange is running wait on the same guard and receive that
//! exchange's outcome instead of stampeding the authority. The cache is written only after a
//! successful exchange, so abandoning a caller mid-flight leaves it untouched.

mod metrics;

pub use metrics::TokenMetrics;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credentials},
	config::ClientConfig,
	error::{AuthError, ConfigError},
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ClientCredentialsFacade, ReqwestTransportErrorMapper, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Observable state of the token cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
	/// No token has been acquired yet (or it was invalidated).
	Unset,
	/// A token is cached and may be attached.
	Valid,
	/// A token is cached but expired or inside the safety margin.
	Expired,
}

#[derive(Clone, Debug)]
struct ExchangeFailure {
	generation: u64,
	reason: String,
	status: Option<u16>,
}

/// Acquires and caches the bearer token for one credential set.
pub struct TokenProvider<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: ClientCredentialsFacade<C, M>,
	client_id: String,
	safety_margin: Duration,
	cache: RwLock<Option<AccessToken>>,
	singleflight: AsyncMutex<()>,
	// Bumped each time an exchange finishes, successfully or not.
	generation: AtomicU64,
	last_failure: Mutex<Option<ExchangeFailure>>,
	metrics: Arc<TokenMetrics>,
}
impl<C, M> TokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a provider that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		credentials: &Credentials,
		token_endpoint: &Url,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		let facade = ClientCredentialsFacade::new(
			credentials,
			token_endpoint,
			http_client.into(),
			mapper.into(),
		)?;

		Ok(Self {
			facade,
			client_id: credentials.client_id.to_string(),
			safety_margin: ClientConfig::DEFAULT_TOKEN_SAFETY_MARGIN,
			cache: RwLock::new(None),
			singleflight: AsyncMutex::new(()),
			generation: AtomicU64::new(0),
			last_failure: Mutex::new(None),
			metrics: Default::default(),
		})
	}

	/// Overrides the window before expiry in which cached tokens are refreshed.
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Returns a usable token, exchanging credentials only when the cache cannot serve one.
	pub async fn get_token(&self) -> Result<AccessToken, AuthError> {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		if let Some(token) = self.usable_cached(OffsetDateTime::now_utc(), self.safety_margin) {
			self.metrics.record_cache_hit();
			obs::record_flow_outcome(KIND, FlowOutcome::CacheHit);

			return Ok(token);
		}

		let span = FlowSpan::new(KIND, "get_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let observed = self.generation.load(Ordering::Acquire);
				let _singleflight = self.singleflight.lock().await;
				let joined = self.generation.load(Ordering::Acquire) != observed;
				// Waiters accept the token their exchange produced even inside the margin.
				let margin = if joined { Duration::ZERO } else { self.safety_margin };

				if let Some(token) = self.usable_cached(OffsetDateTime::now_utc(), margin) {
					span.event("Reused token acquired by a concurrent caller.");
					self.metrics.record_cache_hit();

					return Ok(token);
				}
				if joined {
					if let Some(failure) = self.shared_failure() {
						self.metrics.record_failure();

						return Err(AuthError::SharedFailure {
							reason: failure.reason,
							status: failure.status,
						});
					}
				}

				self.metrics.record_exchange();

				let outcome = self.facade.exchange().await;
				let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

				match outcome {
					Ok(token) => {
						*self.cache.write() = Some(token.clone());
						*self.last_failure.lock() = None;

						span.event("Cached a freshly exchanged token.");

						Ok(token)
					},
					Err(err) => {
						self.metrics.record_failure();
						*self.last_failure.lock() = Some(ExchangeFailure {
							generation,
							reason: err.to_string(),
							status: err.status(),
						});

						Err(err)
					},
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Drops the cached token so the next [`get_token`](Self::get_token) exchanges again.
	pub fn invalidate(&self) {
		if self.cache.write().take().is_some() {
			FlowSpan::new(FlowKind::ClientCredentials, "invalidate")
				.event("Dropped cached token after invalidation.");
		}
	}

	/// Drops the cached token only if it is still `token`.
	///
	/// Returns `true` when the cache was cleared. A newer token cached by another caller is kept.
	pub fn invalidate_if(&self, token: &AccessToken) -> bool {
		let mut cache = self.cache.write();

		if cache.as_ref().is_some_and(|cached| cached.secret == token.secret) {
			*cache = None;

			FlowSpan::new(FlowKind::ClientCredentials, "invalidate")
				.event("Dropped cached token after the remote rejected it.");

			return true;
		}

		false
	}

	/// Reports the cache state at `instant` using the configured safety margin.
	pub fn state_at(&self, instant: OffsetDateTime) -> TokenState {
		match self.cache.read().as_ref() {
			None => TokenState::Unset,
			Some(token) if token.is_usable_at(instant, self.safety_margin) => TokenState::Valid,
			Some(_) => TokenState::Expired,
		}
	}

	/// Reports the cache state against the current clock.
	pub fn state(&self) -> TokenState {
		self.state_at(OffsetDateTime::now_utc())
	}

	/// Returns the configured safety margin.
	pub fn safety_margin(&self) -> Duration {
		self.safety_margin
	}

	/// Returns the shared counters for this provider.
	pub fn metrics(&self) -> Arc<TokenMetrics> {
		self.metrics.clone()
	}

	fn usable_cached(&self, instant: OffsetDateTime, margin: Duration) -> Option<AccessToken> {
		self.cache.read().as_ref().filter(|token| token.is_usable_at(instant, margin)).cloned()
	}

	fn shared_failure(&self) -> Option<ExchangeFailure> {
		let current = self.generation.load(Ordering::Acquire);

		self.last_failure.lock().clone().filter(|failure| failure.generation == current)
	}
}
impl TokenProvider<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a provider with its own reqwest transport.
	pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
		Self::from_config(config, ReqwestHttpClient::default())
	}

	/// Creates a provider on an existing reqwest transport, sharing its connection pool.
	pub fn from_config(
		config: &ClientConfig,
		http_client: ReqwestHttpClient,
	) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(
			config.credentials(),
			config.token_endpoint(),
			http_client,
			ReqwestTransportErrorMapper,
		)?
		.with_safety_margin(config.token_safety_margin()))
	}
}
impl<C, M> Debug for TokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProvider")
			.field("client_id", &self.client_id)
			.field("safety_margin", &self.safety_margin)
			.field("state", &self.state())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{ClientId, TenantId};

	fn provider() -> TokenProvider {
		let credentials = Credentials::new(
			TenantId::new("tenant").expect("Tenant fixture should be valid."),
			ClientId::new("client").expect("Client fixture should be valid."),
			"secret",
			Url::parse("https://org.crm.dynamics.com").expect("Resource fixture should parse."),
		);
		let endpoint = Url::parse("https://login.microsoftonline.com/tenant/oauth2/v2.0/token")
			.expect("Token endpoint fixture should parse.");

		TokenProvider::with_http_client(
			&credentials,
			&endpoint,
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
		.expect("Provider fixture should build.")
	}

	fn seed(provider: &TokenProvider, issued: OffsetDateTime, lifetime: Duration) {
		let token = AccessToken::builder()
			.value("seeded")
			.issued_at(issued)
			.expires_in(lifetime)
			.build()
			.expect("Seeded token should build.");

		*provider.cache.write() = Some(token);
	}

	#[test]
	fn state_machine_follows_expiry_and_margin() {
		let provider = provider().with_safety_margin(Duration::seconds(60));
		let issued = macros::datetime!(2025-01-01 00:00 UTC);

		assert_eq!(provider.state_at(issued), TokenState::Unset);

		seed(&provider, issued, Duration::hours(1));

		assert_eq!(provider.state_at(issued + Duration::minutes(30)), TokenState::Valid);
		assert_eq!(provider.state_at(issued + Duration::minutes(59)), TokenState::Expired);
		assert_eq!(provider.state_at(issued + Duration::hours(2)), TokenState::Expired);

		provider.invalidate();

		assert_eq!(provider.state_at(issued), TokenState::Unset);
	}

	#[tokio::test]
	async fn valid_cached_token_is_served_without_exchange() {
		let provider = provider();

		seed(&provider, OffsetDateTime::now_utc(), Duration::hours(1));

		let token = provider.get_token().await.expect("Cached token should be returned.");

		assert_eq!(token.secret.expose(), "seeded");
		assert_eq!(provider.metrics().exchanges(), 0);
		assert_eq!(provider.metrics().cache_hits(), 1);
	}

	#[test]
	fn conditional_invalidation_keeps_newer_tokens() {
		let provider = provider();
		let now = OffsetDateTime::now_utc();
		let stale = AccessToken::builder()
			.value("stale")
			.issued_at(now)
			.expires_in(Duration::hours(1))
			.build()
			.expect("Stale token should build.");

		seed(&provider, now, Duration::hours(1));

		assert!(!provider.invalidate_if(&stale));
		assert_eq!(provider.state_at(now), TokenState::Valid);

		let current = provider.cache.read().clone().expect("Seeded token should be cached.");

		assert!(provider.invalidate_if(&current));
		assert_eq!(provider.state_at(now), TokenState::Unset);
	}

	#[test]
	fn negative_margin_is_clamped() {
		assert_eq!(provider().with_safety_margin(Duration::seconds(-1)).safety_margin(), Duration::ZERO);
	}
}
