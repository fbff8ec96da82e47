//! Typed CRUD operations on accounts and contacts.
//!
//! Every operation acquires a token from the shared [`TokenProvider`], builds its own request
//! through [`AuthenticatedRequestBuilder`], and maps the outcome into [`Error`]. Operations on one
//! [`EntityClient`] may run concurrently; they share the token cache and the connection pool but
//! never request state.

mod operation;

pub use operation::Operation;

// crates.io
use reqwest::{Response, StatusCode};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, EntityId},
	config::ClientConfig,
	entity::{
		self, ACCOUNTS, AccountSummary, AccountUpdate, CONTACTS, ContactSummary, EntityEnvelope,
		EntityView, NewAccount, NewContact,
	},
	error::{ConfigError, RemoteError, TransportError},
	http::{self, ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::AuthenticatedRequestBuilder,
	token::TokenProvider,
};

/// Authenticated client for the account and contact entity sets.
pub struct EntityClient<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	tokens: Arc<TokenProvider<C, M>>,
	http: ReqwestClient,
	requests: AuthenticatedRequestBuilder,
}
impl<C, M> EntityClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Wires a client from an existing token provider and reqwest client.
	///
	/// Clients built from the same provider share one token cache.
	pub fn with_parts(
		config: &ClientConfig,
		tokens: Arc<TokenProvider<C, M>>,
		http: ReqwestClient,
	) -> Self {
		Self { tokens, http, requests: AuthenticatedRequestBuilder::new(config.api_root().clone()) }
	}

	/// Returns the token provider backing this client.
	pub fn token_provider(&self) -> &Arc<TokenProvider<C, M>> {
		&self.tokens
	}

	/// Returns the API root requests are resolved against.
	pub fn api_root(&self) -> &Url {
		self.requests.api_root()
	}

	/// Lists accounts with their name, city, and identifier.
	pub async fn list_accounts(&self) -> Result<Vec<AccountSummary>> {
		self.list(Operation::ListAccounts).await
	}

	/// Lists contacts with their full name, e-mail, and identifier.
	pub async fn list_contacts(&self) -> Result<Vec<ContactSummary>> {
		self.list(Operation::ListContacts).await
	}

	/// Creates an account with the given name.
	pub async fn create_account(&self, name: &str) -> Result<()> {
		self.write(Operation::CreateAccount, ACCOUNTS, &NewAccount { name }).await
	}

	/// Creates a contact with the given full name.
	pub async fn create_contact(&self, full_name: &str) -> Result<()> {
		self.write(Operation::CreateContact, CONTACTS, &NewContact { full_name }).await
	}

	/// Renames the account identified by `id`.
	pub async fn update_account(&self, id: &EntityId, name: &str) -> Result<()> {
		let path = entity::record_path(ACCOUNTS, id);

		self.write(Operation::UpdateAccount, &path, &AccountUpdate { name }).await
	}

	/// Deletes the account identified by `id`.
	pub async fn delete_account(&self, id: &EntityId) -> Result<()> {
		let operation = Operation::DeleteAccount;
		let path = entity::record_path(ACCOUNTS, id);

		self.observe(operation, |span| async move {
			self.send(&span, operation, |requests, token| {
				requests.build(token, operation.method(), &path)
			})
			.await
			.map(drop)
		})
		.await
	}

	async fn list<V>(&self, operation: Operation) -> Result<Vec<V>>
	where
		V: EntityView,
	{
		let path = V::list_path();

		self.observe(operation, |span| async move {
			let response = self
				.send(&span, operation, |requests, token| {
					requests.build(token, operation.method(), &path)
				})
				.await?;
			let bytes = response
				.bytes()
				.await
				.map_err(|e| Error::Transport { operation, source: e.into() })?;

			decode::<EntityEnvelope<V>>(operation, &bytes).map(EntityEnvelope::into_inner)
		})
		.await
	}

	async fn write<B>(&self, operation: Operation, path: &str, body: &B) -> Result<()>
	where
		B: ?Sized + Serialize,
	{
		self.observe(operation, |span| async move {
			self.send(&span, operation, |requests, token| {
				requests.build_json(token, operation.method(), path, body)
			})
			.await
			.map(drop)
		})
		.await
	}

	async fn observe<T, F, Fut>(&self, operation: Operation, run: F) -> Result<T>
	where
		F: FnOnce(FlowSpan) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let span = FlowSpan::new(FlowKind::Entity, operation.as_str());

		obs::record_flow_outcome(FlowKind::Entity, FlowOutcome::Attempt);

		let result = span.instrument(run(span.clone())).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(FlowKind::Entity, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(FlowKind::Entity, FlowOutcome::Failure),
		}

		result
	}

	async fn send<P>(&self, span: &FlowSpan, operation: Operation, prepare: P) -> Result<Response>
	where
		P: FnOnce(&AuthenticatedRequestBuilder, &AccessToken) -> Result<reqwest::Request, ConfigError>,
	{
		let token =
			self.tokens.get_token().await.map_err(|source| Error::Auth { operation, source })?;
		let request =
			prepare(&self.requests, &token).map_err(|source| Error::Request { operation, source })?;
		let response = self
			.http
			.execute(request)
			.await
			.map_err(|e| Error::Transport { operation, source: TransportError::from(e) })?;
		let status = response.status();

		span.record_status(status.as_u16());

		if status.is_success() {
			return Ok(response);
		}
		if status == StatusCode::UNAUTHORIZED {
			span.event("Remote rejected the bearer token.");
			self.tokens.invalidate_if(&token);
		}

		let retry_after = http::parse_retry_after(response.headers());
		let body = response.text().await.ok().filter(|text| !text.trim().is_empty());

		Err(RemoteError { operation, status: status.as_u16(), retry_after, body }.into())
	}
}
impl EntityClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client, its token provider, and one reqwest connection pool shared by both.
	pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
		let http = ReqwestClient::builder().build()?;
		let tokens =
			Arc::new(TokenProvider::from_config(config, ReqwestHttpClient::with_client(http.clone()))?);

		Ok(Self::with_parts(config, tokens, http))
	}
}
impl<C, M> Clone for EntityClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { tokens: self.tokens.clone(), http: self.http.clone(), requests: self.requests.clone() }
	}
}
impl<C, M> Debug for EntityClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EntityClient")
			.field("api_root", self.requests.api_root())
			.field("tokens", &self.tokens)
			.finish()
	}
}

fn decode<T>(operation: Operation, bytes: &[u8]) -> Result<T>
where
	T: serde::de::DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decoding { operation, source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn decode_reports_missing_envelope_value() {
		let err = decode::<EntityEnvelope<AccountSummary>>(Operation::ListAccounts, br#"{"items":[]}"#)
			.expect_err("An envelope without `value` should fail.");

		assert!(matches!(err, Error::Decoding { operation: Operation::ListAccounts, .. }));
	}

	#[test]
	fn decode_reports_path_of_malformed_record() {
		let err = decode::<EntityEnvelope<ContactSummary>>(
			Operation::ListContacts,
			br#"{"value":[{"fullname":"A","emailaddress1":null,"contactid":"1"},{"fullname":"B"}]}"#,
		)
		.expect_err("A record without an identifier should fail.");
		let Error::Decoding { source, .. } = err else {
			panic!("Expected a decoding error, got {err:?}.");
		};

		assert!(source.path().to_string().starts_with("value[1]"));
	}

	#[test]
	fn api_root_follows_configuration() {
		let config = crate::_preludet::test_config("http://127.0.0.1:8080");
		let client = EntityClient::new(&config).expect("Client should build.");

		assert_eq!(client.api_root().as_str(), "http://127.0.0.1:8080/api/data/v9.2/");
	}
}
