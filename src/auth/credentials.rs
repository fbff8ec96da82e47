//! Service credentials used for the client-credentials exchange.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TenantId, TokenSecret},
};

/// Immutable credential set supplied at construction and held for the client's lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	/// Directory tenant that issues tokens.
	pub tenant_id: TenantId,
	/// Application identifier registered with the authority.
	pub client_id: ClientId,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
	/// Base URL of the protected resource; the requested scope is derived from it.
	pub resource: Url,
}
impl Credentials {
	/// Bundles the provided credential parts.
	pub fn new(
		tenant_id: TenantId,
		client_id: ClientId,
		client_secret: impl Into<TokenSecret>,
		resource: Url,
	) -> Self {
		Self { tenant_id, client_id, client_secret: client_secret.into(), resource }
	}

	/// Returns the `<resource>/.default` scope requested during the exchange.
	pub fn scope(&self) -> String {
		format!("{}/.default", self.resource.as_str().trim_end_matches('/'))
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("tenant_id", &self.tenant_id)
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("resource", &self.resource.as_str())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn credentials(resource: &str) -> Credentials {
		Credentials::new(
			TenantId::new("tenant").expect("Tenant fixture should be valid."),
			ClientId::new("client").expect("Client fixture should be valid."),
			"very-secret",
			Url::parse(resource).expect("Resource fixture should parse."),
		)
	}

	#[test]
	fn scope_appends_default_suffix_once() {
		assert_eq!(
			credentials("https://org.crm.dynamics.com").scope(),
			"https://org.crm.dynamics.com/.default"
		);
		assert_eq!(
			credentials("https://org.crm.dynamics.com/").scope(),
			"https://org.crm.dynamics.com/.default"
		);
	}

	#[test]
	fn debug_never_prints_the_secret() {
		let rendered = format!("{:?}", credentials("https://org.crm.dynamics.com"));

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("very-secret"));
	}
}
