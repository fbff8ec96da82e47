//! Access token record, lifecycle helpers, and builder.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Lifecycle status of an [`AccessToken`] relative to an instant and a safety margin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
	/// Token may be attached to requests.
	Active,
	/// Token has not expired yet but falls inside the safety margin.
	Expiring,
	/// Token reached its expiry instant and must never be attached again.
	Expired,
}

/// Errors produced by [`AccessTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AccessTokenBuilderError {
	/// Issued when no bearer value was provided.
	#[error("Access token value is required.")]
	MissingValue,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the expiry does not come after the issued-at instant.
	#[error("Expiry must be later than the issued-at instant.")]
	ExpiryBeforeIssue,
	/// Issued when `issued_at + expires_in` does not fit in a date-time.
	#[error("Expiry is outside the representable date-time range.")]
	ExpiryOutOfRange,
}

/// Bearer token issued by the authority together with its validity window.
#[derive(Clone)]
pub struct AccessToken {
	/// Bearer value; callers must avoid logging it.
	pub secret: TokenSecret,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Instant after which the token must not be attached to requests.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Returns a builder for a new token.
	pub fn builder() -> AccessTokenBuilder {
		AccessTokenBuilder::default()
	}

	/// Computes the lifecycle status at `instant`, treating the final `margin` before expiry as
	/// [`TokenStatus::Expiring`].
	pub fn status_at(&self, instant: OffsetDateTime, margin: Duration) -> TokenStatus {
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}

		let margin = if margin.is_negative() { Duration::ZERO } else { margin };

		if self.expires_at - instant <= margin {
			return TokenStatus::Expiring;
		}

		TokenStatus::Active
	}

	/// Returns `true` if the token can be attached at `instant` with the given margin.
	pub fn is_usable_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		matches!(self.status_at(instant, margin), TokenStatus::Active)
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant, Duration::ZERO), TokenStatus::Expired)
	}

	/// Returns `true` if the token has expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Formats the `Authorization` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.secret.expose())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("secret", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`AccessToken`].
#[derive(Clone, Debug, Default)]
pub struct AccessTokenBuilder {
	secret: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl AccessTokenBuilder {
	/// Provides the bearer value.
	pub fn value(mut self, value: impl Into<String>) -> Self {
		self.secret = Some(TokenSecret::new(value));

		self
	}

	/// Sets the issued-at instant (defaults to the current clock).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces an [`AccessToken`].
	pub fn build(self) -> Result<AccessToken, AccessTokenBuilderError> {
		let secret = self
			.secret
			.filter(|secret| !secret.is_empty())
			.ok_or(AccessTokenBuilderError::MissingValue)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at
				.checked_add(delta)
				.ok_or(AccessTokenBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(AccessTokenBuilderError::MissingExpiry),
		};

		if expires_at <= issued_at {
			return Err(AccessTokenBuilderError::ExpiryBeforeIssue);
		}

		Ok(AccessToken { secret, issued_at, expires_at })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn token() -> AccessToken {
		AccessToken::builder()
			.value("bearer-value")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token fixture should build.")
	}

	#[test]
	fn status_transitions_respect_margin() {
		let token = token();
		let margin = Duration::seconds(60);

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(
			token.status_at(macros::datetime!(2025-01-01 00:30 UTC), margin),
			TokenStatus::Active
		);
		assert_eq!(
			token.status_at(macros::datetime!(2025-01-01 00:59:30 UTC), margin),
			TokenStatus::Expiring
		);
		assert_eq!(
			token.status_at(macros::datetime!(2025-01-01 01:00 UTC), margin),
			TokenStatus::Expired
		);
	}

	#[test]
	fn token_is_never_usable_at_or_after_expiry() {
		let token = token();

		assert!(token.is_usable_at(macros::datetime!(2025-01-01 00:59:59 UTC), Duration::ZERO));
		assert!(!token.is_usable_at(macros::datetime!(2025-01-01 01:00 UTC), Duration::ZERO));
		// A negative margin is clamped rather than extending validity.
		assert!(!token.is_usable_at(macros::datetime!(2025-01-01 01:00 UTC), Duration::minutes(-5)));
		assert!(token.is_expired_at(macros::datetime!(2025-01-01 02:00 UTC)));
	}

	#[test]
	fn builder_validates_inputs() {
		assert_eq!(
			AccessToken::builder().expires_in(Duration::minutes(5)).build().unwrap_err(),
			AccessTokenBuilderError::MissingValue,
		);
		assert_eq!(
			AccessToken::builder().value("v").build().unwrap_err(),
			AccessTokenBuilderError::MissingExpiry,
		);
		assert_eq!(
			AccessToken::builder().value("v").expires_in(Duration::ZERO).build().unwrap_err(),
			AccessTokenBuilderError::ExpiryBeforeIssue,
		);
		assert_eq!(
			AccessToken::builder().value("v").expires_in(Duration::MAX).build().unwrap_err(),
			AccessTokenBuilderError::ExpiryOutOfRange,
		);
	}

	#[test]
	fn debug_and_bearer_formatting() {
		let token = token();

		assert_eq!(token.bearer(), "Bearer bearer-value");
		assert!(!format!("{token:?}").contains("bearer-value"));
	}
}
