//! Immutable token record structs, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{
		Resource,
		token::{secret::TokenSecret, subject::TokenSubject},
	},
};

/// Current lifecycle status for a token record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is not yet valid because the issued-at instant is in the future.
	Pending,
	/// Token is currently valid.
	Active,
	/// Token exceeded its expiry instant.
	Expired,
	/// Token has been revoked locally or by the provider.
	Revoked,
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Immutable record describing an acquired access token.
#[derive(Serialize, Deserialize, Clone)]
pub struct TokenRecord {
	/// User+tenant pair the token was minted for.
	pub subject: TokenSubject,
	/// Resource the access token is scoped to.
	pub resource: Resource,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Issued-at instant recorded from the provider response.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from issued_at plus expires_in or absolute expiry.
	pub expires_at: OffsetDateTime,
	/// Revocation instant if the record has been revoked.
	pub revoked_at: Option<OffsetDateTime>,
}
impl TokenRecord {
	/// Returns a builder for constructing rotation-friendly records.
	pub fn builder(subject: TokenSubject, resource: Resource) -> TokenRecordBuilder {
		TokenRecordBuilder::new(subject, resource)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.revoked_at.is_some() {
			return TokenStatus::Revoked;
		}
		if instant < self.issued_at {
			return TokenStatus::Pending;
		}
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the record is currently active (not pending/expired/revoked).
	pub fn is_active(&self) -> bool {
		matches!(self.status(), TokenStatus::Active)
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the record has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Marks the record as revoked.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at = Some(instant);
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("subject", &self.subject)
			.field("resource", &self.resource)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	subject: TokenSubject,
	resource: Resource,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	fn new(subject: TokenSubject, resource: Resource) -> Self {
		Self {
			subject,
			resource,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the issued-at instant.
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

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			subject: self.subject,
			resource: self.resource,
			access_token,
			refresh_token: self.refresh_token,
			issued_at,
			expires_at,
			revoked_at: None,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{TenantId, UserId};

	fn subject() -> TokenSubject {
		TokenSubject::new(
			UserId::new("user-1").expect("User fixture should be valid."),
			TenantId::new("contoso").expect("Tenant fixture should be valid."),
		)
	}

	fn resource() -> Resource {
		Resource::new("https://graph.windows.net").expect("Resource fixture should be valid.")
	}

	#[test]
	fn status_transitions_cover_all_states() {
		let issued = macros::datetime!(2025-06-01 00:00 UTC);
		let expires = macros::datetime!(2025-06-01 01:00 UTC);
		let mut record = TokenRecord::builder(subject(), resource())
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(issued)
			.expires_at(expires)
			.build()
			.expect("Token record builder should succeed for status transitions.");

		assert_eq!(record.status_at(macros::datetime!(2025-05-31 23:59 UTC)), TokenStatus::Pending);
		assert_eq!(record.status_at(macros::datetime!(2025-06-01 00:30 UTC)), TokenStatus::Active);
		assert_eq!(record.status_at(macros::datetime!(2025-06-01 01:00 UTC)), TokenStatus::Expired);

		record.revoke(macros::datetime!(2025-06-01 00:10 UTC));

		assert_eq!(record.status_at(macros::datetime!(2025-06-01 00:30 UTC)), TokenStatus::Revoked);
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let record = TokenRecord::builder(subject(), resource())
			.access_token("secret")
			.issued_at(macros::datetime!(2025-06-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Token record builder should support relative expiry calculations.");

		assert_eq!(record.expires_at, macros::datetime!(2025-06-01 00:30 UTC));
	}

	#[test]
	fn builder_requires_access_token_and_expiry() {
		let err = TokenRecord::builder(subject(), resource())
			.expires_in(Duration::minutes(5))
			.build()
			.expect_err("Missing access token must be rejected.");

		assert_eq!(err, TokenRecordBuilderError::MissingAccessToken);

		let err = TokenRecord::builder(subject(), resource())
			.access_token("access")
			.build()
			.expect_err("Missing expiry must be rejected.");

		assert_eq!(err, TokenRecordBuilderError::MissingExpiry);
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let record = TokenRecord::builder(subject(), resource())
			.access_token("access-secret")
			.refresh_token("refresh-secret")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token record fixture should build successfully.");
		let rendered = format!("{record:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}
