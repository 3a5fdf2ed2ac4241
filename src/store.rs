//! Storage contracts and built-in token cache implementations.
//!
//! The cache is keyed per user+tenant+resource, so concurrent logins for
//! different users never observe each other's entries.

pub mod file;
pub mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

// self
use crate::{
	_prelude::*,
	auth::{Resource, TokenRecord, TokenSubject},
};

/// Future type returned by every [`TokenCache`] operation.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by token caches.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Persists or replaces the record for its subject + resource.
	fn save(&self, record: TokenRecord) -> CacheFuture<'_, ()>;

	/// Fetches the record associated with the subject + resource, if present.
	fn fetch<'a>(
		&'a self,
		subject: &'a TokenSubject,
		resource: &'a Resource,
	) -> CacheFuture<'a, Option<TokenRecord>>;

	/// Atomically rotates a refresh token if the expected secret matches.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		subject: &'a TokenSubject,
		resource: &'a Resource,
		expected_refresh: Option<&'a str>,
		replacement: TokenRecord,
	) -> CacheFuture<'a, CompareAndSwapOutcome>;

	/// Marks a record as revoked at the provided instant.
	fn revoke<'a>(
		&'a self,
		subject: &'a TokenSubject,
		resource: &'a Resource,
		instant: OffsetDateTime,
	) -> CacheFuture<'a, Option<TokenRecord>>;
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh secret matched the expected value and the record was updated.
	Updated,
	/// The record exists but the expected refresh secret did not match.
	RefreshMismatch,
	/// No record matched the provided subject + resource.
	Missing,
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Unique key identifying a cached token record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
	/// Subject (user + tenant) component.
	pub subject: TokenSubject,
	/// Resource fingerprint used for partitioning.
	pub resource_fingerprint: String,
}
impl CacheKey {
	/// Builds a key from the provided subject and resource.
	pub fn new(subject: &TokenSubject, resource: &Resource) -> Self {
		Self { subject: subject.clone(), resource_fingerprint: resource.fingerprint() }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::{
		auth::{TenantId, UserId},
		error::Error,
	};

	fn subject(user: &str) -> TokenSubject {
		TokenSubject::new(
			UserId::new(user).expect("User fixture should be valid."),
			TenantId::new("contoso").expect("Tenant fixture should be valid."),
		)
	}

	#[test]
	fn store_error_converts_into_gate_error_with_source() {
		let store_error = StoreError::Backend { message: "cache file unreadable".into() };
		let gate_error: Error = store_error.clone().into();

		assert!(matches!(gate_error, Error::Storage(_)));
		assert!(gate_error.to_string().contains("cache file unreadable"));

		let source = StdError::source(&gate_error)
			.expect("Gate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn cache_keys_partition_by_user_and_resource() {
		let graph =
			Resource::new("https://graph.windows.net").expect("Resource fixture should be valid.");
		let management = Resource::new("https://management.core.windows.net")
			.expect("Resource fixture should be valid.");

		assert_eq!(CacheKey::new(&subject("alice"), &graph), CacheKey::new(&subject("alice"), &graph));
		assert_ne!(CacheKey::new(&subject("alice"), &graph), CacheKey::new(&subject("bob"), &graph));
		assert_ne!(
			CacheKey::new(&subject("alice"), &graph),
			CacheKey::new(&subject("alice"), &management),
		);
	}
}
