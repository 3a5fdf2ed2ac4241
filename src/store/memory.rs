//! Thread-safe in-memory [`TokenCache`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{Resource, TokenRecord, TokenSubject, token::secret::TokenSecret},
	store::{CacheFuture, CacheKey, CompareAndSwapOutcome, StoreError, TokenCache},
};

type CacheMap = Arc<RwLock<HashMap<CacheKey, TokenRecord>>>;

/// Thread-safe cache backend that keeps records in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(CacheMap);
impl MemoryCache {
	fn save_now(map: CacheMap, record: TokenRecord) -> Result<(), StoreError> {
		let key = CacheKey::new(&record.subject, &record.resource);

		map.write().insert(key, record);

		Ok(())
	}

	fn fetch_now(map: CacheMap, subject: TokenSubject, resource: Resource) -> Option<TokenRecord> {
		let key = CacheKey::new(&subject, &resource);

		map.read().get(&key).cloned()
	}

	fn cas_now(
		map: CacheMap,
		subject: TokenSubject,
		resource: Resource,
		expected_refresh: Option<&str>,
		replacement: TokenRecord,
	) -> CompareAndSwapOutcome {
		let key = CacheKey::new(&subject, &resource);
		let mut guard = map.write();
		let outcome = match guard.get(&key) {
			Some(existing)
				if refresh_matches(existing.refresh_token.as_ref(), expected_refresh) =>
				CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
			None => CompareAndSwapOutcome::Missing,
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			guard.insert(key, replacement);
		}

		outcome
	}

	fn revoke_now(
		map: CacheMap,
		subject: TokenSubject,
		resource: Resource,
		instant: OffsetDateTime,
	) -> Option<TokenRecord> {
		let key = CacheKey::new(&subject, &resource);
		let mut guard = map.write();

		match guard.get_mut(&key) {
			Some(record) => {
				record.revoke(instant);

				Some(record.clone())
			},
			None => None,
		}
	}
}
impl TokenCache for MemoryCache {
	fn save(&self, record: TokenRecord) -> CacheFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, record) })
	}

	fn fetch<'a>(
		&'a self,
		subject: &'a TokenSubject,
		resource: &'a Resource,
	) -> CacheFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();
		let subject = subject.to_owned();
		let resource = resource.to_owned();

		Box::pin(async move { Ok(Self::fetch_now(map, subject, resource)) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		subject: &'a TokenSubject,
		resource: &'a Resource,
		expected_refresh: Option<&'a str>,
		replacement: TokenRecord,
	) -> CacheFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();
		let subject = subject.to_owned();
		let resource = resource.to_owned();

		Box::pin(async move {
			Ok(Self::cas_now(map, subject, resource, expected_refresh, replacement))
		})
	}

	fn revoke<'a>(
		&'a self,
		subject: &'a TokenSubject,
		resource: &'a Resource,
		instant: OffsetDateTime,
	) -> CacheFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();
		let subject = subject.to_owned();
		let resource = resource.to_owned();

		Box::pin(async move { Ok(Self::revoke_now(map, subject, resource, instant)) })
	}
}

pub(crate) fn refresh_matches(current: Option<&TokenSecret>, expected: Option<&str>) -> bool {
	match (current.map(TokenSecret::expose), expected) {
		(None, None) => true,
		(Some(cur), Some(exp)) => cur == exp,
		_ => false,
	}
}
