// std
use std::sync::Arc;
// self
use oidc_gate::{
	auth::{Resource, TenantId, TokenRecord, TokenSubject, UserId},
	store::{CompareAndSwapOutcome, MemoryCache, TokenCache},
	time::{Duration, OffsetDateTime},
};

fn subject(user: &str) -> TokenSubject {
	TokenSubject::new(
		UserId::new(user).expect("User fixture should be valid."),
		TenantId::new("contoso").expect("Tenant fixture should be valid."),
	)
}

fn graph() -> Resource {
	Resource::new("https://graph.windows.net").expect("Resource fixture should be valid.")
}

fn record(user: &str, access: &str, refresh: Option<&str>) -> TokenRecord {
	let mut builder = TokenRecord::builder(subject(user), graph())
		.access_token(access)
		.expires_in(Duration::hours(1));

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	builder.build().expect("Record fixture should build.")
}

#[tokio::test]
async fn save_and_fetch_round_trip() {
	let cache = MemoryCache::default();

	cache.save(record("alice", "access-a", Some("refresh-a"))).await.expect("Save should succeed.");

	let fetched = cache
		.fetch(&subject("alice"), &graph())
		.await
		.expect("Fetch should succeed.")
		.expect("Saved record should be present.");

	assert_eq!(fetched.access_token.expose(), "access-a");
}

#[tokio::test]
async fn entries_are_isolated_per_user() {
	let cache = MemoryCache::default();

	cache.save(record("alice", "access-a", None)).await.expect("Save should succeed.");
	cache.save(record("bob", "access-b", None)).await.expect("Save should succeed.");

	let alice = cache
		.fetch(&subject("alice"), &graph())
		.await
		.expect("Fetch should succeed.")
		.expect("Alice's record should be present.");
	let bob = cache
		.fetch(&subject("bob"), &graph())
		.await
		.expect("Fetch should succeed.")
		.expect("Bob's record should be present.");

	assert_eq!(alice.access_token.expose(), "access-a");
	assert_eq!(bob.access_token.expose(), "access-b");

	let carol = cache.fetch(&subject("carol"), &graph()).await.expect("Fetch should succeed.");

	assert!(carol.is_none(), "Unknown users must not observe other users' entries.");
}

#[tokio::test]
async fn entries_are_isolated_per_resource() {
	let cache = MemoryCache::default();
	let management = Resource::new("https://management.core.windows.net")
		.expect("Resource fixture should be valid.");

	cache.save(record("alice", "graph-access", None)).await.expect("Save should succeed.");

	let other =
		cache.fetch(&subject("alice"), &management).await.expect("Fetch should succeed.");

	assert!(other.is_none(), "A record for one resource must not satisfy another.");
}

#[tokio::test]
async fn compare_and_swap_rotates_only_on_matching_refresh() {
	let cache = MemoryCache::default();

	cache
		.save(record("alice", "old-access", Some("old-refresh")))
		.await
		.expect("Save should succeed.");

	let replacement = record("alice", "new-access", Some("new-refresh"));
	let outcome = cache
		.compare_and_swap_refresh(&subject("alice"), &graph(), Some("wrong"), replacement.clone())
		.await
		.expect("CAS should complete.");

	assert_eq!(outcome, CompareAndSwapOutcome::RefreshMismatch);

	let outcome = cache
		.compare_and_swap_refresh(
			&subject("alice"),
			&graph(),
			Some("old-refresh"),
			replacement,
		)
		.await
		.expect("CAS should complete.");

	assert_eq!(outcome, CompareAndSwapOutcome::Updated);

	let rotated = cache
		.fetch(&subject("alice"), &graph())
		.await
		.expect("Fetch should succeed.")
		.expect("Rotated record should be present.");

	assert_eq!(rotated.access_token.expose(), "new-access");
}

#[tokio::test]
async fn compare_and_swap_reports_missing_records() {
	let cache = MemoryCache::default();
	let outcome = cache
		.compare_and_swap_refresh(
			&subject("alice"),
			&graph(),
			Some("refresh"),
			record("alice", "access", Some("refresh")),
		)
		.await
		.expect("CAS should complete.");

	assert_eq!(outcome, CompareAndSwapOutcome::Missing);
}

#[tokio::test]
async fn revoke_marks_the_record_and_keeps_it_fetchable() {
	let cache = MemoryCache::default();

	cache.save(record("alice", "access", Some("refresh"))).await.expect("Save should succeed.");

	let revoked = cache
		.revoke(&subject("alice"), &graph(), OffsetDateTime::now_utc())
		.await
		.expect("Revoke should complete.")
		.expect("Revoked record should be returned.");

	assert!(revoked.is_revoked());

	let fetched = cache
		.fetch(&subject("alice"), &graph())
		.await
		.expect("Fetch should succeed.")
		.expect("Record should remain fetchable after revocation.");

	assert!(fetched.is_revoked());

	let missing = cache
		.revoke(&subject("bob"), &graph(), OffsetDateTime::now_utc())
		.await
		.expect("Revoke should complete.");

	assert!(missing.is_none());
}

#[tokio::test]
async fn trait_object_usage_matches_direct_usage() {
	let backend = Arc::new(MemoryCache::default());
	let cache: Arc<dyn TokenCache> = backend.clone();

	cache.save(record("alice", "access", None)).await.expect("Save should succeed.");

	let fetched = backend
		.fetch(&subject("alice"), &graph())
		.await
		.expect("Fetch should succeed.")
		.expect("Record saved through the trait object should be visible.");

	assert_eq!(fetched.access_token.expose(), "access");
}
