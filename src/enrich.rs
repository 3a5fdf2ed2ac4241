//! Post-login claims enrichment: group memberships to role claims, best effort.
//!
//! Enrichment never fails a login. The tenant claim is a prerequisite: when it
//! is absent the whole pass is skipped before any per-group work. Once the
//! loop runs, every failure is absorbed per group: the group is skipped,
//! the error is logged, and the remaining claims are still attempted. The
//! suppression is deliberately broad (transport failures and malformed
//! responses included, not just not-found); an unresolved group must never
//! block a login.

// self
use crate::{
	_prelude::*,
	acquire::{SilentRequest, TokenAcquirer},
	auth::{GroupId, Resource, TenantId, TokenSecret, TokenSubject, UserId},
	claims::{Claim, Identity, kind},
	directory::DirectoryLookup,
	error::{HandshakeError, LookupError, TokenError},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, StageKind, StageOutcome, StageSpan},
};

/// Future type returned by [`TokenProvider`] implementations.
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenSecret>> + 'a + Send>>;

/// Silent-credential seam the enricher uses for directory calls.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Produces a directory-scoped access token for the signed-in identity
	/// without any user interaction.
	fn directory_token<'a>(&'a self, identity: &'a Identity) -> ProviderFuture<'a>;
}

/// [`TokenProvider`] backed by silent acquisition against the directory resource.
pub struct SilentTokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	acquirer: Arc<TokenAcquirer<C, M>>,
	resource: Resource,
}
impl<C, M> SilentTokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a provider scoped to the given directory resource.
	pub fn new(acquirer: Arc<TokenAcquirer<C, M>>, resource: Resource) -> Self {
		Self { acquirer, resource }
	}
}
impl<C, M> TokenProvider for SilentTokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn directory_token<'a>(&'a self, identity: &'a Identity) -> ProviderFuture<'a> {
		Box::pin(async move {
			let user = identity
				.user_id()
				.ok_or(HandshakeError::MissingClaim { claim: kind::NAME_ID })?;
			let tenant = identity
				.tenant_id()
				.ok_or(HandshakeError::MissingClaim { claim: kind::TENANT_ID })?;
			let user = UserId::new(user)
				.map_err(|err| TokenError::InvalidGrant { reason: err.to_string() })?;
			let tenant = TenantId::new(tenant)
				.map_err(|err| TokenError::InvalidGrant { reason: err.to_string() })?;
			let record = self
				.acquirer
				.acquire_silent(SilentRequest::new(
					TokenSubject::new(user, tenant),
					self.resource.clone(),
				))
				.await?;

			Ok(record.access_token)
		})
	}
}

/// Appends role claims resolved from directory group memberships.
pub struct ClaimsEnricher {
	directory: Arc<dyn DirectoryLookup>,
	tokens: Arc<dyn TokenProvider>,
}
impl ClaimsEnricher {
	/// Creates an enricher over the provided directory and token seams.
	pub fn new(directory: Arc<dyn DirectoryLookup>, tokens: Arc<dyn TokenProvider>) -> Self {
		Self { directory, tokens }
	}

	/// Resolves every `groups` claim to a `role` claim, best effort.
	///
	/// Never fails as a whole. Original claims are neither removed nor
	/// reordered; resolved roles are appended in group-claim order, duplicates
	/// processed independently. An identity with no `groups` claims is
	/// returned unchanged.
	pub async fn enrich(&self, mut identity: Identity) -> Identity {
		let Some(tenant_raw) = identity.tenant_id().map(str::to_owned) else {
			obs::log_absorbed(
				StageKind::GroupLookup,
				"enrich",
				&HandshakeError::MissingClaim { claim: kind::TENANT_ID },
			);

			return identity;
		};
		let tenant = match TenantId::new(&tenant_raw) {
			Ok(tenant) => tenant,
			Err(err) => {
				obs::log_absorbed(StageKind::GroupLookup, "enrich", &err);

				return identity;
			},
		};
		let groups: Vec<String> = identity.find_all(kind::GROUPS).map(str::to_owned).collect();

		for group_value in groups {
			let span = StageSpan::new(StageKind::GroupLookup, "enrich");

			obs::record_stage_outcome(StageKind::GroupLookup, StageOutcome::Attempt);

			match span.instrument(self.resolve(&tenant, &group_value, &identity)).await {
				Ok(Some(display_name)) => {
					obs::record_stage_outcome(StageKind::GroupLookup, StageOutcome::Success);
					identity.push(Claim::role(display_name));
				},
				Ok(None) => {
					obs::record_stage_outcome(StageKind::GroupLookup, StageOutcome::Success);
					obs::log_skipped(StageKind::GroupLookup, &group_value);
				},
				Err(err) => {
					obs::record_stage_outcome(StageKind::GroupLookup, StageOutcome::Failure);
					obs::log_absorbed(StageKind::GroupLookup, &group_value, &err);
				},
			}
		}

		identity
	}

	async fn resolve(
		&self,
		tenant: &TenantId,
		group_value: &str,
		identity: &Identity,
	) -> Result<Option<String>> {
		let group = GroupId::new(group_value)
			.map_err(|source| LookupError::InvalidGroupId { source })?;
		let token = self.tokens.directory_token(identity).await?;

		Ok(self.directory.group_display_name(tenant, &group, &token).await?)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct StaticToken;
	impl TokenProvider for StaticToken {
		fn directory_token<'a>(&'a self, _: &'a Identity) -> ProviderFuture<'a> {
			Box::pin(async { Ok(TokenSecret::new("directory-token")) })
		}
	}

	struct NoDirectory;
	impl DirectoryLookup for NoDirectory {
		fn group_display_name<'a>(
			&'a self,
			_: &'a TenantId,
			_: &'a GroupId,
			_: &'a TokenSecret,
		) -> crate::directory::LookupFuture<'a, Option<String>> {
			Box::pin(async { panic!("Directory must not be called without a tenant claim.") })
		}
	}

	#[tokio::test]
	async fn missing_tenant_claim_skips_enrichment_entirely() {
		let enricher = ClaimsEnricher::new(Arc::new(NoDirectory), Arc::new(StaticToken));
		let identity = Identity::new([
			Claim::new(kind::NAME_ID, "user-1"),
			Claim::new(kind::GROUPS, "g-1"),
		]);
		let enriched = enricher.enrich(identity.clone()).await;

		assert_eq!(enriched, identity);
	}

	#[tokio::test]
	async fn zero_groups_is_a_no_op() {
		let enricher = ClaimsEnricher::new(Arc::new(NoDirectory), Arc::new(StaticToken));
		let identity = Identity::new([
			Claim::new(kind::NAME_ID, "user-1"),
			Claim::new(kind::TENANT_ID, "contoso"),
		]);
		let enriched = enricher.enrich(identity.clone()).await;

		assert_eq!(enriched, identity);
	}
}
