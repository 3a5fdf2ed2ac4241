//! Token acquisition: authorization-code exchange and silent refresh.
//!
//! [`TokenAcquirer`] owns the HTTP transport, the token cache, the authority,
//! and the client credential so both acquisition paths apply one credential
//! and one caching policy. Both consult the cache before contacting the
//! provider. The silent path never touches the authorize endpoint: it is
//! cache + `grant_type=refresh_token` only, serialized per cache key by
//! singleflight guards, with compare-and-swap rotation underneath so
//! concurrent logins for the same user cannot clobber each other's refresh
//! secrets.

mod metrics;

pub use metrics::SilentMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Resource, TokenRecord, TokenSubject},
	config::{Authority, ClientCredential},
	error::{ConfigError, TokenError},
	http::TokenHttpClient,
	oauth::{TokenFacade, TransportErrorMapper},
	obs::{self, StageKind, StageOutcome, StageSpan},
	store::{CacheKey, CompareAndSwapOutcome, TokenCache},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Acquirer specialized for the crate's default reqwest transport stack.
pub type ReqwestAcquirer = TokenAcquirer<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Request parameters for silent acquisition.
///
/// The cached record is evaluated before the provider is contacted: a record
/// that is revoked, expired, forced, or inside the jittered preemptive window
/// triggers a refresh; anything else is returned as-is.
#[derive(Clone, Debug)]
pub struct SilentRequest {
	/// User+tenant pair the token must belong to.
	pub subject: TokenSubject,
	/// Resource the access token must be scoped to.
	pub resource: Resource,
	/// Forces cache bypass when true.
	pub force: bool,
	/// Jittered preemptive window used when refreshing early.
	pub preemptive_window: Duration,
}
impl SilentRequest {
	const DEFAULT_PREEMPTIVE_WINDOW: Duration = Duration::seconds(60);

	/// Creates a new request for the provided subject/resource pair.
	pub fn new(subject: TokenSubject, resource: Resource) -> Self {
		Self {
			subject,
			resource,
			force: false,
			preemptive_window: Self::DEFAULT_PREEMPTIVE_WINDOW,
		}
	}

	/// Forces the acquirer to bypass cache checks.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Overrides the jittered preemptive window (defaults to 60 seconds).
	pub fn with_preemptive_window(mut self, window: Duration) -> Self {
		self.preemptive_window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Determines whether the cached record should be refreshed.
	pub fn should_refresh(&self, record: &TokenRecord, now: OffsetDateTime) -> bool {
		if self.force || record.is_revoked() || record.is_expired_at(now) {
			return true;
		}

		let effective_window = self.effective_preemptive_window();

		if effective_window.is_zero() {
			return false;
		}

		let remaining = record.expires_at - now;

		remaining <= effective_window
	}

	fn effective_preemptive_window(&self) -> Duration {
		self.preemptive_window.checked_sub(self.preemptive_jitter()).unwrap_or(Duration::ZERO)
	}

	fn preemptive_jitter(&self) -> Duration {
		let window_secs = self.preemptive_window.whole_seconds();

		if window_secs <= 1 {
			return Duration::ZERO;
		}

		let modulus = u64::try_from(window_secs).unwrap_or(u64::MAX);

		if modulus == 0 {
			return Duration::ZERO;
		}

		let jitter_secs = self.jitter_seed() % modulus;

		if jitter_secs == 0 {
			return Duration::ZERO;
		}

		let clamped = i64::try_from(jitter_secs).unwrap_or(i64::MAX);

		Duration::seconds(clamped)
	}

	fn jitter_seed(&self) -> u64 {
		let mut hasher = DefaultHasher::new();

		self.subject.hash(&mut hasher);
		self.resource.hash(&mut hasher);

		hasher.finish()
	}
}

/// Acquires resource-scoped tokens by authorization code or silent refresh.
#[derive(Clone)]
pub struct TokenAcquirer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound token request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Per-user token cache consulted before every exchange.
	pub cache: Arc<dyn TokenCache>,
	/// Authority both acquisition paths exchange tokens against.
	pub authority: Authority,
	/// Client credential presented on every token-endpoint call.
	pub credential: ClientCredential,
	/// Shared counters for silent acquisition outcomes.
	pub silent_metrics: Arc<SilentMetrics>,
	flow_guards: Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> TokenAcquirer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an acquirer that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		cache: Arc<dyn TokenCache>,
		authority: Authority,
		credential: ClientCredential,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			cache,
			authority,
			credential,
			silent_metrics: Default::default(),
			flow_guards: Default::default(),
		}
	}

	/// Exchanges a single-use authorization code for a resource-scoped token.
	///
	/// The cache is consulted first; an active record for the subject+resource
	/// makes the exchange unnecessary and the code is simply never spent. A
	/// failed exchange must not be retried by callers; the code is gone.
	pub async fn acquire_by_code(
		&self,
		subject: TokenSubject,
		code: &str,
		redirect_uri: &Url,
		resource: &Resource,
	) -> Result<TokenRecord> {
		const KIND: StageKind = StageKind::CodeExchange;

		let span = StageSpan::new(KIND, "acquire_by_code");

		obs::record_stage_outcome(KIND, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				if let Some(existing) = self.cache.fetch(&subject, resource).await? {
					if existing.is_active() {
						return Ok(existing);
					}
				}

				let facade = <TokenFacade<C, M>>::from_authority(
					&self.authority,
					&self.credential,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;
				let record = facade
					.exchange_authorization_code(subject, code, redirect_uri, resource)
					.await?;

				self.cache.save(record.clone()).await?;

				Ok(record)
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(KIND, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(KIND, StageOutcome::Failure),
		}

		result
	}

	/// Acquires a token without user interaction, refreshing only when needed.
	///
	/// The method performs no interactive or code-based flow under any
	/// circumstance. Cache misses are an [`TokenError::InvalidGrant`]: there
	/// is nothing to refresh and nothing this path is allowed to do about it.
	pub async fn acquire_silent(&self, request: SilentRequest) -> Result<TokenRecord> {
		const KIND: StageKind = StageKind::SilentRefresh;

		let span = StageSpan::new(KIND, "acquire_silent");

		obs::record_stage_outcome(KIND, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.silent_metrics.record_attempt();

				let subject = request.subject.clone();
				let resource = request.resource.clone();
				let key = CacheKey::new(&subject, &resource);
				let guard = self.flow_guard(&key);
				let _singleflight = guard.lock().await;
				let now = OffsetDateTime::now_utc();
				let current = self
					.cache
					.fetch(&subject, &resource)
					.await
					.map_err(|err| {
						self.silent_metrics.record_failure();

						Error::from(err)
					})?
					.ok_or_else(|| {
						self.silent_metrics.record_failure();

						Error::from(TokenError::InvalidGrant {
							reason: "No cached token record is available for silent acquisition."
								.into(),
						})
					})?;

				if !request.should_refresh(&current, now) {
					self.silent_metrics.record_success();

					return Ok(current);
				}

				let expected_refresh = current
					.refresh_token
					.as_ref()
					.map(|secret| secret.expose().to_string())
					.ok_or_else(|| {
						self.silent_metrics.record_failure();

						Error::from(ConfigError::MissingRefreshToken)
					})?;
				let facade = <TokenFacade<C, M>>::from_authority(
					&self.authority,
					&self.credential,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)
				.inspect_err(|_| {
					self.silent_metrics.record_failure();
				})?;
				let (fresh, new_refresh) = match facade
					.refresh_token(subject.clone(), &expected_refresh, &resource)
					.await
				{
					Ok(result) => result,
					Err(err) => {
						if matches!(
							err,
							Error::Token(TokenError::InvalidGrant { .. })
								| Error::Token(TokenError::Expired { .. }),
						) {
							let _ = self.cache.revoke(&subject, &resource, now).await;
						}

						self.silent_metrics.record_failure();

						return Err(err);
					},
				};
				let updated = if new_refresh.is_some() {
					fresh
				} else {
					// Provider did not rotate; carry the proven refresh secret forward.
					TokenRecord::builder(fresh.subject.clone(), fresh.resource.clone())
						.access_token(fresh.access_token.expose())
						.issued_at(fresh.issued_at)
						.expires_at(fresh.expires_at)
						.refresh_token(expected_refresh.clone())
						.build()
						.map_err(|err| {
							self.silent_metrics.record_failure();

							Error::from(ConfigError::from(err))
						})?
				};
				let outcome = self
					.cache
					.compare_and_swap_refresh(
						&subject,
						&resource,
						Some(expected_refresh.as_str()),
						updated.clone(),
					)
					.await
					.map_err(|err| {
						self.silent_metrics.record_failure();

						Error::from(err)
					})?;
				let result = match outcome {
					CompareAndSwapOutcome::Updated => updated,
					CompareAndSwapOutcome::Missing => {
						self.cache.save(updated.clone()).await.map_err(|err| {
							self.silent_metrics.record_failure();

							Error::from(err)
						})?;

						updated
					},
					CompareAndSwapOutcome::RefreshMismatch => {
						// Another flow rotated first; its record wins.
						match self.cache.fetch(&subject, &resource).await.map_err(|err| {
							self.silent_metrics.record_failure();

							Error::from(err)
						})? {
							Some(existing) => existing,
							None => {
								self.cache.save(updated.clone()).await.map_err(|err| {
									self.silent_metrics.record_failure();

									Error::from(err)
								})?;

								updated
							},
						}
					},
				};

				self.silent_metrics.record_success();

				Ok(result)
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(KIND, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(KIND, StageOutcome::Failure),
		}

		result
	}

	/// Returns (and creates on demand) the singleflight guard for a cache key.
	fn flow_guard(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
#[cfg(feature = "reqwest")]
impl TokenAcquirer<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an acquirer with the crate's default reqwest transport.
	pub fn new(
		cache: Arc<dyn TokenCache>,
		authority: Authority,
		credential: ClientCredential,
	) -> Self {
		Self::with_http_client(
			cache,
			authority,
			credential,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}

	/// Builds an acquirer straight from validated startup settings.
	pub fn from_settings(
		settings: &crate::config::AppSettings,
		cache: Arc<dyn TokenCache>,
	) -> Result<Self, ConfigError> {
		Ok(Self::new(cache, settings.authority()?, settings.credential()))
	}
}
impl<C, M> Debug for TokenAcquirer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenAcquirer")
			.field("authority", &self.authority)
			.field("client_id", &self.credential.client_id)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{TenantId, UserId};

	fn request() -> SilentRequest {
		SilentRequest::new(
			TokenSubject::new(
				UserId::new("user-1").expect("User fixture should be valid."),
				TenantId::new("contoso").expect("Tenant fixture should be valid."),
			),
			Resource::new("https://graph.windows.net").expect("Resource fixture should be valid."),
		)
	}

	fn record(expires_in: Duration) -> TokenRecord {
		let request = request();

		TokenRecord::builder(request.subject, request.resource)
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(OffsetDateTime::now_utc() - Duration::minutes(5))
			.expires_in(Duration::minutes(5) + expires_in)
			.build()
			.expect("Record fixture should build.")
	}

	#[test]
	fn fresh_records_are_reused() {
		let silent = request().with_preemptive_window(Duration::ZERO);

		assert!(!silent.should_refresh(&record(Duration::hours(1)), OffsetDateTime::now_utc()));
	}

	#[test]
	fn expired_revoked_and_forced_records_refresh() {
		let now = OffsetDateTime::now_utc();
		let silent = request();

		assert!(silent.should_refresh(&record(Duration::seconds(-30)), now));

		let mut revoked = record(Duration::hours(1));

		revoked.revoke(now);

		assert!(silent.should_refresh(&revoked, now));
		assert!(request().force_refresh().should_refresh(&record(Duration::hours(1)), now));
	}

	#[test]
	fn preemptive_window_triggers_early_refresh() {
		let now = OffsetDateTime::now_utc();
		let silent = request().with_preemptive_window(Duration::seconds(1));

		// A one-second window carries no jitter, so a record expiring within it refreshes.
		assert!(silent.should_refresh(&record(Duration::milliseconds(500)), now));
		assert!(!silent.should_refresh(&record(Duration::hours(1)), now));
	}

	#[test]
	fn jitter_is_deterministic_per_subject() {
		let lhs = request().preemptive_jitter();
		let rhs = request().preemptive_jitter();

		assert_eq!(lhs, rhs);
	}

	#[test]
	fn negative_windows_clamp_to_zero() {
		let silent = request().with_preemptive_window(Duration::seconds(-5));

		assert_eq!(silent.preemptive_window, Duration::ZERO);
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn acquirer_builds_from_settings() {
		use crate::{config::AppSettings, store::MemoryCache};

		let settings = AppSettings::from_lookup(|key| {
			let value = match key {
				"AAD_CLIENT_ID" => "client-123",
				"AAD_CLIENT_SECRET" => "s3cret",
				"AAD_INSTANCE" => "https://login.microsoftonline.com/",
				"AAD_TENANT_ID" => "contoso",
				"AAD_POST_LOGOUT_REDIRECT_URI" => "https://app.example.com/",
				_ => return None,
			};

			Some(value.to_owned())
		})
		.expect("Settings fixture should load.");
		let acquirer =
			ReqwestAcquirer::from_settings(&settings, Arc::new(MemoryCache::default()))
				.expect("Acquirer should build from valid settings.");

		assert!(
			acquirer.authority.token_endpoint().as_str().ends_with("/contoso/oauth2/token"),
		);
	}
}
