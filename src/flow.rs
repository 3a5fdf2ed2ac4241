//! Login callback orchestration: handshake validation, code exchange,
//! enrichment, and session commit as one sequential pipeline.
//!
//! Each login attempt is a single asynchronous chain of fallible steps with
//! one terminal failure branch: every failure short-circuits to
//! [`LoginOutcome::Failed`], which carries a redirect to the landing path with
//! the error message in the `errormessage` query parameter. No step retries,
//! and nothing recovers silently; a failed login is a user-visible event.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	acquire::TokenAcquirer,
	auth::{Resource, TenantId, TokenRecord, TokenSubject, UserId},
	claims::{Identity, kind},
	enrich::ClaimsEnricher,
	error::HandshakeError,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, StageKind, StageOutcome},
};

const STATE_LEN: usize = 32;

/// Pipeline stages of one login attempt.
///
/// A [`LoginOutcome::Failed`] records the last stage that completed before the
/// pipeline stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginStage {
	/// Authorization code and state received from the user agent.
	CodeReceived,
	/// Code exchanged for a resource-scoped token.
	TokenAcquired,
	/// Role claims appended from directory lookups.
	ClaimsEnriched,
	/// Identity handed to session establishment.
	SessionCommitted,
}
impl LoginStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginStage::CodeReceived => "code_received",
			LoginStage::TokenAcquired => "token_acquired",
			LoginStage::ClaimsEnriched => "claims_enriched",
			LoginStage::SessionCommitted => "session_committed",
		}
	}
}
impl Display for LoginStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failure reported by a [`SessionSink`] while committing the identity.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Session establishment failed: {message}.")]
pub struct SessionError {
	/// Sink-supplied failure summary.
	pub message: String,
}
impl SessionError {
	/// Creates a session error from a failure summary.
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

/// Future type returned by [`SessionSink::commit`].
pub type SessionFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SessionError>> + 'a + Send>>;

/// Session establishment seam (cookie issuance lives outside the gate).
///
/// `commit` consumes the identity, so a committed identity is immutable by
/// construction. The orchestrator never retries a commit.
pub trait SessionSink
where
	Self: Send + Sync,
{
	/// Establishes the signed-in session for the enriched identity.
	fn commit(&self, identity: Identity) -> SessionFuture<'_>;
}

/// Query parameters delivered to the redirect endpoint.
#[derive(Clone, Debug, Default)]
pub struct CallbackParams {
	/// Authorization code, when the provider granted one.
	pub code: Option<String>,
	/// Round-tripped `state` value.
	pub state: Option<String>,
	/// Provider-reported error code, when the authorization failed upstream.
	pub error: Option<String>,
	/// Provider-reported error description.
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Extracts the recognized parameters from a redirect URL's query.
	pub fn from_query(url: &Url) -> Self {
		let mut params = Self::default();

		for (key, value) in url.query_pairs() {
			match key.as_ref() {
				"code" => params.code = Some(value.into_owned()),
				"state" => params.state = Some(value.into_owned()),
				"error" => params.error = Some(value.into_owned()),
				"error_description" => params.error_description = Some(value.into_owned()),
				_ => {},
			}
		}

		params
	}
}

/// Login handshake metadata returned by [`LoginOrchestrator::start_login`].
///
/// The `state` value must round-trip via the redirect handler; the callback
/// validates it before anything else.
#[derive(Clone, Debug)]
pub struct LoginSession {
	/// Opaque state value issued for this attempt.
	pub state: String,
	/// Redirect URI the provider will send the user agent back to.
	pub redirect_uri: Url,
	/// Fully-formed authorize URL callers should send end-users to.
	pub authorize_url: Url,
}
impl LoginSession {
	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: Option<&str>) -> Result<(), HandshakeError> {
		if returned_state == Some(self.state.as_str()) {
			Ok(())
		} else {
			Err(HandshakeError::StateMismatch)
		}
	}
}

/// Terminal result of one login attempt.
#[derive(Debug)]
pub enum LoginOutcome {
	/// Pipeline completed; the session sink accepted the enriched identity.
	Committed {
		/// Token record acquired during the code exchange.
		token: TokenRecord,
	},
	/// Pipeline hit the terminal failure state.
	Failed {
		/// Last stage that completed before the failure.
		stage: LoginStage,
		/// Underlying failure.
		error: Error,
		/// Where to send the user agent (`{landing}?errormessage=<msg>`).
		redirect: Url,
	},
}
impl LoginOutcome {
	/// Returns `true` when the session was committed.
	pub fn is_committed(&self) -> bool {
		matches!(self, Self::Committed { .. })
	}
}

/// Sequences one login attempt from received code to committed session.
///
/// The orchestrator holds the client credential state as fields (via the
/// acquirer) instead of capturing it per callback, so handling a callback is a
/// plain method invocation. No timeout is configured and no cancellation is
/// wired in; a hanging downstream call blocks the attempt indefinitely.
pub struct LoginOrchestrator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Token acquirer used for the code exchange (and, via the enricher's
	/// provider seam, silent directory credentials).
	pub acquirer: Arc<TokenAcquirer<C, M>>,
	/// Claims enricher invoked after the exchange.
	pub enricher: ClaimsEnricher,
	/// Session establishment collaborator.
	pub sink: Arc<dyn SessionSink>,
	/// Resource the login token is scoped to.
	pub resource: Resource,
	/// Redirect URI registered for the code flow.
	pub redirect_uri: Url,
	/// Landing URL failures redirect to.
	pub landing: Url,
}
impl<C, M> LoginOrchestrator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an orchestrator over the provided collaborators.
	pub fn new(
		acquirer: Arc<TokenAcquirer<C, M>>,
		enricher: ClaimsEnricher,
		sink: Arc<dyn SessionSink>,
		resource: Resource,
		redirect_uri: Url,
		landing: Url,
	) -> Self {
		Self { acquirer, enricher, sink, resource, redirect_uri, landing }
	}

	/// Issues a new login session with a fresh `state` and authorize URL.
	pub fn start_login(&self) -> LoginSession {
		let state = random_string(STATE_LEN);
		let authorize_url = self.build_authorize_url(&state);

		LoginSession { state, redirect_uri: self.redirect_uri.clone(), authorize_url }
	}

	/// Runs the callback pipeline: handshake checks, code exchange,
	/// enrichment, session commit.
	pub async fn handle_callback(
		&self,
		session: &LoginSession,
		params: CallbackParams,
		identity: Identity,
	) -> LoginOutcome {
		if let Some(error) = params.error {
			let reason = match params.error_description {
				Some(description) => format!("{error}: {description}"),
				None => error,
			};

			return self.fail(LoginStage::CodeReceived, HandshakeError::Rejected { reason });
		}
		if let Err(err) = session.validate_state(params.state.as_deref()) {
			return self.fail(LoginStage::CodeReceived, err);
		}

		let Some(code) = params.code.as_deref() else {
			return self.fail(LoginStage::CodeReceived, HandshakeError::MissingAuthorizationCode);
		};
		let subject = match subject_of(&identity) {
			Ok(subject) => subject,
			Err(err) => return self.fail(LoginStage::CodeReceived, err),
		};
		let token = match self
			.acquirer
			.acquire_by_code(subject, code, &session.redirect_uri, &self.resource)
			.await
		{
			Ok(token) => token,
			Err(err) => return self.fail(LoginStage::CodeReceived, err),
		};
		// By contract this step cannot fail the transition; every per-group
		// problem is absorbed inside the enricher.
		let identity = self.enricher.enrich(identity).await;

		obs::record_stage_outcome(StageKind::SessionCommit, StageOutcome::Attempt);

		if let Err(err) = self.sink.commit(identity).await {
			obs::record_stage_outcome(StageKind::SessionCommit, StageOutcome::Failure);

			return self.fail(LoginStage::ClaimsEnriched, err);
		}

		obs::record_stage_outcome(StageKind::SessionCommit, StageOutcome::Success);

		LoginOutcome::Committed { token }
	}

	/// Builds the failure redirect for an error, suppressing any default error
	/// page in favor of the landing path.
	pub fn error_redirect(&self, error: &Error) -> Url {
		let mut url = self.landing.clone();

		url.query_pairs_mut().append_pair("errormessage", &error.to_string());

		url
	}

	fn fail(&self, stage: LoginStage, error: impl Into<Error>) -> LoginOutcome {
		let error = error.into();
		let redirect = self.error_redirect(&error);

		LoginOutcome::Failed { stage, error, redirect }
	}

	fn build_authorize_url(&self, state: &str) -> Url {
		let mut url = self.acquirer.authority.authorize_endpoint().clone();

		{
			let mut pairs = url.query_pairs_mut();

			pairs.append_pair("response_type", "code");
			pairs.append_pair("client_id", &self.acquirer.credential.client_id);
			pairs.append_pair("redirect_uri", self.redirect_uri.as_str());
			pairs.append_pair("resource", self.resource.as_str());
			pairs.append_pair("state", state);
		}

		url
	}
}

fn subject_of(identity: &Identity) -> Result<TokenSubject, HandshakeError> {
	let user = identity.user_id().ok_or(HandshakeError::MissingClaim { claim: kind::NAME_ID })?;
	let tenant =
		identity.tenant_id().ok_or(HandshakeError::MissingClaim { claim: kind::TENANT_ID })?;
	let user = UserId::new(user).map_err(|_| HandshakeError::MissingClaim { claim: kind::NAME_ID })?;
	let tenant = TenantId::new(tenant)
		.map_err(|_| HandshakeError::MissingClaim { claim: kind::TENANT_ID })?;

	Ok(TokenSubject::new(user, tenant))
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
