//! Gate-wide error types shared across acquisition, enrichment, and the login pipeline.

// self
use crate::_prelude::*;

/// Gate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gate error exposed by public APIs.
///
/// The `Display` output of every variant doubles as the message appended to the
/// failure redirect, so variants keep their text short and provider-flavored.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Startup configuration problem; fatal before any login is served.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// OIDC handshake failure; aborts the login and surfaces via the error redirect.
	#[error(transparent)]
	Handshake(#[from] HandshakeError),
	/// Token acquisition failure.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Directory lookup failure; absorbed per group during enrichment.
	#[error(transparent)]
	Lookup(#[from] LookupError),
	/// Session establishment failure reported by the sink.
	#[error(transparent)]
	Session(#[from] crate::flow::SessionError),
	/// Cache-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
}

/// Configuration and validation failures raised at startup.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required setting is absent (or blank) in the process environment.
	#[error("Missing required setting `{key}`.")]
	MissingSetting {
		/// Environment key that was absent.
		key: &'static str,
	},
	/// A setting could not be parsed as a URL.
	#[error("Setting `{key}` is not a valid URL.")]
	InvalidUrl {
		/// Environment key holding the malformed value.
		key: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A setting failed identifier validation.
	#[error("Setting `{key}` is not a valid identifier.")]
	InvalidIdentifier {
		/// Environment key holding the malformed value.
		key: &'static str,
		/// Underlying validation failure.
		#[source]
		source: crate::auth::IdentifierError,
	},
	/// Authority URLs could not be derived from the instance + tenant pair.
	#[error("Authority URL could not be derived from the configured instance.")]
	InvalidAuthority {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Authority endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Resource identifier failed validation.
	#[error("Requested resource identifier is invalid.")]
	InvalidResource(#[from] crate::auth::ResourceError),
	/// Cached record is missing a refresh secret.
	#[error("Cached token record is missing a refresh token.")]
	MissingRefreshToken,
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// OIDC handshake failures detected before any token work happens.
///
/// Display output is the snake_case error code the redirect surfaces, matching
/// the codes the provider itself puts on authorization redirects.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum HandshakeError {
	/// Returned `state` did not match the issued login session.
	#[error("state_mismatch")]
	StateMismatch,
	/// Authorization response carried no code.
	#[error("missing_authorization_code")]
	MissingAuthorizationCode,
	/// Identity handed over by the upstream validator is missing a required claim.
	#[error("Identity is missing the `{claim}` claim.")]
	MissingClaim {
		/// Claim kind that was absent.
		claim: &'static str,
	},
	/// Provider reported an error on the authorization redirect.
	#[error("{reason}")]
	Rejected {
		/// Provider-supplied error code, plus its description when present.
		reason: String,
	},
	/// Upstream protocol validation (signature, nonce) rejected the response.
	#[error("{reason}")]
	Validation {
		/// Validator-supplied failure summary.
		reason: String,
	},
}

/// Token acquisition failures, labeled by the reason callers branch on.
///
/// Only [`TokenError::Network`] may be retried, and only on the silent path;
/// authorization codes are single-use and must never be replayed.
#[derive(Debug, ThisError)]
pub enum TokenError {
	/// Provider rejected the grant (spent code, rotated-away refresh token).
	#[error("invalid_grant: {reason}")]
	InvalidGrant {
		/// Provider- or gate-supplied reason string.
		reason: String,
	},
	/// Presented or cached credential has expired.
	#[error("expired: {reason}")]
	Expired {
		/// Provider- or gate-supplied reason string.
		reason: String,
	},
	/// Provider demands interactive consent the silent path must not perform.
	#[error("consent_required: {reason}")]
	ConsentRequired {
		/// Provider- or gate-supplied reason string.
		reason: String,
	},
	/// Transient transport or endpoint failure.
	#[error("network: {message}")]
	Network {
		/// Summary of the transport failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("network: token endpoint returned malformed JSON")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TokenError {
	/// Stable reason label suitable for logs and metrics fields.
	pub const fn reason_label(&self) -> &'static str {
		match self {
			Self::InvalidGrant { .. } => "invalid_grant",
			Self::Expired { .. } => "expired",
			Self::ConsentRequired { .. } => "consent_required",
			Self::Network { .. } | Self::ResponseParse { .. } => "network",
		}
	}

	/// Whether a silent acquisition may be retried with backoff.
	pub const fn is_retryable(&self) -> bool {
		matches!(self, Self::Network { .. })
	}
}

/// Directory lookup failures; the enricher absorbs every one of these per group.
#[derive(Debug, ThisError)]
pub enum LookupError {
	/// Group claim value failed identifier validation.
	#[error("Group claim is not a valid identifier.")]
	InvalidGroupId {
		/// Underlying validation failure.
		#[source]
		source: crate::auth::IdentifierError,
	},
	/// Directory request URL could not be constructed.
	#[error("Directory request URL is invalid.")]
	InvalidRequest {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Directory rejected the presented access token.
	#[error("Directory rejected the access token (HTTP {status}).")]
	Unauthorized {
		/// HTTP status code (401 or 403).
		status: u16,
	},
	/// Directory returned an unexpected status.
	#[error("Directory request failed with HTTP {status}.")]
	Http {
		/// HTTP status code returned by the directory.
		status: u16,
	},
	/// Transport failure while calling the directory.
	#[error("Network error occurred while calling the directory.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Directory returned malformed JSON.
	#[error("Directory returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
}
impl LookupError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_error_reason_labels_are_stable() {
		let cases = [
			(TokenError::InvalidGrant { reason: "spent code".into() }, "invalid_grant"),
			(TokenError::Expired { reason: "refresh token expired".into() }, "expired"),
			(TokenError::ConsentRequired { reason: "admin consent".into() }, "consent_required"),
			(
				TokenError::Network { message: "timeout".into(), status: None, retry_after: None },
				"network",
			),
		];

		for (error, label) in cases {
			assert_eq!(error.reason_label(), label);
		}
	}

	#[test]
	fn only_network_failures_are_retryable() {
		assert!(
			TokenError::Network { message: "dns".into(), status: None, retry_after: None }
				.is_retryable()
		);
		assert!(!TokenError::InvalidGrant { reason: "code already redeemed".into() }.is_retryable());
		assert!(!TokenError::ConsentRequired { reason: "interaction".into() }.is_retryable());
	}

	#[test]
	fn handshake_codes_render_as_redirect_messages() {
		assert_eq!(HandshakeError::StateMismatch.to_string(), "state_mismatch");
		assert_eq!(
			HandshakeError::MissingAuthorizationCode.to_string(),
			"missing_authorization_code",
		);

		let error: Error = HandshakeError::StateMismatch.into();

		assert_eq!(error.to_string(), "state_mismatch");
	}
}
