//! Internal OAuth client facade over the token endpoint.
//!
//! The facade wraps the `oauth2` crate's code-exchange and refresh requests,
//! injects the provider's v1 `resource` parameter, and maps every failure into
//! the gate's [`TokenError`] taxonomy so callers branch on
//! `expired`/`invalid_grant`/`network`/`consent_required` instead of raw
//! transport errors.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{Resource, TokenRecord, TokenSubject},
	config::{Authority, ClientCredential},
	error::{ConfigError, TokenError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeTokenResponse = oauth2::basic::BasicTokenResponse;

/// Maps HTTP transport failures into gate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a gate error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TokenError::Network {
				message: format!("I/O error occurred while calling the token endpoint: {inner}."),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
			HttpClientError::Other(message) => TokenError::Network {
				message: format!(
					"HTTP client error occurred while calling the token endpoint: {message}."
				),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
			_ => TokenError::Network {
				message: "HTTP client error occurred while calling the token endpoint.".into(),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		}
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TokenError::Network {
			message: "Request timed out while calling the token endpoint.".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TokenError::Network {
		message: format!("Network error occurred while calling the token endpoint: {err}."),
		status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

/// Token-endpoint facade bound to one authority + client credential pair.
pub(crate) struct TokenFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> TokenFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_authority(
		authority: &Authority,
		credential: &ClientCredential,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(authority.authorize_endpoint().to_string())
			.map_err(|source| ConfigError::InvalidAuthority { source })?;
		let token_url = TokenUrl::new(authority.token_endpoint().to_string())
			.map_err(|source| ConfigError::InvalidAuthority { source })?;
		// The v1 token endpoints take client credentials in the form body.
		let oauth_client = BasicClient::new(ClientId::new(credential.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_client_secret(ClientSecret::new(credential.secret().to_owned()))
			.set_auth_type(AuthType::RequestBody);

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}

	pub(crate) async fn exchange_authorization_code(
		&self,
		subject: TokenSubject,
		code: &str,
		redirect_uri: &Url,
		resource: &Resource,
	) -> Result<TokenRecord> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let request = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.add_extra_param("resource", resource.as_str())
			.set_redirect_uri(Cow::Owned(redirect_url));
		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

		map_token_response(subject, resource.clone(), response)
	}

	pub(crate) async fn refresh_token(
		&self,
		subject: TokenSubject,
		refresh_token: &str,
		resource: &Resource,
	) -> Result<(TokenRecord, Option<String>)> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let request = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.add_extra_param("resource", resource.as_str());
		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;
		let new_refresh = response.refresh_token().map(|token| token.secret().to_owned());
		let record = map_token_response(subject, resource.clone(), response)?;

		Ok((record, new_refresh))
	}
}

fn map_token_response(
	subject: TokenSubject,
	resource: Resource,
	response: FacadeTokenResponse,
) -> Result<TokenRecord> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let issued_at = OffsetDateTime::now_utc();
	let mut builder = TokenRecord::builder(subject, resource)
		.access_token(response.access_token().secret().to_owned())
		.issued_at(issued_at)
		.expires_in(Duration::seconds(expires_in));

	if let Some(refresh) = response.refresh_token() {
		builder = builder.refresh_token(refresh.secret().to_owned());
	}

	builder.build().map_err(|err| ConfigError::from(err).into())
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, _body) =>
			TokenError::ResponseParse { source: error, status: meta_status(meta_ref) }.into(),
		RequestTokenError::Other(message) => TokenError::Network {
			message: format!("Token endpoint returned an unexpected response: {message}."),
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let oauth_error = response.error().as_ref().to_string();
	let description = response.error_description().cloned();
	let reason = match &description {
		Some(text) => format!("{oauth_error}: {text}"),
		None => oauth_error.clone(),
	};

	classify_rejection(
		&oauth_error,
		description.as_deref(),
		meta_status(meta),
		meta_retry_after(meta),
		reason,
	)
	.into()
}

/// Classifies a provider rejection into the gate's four token failure reasons.
///
/// Structured OAuth fields win, the error description is scanned next, and the
/// HTTP status decides the rest. Anything unrecognized lands in `Network`, the
/// only retryable class, matching the provider guidance that unknown failures
/// are worth one more silent attempt.
fn classify_rejection(
	oauth_error: &str,
	description: Option<&str>,
	status: Option<u16>,
	retry_after: Option<Duration>,
	reason: String,
) -> TokenError {
	if oauth_error.eq_ignore_ascii_case("invalid_grant")
		|| oauth_error.eq_ignore_ascii_case("access_denied")
		|| oauth_error.eq_ignore_ascii_case("invalid_client")
		|| oauth_error.eq_ignore_ascii_case("unauthorized_client")
	{
		// An expired refresh token also surfaces as invalid_grant; the
		// description disambiguates.
		if description.is_some_and(|text| text.to_ascii_lowercase().contains("expired")) {
			return TokenError::Expired { reason };
		}

		return TokenError::InvalidGrant { reason };
	}
	if oauth_error.eq_ignore_ascii_case("consent_required")
		|| oauth_error.eq_ignore_ascii_case("interaction_required")
		|| oauth_error.eq_ignore_ascii_case("login_required")
	{
		return TokenError::ConsentRequired { reason };
	}
	if oauth_error.eq_ignore_ascii_case("expired_token") {
		return TokenError::Expired { reason };
	}
	if oauth_error.eq_ignore_ascii_case("temporarily_unavailable")
		|| oauth_error.eq_ignore_ascii_case("server_error")
	{
		return TokenError::Network { message: reason, status, retry_after };
	}

	if let Some(text) = description {
		let lowered = text.to_ascii_lowercase();

		if lowered.contains("expired") {
			return TokenError::Expired { reason };
		}
		if lowered.contains("consent") || lowered.contains("interaction") {
			return TokenError::ConsentRequired { reason };
		}
	}

	match status {
		Some(400 | 401 | 404 | 410) => TokenError::InvalidGrant { reason },
		Some(403) => TokenError::ConsentRequired { reason },
		_ => TokenError::Network { message: reason, status, retry_after },
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[cfg(feature = "reqwest")]
	#[test]
	fn facade_builds_from_authority() {
		use crate::auth::{TenantId, TokenSecret};

		let instance = Url::parse("https://login.microsoftonline.com/")
			.expect("Instance fixture should parse.");
		let tenant = TenantId::new("contoso").expect("Tenant fixture should be valid.");
		let authority = Authority::new(&instance, &tenant).expect("Authority fixture should build.");
		let credential = ClientCredential::new("client-id", TokenSecret::new("secret"));
		let result = <TokenFacade<ReqwestHttpClient, ReqwestTransportErrorMapper>>::from_authority(
			&authority,
			&credential,
			Arc::new(ReqwestHttpClient::default()),
			Arc::new(ReqwestTransportErrorMapper),
		);

		assert!(result.is_ok());
	}

	#[test]
	fn classification_prefers_oauth_error_codes() {
		let classified = classify_rejection(
			"invalid_grant",
			Some("AADSTS70002: Error validating credentials."),
			Some(400),
			None,
			"invalid_grant".into(),
		);

		assert!(matches!(classified, TokenError::InvalidGrant { .. }));

		let classified = classify_rejection(
			"interaction_required",
			None,
			Some(400),
			None,
			"interaction_required".into(),
		);

		assert!(matches!(classified, TokenError::ConsentRequired { .. }));
	}

	#[test]
	fn expired_descriptions_override_invalid_grant() {
		let classified = classify_rejection(
			"invalid_grant",
			Some("AADSTS70008: The provided authorization code or refresh token has expired."),
			Some(400),
			None,
			"invalid_grant: expired".into(),
		);

		assert!(matches!(classified, TokenError::Expired { .. }));
	}

	#[test]
	fn classification_falls_back_to_status() {
		assert!(matches!(
			classify_rejection("odd_error", None, Some(400), None, "odd_error".into()),
			TokenError::InvalidGrant { .. },
		));
		assert!(matches!(
			classify_rejection("odd_error", None, Some(403), None, "odd_error".into()),
			TokenError::ConsentRequired { .. },
		));
		assert!(matches!(
			classify_rejection("odd_error", None, Some(503), None, "odd_error".into()),
			TokenError::Network { .. },
		));
		assert!(matches!(
			classify_rejection("odd_error", None, None, None, "odd_error".into()),
			TokenError::Network { .. },
		));
	}
}
