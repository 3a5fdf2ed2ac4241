//! Startup configuration: required settings, client credential, and authority derivation.
//!
//! Every setting is required and read exactly once at process start; a missing
//! or malformed value fails startup with [`ConfigError`] instead of surfacing
//! at login time. The resulting structs are immutable and shared by reference.

// std
use std::env;
// self
use crate::{
	_prelude::*,
	auth::{TenantId, TokenSecret},
	error::ConfigError,
};

/// Environment keys read by [`AppSettings::from_env`].
pub mod setting {
	/// OAuth client identifier.
	pub const CLIENT_ID: &str = "AAD_CLIENT_ID";
	/// OAuth client secret.
	pub const CLIENT_SECRET: &str = "AAD_CLIENT_SECRET";
	/// Identity provider instance base URL.
	pub const INSTANCE: &str = "AAD_INSTANCE";
	/// Tenant identifier appended to the instance.
	pub const TENANT_ID: &str = "AAD_TENANT_ID";
	/// Post-sign-out landing URL.
	pub const POST_LOGOUT_REDIRECT_URI: &str = "AAD_POST_LOGOUT_REDIRECT_URI";
}

/// Immutable process-wide settings, loaded once at startup.
#[derive(Clone, Debug)]
pub struct AppSettings {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret; redacted in logs.
	pub client_secret: TokenSecret,
	/// Identity provider instance base URL, e.g. `https://login.microsoftonline.com/`.
	pub instance: Url,
	/// Tenant identifier forming the authority together with the instance.
	pub tenant_id: TenantId,
	/// Where the user agent lands after sign-out.
	pub post_logout_redirect_uri: Url,
}
impl AppSettings {
	/// Loads and validates every required setting from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Loads settings through an injectable lookup, keeping tests env-free.
	pub fn from_lookup(
		lookup: impl Fn(&'static str) -> Option<String>,
	) -> Result<Self, ConfigError> {
		let client_id = required(&lookup, setting::CLIENT_ID)?;
		let client_secret = TokenSecret::new(required(&lookup, setting::CLIENT_SECRET)?);
		let instance = required(&lookup, setting::INSTANCE)?;
		let instance = Url::parse(&instance)
			.map_err(|source| ConfigError::InvalidUrl { key: setting::INSTANCE, source })?;
		let tenant_id = TenantId::new(required(&lookup, setting::TENANT_ID)?).map_err(|source| {
			ConfigError::InvalidIdentifier { key: setting::TENANT_ID, source }
		})?;
		let post_logout_redirect_uri = required(&lookup, setting::POST_LOGOUT_REDIRECT_URI)?;
		let post_logout_redirect_uri =
			Url::parse(&post_logout_redirect_uri).map_err(|source| ConfigError::InvalidUrl {
				key: setting::POST_LOGOUT_REDIRECT_URI,
				source,
			})?;

		Ok(Self { client_id, client_secret, instance, tenant_id, post_logout_redirect_uri })
	}

	/// Returns the credential pair presented on every token-endpoint call.
	pub fn credential(&self) -> ClientCredential {
		ClientCredential::new(self.client_id.clone(), self.client_secret.clone())
	}

	/// Derives the validated authority from the instance + tenant pair.
	pub fn authority(&self) -> Result<Authority, ConfigError> {
		Authority::new(&self.instance, &self.tenant_id)
	}
}

fn required(
	lookup: &impl Fn(&'static str) -> Option<String>,
	key: &'static str,
) -> Result<String, ConfigError> {
	match lookup(key) {
		Some(value) if !value.trim().is_empty() => Ok(value),
		_ => Err(ConfigError::MissingSetting { key }),
	}
}

/// Client identifier + secret pair, process-wide and immutable.
#[derive(Clone, Debug)]
pub struct ClientCredential {
	/// OAuth client identifier.
	pub client_id: String,
	secret: TokenSecret,
}
impl ClientCredential {
	/// Creates a credential from an identifier and secret.
	pub fn new(client_id: impl Into<String>, secret: TokenSecret) -> Self {
		Self { client_id: client_id.into(), secret }
	}

	/// Returns the client secret. Callers must avoid logging this string.
	pub fn secret(&self) -> &str {
		self.secret.expose()
	}
}

/// Validated authority the gate authenticates against.
///
/// The authority is the instance URL joined with the tenant identifier; both
/// derived endpoints are precomputed here so later flow code cannot fail on
/// URL arithmetic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authority {
	base: Url,
	authorize: Url,
	token: Url,
	logout: Url,
}
impl Authority {
	/// Builds and validates the authority for the provided instance + tenant.
	pub fn new(instance: &Url, tenant: &TenantId) -> Result<Self, ConfigError> {
		let mut raw = instance.to_string();

		if !raw.ends_with('/') {
			raw.push('/');
		}

		let base = Url::parse(&format!("{raw}{}/", tenant.as_ref()))
			.map_err(|source| ConfigError::InvalidAuthority { source })?;

		if base.scheme() != "https" {
			return Err(ConfigError::InsecureEndpoint {
				endpoint: "authority",
				url: base.to_string(),
			});
		}

		let authorize = base
			.join("oauth2/authorize")
			.map_err(|source| ConfigError::InvalidAuthority { source })?;
		let token =
			base.join("oauth2/token").map_err(|source| ConfigError::InvalidAuthority { source })?;
		let logout = base
			.join("oauth2/logout")
			.map_err(|source| ConfigError::InvalidAuthority { source })?;

		Ok(Self { base, authorize, token, logout })
	}

	/// Authority base URL (`{instance}{tenant}/`).
	pub fn as_url(&self) -> &Url {
		&self.base
	}

	/// Authorization endpoint used to start the code flow.
	pub fn authorize_endpoint(&self) -> &Url {
		&self.authorize
	}

	/// Token endpoint used for code exchanges and silent refreshes.
	pub fn token_endpoint(&self) -> &Url {
		&self.token
	}

	/// Sign-out URL that lands the user agent on the configured page afterwards.
	pub fn logout_url(&self, post_logout_redirect_uri: &Url) -> Url {
		let mut url = self.logout.clone();

		url.query_pairs_mut()
			.append_pair("post_logout_redirect_uri", post_logout_redirect_uri.as_str());

		url
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup_from(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
		let map: HashMap<&'static str, String> =
			pairs.iter().map(|(key, value)| (*key, (*value).to_owned())).collect();

		move |key| map.get(key).cloned()
	}

	fn complete() -> Vec<(&'static str, &'static str)> {
		vec![
			(setting::CLIENT_ID, "client-123"),
			(setting::CLIENT_SECRET, "s3cret"),
			(setting::INSTANCE, "https://login.microsoftonline.com/"),
			(setting::TENANT_ID, "contoso.onmicrosoft.com"),
			(setting::POST_LOGOUT_REDIRECT_URI, "https://app.example.com/"),
		]
	}

	#[test]
	fn settings_load_when_complete() {
		let settings = AppSettings::from_lookup(lookup_from(&complete()))
			.expect("Complete settings should load successfully.");

		assert_eq!(settings.client_id, "client-123");
		assert_eq!(settings.tenant_id.as_ref(), "contoso.onmicrosoft.com");

		let authority =
			settings.authority().expect("Authority should derive from valid settings.");

		assert_eq!(
			authority.token_endpoint().as_str(),
			"https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/token",
		);
		assert_eq!(
			authority.authorize_endpoint().as_str(),
			"https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/authorize",
		);
	}

	#[test]
	fn each_missing_setting_fails_startup() {
		for (absent, _) in complete() {
			let pairs: Vec<_> =
				complete().into_iter().filter(|(key, _)| *key != absent).collect();
			let err = AppSettings::from_lookup(lookup_from(&pairs))
				.expect_err("A missing required setting must fail startup.");

			assert!(
				matches!(err, ConfigError::MissingSetting { key } if key == absent),
				"Expected MissingSetting for `{absent}`, got: {err}.",
			);
		}
	}

	#[test]
	fn blank_settings_count_as_missing() {
		let mut pairs = complete();

		pairs[0] = (setting::CLIENT_ID, "   ");

		let err = AppSettings::from_lookup(lookup_from(&pairs))
			.expect_err("A blank required setting must fail startup.");

		assert!(matches!(err, ConfigError::MissingSetting { key: setting::CLIENT_ID }));
	}

	#[test]
	fn authority_requires_https() {
		let instance =
			Url::parse("http://login.example.com/").expect("Instance fixture should parse.");
		let tenant = TenantId::new("contoso").expect("Tenant fixture should be valid.");
		let err = Authority::new(&instance, &tenant)
			.expect_err("Plain-HTTP authorities must be rejected.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { endpoint: "authority", .. }));
	}

	#[test]
	fn authority_tolerates_missing_trailing_slash() {
		let instance =
			Url::parse("https://login.example.com").expect("Instance fixture should parse.");
		let tenant = TenantId::new("contoso").expect("Tenant fixture should be valid.");
		let authority =
			Authority::new(&instance, &tenant).expect("Authority should build without a slash.");

		assert_eq!(
			authority.token_endpoint().as_str(),
			"https://login.example.com/contoso/oauth2/token",
		);
	}

	#[test]
	fn logout_url_round_trips_the_landing_page() {
		let settings = AppSettings::from_lookup(lookup_from(&complete()))
			.expect("Complete settings should load successfully.");
		let authority =
			settings.authority().expect("Authority should derive from valid settings.");
		let logout = authority.logout_url(&settings.post_logout_redirect_uri);

		assert!(logout.path().ends_with("/oauth2/logout"));
		assert_eq!(
			logout.query(),
			Some("post_logout_redirect_uri=https%3A%2F%2Fapp.example.com%2F"),
		);
	}

	#[test]
	fn credential_redacts_its_secret() {
		let settings = AppSettings::from_lookup(lookup_from(&complete()))
			.expect("Complete settings should load successfully.");
		let credential = settings.credential();

		assert_eq!(credential.secret(), "s3cret");
		assert!(!format!("{credential:?}").contains("s3cret"));
	}
}
