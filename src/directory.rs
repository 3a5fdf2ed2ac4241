//! Directory lookups resolving group object ids to display names.

// self
use crate::{
	_prelude::*,
	auth::{GroupId, TenantId, TokenSecret},
	error::LookupError,
};

/// Resource identifier of the directory graph API.
pub const DIRECTORY_RESOURCE: &str = "https://graph.windows.net";

#[cfg(feature = "reqwest")] const API_VERSION: &str = "1.6";

/// Future type returned by [`DirectoryLookup`] implementations.
pub type LookupFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LookupError>> + 'a + Send>>;

/// Directory query contract used by enrichment.
pub trait DirectoryLookup
where
	Self: Send + Sync,
{
	/// Resolves a group object id to its display name.
	///
	/// `Ok(None)` covers both an explicit not-found and an empty result page;
	/// the enricher treats the two identically and skips the group.
	fn group_display_name<'a>(
		&'a self,
		tenant: &'a TenantId,
		group: &'a GroupId,
		token: &'a TokenSecret,
	) -> LookupFuture<'a, Option<String>>;
}

/// Reqwest-backed graph client querying groups by object id.
///
/// The query mirrors the graph's filtered-list form, so a valid id with no
/// matching object comes back as an empty `value` page rather than an error.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct GraphDirectory {
	base: String,
	client: ReqwestClient,
}
#[cfg(feature = "reqwest")]
impl GraphDirectory {
	/// Creates a client against the provided graph base URL.
	pub fn new(base: impl Into<String>) -> Self {
		Self::with_client(base, ReqwestClient::default())
	}

	/// Creates a client reusing an existing [`ReqwestClient`].
	pub fn with_client(base: impl Into<String>, client: ReqwestClient) -> Self {
		Self { base: base.into(), client }
	}

	async fn query(
		&self,
		tenant: &TenantId,
		group: &GroupId,
		token: &TokenSecret,
	) -> Result<Option<String>, LookupError> {
		let mut url =
			Url::parse(&format!("{}/{}/groups", self.base.trim_end_matches('/'), tenant.as_ref()))
				.map_err(|source| LookupError::InvalidRequest { source })?;

		url.query_pairs_mut()
			.append_pair("api-version", API_VERSION)
			.append_pair("$filter", &format!("objectId eq '{}'", group.as_ref()));

		let response = self
			.client
			.get(url)
			.bearer_auth(token.expose())
			.send()
			.await
			.map_err(LookupError::network)?;
		let status = response.status().as_u16();

		match status {
			200 => {
				let bytes = response.bytes().await.map_err(LookupError::network)?;
				let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
				let page: GroupPage = serde_path_to_error::deserialize(&mut deserializer)
					.map_err(|source| LookupError::Parse { source })?;

				Ok(page.value.into_iter().next().and_then(|entry| entry.display_name))
			},
			404 => Ok(None),
			401 | 403 => Err(LookupError::Unauthorized { status }),
			_ => Err(LookupError::Http { status }),
		}
	}
}
#[cfg(feature = "reqwest")]
impl Default for GraphDirectory {
	fn default() -> Self {
		Self::new(DIRECTORY_RESOURCE)
	}
}
#[cfg(feature = "reqwest")]
impl DirectoryLookup for GraphDirectory {
	fn group_display_name<'a>(
		&'a self,
		tenant: &'a TenantId,
		group: &'a GroupId,
		token: &'a TokenSecret,
	) -> LookupFuture<'a, Option<String>> {
		Box::pin(self.query(tenant, group, token))
	}
}

/// One page of a filtered group query.
#[cfg(any(test, feature = "reqwest"))]
#[derive(Debug, Deserialize)]
struct GroupPage {
	#[serde(default)]
	value: Vec<GroupEntry>,
}

#[cfg(any(test, feature = "reqwest"))]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupEntry {
	#[serde(default)]
	display_name: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn parse(json: &str) -> Option<String> {
		let mut deserializer = serde_json::Deserializer::from_str(json);
		let page: GroupPage = serde_path_to_error::deserialize(&mut deserializer)
			.expect("Page fixture should deserialize.");

		page.value.into_iter().next().and_then(|entry| entry.display_name)
	}

	#[test]
	fn first_entry_display_name_wins() {
		let resolved = parse(
			r#"{"value":[{"objectId":"g-1","displayName":"Engineering"},{"displayName":"Two"}]}"#,
		);

		assert_eq!(resolved.as_deref(), Some("Engineering"));
	}

	#[test]
	fn empty_pages_resolve_to_none() {
		assert_eq!(parse(r#"{"value":[]}"#), None);
		assert_eq!(parse(r#"{}"#), None);
		assert_eq!(parse(r#"{"value":[{"objectId":"g-1"}]}"#), None);
	}

	#[test]
	fn malformed_pages_surface_a_parse_error() {
		let mut deserializer = serde_json::Deserializer::from_str(r#"{"value":"not-a-list"}"#);
		let result: Result<GroupPage, _> = serde_path_to_error::deserialize(&mut deserializer);

		assert!(result.is_err());
	}
}
