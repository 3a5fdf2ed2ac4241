//! Resource identifier modeling for v1-style token requests.

// std
use std::sync::OnceLock;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use serde::{Deserializer, Serializer, de::Error as DeError};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Errors emitted when validating resource identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ResourceError {
	/// Empty resource identifiers are not allowed.
	#[error("Resource identifier cannot be empty.")]
	Empty,
	/// Resource identifiers cannot contain whitespace characters.
	#[error("Resource identifier contains whitespace: {resource}.")]
	ContainsWhitespace {
		/// The offending resource string.
		resource: String,
	},
}

/// Identifier of the API a token is scoped to, e.g. `https://graph.windows.net`.
///
/// The provider's v1 token endpoints take a single `resource` parameter instead
/// of a scope list; the value is treated as opaque beyond basic validation.
/// [`fingerprint`](Self::fingerprint) lazily caches a base64 (no padding)
/// SHA-256 digest of the identifier for use in cache partitioning, so cache
/// keys stay filename- and log-safe regardless of the resource URI shape.
pub struct Resource {
	value: Arc<str>,
	fingerprint_cache: OnceLock<String>,
}
impl Resource {
	/// Creates a validated resource identifier.
	pub fn new(value: impl AsRef<str>) -> Result<Self, ResourceError> {
		let view = value.as_ref();

		if view.is_empty() {
			return Err(ResourceError::Empty);
		}
		if view.chars().any(char::is_whitespace) {
			return Err(ResourceError::ContainsWhitespace { resource: view.to_owned() });
		}

		Ok(Self { value: Arc::from(view), fingerprint_cache: OnceLock::new() })
	}

	/// Returns the raw identifier string.
	pub fn as_str(&self) -> &str {
		&self.value
	}

	/// Stable fingerprint derived from the identifier.
	///
	/// The fingerprint is a base64 (no padding) encoding of the SHA-256 digest
	/// and is cached after the first calculation.
	pub fn fingerprint(&self) -> String {
		self.fingerprint_cache.get_or_init(|| compute_fingerprint(&self.value)).clone()
	}
}
impl Clone for Resource {
	fn clone(&self) -> Self {
		Self { value: self.value.clone(), fingerprint_cache: OnceLock::new() }
	}
}
impl PartialEq for Resource {
	fn eq(&self, other: &Self) -> bool {
		self.value == other.value
	}
}
impl Eq for Resource {}
impl Hash for Resource {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.value.hash(state);
	}
}
impl AsRef<str> for Resource {
	fn as_ref(&self) -> &str {
		&self.value
	}
}
impl Debug for Resource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Resource").field(&self.value).finish()
	}
}
impl Display for Resource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.value)
	}
}
impl FromStr for Resource {
	type Err = ResourceError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Serialize for Resource {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.value)
	}
}
impl<'de> Deserialize<'de> for Resource {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;

		Resource::new(value).map_err(DeError::custom)
	}
}

fn compute_fingerprint(value: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(value.as_bytes());

	let digest = hasher.finalize();

	STANDARD_NO_PAD.encode(digest)
}
