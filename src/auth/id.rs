//! Strongly typed identifiers enforced across the gate domain.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (user, tenant, group).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (user, tenant, group).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (user, tenant, group).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { UserId, "Stable identifier for a signed-in user (the `nameidentifier` claim value).", "User" }
def_id! { TenantId, "Identifier for a directory tenant.", "Tenant" }
def_id! { GroupId, "Object identifier for a directory group.", "Group" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_padding_and_emptiness() {
		assert!(TenantId::new(" contoso").is_err(), "Leading whitespace must be rejected.");
		assert!(TenantId::new("contoso ").is_err(), "Trailing whitespace must be rejected.");
		assert!(UserId::new("").is_err());
		assert!(GroupId::new("with space").is_err());

		let tenant = TenantId::new("contoso").expect("Tenant fixture should be considered valid.");

		assert_eq!(tenant.as_ref(), "contoso");
	}

	#[test]
	fn group_ids_accept_directory_object_ids() {
		let group = GroupId::new("0fbd2aa9-6ddd-42d6-add6-f9f4e1b01fd0")
			.expect("Opaque object identifiers should be accepted.");

		assert_eq!(format!("{group:?}"), "Group(0fbd2aa9-6ddd-42d6-add6-f9f4e1b01fd0)");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let payload = "\"user-42\"";
		let user: UserId =
			serde_json::from_str(payload).expect("User should deserialize successfully.");

		assert_eq!(user.as_ref(), "user-42");
		assert!(serde_json::from_str::<UserId>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_is_enforced_exactly() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		TenantId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(TenantId::new(&too_long).is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<UserId, u8> = HashMap::from_iter([(
			UserId::new("user-123").expect("User used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("user-123"), Some(&7));
	}
}
