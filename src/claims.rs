//! Claim and identity modeling for the sign-in callback.

// self
use crate::_prelude::*;

/// Claim kinds the gate reads or writes.
pub mod kind {
	/// Directory group membership; the value is a group object identifier.
	pub const GROUPS: &str = "groups";
	/// Tenant the user authenticated against.
	pub const TENANT_ID: &str = "tenantid";
	/// Directory object identifier of the user.
	pub const OBJECT_ID: &str = "objectidentifier";
	/// Stable user identifier issued by the provider.
	pub const NAME_ID: &str = "nameidentifier";
	/// Role granted by enrichment; the value is a group display name.
	pub const ROLE: &str = "role";
}

/// A typed assertion about the authenticated subject.
///
/// Claim kinds are not unique across an identity; `groups` in particular
/// appears once per membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
	/// Claim kind, e.g. [`kind::GROUPS`].
	pub kind: String,
	/// Claim value.
	pub value: String,
}
impl Claim {
	/// Creates a claim from a kind and value pair.
	pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
		Self { kind: kind.into(), value: value.into() }
	}

	/// Creates a `role` claim carrying a resolved group display name.
	pub fn role(value: impl Into<String>) -> Self {
		Self::new(kind::ROLE, value)
	}
}
impl Display for Claim {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}={}", self.kind, self.value)
	}
}

/// Ordered, duplicate-friendly claim set for a signed-in user.
///
/// The identity stays mutable while the login callback runs; committing it to
/// a session consumes the value, so committed identities are immutable by
/// construction. Enrichment only ever appends; existing claims are neither
/// removed nor reordered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	claims: Vec<Claim>,
}
impl Identity {
	/// Creates an identity from an ordered claim sequence.
	pub fn new(claims: impl IntoIterator<Item = Claim>) -> Self {
		Self { claims: claims.into_iter().collect() }
	}

	/// Returns the ordered claim list.
	pub fn claims(&self) -> &[Claim] {
		&self.claims
	}

	/// Returns the value of the first claim of the provided kind.
	pub fn find_first(&self, kind: &str) -> Option<&str> {
		self.claims.iter().find(|claim| claim.kind == kind).map(|claim| claim.value.as_str())
	}

	/// Iterates the values of every claim of the provided kind, in claim order.
	pub fn find_all<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> {
		self.claims
			.iter()
			.filter(move |claim| claim.kind == kind)
			.map(|claim| claim.value.as_str())
	}

	/// Appends a claim at the end of the sequence.
	pub fn push(&mut self, claim: Claim) {
		self.claims.push(claim);
	}

	/// Value of the `nameidentifier` claim, when present.
	pub fn user_id(&self) -> Option<&str> {
		self.find_first(kind::NAME_ID)
	}

	/// Value of the `tenantid` claim, when present.
	pub fn tenant_id(&self) -> Option<&str> {
		self.find_first(kind::TENANT_ID)
	}

	/// Value of the `objectidentifier` claim, when present.
	pub fn object_id(&self) -> Option<&str> {
		self.find_first(kind::OBJECT_ID)
	}
}
