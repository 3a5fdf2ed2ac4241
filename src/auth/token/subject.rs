//! Cache-subject classification for acquired tokens.

// self
use crate::{
	_prelude::*,
	auth::{TenantId, UserId},
};

/// Identifies the user+tenant pair a cached token belongs to.
///
/// One user's entries are never visible to another user's flow; the subject is
/// half of the cache key (the resource fingerprint is the other half).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenSubject {
	/// Signed-in user the tokens were minted for.
	pub user: UserId,
	/// Tenant the user authenticated against.
	pub tenant: TenantId,
}
impl TokenSubject {
	/// Creates a subject for the provided user and tenant.
	pub fn new(user: UserId, tenant: TenantId) -> Self {
		Self { user, tenant }
	}
}
