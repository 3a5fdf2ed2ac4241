//! Auth-domain identifiers, resource identifiers, and token models.

pub mod id;
pub mod resource;
pub mod token;

pub use id::*;
pub use resource::*;
pub use token::{record::*, secret::*, subject::*};
