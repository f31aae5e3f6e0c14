//! Common types shared across the service crates: the bearer-token claim
//! schema and the authentication rejection taxonomy.

pub mod error;
pub mod protocol;

pub use error::AuthRejection;
pub use protocol::{Audience, Claims};
