//! Bearer-token authentication for the primary listener.
//!
//! # Request flow
//!
//! ```text
//! Authorization header ─▶ "Bearer <token>" shape ─▶ RSA key usable ─▶ JWT verified
//!        │ absent               │ wrong shape           │ unparsable       │ bad/expired
//!        ▼                      ▼                       ▼                  ▼
//!                         401 "Unauthorized" (identical for every branch)
//! ```
//!
//! On success the token's claims travel with the request as an
//! [`AuthContext`]; nothing is cached across requests.
//!
//! # Module invariants
//!
//! - The gateway never logs per-request outcomes; the request logger records
//!   every request, refused or not.
//! - Key material is parsed once when the gateway is built.

pub mod context;
pub mod gateway;
pub mod key;

pub use context::AuthContext;
pub use gateway::{require_bearer, AuthGateway};
