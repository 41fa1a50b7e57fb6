//! API handlers for the demo gate.
//!
//! Public routes redeem codes and report session state; the assistant route is
//! wrapped by [`guard::require_session`]; admin routes check a bearer token.

pub mod access;
pub mod admin;
pub mod agent;
pub mod guard;
pub mod health;
pub mod session;
pub mod state;
pub mod utils;

pub use self::state::ApiState;
