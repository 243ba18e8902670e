//! `kirworld_shared`
//!
//! Shared libraries used by the client and by anything that speaks its
//! protocol (test authorities included).
//!
//! Design goals:
//! - Typed, validated wire messages.
//! - Small deterministic math.
//! - No `unsafe`.

pub mod chat;
pub mod config;
pub mod math;
pub mod net;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::chat::*;
    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::net::*;
}
