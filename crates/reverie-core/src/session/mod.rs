//! Session state handling: sanitizer/bounder, typed TTL store, and the
//! in-memory session cache.

pub mod cache;
pub mod sanitize;
pub mod store;

pub use cache::SessionCache;
pub use store::{DEFAULT_MAX_STATE_BYTES, DEFAULT_TTL_DAYS, SessionStore};
