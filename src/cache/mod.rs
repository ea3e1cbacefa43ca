//! Caching subsystem.
//!
//! - [`Fingerprint`]: deterministic key derived from the operation kind and
//!   the normalized request.
//! - [`ResponseCache`]: moka-backed TTL cache of schema-valid results,
//!   consulted by the gateway before any provider call.

pub mod fingerprint;
pub mod response;

pub use fingerprint::Fingerprint;
pub use response::{CacheConfig, CacheEntry, EntryCounts, ResponseCache};
