//! Gateway implementation

mod builder;
mod client;
pub mod coalesce;

pub use builder::GatewayBuilder;
pub use client::{AiGateway, CacheStats};
pub use coalesce::{RequestCoalescer, Role};
