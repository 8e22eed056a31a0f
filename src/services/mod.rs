//! Service layer: Redis caching, alert raising and document numbering.

pub mod alerts;
pub mod cache;
pub mod numbering;

pub use cache::RedisCache;
