pub mod gateway;
pub mod key;
pub mod record;
pub mod storage;

pub use gateway::CacheGateway;
pub use key::{CacheKey, compute_hash, normalize_url};
pub use record::CacheRecord;
pub use storage::LocalFileStorage;
