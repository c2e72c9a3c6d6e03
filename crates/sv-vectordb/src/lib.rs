//! Sharded vector storage engine.
//!
//! Collections live under a project and are split across a fixed number of
//! shards. Writes go to the shard picked by hashing the record id; searches fan
//! out to every shard and merge the per-shard top-k lists. Each shard is an
//! exact flat index rebuilt from an append-only record log.

pub mod distance;
pub mod index;
pub mod project;
pub mod registry;
pub mod shard;
pub mod sharded;
pub mod sharding;
pub mod store;

pub use index::{FlatIndex, TopK, VectorIndex};
pub use project::ProjectDirectory;
pub use registry::{ShardKey, ShardRegistry};
pub use shard::ShardTable;
pub use sharded::ShardedVectorStore;
pub use sharding::{HashSharding, ShardingStrategy};
pub use store::StoreLayout;
