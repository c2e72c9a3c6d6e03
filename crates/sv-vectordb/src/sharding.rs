//! Record-to-shard placement.

/// Maps a record id to a shard index in `[0, total_shards)`.
///
/// Implementations must be pure: the write path and the delete path call this
/// independently and must agree for the same id, across process restarts.
pub trait ShardingStrategy: Send + Sync {
    fn compute_shard(&self, record_id: &str, total_shards: usize) -> usize;
}

/// MD5 of the id bytes, read as a big-endian 128-bit integer, modulo the shard
/// count. Placement matches existing on-disk collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashSharding;

impl ShardingStrategy for HashSharding {
    fn compute_shard(&self, record_id: &str, total_shards: usize) -> usize {
        if total_shards == 0 {
            return 0;
        }
        let digest = md5::compute(record_id.as_bytes());
        let value = u128::from_be_bytes(digest.0);
        (value % total_shards as u128) as usize
    }
}
