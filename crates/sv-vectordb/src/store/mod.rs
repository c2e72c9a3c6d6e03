//! On-disk layout and file primitives shared by the project and vector stores.

mod file_store;
mod layout;

pub use file_store::{atomic_write, create_new_json, read_json};
pub use layout::{StoreLayout, CONFIG_FILE, PROJECT_META_FILE, SHARD_LOG_FILE};
