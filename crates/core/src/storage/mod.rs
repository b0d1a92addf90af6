//! Storage contract and backends.
//!
//! Every backend implements [`Storage`]: `save`, `delete`, `copy`, `retrieve`
//! and `build_uri`, all addressed by `(directory, filename)` and a
//! backend-specific [`StorageOptions`] map. Objects live at
//! `directory/filename` relative to the backend root.
//!
//! # Backends
//!
//! - [`LocalStorage`]: filesystem under a base path, optional permission mode
//! - [`MemoryStorage`]: in-process map, for tests and ephemeral deployments

mod config;
mod error;
mod factory;
mod local;
mod memory;
mod traits;
mod types;

pub use config::{LocalStorageConfig, StorageBackend, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use factory::create_storage;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use traits::Storage;
pub(crate) use types::split_extension;
pub use types::{merge_options, object_key, object_names, parse_mode, StorageOptions};
