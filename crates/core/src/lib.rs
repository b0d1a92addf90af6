pub mod config;
pub mod definition;
pub mod metrics;
pub mod orchestrator;
pub mod persist;
pub mod postprocess;
pub mod state;
pub mod storage;
pub mod testing;
pub mod transform;

pub use config::{
    load_config, load_config_from_str, validate_config, validate_options, Config, ConfigError,
    Options, OptionsOverride, TypeConfig, VersionConfig,
};
pub use definition::{DefaultDefinition, Definition};
pub use orchestrator::{OperationError, Orchestrator};
pub use persist::{
    restore, save, AssignKeys, PersistError, Persisted, PersistedFile, RestoreInput, SaveFormat,
};
pub use state::{Assigns, FileState, Source, Stage, StageError, VersionId, VersionState};
pub use storage::{
    create_storage, LocalStorage, LocalStorageConfig, MemoryStorage, Storage, StorageBackend,
    StorageConfig, StorageError, StorageOptions,
};
pub use transform::{
    Args, CommandExecutor, ExecutorConfig, Transform, TransformError, TransformExecutor,
    TransformOutput,
};
