//! Transform instructions and the external transform executor.
//!
//! A version's transform is resolved by its `Definition` into one of:
//!
//! - no transform: the source file is stored unchanged
//! - a command: an external program invoked as `program source ...args dest`
//!   (or with a placement function deciding the argument order)
//! - a function: async code turning the source path into one or more outputs
//!
//! # Example
//!
//! ```ignore
//! use quiver_core::transform::{Args, Transform};
//!
//! // convert coffee.jpg -thumbnail 100x100> /tmp/<uuid>.png
//! let thumb = Transform::command("convert", "-thumbnail 100x100>").with_extension("png");
//!
//! // ffmpeg wants its output last but the input behind -i
//! let poster = Transform::command(
//!     "ffmpeg",
//!     Args::placement(|src, dest| {
//!         vec!["-i".into(), src.display().to_string(), "-frames:v".into(), "1".into(), dest.display().to_string()]
//!     }),
//! )
//! .with_extension("jpg");
//! ```

mod command;
mod config;
mod error;
mod traits;
mod types;

pub use command::CommandExecutor;
pub use config::ExecutorConfig;
pub use error::TransformError;
pub use traits::TransformExecutor;
pub use types::{Args, PlacementFn, Transform, TransformFn, TransformOutput};
