//! Types describing how a version is derived from its source.

use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A transform implemented in code: `source_path -> output(s)` or a reason.
pub type TransformFn =
    Arc<dyn Fn(PathBuf) -> BoxFuture<'static, Result<TransformOutput, String>> + Send + Sync>;

/// Builds the full argument list from `(source, dest)`.
pub type PlacementFn = Arc<dyn Fn(&Path, &Path) -> Vec<String> + Send + Sync>;

/// Arguments of a command transform.
#[derive(Clone)]
pub enum Args {
    /// Placed between the source and the destination path.
    List(Vec<String>),
    /// Decides the placement of both paths itself.
    Placement(PlacementFn),
}

impl Args {
    pub fn placement<F>(f: F) -> Self
    where
        F: Fn(&Path, &Path) -> Vec<String> + Send + Sync + 'static,
    {
        Self::Placement(Arc::new(f))
    }

    /// Produces the argument list handed to the executor.
    pub fn resolve(&self, source: &Path, dest: &Path) -> Vec<String> {
        match self {
            Self::List(args) => {
                let mut resolved = Vec::with_capacity(args.len() + 2);
                resolved.push(source.to_string_lossy().to_string());
                resolved.extend(args.iter().cloned());
                resolved.push(dest.to_string_lossy().to_string());
                resolved
            }
            Self::Placement(f) => f(source, dest),
        }
    }
}

/// Splits on whitespace, like a shell without quoting.
impl From<&str> for Args {
    fn from(args: &str) -> Self {
        Self::List(args.split_whitespace().map(str::to_string).collect())
    }
}

impl From<String> for Args {
    fn from(args: String) -> Self {
        Self::from(args.as_str())
    }
}

impl From<Vec<String>> for Args {
    fn from(args: Vec<String>) -> Self {
        Self::List(args)
    }
}

impl From<Vec<&str>> for Args {
    fn from(args: Vec<&str>) -> Self {
        Self::List(args.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(args) => f.debug_tuple("List").field(args).finish(),
            Self::Placement(_) => f.write_str("Placement(<fn>)"),
        }
    }
}

/// A resolved transform instruction.
#[derive(Clone)]
pub enum Transform {
    /// External program run through the `TransformExecutor`.
    Command {
        program: String,
        args: Args,
        /// Output extension without the dot; defaults to the source extension.
        extension: Option<String>,
    },
    /// In-process transform.
    Function(TransformFn),
}

impl Transform {
    pub fn command(program: impl Into<String>, args: impl Into<Args>) -> Self {
        Self::Command {
            program: program.into(),
            args: args.into(),
            extension: None,
        }
    }

    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TransformOutput, String>> + Send + 'static,
    {
        Self::Function(Arc::new(move |path| Box::pin(f(path))))
    }

    /// Forces the output extension of a command transform. No-op on functions.
    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        if let Self::Command { extension, .. } = &mut self {
            let ext = ext.into();
            *extension = Some(ext.trim_start_matches('.').to_string());
        }
        self
    }

    /// The forced output extension, with its leading dot.
    pub fn forced_extension(&self) -> Option<String> {
        match self {
            Self::Command {
                extension: Some(ext),
                ..
            } => Some(format!(".{}", ext)),
            _ => None,
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command {
                program,
                args,
                extension,
            } => f
                .debug_struct("Command")
                .field("program", program)
                .field("args", args)
                .field("extension", extension)
                .finish(),
            Self::Function(_) => f.write_str("Function(<fn>)"),
        }
    }
}

/// What a transform produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TransformOutput {
    Single(PathBuf),
    /// e.g. one image per page of a document.
    Multiple(Vec<PathBuf>),
}

impl TransformOutput {
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Self::Single(path) => std::slice::from_ref(path),
            Self::Multiple(paths) => paths,
        }
    }

    pub fn len(&self) -> usize {
        self.paths().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths().is_empty()
    }
}

impl From<PathBuf> for TransformOutput {
    fn from(path: PathBuf) -> Self {
        Self::Single(path)
    }
}

impl From<Vec<PathBuf>> for TransformOutput {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::Multiple(paths)
    }
}
