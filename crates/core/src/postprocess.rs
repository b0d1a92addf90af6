//! Ready-made post-processing steps for `Definition::postprocess` overrides.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::state::VersionState;

const BUFFER_SIZE: usize = 64 * 1024;

/// Stores `sha256` (hex) and `size` (bytes) of the version's file in its assigns.
///
/// The version's file is its first transform output, or `source` when no
/// transform ran.
pub async fn digest(
    version_state: VersionState,
    source: Option<&Path>,
) -> Result<VersionState, String> {
    let path: PathBuf = match version_state.temp_path.as_ref().and_then(|o| o.paths().first()) {
        Some(path) => path.clone(),
        None => source
            .map(Path::to_path_buf)
            .ok_or_else(|| "no file to digest".to_string())?,
    };

    let (sha256, size) = sha256_file(&path)
        .await
        .map_err(|e| format!("failed to digest {}: {}", path.display(), e))?;

    Ok(version_state.assign("sha256", sha256).assign("size", size))
}

/// Hex SHA-256 and byte length of a file.
pub async fn sha256_file(path: &Path) -> std::io::Result<(String, u64)> {
    let file = File::open(path).await?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut hasher = Sha256::new();
    let mut size = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        size += bytes_read as u64;
    }

    Ok((format!("{:x}", hasher.finalize()), size))
}
