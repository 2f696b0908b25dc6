use crate::error::RuntimeError;
use stampede_core::{RawRunConfig, RunConfig};
use std::path::Path;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Reads a JSON run definition. A file without a `name` is named after its stem.
pub fn load(path: &Path) -> Result<RunConfig, RuntimeError> {
    let text = std::fs::read_to_string(path).map_err(|source| RuntimeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded {} bytes from {}", text.len(), path.display());
    parse(&text, path)
}

pub(crate) fn parse(text: &str, path: &Path) -> Result<RunConfig, RuntimeError> {
    let mut raw: RawRunConfig =
        serde_json::from_str(text).map_err(|source| RuntimeError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if raw.name.is_none() {
        raw.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
    }

    Ok(RunConfig::try_from(raw)?)
}
