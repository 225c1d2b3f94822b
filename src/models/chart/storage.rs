//! Content-addressed chart storage.
//!
//! Charts are stored as JSON under `files/<h>/<hh>/<hash>` where `hash` is the
//! MD5 of the JSON text. Files are written to a temporary sibling first and
//! renamed into place, so a failed save never leaves a truncated chart.

use super::{Chart, ChartError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new file was written.
    Saved { hash: String, path: PathBuf },
    /// The chart hashes to the previous save; nothing was written.
    UpToDate { hash: String },
}

impl SaveOutcome {
    pub fn hash(&self) -> &str {
        match self {
            SaveOutcome::Saved { hash, .. } | SaveOutcome::UpToDate { hash } => hash,
        }
    }
}

/// Hex MD5 of a chart's serialized form.
pub fn chart_hash(json: &str) -> String {
    format!("{:x}", md5::compute(json.as_bytes()))
}

/// Relative path of a content-addressed file.
pub fn hash_to_path(hash: &str) -> PathBuf {
    let first = hash.get(..1).unwrap_or("_");
    let second = hash.get(..2).unwrap_or("__");
    PathBuf::from(first).join(second).join(hash)
}

/// Stores charts below a root directory.
#[derive(Debug, Clone)]
pub struct ChartStore {
    root: PathBuf,
}

impl ChartStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, hash: &str) -> PathBuf {
        self.root.join("files").join(hash_to_path(hash))
    }

    /// Validates, sorts and writes `chart`.
    ///
    /// Data-shape errors abort before anything touches the disk.
    pub fn save(
        &self,
        chart: &mut Chart,
        previous_hash: Option<&str>,
    ) -> Result<SaveOutcome, ChartError> {
        chart.validate()?;
        chart.sort();

        let json = chart.to_json()?;
        let hash = chart_hash(&json);

        if previous_hash == Some(hash.as_str()) {
            return Ok(SaveOutcome::UpToDate { hash });
        }

        let path = self.path_for(&hash);
        write_atomic(&path, json.as_bytes())?;
        log::info!("CHART: Saved {} to {:?}", hash, path);

        Ok(SaveOutcome::Saved { hash, path })
    }

    pub fn load(&self, hash: &str) -> Result<Chart, ChartError> {
        Chart::load(&self.path_for(hash))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("tmp");
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
