use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Raw contents of an org file holding habit headings.
#[derive(Debug, Clone)]
pub struct OrgDocument {
    path: PathBuf,
    raw: String,
    loaded_at: DateTime<Utc>,
}

impl OrgDocument {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        Ok(Self {
            path,
            raw,
            loaded_at: Utc::now(),
        })
    }

    pub fn from_string(path: impl AsRef<Path>, raw: String) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            raw,
            loaded_at: Utc::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
