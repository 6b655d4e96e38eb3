//! Persistent event cursor
//!
//! Stores the id of the last fully processed event as a decimal string.
//! Writes go to a sibling temp file which is then renamed over the cursor
//! file, so a crash leaves either the old or the new value on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last persisted event id, `0` if absent or unreadable.
    pub fn load(&self) -> u64 {
        match fs::read_to_string(&self.path) {
            Ok(content) => match content.trim().parse::<u64>() {
                Ok(id) => id,
                Err(_) => {
                    tracing::warn!(
                        "Ignoring corrupt cursor file {}, starting from 0",
                        self.path.display()
                    );
                    0
                }
            },
            Err(_) => 0,
        }
    }

    /// Persist `id`, creating the parent directory if needed.
    pub fn save(&self, id: u64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(id.to_string().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        tracing::trace!("Saved cursor {} to {}", id, self.path.display());
        Ok(())
    }
}
