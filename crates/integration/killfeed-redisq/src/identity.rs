//! Queue identity persistence
//!
//! RedisQ tracks each client's position by an opaque `queueID`. It is
//! generated once and kept on disk so a restart resumes the same queue.

use crate::Result;
use rand::Rng;
use std::path::{Path, PathBuf};

const PREFIX: &str = "zkbmap-";
const SUFFIX_LEN: usize = 11;
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// File-backed queue id
#[derive(Debug, Clone)]
pub struct QueueIdentity {
    path: PathBuf,
}

impl QueueIdentity {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh namespaced id, e.g. `zkbmap-k3j9x0q2m7a`
    pub fn generate() -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        format!("{}{}", PREFIX, suffix)
    }

    /// Stored id, if one exists and is non-empty
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let id = content.trim();
        Ok((!id.is_empty()).then(|| id.to_string()))
    }

    pub fn load_or_create(&self) -> Result<String> {
        if let Some(id) = self.load()? {
            return Ok(id);
        }
        let id = Self::generate();
        self.save(&id)?;
        tracing::info!(queue_id = %id, path = %self.path.display(), "created queue identity");
        Ok(id)
    }

    /// Replace the stored id with a fresh one
    pub fn reset(&self) -> Result<String> {
        let id = Self::generate();
        self.save(&id)?;
        tracing::info!(queue_id = %id, "reset queue identity");
        Ok(id)
    }

    fn save(&self, id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write to temp file first, then rename (atomic)
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, id)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
