//! Append-only log of comment ids the bot has already replied to.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};

#[derive(Debug)]
/// Persistent set of handled comment ids.
///
/// The newline-delimited file is the source of truth; the in-memory set is
/// populated from it on first access and kept in sync by `record`.
pub struct DedupStore {
    path: PathBuf,
    cache: Mutex<Option<HashSet<String>>>,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has(&self, comment_id: &str) -> Result<bool> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|_| anyhow!("dedup store lock is poisoned"))?;
        let ids = loaded(&mut guard, &self.path)?;
        Ok(ids.contains(comment_id.trim()))
    }

    /// Appends `comment_id` unless it is already known. Returns `true` when the id was new.
    pub fn record(&self, comment_id: &str) -> Result<bool> {
        let comment_id = comment_id.trim();
        if comment_id.is_empty() {
            return Err(anyhow!("cannot record an empty comment id"));
        }
        let mut guard = self
            .cache
            .lock()
            .map_err(|_| anyhow!("dedup store lock is poisoned"))?;
        let ids = loaded(&mut guard, &self.path)?;
        if ids.contains(comment_id) {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        let separator = if ends_with_newline(&mut file)
            .with_context(|| format!("failed to inspect {}", self.path.display()))?
        {
            ""
        } else {
            "\n"
        };
        writeln!(file, "{separator}{comment_id}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;

        ids.insert(comment_id.to_string());
        Ok(true)
    }

    /// Number of distinct ids known.
    pub fn len(&self) -> Result<usize> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|_| anyhow!("dedup store lock is poisoned"))?;
        Ok(loaded(&mut guard, &self.path)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn loaded<'a>(
    slot: &'a mut Option<HashSet<String>>,
    path: &Path,
) -> Result<&'a mut HashSet<String>> {
    if slot.is_none() {
        *slot = Some(read_id_log(path)?);
    }
    slot.as_mut()
        .ok_or_else(|| anyhow!("dedup cache failed to initialize"))
}

/// An empty file counts as terminated. Appends always land at the end regardless of the read cursor.
fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn read_id_log(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
