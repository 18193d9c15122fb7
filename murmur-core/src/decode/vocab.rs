//! Subword vocabulary table.
//!
//! Loaded once at startup from an `id<whitespace>token` text source (plain
//! or gzip-compressed, detected by magic bytes) and shared read-only by all
//! decode calls. Malformed lines are skipped with a warning; only a missing,
//! unreadable, or entirely unusable source is fatal.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, warn};

use crate::error::{MurmurError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Immutable id→token map with unique keys.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: HashMap<i64, String>,
}

impl Vocabulary {
    /// Load from a file in either accepted encoding.
    ///
    /// # Errors
    /// `Vocabulary` if the file cannot be opened or holds no usable entries.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            MurmurError::Vocabulary(format!("cannot read {}: {e}", path.display()))
        })?;

        if bytes.starts_with(&GZIP_MAGIC) {
            debug!(path = %path.display(), "loading gzip-compressed vocabulary");
            Self::from_reader(BufReader::new(GzDecoder::new(&bytes[..])))
        } else {
            Self::from_reader(BufReader::new(&bytes[..]))
        }
    }

    /// Parse `id<whitespace>token` lines from any buffered reader.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut entries: HashMap<i64, String> = HashMap::new();
        let mut skipped = 0usize;

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                MurmurError::Vocabulary(format!("read failed at line {}: {e}", index + 1))
            })?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let mut parts = line.splitn(2, char::is_whitespace);
            let id = parts.next().and_then(|s| s.parse::<i64>().ok());
            let token = parts.next().map(str::trim_start).filter(|t| !t.is_empty());
            let (Some(id), Some(token)) = (id, token) else {
                warn!(line = index + 1, "skipping malformed vocabulary line");
                skipped += 1;
                continue;
            };
            if id < 0 {
                warn!(line = index + 1, id, "skipping negative vocabulary id");
                skipped += 1;
                continue;
            }
            if entries.contains_key(&id) {
                warn!(line = index + 1, id, "duplicate vocabulary id; keeping the first entry");
                skipped += 1;
                continue;
            }
            entries.insert(id, token.to_string());
        }

        if entries.is_empty() {
            return Err(MurmurError::Vocabulary(
                "vocabulary source holds no usable entries".into(),
            ));
        }
        debug!(entries = entries.len(), skipped, "vocabulary loaded");
        Ok(Self { entries })
    }

    /// Build directly from id/token pairs (tests, embedded tables).
    ///
    /// Duplicate ids keep the first entry, matching the file loader.
    pub fn from_entries(pairs: impl IntoIterator<Item = (i64, String)>) -> Result<Self> {
        let mut entries: HashMap<i64, String> = HashMap::new();
        for (id, token) in pairs {
            entries.entry(id).or_insert(token);
        }
        if entries.is_empty() {
            return Err(MurmurError::Vocabulary("no vocabulary entries given".into()));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    /// Reverse lookup by exact token string. Linear scan; used once per
    /// decoder to locate the end-of-text sentinel.
    pub fn id_of(&self, token: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(_, t)| t.as_str() == token)
            .map(|(&id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
