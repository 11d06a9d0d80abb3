// src/storage/mod.rs

//! Fingerprint persistence.
//!
//! State survives restarts in a line-oriented file, one record per
//! line: `<url><space><hex-digest>`. The loader skips malformed lines
//! and degrades to an empty store on read failure; losing state only
//! means re-notifying on the next genuine change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Last-observed fingerprint per watched URL. At most one record per
/// URL; created on first successful fetch, overwritten on change.
pub struct FingerprintStore {
    path: PathBuf,
    records: HashMap<String, String>,
}

impl FingerprintStore {
    /// Load the store from its state file. Never fails: a missing or
    /// unreadable file yields an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                log::warn!(
                    "Failed to read state file {}: {}. Starting empty.",
                    path.display(),
                    e
                );
                HashMap::new()
            }
        };

        log::debug!("Loaded {} fingerprint record(s)", records.len());
        Self { path, records }
    }

    /// Last-observed digest for a URL.
    pub fn get(&self, url: &str) -> Option<&str> {
        self.records.get(url).map(String::as_str)
    }

    /// Record the digest for a URL, replacing any previous record.
    pub fn set(&mut self, url: impl Into<String>, digest: impl Into<String>) {
        self.records.insert(url.into(), digest.into());
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate over (url, digest) records in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().map(|(u, d)| (u.as_str(), d.as_str()))
    }

    /// Write the store atomically (temp file, then rename).
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(self.serialize().as_bytes()).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Parse state file content, skipping malformed lines.
    fn parse(content: &str) -> HashMap<String, String> {
        let mut records = HashMap::new();
        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            match line.split_once(' ') {
                Some((url, digest)) if !url.is_empty() && !digest.trim().is_empty() => {
                    records.insert(url.to_string(), digest.trim().to_string());
                }
                _ => log::warn!("Skipping malformed state line: {line}"),
            }
        }
        records
    }

    /// Serialize to sorted lines for a stable on-disk ordering.
    fn serialize(&self) -> String {
        let mut lines: Vec<String> = self
            .records
            .iter()
            .map(|(url, digest)| format!("{url} {digest}"))
            .collect();
        lines.sort();

        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}
