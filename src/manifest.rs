//! Fetch-run manifest (`metadata.txt`).

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

/// Manifest file name inside the data directory.
pub const MANIFEST_FILE: &str = "metadata.txt";

/// Record of one fetch run.
///
/// The file listing is a snapshot of the output directory taken when the
/// manifest is captured, so it reflects actual rather than intended
/// output. The manifest is overwritten, never appended, on rerun.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub comuna: String,
    pub fetched_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub files: Vec<String>,
}

impl Manifest {
    /// Capture a manifest for the current state of the output directory.
    pub fn capture(comuna: &str, sources: &[&str], dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to list output directory {}", dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();

        Ok(Self {
            comuna: comuna.to_string(),
            fetched_at: Utc::now(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            files,
        })
    }

    /// Write the manifest into the directory, replacing any previous one.
    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, self.render())
            .with_context(|| format!("Failed to write manifest {}", path.display()))
    }

    /// Render as line-oriented `key: value` pairs.
    pub fn render(&self) -> String {
        format!(
            "comuna: {}\nfetched_at: {}\nsources: {}\nfiles: {}\n",
            self.comuna,
            self.fetched_at.to_rfc3339(),
            self.sources.join(", "),
            self.files.join(", "),
        )
    }

    /// Parse a manifest previously produced by [`Manifest::render`].
    pub fn parse(content: &str) -> Result<Self> {
        let mut comuna = None;
        let mut fetched_at = None;
        let mut sources = Vec::new();
        let mut files = Vec::new();

        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "comuna" => comuna = Some(value.to_string()),
                "fetched_at" => {
                    fetched_at = Some(
                        DateTime::parse_from_rfc3339(value)
                            .context("Invalid manifest timestamp")?
                            .with_timezone(&Utc),
                    )
                }
                "sources" => sources = split_list(value),
                "files" => files = split_list(value),
                _ => {}
            }
        }

        let (Some(comuna), Some(fetched_at)) = (comuna, fetched_at) else {
            bail!("Manifest is missing required keys");
        };

        Ok(Self {
            comuna,
            fetched_at,
            sources,
            files,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
