//! Run summary written next to the outputs (`ebg.lock.json`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::ebg::FactoryStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDigest {
    pub file: String,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    pub input_sha256: String,
    pub profile: String,
    pub tiny_component_threshold: u32,
    pub outputs: Vec<OutputDigest>,
    pub stats: FactoryStats,
    pub created_at_utc: String,
}

impl LockFile {
    /// Digest the input and every output of a run
    pub fn create(
        input_path: &Path,
        outputs: &[&Path],
        profile: &str,
        tiny_component_threshold: u32,
        stats: FactoryStats,
    ) -> Result<Self> {
        let input_sha256 = hex::encode(sha256_file(input_path)?);
        debug!(sha256 = %input_sha256, path = %input_path.display(), "input digest");

        let mut digests = Vec::with_capacity(outputs.len());
        for &path in outputs {
            let sha256 = hex::encode(sha256_file(path)?);
            let bytes = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat {}", path.display()))?
                .len();
            let file = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            debug!(%file, bytes, %sha256, "output digest");
            digests.push(OutputDigest {
                file,
                bytes,
                sha256,
            });
        }

        Ok(Self {
            input_sha256,
            profile: profile.to_string(),
            tiny_component_threshold,
            outputs: digests,
            stats,
            created_at_utc: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)?;
        info!(path = %path.display(), "wrote lock file");
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let lock: LockFile = serde_json::from_reader(BufReader::new(file))?;
        Ok(lock)
    }
}

/// SHA-256 of a file's contents
pub fn sha256_file<P: AsRef<Path>>(path: P) -> Result<[u8; 32]> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024]; // 1MB buffer
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().into())
}
