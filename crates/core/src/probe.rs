use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

use crate::report::Reporter;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run ffprobe: {0}")]
    Io(#[from] std::io::Error),
    #[error("ffprobe exited with {exit_code:?}: {stderr}")]
    Failed {
        stderr: String,
        exit_code: Option<i32>,
    },
    #[error("malformed ffprobe output: {0}")]
    Malformed(String),
}

#[async_trait::async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration(&self, path: &Path) -> Result<f64, ProbeError>;
}

#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    binary: PathBuf,
}

impl Default for FfprobeDurationProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeDurationProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait::async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let output = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                exit_code: output.status.code(),
            });
        }
        parse_duration(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Extracts `format.duration` from ffprobe's JSON output.
pub fn parse_duration(stdout: &[u8]) -> Result<f64, ProbeError> {
    let probe: FfprobeOutput =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::Malformed(e.to_string()))?;
    let raw = probe
        .format
        .duration
        .ok_or_else(|| ProbeError::Malformed("missing format.duration".to_string()))?;
    let duration: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ProbeError::Malformed(format!("unparseable duration {raw:?}")))?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(ProbeError::Malformed(format!("invalid duration {raw:?}")));
    }
    Ok(duration)
}

/// Probes `path`, mapping every failure to a duration of 0.
pub async fn probe_duration(probe: &dyn DurationProbe, path: &Path, reporter: &Reporter) -> f64 {
    match probe.duration(path).await {
        Ok(duration) => {
            reporter.info(format!("Duration for {}: {duration:.2}s", path.display()));
            duration
        }
        Err(e) => {
            reporter.error(format!("Could not probe duration of {}: {e}", path.display()));
            0.0
        }
    }
}
