//! Configuration for the converter and the retention sweeper.
//!
//! All behaviour is controlled through [`ConverterConfig`], built via its
//! [`ConverterConfigBuilder`]. The config is created once at process start,
//! wrapped in an `Arc` by [`crate::convert::Converter`] and never mutated
//! afterwards; the dispatcher and the sweeper read the same instance.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Files older than this are removed by the sweeper. 24 hours.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Time between two sweeps. 1 hour.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Largest accepted input. 50 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 50 * 1024 * 1024;

/// Configuration for conversion and storage retention.
///
/// # Example
/// ```rust
/// use quickconvert::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .storage_root("/var/lib/quickconvert")
///     .jpeg_quality(85)
///     .office_command("soffice")
///     .build()
///     .unwrap();
/// assert!(config.upload_dir.ends_with("uploads"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Directory receiving persisted inputs.
    pub upload_dir: PathBuf,

    /// Directory receiving conversion outputs and demo placeholders.
    pub output_dir: PathBuf,

    /// Age after which a stored file is deleted. Default: 24 h.
    ///
    /// This threshold is the only thing keeping the sweeper away from files a
    /// conversion is still using. It must stay far above the longest expected
    /// conversion (see `tool_timeout_secs`).
    pub retention: Duration,

    /// Period of the background sweep. Default: 1 h.
    pub sweep_interval: Duration,

    /// JPEG quality for image re-encoding, 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Field delimiter for CSV input and output, a single ASCII character.
    /// Default: `,`.
    pub csv_delimiter: char,

    /// Maximum input size in bytes. Default: 50 MiB.
    pub max_input_bytes: u64,

    /// Program used for office document conversion. Default: `libreoffice`.
    pub office_command: String,

    /// How the presence of `office_command` is determined. Default: probe once.
    pub tool_probe: ToolProbe,

    /// Upper bound on concurrently running office tool processes. Default: 4.
    pub max_concurrent_delegates: usize,

    /// Per-invocation timeout for the office tool in seconds. Default: 300.
    pub tool_timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        let root = std::env::temp_dir().join("quickconvert");
        Self {
            upload_dir: root.join("uploads"),
            output_dir: root.join("outputs"),
            retention: DEFAULT_RETENTION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            jpeg_quality: 90,
            csv_delimiter: ',',
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            office_command: "libreoffice".to_string(),
            tool_probe: ToolProbe::default(),
            max_concurrent_delegates: 4,
            tool_timeout_secs: 300,
        }
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Both storage directories, uploads first.
    pub fn storage_dirs(&self) -> [&PathBuf; 2] {
        [&self.upload_dir, &self.output_dir]
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    /// Place `uploads/` and `outputs/` under `root`.
    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.config.upload_dir = root.join("uploads");
        self.config.output_dir = root.join("outputs");
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn csv_delimiter(mut self, delimiter: char) -> Self {
        self.config.csv_delimiter = delimiter;
        self
    }

    pub fn max_input_bytes(mut self, bytes: u64) -> Self {
        self.config.max_input_bytes = bytes;
        self
    }

    pub fn office_command(mut self, command: impl Into<String>) -> Self {
        self.config.office_command = command.into();
        self
    }

    pub fn tool_probe(mut self, probe: ToolProbe) -> Self {
        self.config.tool_probe = probe;
        self
    }

    pub fn max_concurrent_delegates(mut self, n: usize) -> Self {
        self.config.max_concurrent_delegates = n.max(1);
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        if c.upload_dir == c.output_dir {
            return Err(ConvertError::InvalidConfig(format!(
                "upload and output directories must differ, both are {}",
                c.upload_dir.display()
            )));
        }
        if c.retention.is_zero() {
            return Err(ConvertError::InvalidConfig(
                "retention must be greater than zero".into(),
            ));
        }
        if c.sweep_interval.is_zero() {
            return Err(ConvertError::InvalidConfig(
                "sweep interval must be greater than zero".into(),
            ));
        }
        if !c.csv_delimiter.is_ascii() || matches!(c.csv_delimiter, '"' | '\n' | '\r') {
            return Err(ConvertError::InvalidConfig(format!(
                "{:?} cannot be used as a CSV delimiter",
                c.csv_delimiter
            )));
        }
        if c.office_command.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "office command must not be empty".into(),
            ));
        }
        if c.tool_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "tool timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the office tool's availability is decided.
///
/// `Auto` runs `{office_command} --version` on first use and caches the
/// answer for the lifetime of the [`crate::convert::Converter`]. The other two
/// variants skip the probe entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolProbe {
    /// Probe once, then reuse the result. (default)
    #[default]
    Auto,
    /// Assume the tool is installed.
    Present,
    /// Assume the tool is missing; every document conversion returns a demo placeholder.
    Absent,
}
