//! Office document conversion through an external tool (LibreOffice).
//!
//! ## Two branches
//!
//! The tool is probed with `{command} --version`:
//!
//! * **present**: run `{command} --headless --convert-to {target} --outdir
//!   {output_dir} {input}` and expect `{output_dir}/{stem}.{target}`
//!   afterwards. A non-zero exit, spawn failure, timeout, or missing output
//!   is `ExternalToolError`; any partial output is removed.
//! * **absent**: write a small text placeholder at the expected output path
//!   and return [`ConversionOutcome::Demo`]. Installs without LibreOffice
//!   still exercise the whole request/response contract.
//!
//! With [`ToolProbe::Auto`] the probe runs once per [`OfficeDelegate`] and its
//! answer is reused. Concurrent tool processes are capped by a semaphore.

use crate::config::{ConverterConfig, ToolProbe};
use crate::error::ConvertError;
use crate::format::OfficeConversion;
use crate::outcome::{ConversionOutcome, OutputRef};
use crate::pipeline::storage::{output_path_for, write_atomic};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, warn};

/// Runs document conversions and remembers whether the tool exists.
#[derive(Debug)]
pub struct OfficeDelegate {
    command: String,
    probe: ToolProbe,
    timeout: Duration,
    available: OnceCell<bool>,
    permits: Semaphore,
    probes_run: AtomicUsize,
}

impl OfficeDelegate {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            command: config.office_command.clone(),
            probe: config.tool_probe,
            timeout: Duration::from_secs(config.tool_timeout_secs),
            available: OnceCell::new(),
            permits: Semaphore::new(config.max_concurrent_delegates.max(1)),
            probes_run: AtomicUsize::new(0),
        }
    }

    /// Whether the tool is usable, honouring the configured override.
    pub async fn is_available(&self) -> bool {
        match self.probe {
            ToolProbe::Present => true,
            ToolProbe::Absent => false,
            ToolProbe::Auto => {
                *self
                    .available
                    .get_or_init(|| async {
                        self.probes_run.fetch_add(1, Ordering::Relaxed);
                        probe_tool(&self.command, self.timeout).await
                    })
                    .await
            }
        }
    }

    /// Number of `--version` probes spawned so far.
    pub fn probes_run(&self) -> usize {
        self.probes_run.load(Ordering::Relaxed)
    }

    /// Convert `input_path` according to `conversion`, writing into `output_dir`.
    ///
    /// Never returns `Err`: every failure is folded into
    /// [`ConversionOutcome::Failed`].
    pub async fn delegate(
        &self,
        input_path: &Path,
        conversion: OfficeConversion,
        output_dir: &Path,
    ) -> ConversionOutcome {
        let output_path = output_path_for(input_path, conversion.target, output_dir);
        info!(
            "Converting office document {} ({})",
            input_path.display(),
            conversion.format()
        );

        if !self.is_available().await {
            warn!(
                "'{}' not found, writing placeholder instead of converting",
                self.command
            );
            return match write_placeholder(input_path, conversion, &output_path).await {
                Ok(()) => ConversionOutcome::Demo {
                    message: format!(
                        "{} conversion requires {}, which is not installed. A placeholder file was produced instead.",
                        conversion.format(),
                        self.command
                    ),
                    placeholder: OutputRef::from_path(&output_path),
                },
                Err(e) => e.into(),
            };
        }

        match self.run_tool(input_path, conversion, output_dir, &output_path).await {
            Ok(size_bytes) => {
                info!("Office conversion complete: {}", output_path.display());
                ConversionOutcome::Converted {
                    output: OutputRef::from_path(&output_path),
                    size_bytes,
                }
            }
            Err(e) => {
                warn!("Office conversion failed: {}", e);
                if tokio::fs::remove_file(&output_path).await.is_ok() {
                    debug!("Removed partial output {}", output_path.display());
                }
                e.into()
            }
        }
    }

    async fn run_tool(
        &self,
        input_path: &Path,
        conversion: OfficeConversion,
        output_dir: &Path,
        output_path: &Path,
    ) -> Result<u64, ConvertError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ConvertError::Internal(format!("delegate semaphore closed: {e}")))?;

        let mut cmd = Command::new(&self.command);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg(conversion.target.extension())
            .arg("--outdir")
            .arg(output_dir)
            .arg(input_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        debug!("Office command: {:?}", cmd);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ConvertError::ExternalTool {
                detail: format!(
                    "{} did not finish within {}s",
                    self.command,
                    self.timeout.as_secs()
                ),
            })?
            .map_err(|e| ConvertError::ExternalTool {
                detail: format!("failed to run {}: {e}", self.command),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(ConvertError::ExternalTool {
                detail: if stderr.is_empty() {
                    format!("{} exited with {}", self.command, output.status)
                } else {
                    format!("{} exited with {}: {stderr}", self.command, output.status)
                },
            });
        }

        match tokio::fs::metadata(output_path).await {
            Ok(meta) => Ok(meta.len()),
            Err(_) => Err(ConvertError::ExternalTool {
                detail: format!(
                    "{} reported success but produced no {}",
                    self.command,
                    output_path.display()
                ),
            }),
        }
    }
}

/// Run `{command} --version`; true when it exits successfully within
/// `timeout`. A probe that hangs counts as absent and is killed.
async fn probe_tool(command: &str, timeout: Duration) -> bool {
    let status = Command::new(command)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();
    let status = match tokio::time::timeout(timeout, status).await {
        Ok(status) => status,
        Err(_) => {
            warn!(
                "Office tool probe '{}' did not answer within {}s",
                command,
                timeout.as_secs()
            );
            return false;
        }
    };
    match status {
        Ok(s) if s.success() => {
            debug!("Office tool '{}' is available", command);
            true
        }
        Ok(s) => {
            debug!("Office tool probe '{}' exited with {}", command, s);
            false
        }
        Err(e) => {
            debug!("Office tool probe '{}' failed: {}", command, e);
            false
        }
    }
}

async fn write_placeholder(
    input_path: &Path,
    conversion: OfficeConversion,
    output_path: &Path,
) -> Result<(), ConvertError> {
    let original = input_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let body = format!(
        "Placeholder for a {} to {} conversion\n\
         Original file: {original}\n\n\
         The office conversion tool is not installed on this server, so the document was not converted.\n",
        conversion.source, conversion.target
    );
    write_atomic(output_path, body.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::format::FileFormat;

    const PDF_TO_DOCX: OfficeConversion = OfficeConversion {
        source: FileFormat::Pdf,
        target: FileFormat::Docx,
    };

    fn config(command: &str, probe: ToolProbe) -> ConverterConfig {
        ConverterConfig::builder()
            .office_command(command)
            .tool_probe(probe)
            .tool_timeout_secs(20)
            .build()
            .unwrap()
    }

    fn input(dir: &Path) -> std::path::PathBuf {
        let p = dir.join("123-000000001-report.pdf");
        std::fs::write(&p, b"%PDF-1.4 fake").unwrap();
        p
    }

    /// Write an executable stand-in for the office tool.
    #[cfg(unix)]
    fn fake_tool(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-office");
        std::fs::write(
            &path,
            format!(
                "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo 'FakeOffice 7.6'; exit 0; fi\n{body}\n"
            ),
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn absent_tool_writes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let delegate = OfficeDelegate::new(&config("quickconvert-no-such-tool", ToolProbe::Auto));

        let outcome = delegate.delegate(&input(dir.path()), PDF_TO_DOCX, out.path()).await;
        let (placeholder, message) = match outcome {
            ConversionOutcome::Demo {
                placeholder,
                message,
            } => (placeholder, message),
            other => panic!("expected Demo, got {other:?}"),
        };
        assert_eq!(placeholder.path, out.path().join("123-000000001-report.docx"));
        assert!(message.contains("pdf-to-docx"));
        let body = std::fs::read_to_string(&placeholder.path).unwrap();
        assert!(body.contains("pdf to docx"));
        assert!(body.contains("123-000000001-report.pdf"));
    }

    #[tokio::test]
    async fn forced_absent_skips_probe() {
        let dir = tempfile::tempdir().unwrap();
        let delegate = OfficeDelegate::new(&config("sh", ToolProbe::Absent));
        let outcome = delegate.delegate(&input(dir.path()), PDF_TO_DOCX, dir.path()).await;
        assert!(matches!(outcome, ConversionOutcome::Demo { .. }));
        assert_eq!(delegate.probes_run(), 0);
    }

    #[tokio::test]
    async fn probe_result_is_cached() {
        let delegate = OfficeDelegate::new(&config("quickconvert-no-such-tool", ToolProbe::Auto));
        assert!(!delegate.is_available().await);
        assert!(!delegate.is_available().await);
        assert_eq!(delegate.probes_run(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn present_tool_converts() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        // $3 = target extension, $5 = outdir, $6 = input
        let tool = fake_tool(
            dir.path(),
            "base=$(basename \"$6\"); cp \"$6\" \"$5/${base%.*}.$3\"",
        );
        let delegate = OfficeDelegate::new(&config(&tool, ToolProbe::Auto));

        let outcome = delegate.delegate(&input(dir.path()), PDF_TO_DOCX, out.path()).await;
        let (output, size_bytes) = match outcome {
            ConversionOutcome::Converted { output, size_bytes } => (output, size_bytes),
            other => panic!("expected Converted, got {other:?}"),
        };
        assert_eq!(output.file_name, "123-000000001-report.docx");
        assert_eq!(size_bytes, 13);
        assert!(output.path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tool_is_external_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let tool = fake_tool(
            dir.path(),
            "base=$(basename \"$6\"); echo partial > \"$5/${base%.*}.$3\"; echo 'source file could not be loaded' >&2; exit 3",
        );
        let delegate = OfficeDelegate::new(&config(&tool, ToolProbe::Present));

        let outcome = delegate.delegate(&input(dir.path()), PDF_TO_DOCX, out.path()).await;
        let (kind, message) = match outcome {
            ConversionOutcome::Failed { kind, message } => (kind, message),
            other => panic!("expected Failed, got {other:?}"),
        };
        assert_eq!(kind, ErrorKind::ExternalToolError);
        assert!(message.contains("could not be loaded"), "got: {message}");
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_tool_without_output_is_external_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "exit 0");
        let delegate = OfficeDelegate::new(&config(&tool, ToolProbe::Auto));

        let outcome = delegate.delegate(&input(dir.path()), PDF_TO_DOCX, dir.path()).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ExternalToolError));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hanging_probe_counts_as_absent() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("stuck-office");
        std::fs::write(&tool, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = ConverterConfig::builder()
            .office_command(tool.to_string_lossy())
            .tool_probe(ToolProbe::Auto)
            .tool_timeout_secs(1)
            .build()
            .unwrap();
        let delegate = OfficeDelegate::new(&config);

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            delegate.delegate(&input(dir.path()), PDF_TO_DOCX, dir.path()),
        )
        .await
        .expect("probe must be bounded by the tool timeout");
        assert!(matches!(outcome, ConversionOutcome::Demo { .. }), "got {outcome:?}");
        assert_eq!(delegate.probes_run(), 1);
        assert!(!delegate.is_available().await);
    }
}
