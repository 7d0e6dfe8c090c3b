//! The conversion dispatcher.
//!
//! [`Converter::submit`] walks a submission through a fixed sequence of
//! gates; a failing gate ends the submission with no later side effects:
//!
//! ```text
//! input? ──▶ format? ──▶ registry ──▶ size ──▶ persist ──▶ transform | delegate
//! ```
//!
//! The first three gates run before anything is written. Transform failures
//! keep their own kind such as `DecodeError` or `SchemaError`; anything unexpected
//! (I/O, a panicking transform) becomes `InternalError` carrying the error's
//! display text only.
//!
//! Each submission runs on its own spawned task. Dropping the future returned
//! by `submit` detaches that task rather than cancelling it, so work already
//! handed to a transform or subprocess always runs to completion. Nothing is
//! retried.

use crate::config::ConverterConfig;
use crate::error::{ConvertError, ErrorKind};
use crate::format::{ConversionFormat, FileFormat, Strategy, Transform};
use crate::outcome::{ConversionOutcome, HealthStatus, Origin, OutputRef, StoredFile, SweepReport};
use crate::pipeline::office::OfficeDelegate;
use crate::pipeline::storage::{self, InputSource};
use crate::pipeline::{image, tabular};
use crate::sweeper::{self, SweeperHandle};
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info};

/// A raw submission as received from the transport layer.
///
/// Either field may be missing; [`Converter::submit`] reports which.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub input: Option<InputSource>,
    pub format: Option<String>,
}

impl SubmitRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, input: InputSource) -> Self {
        self.input = Some(input);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// A validated conversion: a supported pair plus its input.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    format: ConversionFormat,
    input: InputSource,
}

impl ConversionRequest {
    pub fn new(format: ConversionFormat, input: InputSource) -> Self {
        Self { format, input }
    }

    pub fn format(&self) -> ConversionFormat {
        self.format
    }

    pub fn input(&self) -> &InputSource {
        &self.input
    }
}

/// Entry point of the library: validates, routes and executes conversions.
///
/// Cheap to clone; clones share the configuration and the office delegate
/// (and with it the cached tool probe and the subprocess limit).
#[derive(Debug, Clone)]
pub struct Converter {
    config: Arc<ConverterConfig>,
    delegate: Arc<OfficeDelegate>,
}

impl Converter {
    /// Create the storage directories and build a converter.
    pub async fn open(config: ConverterConfig) -> Result<Self, ConvertError> {
        for dir in config.storage_dirs() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ConvertError::io(dir, e))?;
        }
        info!(
            "Storage ready: uploads={} outputs={}",
            config.upload_dir.display(),
            config.output_dir.display()
        );
        Ok(Self {
            delegate: Arc::new(OfficeDelegate::new(&config)),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn delegate(&self) -> &OfficeDelegate {
        &self.delegate
    }

    /// Validate and execute a submission.
    ///
    /// Always returns an outcome; `Err` never escapes.
    pub async fn submit(&self, request: SubmitRequest) -> ConversionOutcome {
        let this = self.clone();
        match tokio::spawn(async move { this.submit_detached(request).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Conversion task failed: {}", e);
                ConvertError::Internal(format!("conversion task failed: {e}")).into()
            }
        }
    }

    async fn submit_detached(&self, request: SubmitRequest) -> ConversionOutcome {
        match self.validate(request).await {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                info!("Rejected submission: {}", e);
                e.into()
            }
        }
    }

    /// Gates 1–3: input present, format present, format supported.
    ///
    /// Writes nothing.
    pub async fn validate(&self, request: SubmitRequest) -> Result<ConversionRequest, ConvertError> {
        let input = request.input.ok_or(ConvertError::MissingInput)?;
        if input.is_empty().await? {
            return Err(ConvertError::MissingInput);
        }

        let format = request
            .format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(ConvertError::MissingFormat)?;

        let format = ConversionFormat::parse(format)?;
        Ok(ConversionRequest::new(format, input))
    }

    /// Execute an already validated request.
    pub async fn dispatch(&self, request: ConversionRequest) -> ConversionOutcome {
        let start = Instant::now();
        info!(
            "Converting '{}' ({})",
            request.input().file_name(),
            request.format()
        );

        let outcome = match self.execute(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.kind() == ErrorKind::InternalError {
                    error!("Conversion {} failed: {}", request.format(), e);
                }
                e.into()
            }
        };

        match &outcome {
            ConversionOutcome::Converted { output, size_bytes } => info!(
                "Converted → {} ({} bytes) in {}ms",
                output.file_name,
                size_bytes,
                start.elapsed().as_millis()
            ),
            ConversionOutcome::Demo { placeholder, .. } => {
                info!("Demo placeholder written: {}", placeholder.file_name)
            }
            ConversionOutcome::Failed { kind, message } => {
                info!("Conversion failed ({}): {}", kind, message)
            }
        }
        outcome
    }

    async fn execute(&self, request: &ConversionRequest) -> Result<ConversionOutcome, ConvertError> {
        let size = request.input().len().await?;
        if size > self.config.max_input_bytes {
            return Err(ConvertError::InputTooLarge {
                size,
                limit: self.config.max_input_bytes,
            });
        }

        let stored = storage::persist_input(request.input(), &self.config.upload_dir).await?;

        match request.format().strategy() {
            Strategy::InProcess(transform) => {
                debug!("Routing {} in-process", request.format());
                self.transform(&stored, transform, request.format().target())
                    .await
            }
            Strategy::Delegate(conversion) => {
                debug!("Routing {} to office tool", request.format());
                Ok(self
                    .delegate
                    .delegate(&stored, conversion, &self.config.output_dir)
                    .await)
            }
            Strategy::Unsupported => Err(ConvertError::UnsupportedFormat {
                format: request.format().identifier(),
            }),
        }
    }

    /// Run an in-process transform on the blocking pool and store its output.
    async fn transform(
        &self,
        stored_input: &Path,
        transform: Transform,
        target: FileFormat,
    ) -> Result<ConversionOutcome, ConvertError> {
        let data = tokio::fs::read(stored_input)
            .await
            .map_err(|e| ConvertError::io(stored_input, e))?;
        let jpeg_quality = self.config.jpeg_quality;
        let delimiter = self.config.csv_delimiter;
        if !delimiter.is_ascii() {
            return Err(ConvertError::InvalidConfig(format!(
                "{delimiter:?} is not an ASCII CSV delimiter"
            )));
        }
        let delimiter = delimiter as u8;

        let bytes = tokio::task::spawn_blocking(move || {
            run_transform(transform, &data, jpeg_quality, delimiter)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("transform task panicked: {e}")))??;

        let output_path = storage::output_path_for(stored_input, target, &self.config.output_dir);
        storage::write_atomic(&output_path, &bytes).await?;

        Ok(ConversionOutcome::Converted {
            output: OutputRef::from_path(&output_path),
            size_bytes: bytes.len() as u64,
        })
    }

    /// Raw bytes of a stored output.
    ///
    /// `NotFound` when the artifact was swept, never existed, or `file_name`
    /// is not a bare file name.
    pub async fn fetch_result(&self, file_name: &str) -> Result<Vec<u8>, ConvertError> {
        let not_found = || ConvertError::NotFound {
            file_name: file_name.to_string(),
        };
        if !storage::is_plain_file_name(file_name) {
            return Err(not_found());
        }
        let path = self.config.output_dir.join(file_name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory
                ) =>
            {
                Err(not_found())
            }
            Err(e) => Err(ConvertError::io(path, e)),
        }
    }

    /// Constant liveness signal.
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            message: "QuickConvert API is running".to_string(),
        }
    }

    /// Every file currently held in storage, uploads first.
    pub async fn stored_files(&self) -> Result<Vec<StoredFile>, ConvertError> {
        let mut files = StoredFile::scan(&self.config.upload_dir, Origin::Upload).await?;
        files.extend(StoredFile::scan(&self.config.output_dir, Origin::Output).await?);
        Ok(files)
    }

    /// Run one retention sweep now.
    pub async fn sweep(&self) -> SweepReport {
        let dirs = sweeper::storage_targets(&self.config);
        sweeper::sweep_once(&dirs, self.config.retention, SystemTime::now()).await
    }

    /// Start the periodic retention sweeper.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        sweeper::spawn(Arc::clone(&self.config))
    }
}

fn run_transform(
    transform: Transform,
    data: &[u8],
    jpeg_quality: u8,
    delimiter: u8,
) -> Result<Vec<u8>, ConvertError> {
    match transform {
        Transform::Image { target } => image::reencode(data, target, jpeg_quality),
        Transform::CsvToJson => tabular::csv_to_json(data, delimiter),
        Transform::JsonToCsv => tabular::json_to_csv(data, delimiter),
    }
}
