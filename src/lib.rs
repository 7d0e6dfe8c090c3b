//! # quickconvert
//!
//! File-format conversion with bounded on-disk retention.
//!
//! A submission names a conversion (`"png-to-jpg"`, `"docx-to-pdf"`, …) and
//! carries the input bytes. The [`Converter`] validates it, stores the input,
//! and either transforms it in-process (raster images, CSV/JSON) or hands it
//! to LibreOffice. Every submission ends in exactly one
//! [`ConversionOutcome`]. A background sweeper deletes stored files once they
//! outlive the retention window.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SubmitRequest
//!  │
//!  ├─ 1. Validate  input present, format present, format supported
//!  ├─ 2. Persist   copy the input into the upload directory
//!  ├─ 3. Route     in-process transform or office delegate
//!  ├─ 4. Execute   image / tabular on the blocking pool, soffice as a subprocess
//!  └─ 5. Outcome   Converted | Demo | Failed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quickconvert::{ConversionOutcome, Converter, ConverterConfig, InputSource, SubmitRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::open(ConverterConfig::default()).await?;
//!     let _sweeper = converter.spawn_sweeper();
//!
//!     let outcome = converter
//!         .submit(
//!             SubmitRequest::new()
//!                 .input(InputSource::path("people.csv"))
//!                 .format("csv-to-json"),
//!         )
//!         .await;
//!
//!     if let ConversionOutcome::Converted { output, .. } = &outcome {
//!         let json = converter.fetch_result(&output.file_name).await?;
//!         println!("{}", String::from_utf8_lossy(&json));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Conversions
//!
//! | Identifier     | Executor          |
//! |----------------|-------------------|
//! | `png-to-jpg`   | in-process image  |
//! | `jpg-to-png`   | in-process image  |
//! | `csv-to-json`  | in-process tabular |
//! | `json-to-csv`  | in-process tabular |
//! | `docx-to-pdf`  | LibreOffice       |
//! | `pdf-to-docx`  | LibreOffice       |
//! | `pptx-to-pdf`  | LibreOffice       |
//! | `pdf-to-pptx`  | LibreOffice       |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `quickconvert` binary (clap + anyhow + tracing-subscriber) |
//!
//! Library-only users can drop the CLI dependencies:
//! ```toml
//! quickconvert = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod outcome;
pub mod pipeline;
pub mod sweeper;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder, ToolProbe};
pub use convert::{ConversionRequest, Converter, SubmitRequest};
pub use error::{ConvertError, ErrorKind};
pub use format::{classify, ConversionFormat, FileFormat, Strategy, Transform};
pub use outcome::{ConversionOutcome, HealthStatus, Origin, OutputRef, StoredFile, SweepReport};
pub use pipeline::storage::InputSource;
pub use sweeper::{sweep_once, SweeperHandle};
