//! Executors behind the conversion dispatcher.
//!
//! Each submodule implements one concern. The transforms (`image`,
//! `tabular`) are pure byte-to-byte functions with no I/O, so they are unit
//! tested without touching disk and run on the blocking pool from
//! [`crate::convert`].
//!
//! ## Data Flow
//!
//! ```text
//! storage ──▶ image | tabular ──▶ storage
//!        └──▶ office (subprocess writes its own output)
//! ```
//!
//! 1. [`storage`]: persist the submission, name outputs, atomic writes
//! 2. [`image`]: PNG ↔ JPEG re-encoding
//! 3. [`tabular`]: CSV ↔ JSON
//! 4. [`office`]: LibreOffice subprocess with a placeholder fallback

pub mod image;
pub mod office;
pub mod storage;
pub mod tabular;
