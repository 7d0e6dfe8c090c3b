//! Stored-file naming and persistence.
//!
//! Inputs land in the upload directory as
//! `{unix_millis}-{9 random digits}-{sanitised original name}` so two
//! uploads of `report.csv` never collide. Outputs are named
//! `{stem of stored input}.{target}` in the output directory, which makes
//! them unique by construction and deterministic given the stored input.
//!
//! Outputs are written through a [`tempfile::NamedTempFile`] in the output
//! directory and persisted with a rename, so a fetch never sees a
//! half-written artifact and a failed write leaves nothing behind.

use crate::error::ConvertError;
use crate::format::FileFormat;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Where the bytes of a submission come from.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Bytes already in memory, with the client's original file name.
    Bytes { file_name: String, data: Vec<u8> },
    /// A file already on disk.
    Path(PathBuf),
}

impl InputSource {
    pub fn bytes(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        InputSource::Bytes {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        InputSource::Path(path.into())
    }

    /// Original name as the client knows it.
    pub fn file_name(&self) -> String {
        match self {
            InputSource::Bytes { file_name, .. } => file_name.clone(),
            InputSource::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// Size of the input. Stats the file for `Path` inputs.
    pub async fn len(&self) -> Result<u64, ConvertError> {
        match self {
            InputSource::Bytes { data, .. } => Ok(data.len() as u64),
            InputSource::Path(p) => match tokio::fs::metadata(p).await {
                Ok(m) if m.is_file() => Ok(m.len()),
                Ok(_) => Err(ConvertError::MissingInput),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(ConvertError::MissingInput)
                }
                Err(e) => Err(ConvertError::io(p, e)),
            },
        }
    }

    pub async fn is_empty(&self) -> Result<bool, ConvertError> {
        Ok(self.len().await? == 0)
    }
}

static RE_UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`.
///
/// Directory components are dropped and leading dots stripped, so the result
/// can never escape the upload directory or become a hidden file.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = RE_UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Collision-avoiding name for a persisted input.
pub fn unique_upload_name(original: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{millis}-{suffix:09}-{}", sanitize_file_name(original))
}

/// Deterministic output location: `{output_dir}/{stem(input)}.{target}`.
pub fn output_path_for(input: &Path, target: FileFormat, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{stem}.{}", target.extension()))
}

/// True when `name` is a single plain path component.
///
/// Guards [`crate::convert::Converter::fetch_result`] against traversal.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Copy or write the submission into `upload_dir`, returning the stored path.
pub async fn persist_input(input: &InputSource, upload_dir: &Path) -> Result<PathBuf, ConvertError> {
    let stored = upload_dir.join(unique_upload_name(&input.file_name()));
    match input {
        InputSource::Bytes { data, .. } => tokio::fs::write(&stored, data)
            .await
            .map_err(|e| ConvertError::io(&stored, e))?,
        InputSource::Path(src) => {
            tokio::fs::copy(src, &stored)
                .await
                .map_err(|e| ConvertError::io(src, e))?;
        }
    }
    debug!("Stored input: {}", stored.display());
    Ok(stored)
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let target = path.to_path_buf();
    let bytes = bytes.to_vec();

    tokio::task::spawn_blocking(move || -> Result<(), ConvertError> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| ConvertError::io(&dir, e))?;
        tmp.write_all(&bytes)
            .map_err(|e| ConvertError::io(tmp.path(), e))?;
        // Dropping `tmp` on any error above removes the temp file.
        tmp.persist(&target)
            .map_err(|e| ConvertError::io(&target, e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("atomic write task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_chars() {
        assert_eq!(sanitize_file_name("report.csv"), "report.csv");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\my file (1).png"), "my_file_1_.png");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[test]
    fn upload_names_are_unique_and_keep_original() {
        let a = unique_upload_name("data.csv");
        let b = unique_upload_name("data.csv");
        assert_ne!(a, b);
        assert!(a.ends_with("-data.csv"), "got: {a}");
        let parts: Vec<&str> = a.splitn(3, '-').collect();
        assert!(parts[0].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[1].len(), 9);
    }

    #[test]
    fn output_path_is_deterministic() {
        let p = output_path_for(
            Path::new("/up/1700000000000-000000042-deck.pptx"),
            FileFormat::Pdf,
            Path::new("/out"),
        );
        assert_eq!(p, PathBuf::from("/out/1700000000000-000000042-deck.pdf"));
        assert_eq!(
            output_path_for(Path::new("/up/noext"), FileFormat::Json, Path::new("/out")),
            PathBuf::from("/out/noext.json")
        );
    }

    #[test]
    fn plain_file_names() {
        assert!(is_plain_file_name("report.json"));
        assert!(!is_plain_file_name("../report.json"));
        assert!(!is_plain_file_name("a/b"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
    }

    #[tokio::test]
    async fn persist_bytes_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        let stored = persist_input(&InputSource::bytes("a.csv", b"x,y".to_vec()), dir.path())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&stored).unwrap(), b"x,y");
        assert!(stored.starts_with(dir.path()));

        let copied = persist_input(&InputSource::path(&stored), dir.path()).await.unwrap();
        assert_ne!(copied, stored);
        assert_eq!(std::fs::read(&copied).unwrap(), b"x,y");
    }

    #[tokio::test]
    async fn input_len_and_missing_path() {
        assert_eq!(InputSource::bytes("a", vec![1, 2, 3]).len().await.unwrap(), 3);
        assert!(InputSource::bytes("a", Vec::new()).is_empty().await.unwrap());
        assert!(matches!(
            InputSource::path("/definitely/not/here.csv").len().await,
            Err(ConvertError::MissingInput)
        ));
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        write_atomic(&target, b"[]").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"[]");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
