//! End-to-end tests through the public `Converter` API.
//!
//! Office conversions run with the tool forced absent so the suite does not
//! depend on LibreOffice being installed.

use futures::future::join_all;
use image::{ImageFormat, Rgb, RgbImage};
use quickconvert::{
    ConversionOutcome, Converter, ConverterConfig, ErrorKind, InputSource, Origin, SubmitRequest,
    ToolProbe,
};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio_test::assert_ok;

async fn open(root: &Path) -> Converter {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("quickconvert=debug")
        .with_test_writer()
        .try_init();
    let config = ConverterConfig::builder()
        .storage_root(root)
        .tool_probe(ToolProbe::Absent)
        .build()
        .unwrap();
    Converter::open(config).await.unwrap()
}

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(8, 6, |x, y| Rgb([(x * 30) as u8, (y * 40) as u8, 128]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

async fn submit(c: &Converter, name: &str, data: &[u8], format: &str) -> ConversionOutcome {
    c.submit(
        SubmitRequest::new()
            .input(InputSource::bytes(name, data.to_vec()))
            .format(format),
    )
    .await
}

fn converted_name(outcome: &ConversionOutcome) -> String {
    match outcome {
        ConversionOutcome::Converted { output, .. } => output.file_name.clone(),
        other => panic!("expected Converted, got {other:?}"),
    }
}

fn age(path: &Path, by: Duration) {
    let f = std::fs::File::options().write(true).open(path).unwrap();
    f.set_modified(SystemTime::now() - by).unwrap();
}

#[tokio::test]
async fn png_to_jpg_and_back() {
    let root = tempfile::tempdir().unwrap();
    let c = open(root.path()).await;

    let outcome = submit(&c, "pixel.png", &png_bytes(), "png-to-jpg").await;
    let name = converted_name(&outcome);
    assert!(name.ends_with(".jpg"));

    let jpg = assert_ok!(c.fetch_result(&name).await);
    assert_eq!(&jpg[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&jpg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 6));

    let outcome = submit(&c, "pixel.jpg", &jpg, "jpg-to-png").await;
    let png = assert_ok!(c.fetch_result(&converted_name(&outcome)).await);
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn csv_to_json_output_is_fetchable() {
    let root = tempfile::tempdir().unwrap();
    let c = open(root.path()).await;

    let outcome = submit(&c, "data.csv", b"a,b\n1,2\n3,4", "csv-to-json").await;
    let bytes = assert_ok!(c.fetch_result(&converted_name(&outcome)).await);
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        value,
        serde_json::json!([{"a": "1", "b": "2"}, {"a": "3", "b": "4"}])
    );
}

#[tokio::test]
async fn json_to_csv_fills_missing_fields() {
    let root = tempfile::tempdir().unwrap();
    let c = open(root.path()).await;

    let input = br#"[{"name":"Ada","langs":"x, y"},{"name":"Alan"}]"#;
    let outcome = submit(&c, "people.json", input, "json-to-csv").await;
    let bytes = assert_ok!(c.fetch_result(&converted_name(&outcome)).await);
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "name,langs\nAda,\"x, y\"\nAlan,"
    );
}

#[tokio::test]
async fn rejections_report_their_kind() {
    let root = tempfile::tempdir().unwrap();
    let c = open(root.path()).await;

    let outcome = c.submit(SubmitRequest::new().format("csv-to-json")).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::MissingInput));
    match &outcome {
        ConversionOutcome::Failed { message, .. } => assert_eq!(message, "No file uploaded"),
        other => panic!("expected Failed, got {other:?}"),
    }

    let outcome = c
        .submit(SubmitRequest::new().input(InputSource::bytes("a.csv", b"a".to_vec())))
        .await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::MissingFormat));

    let outcome = submit(&c, "a.png", &png_bytes(), "png-to-pdf").await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::UnsupportedFormat));

    let outcome = submit(&c, "a.csv", b"\n\n", "csv-to-json").await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::EmptyInputError));

    let outcome = submit(&c, "a.png", b"not an image", "png-to-jpg").await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::DecodeError));

    let files = c.stored_files().await.unwrap();
    assert!(
        files.iter().all(|f| f.origin == Origin::Upload),
        "failed conversions left output files: {files:?}"
    );
}

#[tokio::test]
async fn office_without_tool_produces_demo_placeholder() {
    let root = tempfile::tempdir().unwrap();
    let c = open(root.path()).await;

    let outcome = submit(&c, "report.docx", b"PK\x03\x04fake", "docx-to-pdf").await;
    let placeholder = match &outcome {
        ConversionOutcome::Demo { placeholder, .. } => placeholder.clone(),
        other => panic!("expected Demo, got {other:?}"),
    };
    assert!(outcome.is_success());
    assert!(placeholder.file_name.ends_with("-report.pdf"));
    assert!(!assert_ok!(c.fetch_result(&placeholder.file_name).await).is_empty());
    assert_eq!(c.delegate().probes_run(), 0);
}

#[tokio::test]
async fn swept_outputs_are_not_found() {
    let root = tempfile::tempdir().unwrap();
    let c = open(root.path()).await;

    let outcome = submit(&c, "data.csv", b"a\n1", "csv-to-json").await;
    let name = converted_name(&outcome);
    assert_ok!(c.fetch_result(&name).await);

    for file in c.stored_files().await.unwrap() {
        age(&file.path, Duration::from_secs(25 * 3600));
    }
    let report = c.sweep().await;
    assert_eq!(report.deleted, 2);

    let err = c.fetch_result(&name).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(c.stored_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_submissions_get_distinct_outputs() {
    let root = tempfile::tempdir().unwrap();
    let c = open(root.path()).await;

    let outcomes = join_all((0..8).map(|i| {
        let c = c.clone();
        async move {
            let csv = format!("n\n{i}");
            submit(&c, "same.csv", csv.as_bytes(), "csv-to-json").await
        }
    }))
    .await;

    let names: HashSet<String> = outcomes.iter().map(converted_name).collect();
    assert_eq!(names.len(), 8);
}

#[tokio::test]
async fn path_inputs_are_copied_into_storage() {
    let root = tempfile::tempdir().unwrap();
    let c = open(root.path()).await;
    let src = root.path().join("local.csv");
    std::fs::write(&src, b"x,y\n1,2").unwrap();

    let outcome = c
        .submit(
            SubmitRequest::new()
                .input(InputSource::path(&src))
                .format("csv-to-json"),
        )
        .await;
    assert!(outcome.is_success());
    assert!(src.exists());
    let uploads: Vec<_> = c
        .stored_files()
        .await
        .unwrap()
        .into_iter()
        .filter(|f| f.origin == Origin::Upload)
        .collect();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].path.starts_with(&c.config().upload_dir));
}
