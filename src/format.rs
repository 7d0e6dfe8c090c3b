//! Format registry: which conversions exist and how each one is executed.
//!
//! Every submission names a `{source}-to-{target}` identifier. The registry
//! parses it into a [`ConversionFormat`] and [`classify`] maps the pair onto a
//! [`Strategy`]. The set of pairs is closed: anything outside it is rejected
//! here, before the dispatcher touches the filesystem.
//!
//! | Identifier | Strategy |
//! |------------|----------|
//! | `png-to-jpg`, `jpg-to-png` | in-process image re-encode |
//! | `csv-to-json`, `json-to-csv` | in-process tabular transform |
//! | `pdf-to-docx`, `docx-to-pdf`, `pdf-to-pptx`, `pptx-to-pdf` | office tool subprocess |

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A file format known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Png,
    Jpg,
    Csv,
    Json,
    Pdf,
    Docx,
    Pptx,
}

impl FileFormat {
    /// Every format, in identifier order.
    pub const ALL: [FileFormat; 7] = [
        FileFormat::Png,
        FileFormat::Jpg,
        FileFormat::Csv,
        FileFormat::Json,
        FileFormat::Pdf,
        FileFormat::Docx,
        FileFormat::Pptx,
    ];

    /// File extension, also the identifier fragment.
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Png => "png",
            FileFormat::Jpg => "jpg",
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Pdf => "pdf",
            FileFormat::Docx => "docx",
            FileFormat::Pptx => "pptx",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FileFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileFormat::ALL
            .into_iter()
            .find(|f| f.extension() == s)
            .ok_or_else(|| ConvertError::UnsupportedFormat {
                format: s.to_string(),
            })
    }
}

/// A validated `{source}-to-{target}` pair from the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionFormat {
    source: FileFormat,
    target: FileFormat,
}

impl ConversionFormat {
    /// The closed set of supported conversions.
    pub const ALL: [ConversionFormat; 8] = [
        ConversionFormat::pair(FileFormat::Pdf, FileFormat::Docx),
        ConversionFormat::pair(FileFormat::Docx, FileFormat::Pdf),
        ConversionFormat::pair(FileFormat::Pdf, FileFormat::Pptx),
        ConversionFormat::pair(FileFormat::Pptx, FileFormat::Pdf),
        ConversionFormat::pair(FileFormat::Csv, FileFormat::Json),
        ConversionFormat::pair(FileFormat::Json, FileFormat::Csv),
        ConversionFormat::pair(FileFormat::Png, FileFormat::Jpg),
        ConversionFormat::pair(FileFormat::Jpg, FileFormat::Png),
    ];

    const fn pair(source: FileFormat, target: FileFormat) -> Self {
        Self { source, target }
    }

    /// Build a pair, rejecting combinations the registry cannot execute.
    pub fn new(source: FileFormat, target: FileFormat) -> Result<Self, ConvertError> {
        let format = Self::pair(source, target);
        match classify(source, target) {
            Strategy::Unsupported => Err(ConvertError::UnsupportedFormat {
                format: format.identifier(),
            }),
            _ => Ok(format),
        }
    }

    /// Parse an identifier such as `"png-to-jpg"`.
    pub fn parse(identifier: &str) -> Result<Self, ConvertError> {
        let unsupported = || ConvertError::UnsupportedFormat {
            format: identifier.to_string(),
        };
        let (source, target) = identifier.split_once("-to-").ok_or_else(unsupported)?;
        let source: FileFormat = source.parse().map_err(|_| unsupported())?;
        let target: FileFormat = target.parse().map_err(|_| unsupported())?;
        Self::new(source, target)
    }

    pub fn source(&self) -> FileFormat {
        self.source
    }

    pub fn target(&self) -> FileFormat {
        self.target
    }

    /// The `{source}-to-{target}` identifier.
    pub fn identifier(&self) -> String {
        format!("{}-to-{}", self.source, self.target)
    }

    /// Strategy for this pair. Never [`Strategy::Unsupported`].
    pub fn strategy(&self) -> Strategy {
        classify(self.source, self.target)
    }
}

impl fmt::Display for ConversionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-to-{}", self.source, self.target)
    }
}

impl FromStr for ConversionFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ── Strategies ───────────────────────────────────────────────────────────

/// How a conversion is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Pure byte transform inside this process.
    InProcess(Transform),
    /// Conversion by the external office tool.
    Delegate(OfficeConversion),
    /// Not in the supported set.
    Unsupported,
}

/// In-process transform families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Decode a raster image and re-encode it as `target`.
    Image { target: RasterFormat },
    CsvToJson,
    JsonToCsv,
}

/// Raster containers the image transform can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpg,
}

impl TryFrom<FileFormat> for RasterFormat {
    type Error = ConvertError;

    fn try_from(f: FileFormat) -> Result<Self, Self::Error> {
        match f {
            FileFormat::Png => Ok(RasterFormat::Png),
            FileFormat::Jpg => Ok(RasterFormat::Jpg),
            other => Err(ConvertError::Encode {
                target: other.to_string(),
                detail: "not a raster image container".into(),
            }),
        }
    }
}

impl From<RasterFormat> for FileFormat {
    fn from(f: RasterFormat) -> Self {
        match f {
            RasterFormat::Png => FileFormat::Png,
            RasterFormat::Jpg => FileFormat::Jpg,
        }
    }
}

/// A document pair handed to the office tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfficeConversion {
    pub source: FileFormat,
    pub target: FileFormat,
}

impl OfficeConversion {
    pub fn format(&self) -> ConversionFormat {
        ConversionFormat::pair(self.source, self.target)
    }
}

/// Map a (source, target) pair onto its execution strategy.
///
/// Pure and table-driven so every caller context classifies a request the
/// same way.
pub fn classify(source: FileFormat, target: FileFormat) -> Strategy {
    use FileFormat::*;

    match (source, target) {
        (Png, Jpg) => Strategy::InProcess(Transform::Image {
            target: RasterFormat::Jpg,
        }),
        (Jpg, Png) => Strategy::InProcess(Transform::Image {
            target: RasterFormat::Png,
        }),
        (Csv, Json) => Strategy::InProcess(Transform::CsvToJson),
        (Json, Csv) => Strategy::InProcess(Transform::JsonToCsv),
        (Pdf, Docx) | (Docx, Pdf) | (Pdf, Pptx) | (Pptx, Pdf) => {
            Strategy::Delegate(OfficeConversion { source, target })
        }
        _ => Strategy::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_declared_pair_has_a_strategy() {
        for format in ConversionFormat::ALL {
            assert_ne!(
                format.strategy(),
                Strategy::Unsupported,
                "{format} must be supported"
            );
        }
    }

    #[test]
    fn every_other_pair_is_unsupported() {
        for source in FileFormat::ALL {
            for target in FileFormat::ALL {
                let declared = ConversionFormat::ALL
                    .iter()
                    .any(|f| f.source() == source && f.target() == target);
                if !declared {
                    assert_eq!(
                        classify(source, target),
                        Strategy::Unsupported,
                        "{source}-to-{target}"
                    );
                }
            }
        }
    }

    #[test]
    fn parse_identifiers() {
        let f = ConversionFormat::parse("png-to-jpg").unwrap();
        assert_eq!(f.source(), FileFormat::Png);
        assert_eq!(f.target(), FileFormat::Jpg);
        assert_eq!(f.identifier(), "png-to-jpg");
        assert_eq!(
            "docx-to-pdf".parse::<ConversionFormat>().unwrap().strategy(),
            Strategy::Delegate(OfficeConversion {
                source: FileFormat::Docx,
                target: FileFormat::Pdf
            })
        );
    }

    #[test]
    fn parse_rejects_outside_closed_set() {
        for bad in [
            "invalid-format",
            "jpeg-to-png",
            "png-to-png",
            "docx-to-pptx",
            "csv-to-pdf",
            "PNG-to-JPG",
            "png-jpg",
            "",
        ] {
            let err = ConversionFormat::parse(bad).unwrap_err();
            assert!(
                matches!(err, ConvertError::UnsupportedFormat { ref format } if format == bad),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn identifiers_round_trip_through_display() {
        for format in ConversionFormat::ALL {
            assert_eq!(ConversionFormat::parse(&format.to_string()).unwrap(), format);
        }
    }

    #[test]
    fn raster_conversion_rejects_documents() {
        assert_eq!(RasterFormat::try_from(FileFormat::Jpg).unwrap(), RasterFormat::Jpg);
        assert!(matches!(
            RasterFormat::try_from(FileFormat::Pdf),
            Err(ConvertError::Encode { .. })
        ));
    }
}
