//! Listed file statuses and the formats the scanner understands.

use serde::{Deserialize, Serialize};

/// One entry returned by a broker listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub path: String,
    pub size: u64,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub is_splittable: bool,
}

impl FileStatus {
    pub fn file(path: impl Into<String>, size: u64, is_splittable: bool) -> Self {
        Self {
            path: path.into(),
            size,
            is_dir: false,
            is_splittable,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: 0,
            is_dir: true,
            is_splittable: false,
        }
    }

    pub fn format(&self) -> FileFormat {
        FileFormat::from_path(&self.path)
    }
}

/// Encoding of a delimited text file, derived from its path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    CsvPlain,
    CsvGz,
    CsvBz2,
    CsvLz4Frame,
    CsvLzop,
}

impl FileFormat {
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".gz") {
            FileFormat::CsvGz
        } else if lower.ends_with(".bz2") {
            FileFormat::CsvBz2
        } else if lower.ends_with(".lz4") {
            FileFormat::CsvLz4Frame
        } else if lower.ends_with(".lzo") {
            FileFormat::CsvLzop
        } else {
            FileFormat::CsvPlain
        }
    }

    /// Only uncompressed text can be read from an arbitrary offset.
    pub fn supports_split(self) -> bool {
        self == FileFormat::CsvPlain
    }
}

/// How the executor reaches the file. Broker scans always go through a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Broker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_suffix() {
        assert_eq!(FileFormat::from_path("hdfs://nn/a/b.csv"), FileFormat::CsvPlain);
        assert_eq!(FileFormat::from_path("hdfs://nn/a/b"), FileFormat::CsvPlain);
        assert_eq!(FileFormat::from_path("/data/x.GZ"), FileFormat::CsvGz);
        assert_eq!(FileFormat::from_path("/data/x.bz2"), FileFormat::CsvBz2);
        assert_eq!(FileFormat::from_path("/data/x.lz4"), FileFormat::CsvLz4Frame);
        assert_eq!(FileFormat::from_path("/data/x.Lzo"), FileFormat::CsvLzop);
    }

    #[test]
    fn test_only_plain_text_splits() {
        assert!(FileFormat::CsvPlain.supports_split());
        assert!(!FileFormat::CsvGz.supports_split());
        assert!(!FileFormat::CsvLzop.supports_split());
    }
}
