//! A broker served from the local filesystem.
//!
//! Accepts plain paths and `file://` URLs. A path naming a directory lists
//! its entries; `*` and `?` are expanded in the last path component only.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use brokerscan_core::{FileStatus, NetworkAddress};
use tracing::debug;
use url::Url;

use crate::protocol::{
    BrokerClient, BrokerConnector, ListPathRequest, ListPathResponse, OperationStatus, StatusCode,
    TransportError,
};

/// Connects every broker address to the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalFsConnector;

impl LocalFsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrokerConnector for LocalFsConnector {
    async fn connect(
        &self,
        address: &NetworkAddress,
    ) -> Result<Box<dyn BrokerClient>, TransportError> {
        debug!("Local filesystem broker serving {}", address);
        Ok(Box::new(LocalFsClient))
    }
}

struct LocalFsClient;

#[async_trait]
impl BrokerClient for LocalFsClient {
    async fn list_path(
        &mut self,
        request: &ListPathRequest,
    ) -> Result<ListPathResponse, TransportError> {
        let (path, as_url) = match parse_location(&request.path) {
            Ok(parsed) => parsed,
            Err(message) => return Ok(rejected(StatusCode::InvalidInputFilePath, message)),
        };

        let result = if has_wildcard(&path) {
            list_wildcard(&path).await
        } else {
            list_exact(&path).await
        };

        match result {
            Ok(entries) => Ok(ListPathResponse {
                status: OperationStatus::ok(),
                files: entries
                    .into_iter()
                    .map(|(p, meta)| to_status(&p, &meta, as_url))
                    .collect(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(rejected(
                StatusCode::FileNotFound,
                format!("file not found: {}", request.path),
            )),
            Err(e) => Ok(rejected(
                StatusCode::TargetStorageServiceError,
                format!("{}: {}", request.path, e),
            )),
        }
    }
}

fn rejected(code: StatusCode, message: impl Into<String>) -> ListPathResponse {
    ListPathResponse {
        status: OperationStatus::error(code, message),
        files: vec![],
    }
}

fn parse_location(location: &str) -> Result<(PathBuf, bool), String> {
    if location.starts_with("file://") {
        let url = Url::parse(location).map_err(|e| format!("invalid url {}: {}", location, e))?;
        let path = url
            .to_file_path()
            .map_err(|_| format!("not a local file url: {}", location))?;
        Ok((path, true))
    } else if location.contains("://") {
        Err(format!("unsupported scheme: {}", location))
    } else {
        Ok((PathBuf::from(location), false))
    }
}

fn has_wildcard(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains('*') || n.contains('?'))
        .unwrap_or(false)
}

async fn list_exact(path: &Path) -> std::io::Result<Vec<(PathBuf, std::fs::Metadata)>> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.is_dir() {
        read_dir_matching(path, |_| true).await
    } else {
        Ok(vec![(path.to_path_buf(), meta)])
    }
}

async fn list_wildcard(path: &Path) -> std::io::Result<Vec<(PathBuf, std::fs::Metadata)>> {
    let pattern = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    read_dir_matching(&parent, |name| wildcard_match(&pattern, name)).await
}

async fn read_dir_matching<F>(
    dir: &Path,
    matches: F,
) -> std::io::Result<Vec<(PathBuf, std::fs::Metadata)>>
where
    F: Fn(&str) -> bool,
{
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !matches(name) {
            continue;
        }
        let meta = entry.metadata().await?;
        entries.push((entry.path(), meta));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

fn to_status(path: &Path, meta: &std::fs::Metadata, as_url: bool) -> FileStatus {
    let rendered = if as_url {
        Url::from_file_path(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.display().to_string())
    } else {
        path.display().to_string()
    };
    if meta.is_dir() {
        FileStatus::dir(rendered)
    } else {
        FileStatus::file(rendered, meta.len(), true)
    }
}

/// Glob match supporting `*` (any run) and `?` (one character).
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn write(dir: &Path, name: &str, bytes: usize) {
        std::fs::write(dir.join(name), vec![b'x'; bytes]).unwrap();
    }

    async fn list(path: &str) -> ListPathResponse {
        let mut client = LocalFsConnector::new()
            .connect(&NetworkAddress::new("127.0.0.1", 8000))
            .await
            .unwrap();
        client
            .list_path(&ListPathRequest::new(path, BTreeMap::new()))
            .await
            .unwrap()
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*.csv", "a.csv"));
        assert!(wildcard_match("part-?.csv", "part-1.csv"));
        assert!(!wildcard_match("part-?.csv", "part-10.csv"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*b*c", "aXXbYc"));
        assert!(!wildcard_match("*.gz", "a.csv"));
    }

    #[tokio::test]
    async fn test_list_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.csv", 20);
        write(dir.path(), "a.csv", 10);
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let resp = list(dir.path().to_str().unwrap()).await;
        assert_eq!(resp.status.code, StatusCode::Ok);
        assert_eq!(resp.files.len(), 3);
        assert!(resp.files[0].path.ends_with("a.csv"));
        assert_eq!(resp.files[0].size, 10);
        assert!(resp.files[0].is_splittable);
        assert!(resp.files.iter().any(|f| f.is_dir));
    }

    #[tokio::test]
    async fn test_list_wildcard() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "part-1.csv", 5);
        write(dir.path(), "part-2.csv.gz", 7);
        write(dir.path(), "other.txt", 1);

        let pattern = dir.path().join("part-*");
        let resp = list(pattern.to_str().unwrap()).await;
        let sizes: Vec<u64> = resp.files.iter().map(|f| f.size).collect();
        assert_eq!(sizes, vec![5, 7]);
    }

    #[tokio::test]
    async fn test_list_file_url() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "one.csv", 3);
        let url = Url::from_file_path(dir.path().join("one.csv")).unwrap();

        let resp = list(url.as_str()).await;
        assert_eq!(resp.files.len(), 1);
        assert!(resp.files[0].path.starts_with("file://"));
        assert_eq!(resp.files[0].size, 3);
    }

    #[tokio::test]
    async fn test_missing_path_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        let resp = list(missing.to_str().unwrap()).await;
        assert_eq!(resp.status.code, StatusCode::FileNotFound);
        assert!(resp.files.is_empty());
    }

    #[tokio::test]
    async fn test_remote_scheme_rejected() {
        let resp = list("hdfs://nn:8020/data").await;
        assert_eq!(resp.status.code, StatusCode::InvalidInputFilePath);
    }
}
