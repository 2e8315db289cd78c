//! Streaming download of the Lichess puzzle database

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const LICHESS_PUZZLE_URL: &str = "https://database.lichess.org/lichess_db_puzzle.csv.bz2";

/// Log a progress line every this many bytes
const PROGRESS_STEP: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub path: PathBuf,
    pub bytes: u64,
}

pub struct PuzzleDownloader {
    client: Client,
    url: String,
}

impl PuzzleDownloader {
    pub fn new() -> Result<Self> {
        Self::with_url(LICHESS_PUZZLE_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Streams the response body to `dest` chunk by chunk. The file only
    /// appears at `dest` once the whole body has arrived.
    pub async fn download_to(&self, dest: &Path) -> Result<DownloadSummary> {
        info!(url = %self.url, dest = %dest.display(), "downloading puzzle database");

        let mut response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }
        let expected = response.content_length();

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let partial = dest.with_extension("part");
        let mut file = File::create(&partial).await?;

        let mut bytes: u64 = 0;
        let mut next_report = PROGRESS_STEP;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
            if bytes >= next_report {
                debug!(bytes, total = ?expected, "download progress");
                next_report += PROGRESS_STEP;
            }
        }
        file.flush().await?;
        drop(file);

        if let Some(expected) = expected {
            if expected != bytes {
                let _ = fs::remove_file(&partial).await;
                return Err(Error::Download(format!(
                    "expected {expected} bytes, received {bytes}"
                )));
            }
        }

        fs::rename(&partial, dest).await?;
        info!(bytes, dest = %dest.display(), "download complete");

        Ok(DownloadSummary {
            path: dest.to_path_buf(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns its URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/lichess_db_puzzle.csv")
    }

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("puzzle-bridge-dl-{name}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn test_streams_body_to_disk() {
        let body = "00008,fen,f2g3 e6e7,1877,76,95,8000,crushing\n";
        let url = serve_once("200 OK", body).await;
        let dest = scratch("ok").join("puzzles.csv");

        let summary = PuzzleDownloader::with_url(url)
            .unwrap()
            .download_to(&dest)
            .await
            .unwrap();

        assert_eq!(summary.bytes, body.len() as u64);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), body);
        let _ = std::fs::remove_dir_all(dest.parent().unwrap());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let url = serve_once("404 Not Found", "missing").await;
        let dest = scratch("missing").join("puzzles.csv");

        let err = PuzzleDownloader::with_url(url)
            .unwrap()
            .download_to(&dest)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Download(_)));
        assert!(!dest.exists());
    }
}
