// Webcam snapshot client
//
// One GET per snapshot, body streamed straight to disk. The destination is
// opened with `create_new`, so an existing file is never overwritten; a
// transfer that fails halfway removes its partial file.

use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};
use url::Url;

use crate::auth::BasicAuth;
use crate::error::Error;
use crate::transport::TransportConfig;

/// HTTP client for a single webcam snapshot URL.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    http: reqwest::Client,
    url: Url,
    auth: Option<BasicAuth>,
}

impl SnapshotClient {
    /// Create a snapshot client from a `TransportConfig`.
    pub fn new(url: Url, auth: Option<BasicAuth>, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, url, auth })
    }

    /// Create a snapshot client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, url: Url, auth: Option<BasicAuth>) -> Self {
        Self { http, url, auth }
    }

    /// Fetch one image and stream it into `dest`.
    ///
    /// Only HTTP 200 counts as success. Returns the number of bytes written.
    /// Fails with an I/O error of kind `AlreadyExists` if `dest` exists.
    pub async fn download(&self, dest: &Path) -> Result<u64, Error> {
        debug!(url = %self.url, "GET snapshot");

        let mut request = self.http.get(self.url.clone());
        if let Some(ref auth) = self.auth {
            request = auth.apply(request);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::SnapshotStatus {
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .await?;

        match stream_body(resp, &mut file).await {
            Ok(written) => {
                trace!(path = %dest.display(), bytes = written, "snapshot written");
                Ok(written)
            }
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}

async fn stream_body(resp: reqwest::Response, file: &mut tokio::fs::File) -> Result<u64, Error> {
    let mut written: u64 = 0;
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += u64::try_from(chunk.len()).unwrap_or(u64::MAX);
    }
    file.flush().await?;
    Ok(written)
}
