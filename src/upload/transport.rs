//! Remote calls made by the uploader: the application server API, the
//! progress WebSocket, and direct PUTs to pre-signed storage URLs.

use crate::config::{ServerConfig, UploadConfig};
use crate::error::{Result, UploadError};
use crate::upload::progress::{ProgressMessage, TransferSample};
use crate::upload::types::{FileReader, FileRef};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{multipart, Body, Client};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::io::ReaderStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Read buffer size for streamed request bodies.
/// One progress sample is emitted per chunk read.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub already_exists: bool,
}

/// Authorization for a direct upload to storage.
#[derive(Debug, Clone, Deserialize)]
pub struct PresignDescriptor {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub expiration: Option<String>,
}

impl PresignDescriptor {
    pub fn host(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("host"))
            .map(|(_, value)| value.as_str())
    }

    /// Public URL of the object once uploaded, or empty when no host was given.
    pub fn public_url(&self, file_name: &str) -> String {
        match self.host() {
            Some(host) => format!("https://{}/{}", host, file_name),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadDescriptor {
    pub url: String,
    pub expiration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShareLink {
    #[serde(rename = "shortURL")]
    pub short_url: String,
    pub expiration: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Server push channel for relayed upload progress.
#[async_trait]
pub trait ProgressChannel: Send {
    /// Next progress event. `None` once the server closed the channel.
    async fn next_event(&mut self) -> Option<Result<ProgressMessage>>;

    async fn close(&mut self);
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn open_progress_channel(&self, upload_id: &str) -> Result<Box<dyn ProgressChannel>>;

    /// Multipart upload through the application server.
    async fn relay_upload(&self, file: &FileRef, upload_id: &str) -> Result<RelayResponse>;

    async fn presign_upload(&self, file_name: &str, file_size: u64) -> Result<PresignDescriptor>;

    /// PUTs the file to the descriptor's URL and returns the HTTP status code.
    /// Samples are sent on `progress` while the body is streamed.
    async fn put_object(
        &self,
        descriptor: &PresignDescriptor,
        file: &FileRef,
        progress: UnboundedSender<TransferSample>,
    ) -> Result<u16>;

    async fn presign_download(&self, file_name: &str, expiration: &str)
        -> Result<DownloadDescriptor>;

    async fn create_short_link(
        &self,
        url: &str,
        file_name: &str,
        expiration: &str,
    ) -> Result<ShareLink>;

    async fn health(&self) -> Result<HealthStatus>;
}

/// Turns an `http(s)://` base into the matching `ws(s)://` base.
pub fn websocket_base(api_base: &str) -> Result<String> {
    if let Some(rest) = api_base.strip_prefix("https://") {
        Ok(format!("wss://{}", rest))
    } else if let Some(rest) = api_base.strip_prefix("http://") {
        Ok(format!("ws://{}", rest))
    } else {
        Err(UploadError::InvalidUrl(api_base.to_string()))
    }
}

pub struct HttpTransport {
    api: Client,
    uploads: Client,
    api_base: String,
    progress_base: String,
    connect_timeout: Duration,
}

impl HttpTransport {
    pub fn new(server: &ServerConfig, upload: &UploadConfig) -> Result<Self> {
        let connect_timeout = Duration::from_secs(upload.connect_timeout_secs);

        let api = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(Duration::from_secs(upload.request_timeout_secs))
            .build()?;

        let mut uploads = Client::builder().connect_timeout(connect_timeout);
        if let Some(secs) = upload.upload_timeout_secs {
            uploads = uploads.timeout(Duration::from_secs(secs));
        }
        let uploads = uploads.build()?;

        let api_base = server.api_base.trim_end_matches('/').to_string();
        let progress_base = match &server.progress_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => websocket_base(&api_base)?,
        };

        Ok(Self {
            api,
            uploads,
            api_base,
            progress_base,
            connect_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    pub fn progress_url(&self, upload_id: &str) -> String {
        format!("{}/ws/progress/{}", self.progress_base, upload_id)
    }
}

/// Streams `reader` in bounded chunks, reporting the running byte count
/// against `total` after each chunk.
fn progress_stream(
    reader: FileReader,
    total: u64,
    progress: UnboundedSender<TransferSample>,
) -> impl Stream<Item = <ReaderStream<FileReader> as Stream>::Item> + Send + Sync + 'static {
    let mut loaded = 0u64;
    ReaderStream::with_capacity(reader, UPLOAD_CHUNK_SIZE).inspect(move |chunk| {
        if let Ok(chunk) = chunk {
            loaded += chunk.len() as u64;
            // The receiver is gone once the orchestrator stopped watching this item.
            let _ = progress.send(TransferSample { loaded, total });
        }
    })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open_progress_channel(&self, upload_id: &str) -> Result<Box<dyn ProgressChannel>> {
        let url = self.progress_url(upload_id);
        let handshake = tokio_tungstenite::connect_async(url.as_str());
        let (stream, _) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| UploadError::Channel("connection timed out".to_string()))??;
        debug!("Progress channel connected: {}", upload_id);
        Ok(Box::new(WsProgressChannel { stream }))
    }

    async fn relay_upload(&self, file: &FileRef, upload_id: &str) -> Result<RelayResponse> {
        let (reader, length) = file.open().await?;
        let body = Body::wrap_stream(ReaderStream::with_capacity(reader, UPLOAD_CHUNK_SIZE));
        let part = multipart::Part::stream_with_length(body, length)
            .file_name(file.name.clone())
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("uploadID", upload_id.to_string())
            .text("originalFileName", file.name.clone());

        let response = self
            .uploads
            .post(self.endpoint("/upload"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| "Upload failed".to_string());
            warn!("Relay upload rejected: status={}, body={}", status, body);
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn presign_upload(&self, file_name: &str, file_size: u64) -> Result<PresignDescriptor> {
        let form = multipart::Form::new()
            .text("fileName", file_name.to_string())
            .text("fileSize", file_size.to_string());

        let response = self
            .api
            .post(self.endpoint("/presign"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Presign request failed: status={}", response.status());
            return Err(UploadError::PresignFailed);
        }
        Ok(response.json().await?)
    }

    async fn put_object(
        &self,
        descriptor: &PresignDescriptor,
        file: &FileRef,
        progress: UnboundedSender<TransferSample>,
    ) -> Result<u16> {
        let (reader, total) = file.open().await?;

        let mut request = self
            .uploads
            .put(&descriptor.url)
            .header(CONTENT_LENGTH, total)
            .body(Body::wrap_stream(progress_stream(reader, total, progress)));
        for (key, value) in &descriptor.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        Ok(response.status().as_u16())
    }

    async fn presign_download(
        &self,
        file_name: &str,
        expiration: &str,
    ) -> Result<DownloadDescriptor> {
        let url = self.endpoint(&format!("/download/{}", urlencoding::encode(file_name)));
        let response = self
            .api
            .get(url)
            .query(&[("expiration", expiration)])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Download link request failed: status={}", response.status());
            return Err(UploadError::DownloadLinkFailed);
        }
        Ok(response.json().await?)
    }

    async fn create_short_link(
        &self,
        url: &str,
        file_name: &str,
        expiration: &str,
    ) -> Result<ShareLink> {
        let form = multipart::Form::new()
            .text("url", url.to_string())
            .text("fileName", file_name.to_string())
            .text("expiration", expiration.to_string());

        let response = self
            .api
            .post(self.endpoint("/short-link"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Short link request failed: status={}", response.status());
            return Err(UploadError::ShortLinkFailed);
        }
        Ok(response.json().await?)
    }

    async fn health(&self) -> Result<HealthStatus> {
        let response = self.api.get(self.endpoint("/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::UnexpectedStatus(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

struct WsProgressChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ProgressChannel for WsProgressChannel {
    async fn next_event(&mut self) -> Option<Result<ProgressMessage>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                    Ok(message) => return Some(Ok(message)),
                    Err(e) => {
                        warn!("Ignoring malformed progress message: {} ({})", text, e);
                        continue;
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Progress channel close: {}", e);
        }
    }
}
