use async_trait::async_trait;

use crate::error::GenerationError;

const SERVICE: &str = "Image download";
const DEFAULT_MIME: &str = "image/png";

/// Raw image bytes plus the MIME type sent along to the vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        let mime_type = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| ct.starts_with("image/"))
            .or_else(|| sniff_mime(&bytes).map(str::to_owned))
            .unwrap_or_else(|| DEFAULT_MIME.to_owned());
        Self { bytes, mime_type }
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        Some("image/jpeg")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ImageData, GenerationError>;
}

#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageData, GenerationError> {
        let parsed = url::Url::parse(url)
            .map_err(|err| GenerationError::service(SERVICE, format!("invalid url {url}: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GenerationError::service(
                SERVICE,
                format!("unsupported url scheme: {}", parsed.scheme()),
            ));
        }

        let response = self
            .http
            .get(parsed)
            .send()
            .await
            .map_err(|err| GenerationError::transport(SERVICE, &err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::service(
                SERVICE,
                format!("GET {url} returned HTTP {}", status.as_u16()),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response
            .bytes()
            .await
            .map_err(|err| GenerationError::transport(SERVICE, &err))?;
        if bytes.is_empty() {
            return Err(GenerationError::service(SERVICE, format!("GET {url} returned no data")));
        }
        tracing::debug!(url, bytes = bytes.len(), "downloaded image");

        Ok(ImageData::new(bytes.to_vec(), content_type.as_deref()))
    }
}
