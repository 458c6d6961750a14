//! Resolution of the `attachment` request field into image bytes.
//!
//! Accepted forms: an `http(s)://` URL (fetched), a `data:<mime>;base64,...`
//! URI, or bare base64. Inline forms are decoded by [`Attachment::parse`] so
//! bad input is rejected before any session is touched. URLs are fetched
//! later by [`Attachment::into_image`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;
use wagate_core::error::GatewayError;

pub const DEFAULT_MIMETYPE: &str = "image/jpeg";

/// Largest attachment accepted, inline or fetched.
pub const MAX_ATTACHMENT_BYTES: usize = 16 * 1024 * 1024;

/// Decoded attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub data: Vec<u8>,
    pub mimetype: String,
}

/// A validated attachment, possibly still remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Inline(Image),
    Remote(String),
}

impl Attachment {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Self::Remote(raw.to_string()));
        }
        let image = match raw.strip_prefix("data:") {
            Some(rest) => decode_data_uri(rest)?,
            None => Image {
                data: decode_base64(raw)?,
                mimetype: DEFAULT_MIMETYPE.to_string(),
            },
        };
        Ok(Self::Inline(image))
    }

    pub async fn into_image(self, http: &reqwest::Client) -> Result<Image, GatewayError> {
        match self {
            Self::Inline(image) => Ok(image),
            Self::Remote(url) => fetch(http, &url, MAX_ATTACHMENT_BYTES).await,
        }
    }
}

fn too_large(limit: usize) -> GatewayError {
    GatewayError::Validation(format!("attachment exceeds {limit} bytes"))
}

async fn fetch(http: &reqwest::Client, url: &str, limit: usize) -> Result<Image, GatewayError> {
    let collaborator = |e: reqwest::Error| {
        GatewayError::Collaborator(format!("failed to fetch attachment {url}: {e}"))
    };

    let mut resp = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(collaborator)?;

    if resp.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large(limit));
    }

    let mimetype = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or_else(|| DEFAULT_MIMETYPE.to_string());

    let mut data = Vec::new();
    while let Some(chunk) = resp.chunk().await.map_err(collaborator)? {
        if data.len() + chunk.len() > limit {
            return Err(too_large(limit));
        }
        data.extend_from_slice(&chunk);
    }
    if data.is_empty() {
        return Err(GatewayError::Validation("attachment is empty".into()));
    }

    debug!("fetched attachment {url} ({} bytes, {mimetype})", data.len());
    Ok(Image { data, mimetype })
}

fn decode_data_uri(rest: &str) -> Result<Image, GatewayError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| GatewayError::Validation("malformed data URI attachment".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| GatewayError::Validation("data URI attachment must be base64".into()))?;

    let mimetype = if mime.is_empty() {
        DEFAULT_MIMETYPE.to_string()
    } else {
        mime.to_string()
    };
    Ok(Image {
        data: decode_base64(payload)?,
        mimetype,
    })
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, GatewayError> {
    let data = BASE64.decode(payload.trim()).map_err(|_| {
        GatewayError::Validation(
            "attachment must be an http(s) URL, a base64 data URI, or base64".into(),
        )
    })?;
    if data.is_empty() {
        return Err(GatewayError::Validation("attachment is empty".into()));
    }
    if data.len() > MAX_ATTACHMENT_BYTES {
        return Err(too_large(MAX_ATTACHMENT_BYTES));
    }
    Ok(data)
}
