//! Image payloads handed to the recognition pipeline.
//!
//! A payload is one encoded image (PNG, JPEG, ...) plus its MIME type.
//! It is immutable: selecting a new image produces a new payload. Clones
//! share the underlying buffer.

use std::sync::Arc;

use base64::Engine;
use thiserror::Error;

/// Errors parsing a payload from its string form.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// One self-contained encoded image.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    mime: String,
    bytes: Arc<[u8]>,
}

impl ImagePayload {
    /// Wrap encoded image bytes. No validation happens here; see `UploadPolicy`.
    pub fn new(mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime: mime.into().to_ascii_lowercase(),
            bytes: bytes.into(),
        }
    }

    /// Detect the MIME type of encoded image bytes from their magic number.
    pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
        infer::get(bytes).map(|t| t.mime_type())
    }

    /// Parse an RFC 2397 `data:` URL with a base64 body.
    ///
    /// When the URL omits the media type it is sniffed from the content.
    pub fn from_data_url(url: &str) -> Result<Self, PayloadError> {
        let rest = url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| PayloadError::InvalidDataUrl("missing data: scheme".to_string()))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| PayloadError::InvalidDataUrl("missing ',' separator".to_string()))?;

        let mut params = meta.split(';');
        let media_type = params.next().unwrap_or("").trim();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(PayloadError::InvalidDataUrl(
                "only base64-encoded data URLs are supported".to_string(),
            ));
        }

        let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
        let mime = if media_type.is_empty() {
            Self::sniff(&bytes)
                .unwrap_or("application/octet-stream")
                .to_string()
        } else {
            media_type.to_string()
        };

        Ok(Self::new(mime, bytes))
    }

    /// Render as a `data:` URL, suitable for an `<img src>`.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the MIME type, for engines that read files.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            other => mime_guess::get_mime_extensions_str(other)
                .and_then(|exts| exts.first().copied())
                .unwrap_or("img"),
        }
    }
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_data_url_round_trip() {
        let payload = ImagePayload::new("image/png", PNG_MAGIC.to_vec());
        let url = payload.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));

        let parsed = ImagePayload::from_data_url(&url).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_data_url_without_media_type_is_sniffed() {
        let body = base64::engine::general_purpose::STANDARD.encode(PNG_MAGIC);
        let parsed = ImagePayload::from_data_url(&format!("data:;base64,{}", body)).unwrap();
        assert_eq!(parsed.mime(), "image/png");
    }

    #[test]
    fn test_data_url_rejects_plain_encoding() {
        let err = ImagePayload::from_data_url("data:image/png,abc").unwrap_err();
        assert!(matches!(err, PayloadError::InvalidDataUrl(_)));

        let err = ImagePayload::from_data_url("image/png;base64,abc").unwrap_err();
        assert!(matches!(err, PayloadError::InvalidDataUrl(_)));

        let err = ImagePayload::from_data_url("data:image/png;base64,@@@").unwrap_err();
        assert!(matches!(err, PayloadError::Base64(_)));
    }

    #[test]
    fn test_extension() {
        assert_eq!(ImagePayload::new("image/jpg", vec![1]).extension(), "jpg");
        assert_eq!(ImagePayload::new("IMAGE/PNG", vec![1]).extension(), "png");
    }

    #[test]
    fn test_clones_share_buffer() {
        let payload = ImagePayload::new("image/png", PNG_MAGIC.to_vec());
        let copy = payload.clone();
        assert!(std::ptr::eq(payload.bytes().as_ptr(), copy.bytes().as_ptr()));
    }
}
