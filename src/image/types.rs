//! Core types for photo intake and merge generation.

use crate::error::{MergeError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
    /// GIF format (first frame is used by most models).
    Gif,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Parses a MIME type such as `image/jpeg`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // GIF87a / GIF89a
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Generation provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini image models.
    Gemini,
    /// Any other capability plugged in by the caller.
    Custom,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// The two upload slots of a merge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// The earlier photo (e.g. a childhood picture).
    Before,
    /// The recent photo.
    After,
}

impl Slot {
    /// Both slots, in request order.
    pub const ALL: [Slot; 2] = [Slot::Before, Slot::After];
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

/// Borrowed view of a parsed `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    /// Declared MIME type.
    pub mime_type: &'a str,
    /// Base64 payload.
    pub payload: &'a str,
}

impl<'a> DataUrl<'a> {
    /// Parses a base64 data URL. Returns `None` for anything else.
    pub fn parse(input: &'a str) -> Option<Self> {
        let rest = input.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        if mime_type.is_empty() {
            return None;
        }
        Some(Self { mime_type, payload })
    }

    /// Decodes the payload, tolerating embedded whitespace and missing padding.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let cleaned: String = self
            .payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
            return Ok(data);
        }
        base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(&cleaned)
            .map_err(|e| MergeError::Decode(e.to_string()))
    }
}

/// Encodes raw bytes as a `data:` URL.
pub fn to_data_url(format: ImageFormat, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        format.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// A photo held by an upload slot, encoded as a data URL.
///
/// Replaced wholesale on re-selection, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    data: String,
    file_name: String,
    format: ImageFormat,
    size: u64,
}

impl EncodedImage {
    pub(crate) fn from_bytes(
        bytes: &[u8],
        format: ImageFormat,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            data: to_data_url(format, bytes),
            file_name: file_name.into(),
            format,
            size: bytes.len() as u64,
        }
    }

    /// Wraps an already-encoded data URL after checking it decodes to a known image.
    pub fn from_data_url(data_url: impl Into<String>, file_name: impl Into<String>) -> Result<Self> {
        let data = data_url.into();
        let file_name = file_name.into();
        let parsed = DataUrl::parse(&data)
            .ok_or_else(|| MergeError::Decode(format!("{file_name} is not a base64 data URL")))?;
        let bytes = parsed.decode()?;
        let format = ImageFormat::from_magic_bytes(&bytes)
            .ok_or_else(|| MergeError::UnsupportedImageType(file_name.clone()))?;

        Ok(Self {
            data,
            file_name,
            format,
            size: bytes.len() as u64,
        })
    }

    /// The encoded data URL sent to the generation capability.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Display URI for previews. Identical to [`EncodedImage::data`].
    pub fn preview(&self) -> &str {
        &self.data
    }

    /// Name of the file the image was read from.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Detected image format.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Size of the decoded image in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Payload handed to a generation capability for one merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    /// Data URL of the first ("before") photo.
    pub first_image: String,
    /// Data URL of the second ("after") photo.
    pub second_image: String,
    /// Prompt text, passed through verbatim.
    pub prompt: String,
}

impl MergeRequest {
    /// Creates a new request.
    pub fn new(
        first_image: impl Into<String>,
        second_image: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            first_image: first_image.into(),
            second_image: second_image.into(),
            prompt: prompt.into(),
        }
    }

    /// Both images, in request order.
    pub fn images(&self) -> [&str; 2] {
        [&self.first_image, &self.second_image]
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A merged image returned by a generation capability.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or displayed"]
pub struct GeneratedImage {
    /// Raw image bytes. Empty when the capability only returned a remote reference.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Provider that generated this image.
    pub provider: ProviderKind,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
    /// Remote location of the image, if the capability hosts it.
    pub url: Option<String>,
}

impl GeneratedImage {
    /// Creates a new generated image from raw bytes.
    pub fn new(
        data: Vec<u8>,
        format: ImageFormat,
        provider: ProviderKind,
        metadata: GenerationMetadata,
    ) -> Self {
        Self {
            data,
            format,
            provider,
            metadata,
            url: None,
        }
    }

    /// Creates an image known only by its reference (e.g. a hosted URL).
    pub fn from_reference(url: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            data: Vec::new(),
            format: ImageFormat::Png,
            provider,
            metadata: GenerationMetadata::default(),
            url: Some(url.into()),
        }
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        to_data_url(self.format, &self.data)
    }

    /// The reference used to display the image: the remote URL if any, else a data URL.
    pub fn reference(&self) -> String {
        self.url.clone().unwrap_or_else(|| self.to_data_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"GIF89a\x01\x00"),
            Some(ImageFormat::Gif)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"hello world!"), None);
        assert_eq!(ImageFormat::from_magic_bytes(&[]), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/jpeg"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_mime_type("IMAGE/PNG"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime_type("text/plain"), None);
    }

    #[test]
    fn test_data_url_parse() {
        let url = DataUrl::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(url.mime_type, "image/png");
        assert_eq!(url.payload, "iVBORw0KGgo=");

        assert!(DataUrl::parse("blob:xyz").is_none());
        assert!(DataUrl::parse("data:image/png,raw").is_none());
        assert!(DataUrl::parse("data:;base64,AAAA").is_none());
    }

    #[test]
    fn test_data_url_decode_is_lenient() {
        let url = DataUrl::parse("data:image/png;base64,iVBO\nRw0K\nGgo").unwrap();
        assert_eq!(url.decode().unwrap(), PNG_MAGIC[..8].to_vec());
    }

    #[test]
    fn test_encoded_image_preview_matches_data() {
        let image = EncodedImage::from_bytes(&PNG_MAGIC, ImageFormat::Png, "young.png");
        assert!(image.data().starts_with("data:image/png;base64,"));
        assert_eq!(image.preview(), image.data());
        assert_eq!(image.file_name(), "young.png");
        assert_eq!(image.size(), 12);
    }

    #[test]
    fn test_encoded_image_from_data_url_rejects_non_images() {
        let text = to_data_url(ImageFormat::Png, b"definitely not a png");
        let err = EncodedImage::from_data_url(text, "notes.txt").unwrap_err();
        assert!(matches!(err, MergeError::UnsupportedImageType(_)));

        let err = EncodedImage::from_data_url("blob:xyz", "remote").unwrap_err();
        assert!(matches!(err, MergeError::Decode(_)));
    }

    #[test]
    fn test_generated_image_reference() {
        let image = GeneratedImage::new(
            PNG_MAGIC.to_vec(),
            ImageFormat::Png,
            ProviderKind::Gemini,
            GenerationMetadata::default(),
        );
        assert!(image.reference().starts_with("data:image/png;base64,"));

        let hosted = GeneratedImage::from_reference("blob:xyz", ProviderKind::Custom);
        assert_eq!(hosted.reference(), "blob:xyz");
        assert_eq!(hosted.size(), 0);
    }

    #[test]
    fn test_provider_kind_and_slot_display() {
        assert_eq!(ProviderKind::Gemini.to_string(), "gemini");
        assert_eq!(Slot::Before.to_string(), "before");
        assert_eq!(Slot::After.to_string(), "after");
    }
}
