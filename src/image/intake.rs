//! Reading user-selected photos into data URLs.

use crate::error::{MergeError, Result};
use crate::image::types::{EncodedImage, ImageFormat};
use std::path::Path;

/// Default upper bound on a single photo (20 MiB, the inline request limit of most hosted models).
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Validation rules applied before a photo is encoded.
#[derive(Debug, Clone)]
pub struct ImageIntake {
    max_bytes: u64,
    allowed: Vec<ImageFormat>,
}

impl Default for ImageIntake {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            allowed: vec![
                ImageFormat::Png,
                ImageFormat::Jpeg,
                ImageFormat::WebP,
                ImageFormat::Gif,
            ],
        }
    }
}

impl ImageIntake {
    /// Creates an intake with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum accepted file size in bytes.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Restricts the accepted formats.
    pub fn with_allowed_formats(mut self, formats: impl IntoIterator<Item = ImageFormat>) -> Self {
        self.allowed = formats.into_iter().collect();
        self
    }

    /// Maximum accepted file size in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Reads `path` and encodes it as a data URL.
    ///
    /// The size check runs against file metadata before the contents are read.
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<EncodedImage> {
        let path = path.as_ref();
        let read_err = |source| MergeError::Read {
            path: path.to_path_buf(),
            source,
        };

        let meta = tokio::fs::metadata(path).await.map_err(read_err)?;
        self.check_size(meta.len())?;

        let bytes = tokio::fs::read(path).await.map_err(read_err)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let image = self.encode(&bytes, file_name)?;
        tracing::debug!(
            file = %path.display(),
            format = image.format().mime_type(),
            size = image.size(),
            "encoded photo"
        );
        Ok(image)
    }

    /// Validates and encodes bytes that are already in memory.
    pub fn encode(&self, bytes: &[u8], file_name: impl Into<String>) -> Result<EncodedImage> {
        let file_name = file_name.into();
        self.check_size(bytes.len() as u64)?;

        let format = ImageFormat::from_magic_bytes(bytes)
            .filter(|f| self.allowed.contains(f))
            .ok_or_else(|| MergeError::UnsupportedImageType(file_name.clone()))?;

        Ok(EncodedImage::from_bytes(bytes, format, file_name))
    }

    /// Validates an image that arrived already encoded.
    pub fn accept(&self, image: EncodedImage) -> Result<EncodedImage> {
        self.check_size(image.size())?;
        if !self.allowed.contains(&image.format()) {
            return Err(MergeError::UnsupportedImageType(image.file_name().to_string()));
        }
        Ok(image)
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_bytes {
            return Err(MergeError::ImageTooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn write_temp(bytes: &[u8], suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_read_png_file() {
        let file = write_temp(PNG, ".png");
        let image = ImageIntake::new().read(file.path()).await.unwrap();

        assert_eq!(image.format(), ImageFormat::Png);
        assert!(image.data().starts_with("data:image/png;base64,"));
        assert_eq!(
            image.file_name(),
            file.path().file_name().unwrap().to_string_lossy()
        );
    }

    #[tokio::test]
    async fn test_read_missing_file_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.jpg");

        let err = ImageIntake::new().read(&missing).await.unwrap_err();
        match err {
            MergeError::Read { path, .. } => assert_eq!(path, missing),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_file() {
        let file = write_temp(PNG, ".png");
        let err = ImageIntake::new()
            .with_max_bytes(4)
            .read(file.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::ImageTooLarge { size: 12, limit: 4 }));
    }

    #[tokio::test]
    async fn test_read_rejects_non_image() {
        let file = write_temp(b"just some text, not a photo", ".png");
        let err = ImageIntake::new().read(file.path()).await.unwrap_err();
        assert!(matches!(err, MergeError::UnsupportedImageType(_)));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_encode_respects_allowed_formats() {
        let intake = ImageIntake::new().with_allowed_formats([ImageFormat::Jpeg]);
        let err = intake.encode(PNG, "photo.png").unwrap_err();
        assert!(matches!(err, MergeError::UnsupportedImageType(name) if name == "photo.png"));
    }

    #[test]
    fn test_accept_checks_limits() {
        let image = ImageIntake::new().encode(PNG, "photo.png").unwrap();
        assert!(ImageIntake::new().accept(image.clone()).is_ok());
        assert!(ImageIntake::new().with_max_bytes(1).accept(image).is_err());
    }
}
