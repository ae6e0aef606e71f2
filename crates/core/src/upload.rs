//! Image upload validation.
//!
//! Uploads are rejected synchronously, before any task record exists:
//! only JPEG, PNG, and WebP are accepted, at most [`MAX_UPLOAD_BYTES`].
//! Format detection sniffs the file's magic bytes (via the `image`
//! crate) and only falls back to the declared content type when the
//! header is unrecognized.

use image::ImageFormat;

use crate::error::CoreError;

/// Maximum accepted upload size: 10 MB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Content types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// An uploaded image payload, as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: Option<String>,
    /// Declared content type from the multipart field; may be empty.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Validate an upload against the content-type and size constraints.
///
/// Returns `CoreError::Validation` naming the violated constraint.
pub fn validate_upload(upload: &ImageUpload) -> Result<(), CoreError> {
    if upload.bytes.is_empty() {
        return Err(CoreError::Validation(
            "Uploaded image is empty".to_string(),
        ));
    }

    if upload.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "Image exceeds the maximum upload size of {} bytes (got {})",
            MAX_UPLOAD_BYTES,
            upload.bytes.len()
        )));
    }

    // Prefer the actual file header over the client-declared type.
    match image::guess_format(&upload.bytes) {
        Ok(ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) => Ok(()),
        Ok(other) => Err(CoreError::Validation(format!(
            "Unsupported image format {other:?}; accepted formats are JPEG, PNG, and WebP"
        ))),
        Err(_) => {
            if ALLOWED_CONTENT_TYPES.contains(&upload.content_type.as_str()) {
                Ok(())
            } else {
                Err(CoreError::Validation(format!(
                    "Unrecognized image data with content type '{}'; accepted types are {}",
                    upload.content_type,
                    ALLOWED_CONTENT_TYPES.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    fn upload(content_type: &str, bytes: Vec<u8>) -> ImageUpload {
        ImageUpload {
            filename: Some("meal.img".to_string()),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    #[test]
    fn accepts_png_by_magic_bytes() {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        // Content type is wrong on purpose; the header wins.
        assert!(validate_upload(&upload("application/octet-stream", bytes)).is_ok());
    }

    #[test]
    fn accepts_jpeg_by_magic_bytes() {
        let mut bytes = JPEG_HEADER.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        assert!(validate_upload(&upload("image/jpeg", bytes)).is_ok());
    }

    #[test]
    fn accepts_webp_by_magic_bytes() {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0x20, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(b"WEBP");
        bytes.extend_from_slice(&[0u8; 64]);
        assert!(validate_upload(&upload("image/webp", bytes)).is_ok());
    }

    #[test]
    fn rejects_empty_upload() {
        let err = validate_upload(&upload("image/png", Vec::new())).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn rejects_oversized_upload() {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.resize(MAX_UPLOAD_BYTES + 1, 0);
        let err = validate_upload(&upload("image/png", bytes)).unwrap_err();
        assert!(err.to_string().contains("maximum upload size"));
    }

    #[test]
    fn rejects_unknown_format_with_unknown_content_type() {
        let bytes = b"definitely not an image".to_vec();
        let err = validate_upload(&upload("text/plain", bytes)).unwrap_err();
        assert!(err.to_string().contains("accepted types"));
    }

    #[test]
    fn unknown_header_falls_back_to_declared_content_type() {
        // Unrecognizable header, but a trusted declared type.
        let bytes = vec![0x00, 0x01, 0x02, 0x03];
        assert!(validate_upload(&upload("image/jpeg", bytes)).is_ok());
    }
}
