//! Resume upload → plain text.

use axum::extract::Multipart;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::text::ats_sanitizer::light_sanitize;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
/// Request body ceiling for the upload route: the file plus multipart framing.
pub const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

const FILE_FIELD: &str = "file";
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Pdf,
    PlainText,
}

#[derive(Debug)]
pub struct UploadedResume {
    pub file_name: Option<String>,
    pub kind: UploadKind,
    pub text: String,
}

/// PDF by magic bytes first, then by declared type or extension.
pub fn detect_kind(content_type: Option<&str>, file_name: Option<&str>, bytes: &[u8]) -> Option<UploadKind> {
    if bytes.starts_with(PDF_MAGIC) {
        return Some(UploadKind::Pdf);
    }
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    let file_name = file_name.unwrap_or_default().to_ascii_lowercase();
    if content_type.starts_with("text/plain") || file_name.ends_with(".txt") {
        Some(UploadKind::PlainText)
    } else {
        None
    }
}

/// Reads the `file` field and extracts its text.
pub async fn read_upload(mut multipart: Multipart) -> Result<UploadedResume, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;

        if data.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation(format!(
                "File is too large (maximum {} MB)",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }

        let kind = detect_kind(content_type.as_deref(), file_name.as_deref(), &data)
            .ok_or_else(|| AppError::Validation("Only PDF and plain-text files are supported".to_string()))?;
        let raw = extract_text(kind, data.to_vec()).await?;
        let text = light_sanitize(raw.trim());
        if text.trim().is_empty() {
            return Err(AppError::Validation(
                "No text found in the file. Scanned PDFs are not supported; paste the text instead."
                    .to_string(),
            ));
        }

        info!(
            "Parsed {:?} upload {} ({} bytes → {} chars)",
            kind,
            file_name.as_deref().unwrap_or("<unnamed>"),
            data.len(),
            text.chars().count()
        );
        return Ok(UploadedResume {
            file_name,
            kind,
            text,
        });
    }

    Err(AppError::Validation(format!("Missing \"{FILE_FIELD}\" field")))
}

async fn extract_text(kind: UploadKind, data: Vec<u8>) -> Result<String, AppError> {
    match kind {
        UploadKind::PlainText => String::from_utf8(data)
            .map_err(|_| AppError::Validation("Text file is not valid UTF-8".to_string())),
        UploadKind::Pdf => {
            // pdf-extract is CPU-bound.
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?
                .map_err(|e| {
                    warn!("PDF extraction failed: {e}");
                    AppError::Validation("Could not read this PDF".to_string())
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind() {
        assert_eq!(
            detect_kind(Some("application/octet-stream"), None, b"%PDF-1.7\n..."),
            Some(UploadKind::Pdf)
        );
        assert_eq!(
            detect_kind(Some("text/plain; charset=utf-8"), None, b"Jane Doe"),
            Some(UploadKind::PlainText)
        );
        assert_eq!(detect_kind(None, Some("CV.TXT"), b"Jane Doe"), Some(UploadKind::PlainText));
        assert_eq!(detect_kind(Some("image/png"), Some("cv.png"), b"\x89PNG"), None);
    }

    #[tokio::test]
    async fn test_plain_text_extraction() {
        let text = extract_text(UploadKind::PlainText, "Jane Doe\n• Rust".as_bytes().to_vec())
            .await
            .unwrap();
        assert_eq!(text, "Jane Doe\n• Rust");
        assert!(matches!(
            extract_text(UploadKind::PlainText, vec![0xff, 0xfe]).await,
            Err(AppError::Validation(_))
        ));
    }
}
