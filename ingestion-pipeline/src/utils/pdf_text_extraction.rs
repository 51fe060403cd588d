use std::path::Path;

use common::error::AppError;

/// Extracts the text layer of a PDF. Scanned documents without a text layer
/// are rejected rather than OCRed.
pub async fn extract_pdf_text(file_path: &Path) -> Result<String, AppError> {
    let pdf_bytes = tokio::fs::read(file_path).await?;

    let extraction = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&pdf_bytes).map(|s| s.trim().to_string())
    })
    .await?
    .map_err(|err| AppError::Processing(format!("Failed to extract text from PDF: {err}")))?;

    if extraction.is_empty() {
        return Err(AppError::Processing(
            "PDF contains no extractable text layer".into(),
        ));
    }

    Ok(extraction)
}
