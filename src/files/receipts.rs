use std::fs;
use std::path::Path;

use base64::Engine;

use crate::error::AppError;
use crate::models::ReceiptUpload;

pub const RECEIPT_MAX_BYTES: u64 = 10 * 1024 * 1024;

const CONTENT_TYPES: &[(&str, &str)] = &[
  ("png", "image/png"),
  ("jpg", "image/jpeg"),
  ("jpeg", "image/jpeg"),
  ("gif", "image/gif"),
  ("webp", "image/webp"),
  ("heic", "image/heic"),
  ("pdf", "application/pdf"),
];

pub fn content_type_for(extension: &str) -> Option<&'static str> {
  let extension = extension.to_ascii_lowercase();
  CONTENT_TYPES
    .iter()
    .find(|(ext, _)| *ext == extension)
    .map(|(_, content_type)| *content_type)
}

/// Reads a picked receipt file from disk for upload.
pub fn load_receipt(source_path: &str) -> Result<ReceiptUpload, AppError> {
  let source = Path::new(source_path.trim());
  if source_path.trim().is_empty() || !source.is_file() {
    return Err(AppError::new("RECEIPT_NOT_FOUND", "Receipt file not found"));
  }

  let extension = source
    .extension()
    .and_then(|v| v.to_str())
    .map(|v| v.to_ascii_lowercase())
    .unwrap_or_default();
  let content_type = content_type_for(&extension).ok_or_else(|| {
    AppError::new(
      "RECEIPT_TYPE",
      "Receipts must be an image (png, jpg, gif, webp, heic) or a pdf",
    )
  })?;

  let size = fs::metadata(source)?.len();
  if size > RECEIPT_MAX_BYTES {
    return Err(AppError::new("RECEIPT_TOO_LARGE", "Receipt file is larger than 10 MB"));
  }

  let file_name = source
    .file_name()
    .and_then(|v| v.to_str())
    .unwrap_or("receipt")
    .to_string();

  Ok(ReceiptUpload {
    file_name,
    extension,
    content_type: content_type.to_string(),
    bytes: fs::read(source)?,
  })
}

/// `<user>/<expense>_<millis>.<ext>` inside the receipts bucket.
pub fn storage_path(user_id: &str, expense_id: i64, extension: &str, now_millis: i64) -> String {
  format!("{user_id}/{expense_id}_{now_millis}.{}", extension.to_ascii_lowercase())
}

/// Inline preview of a picked file before it is uploaded.
pub fn preview_data_url(receipt: &ReceiptUpload) -> String {
  let encoded = base64::engine::general_purpose::STANDARD.encode(&receipt.bytes);
  format!("data:{};base64,{}", receipt.content_type, encoded)
}

pub fn open_receipt(url: &str) -> Result<(), AppError> {
  if url.trim().is_empty() {
    return Err(AppError::new("RECEIPT_PATH_EMPTY", "Receipt path missing"));
  }
  open::that(url).map_err(|err| AppError::new("RECEIPT_OPEN", err.to_string()))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn loads_supported_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Lunch.JPG");
    fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

    let receipt = load_receipt(path.to_str().unwrap()).unwrap();
    assert_eq!(receipt.file_name, "Lunch.JPG");
    assert_eq!(receipt.extension, "jpg");
    assert_eq!(receipt.content_type, "image/jpeg");
    assert_eq!(receipt.bytes.len(), 3);
    assert_eq!(preview_data_url(&receipt), "data:image/jpeg;base64,/9j/");
  }

  #[test]
  fn rejects_missing_and_unsupported_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.png");
    assert_eq!(load_receipt(missing.to_str().unwrap()).unwrap_err().code, "RECEIPT_NOT_FOUND");
    assert_eq!(load_receipt("  ").unwrap_err().code, "RECEIPT_NOT_FOUND");

    let text = dir.path().join("notes.txt");
    fs::write(&text, "hello").unwrap();
    assert_eq!(load_receipt(text.to_str().unwrap()).unwrap_err().code, "RECEIPT_TYPE");
  }

  #[test]
  fn storage_path_is_scoped_by_user() {
    assert_eq!(storage_path("u-1", 42, "PNG", 1_700_000_000_000), "u-1/42_1700000000000.png");
  }
}
