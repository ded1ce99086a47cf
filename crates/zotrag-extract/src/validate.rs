//! Structural PDF validation.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use zotrag_core::ValidationError;

/// Bytes every PDF starts with.
pub const PDF_HEADER: &[u8] = b"%PDF-";

/// Trailing window searched for the end-of-file marker.
pub const TRAILER_WINDOW: u64 = 1024;

/// Bytes of the file head shown when the header check fails.
pub const PREVIEW_LEN: u64 = 100;

const EOF_MARKER: &[u8] = b"%%eof";

/// Check that `path` looks like a complete PDF and return its size in bytes.
///
/// The file must be non-empty, start with `%PDF-`, and contain `%%EOF`
/// (any case) within its last 1024 bytes.
pub fn validate_pdf(path: &Path) -> Result<u64, ValidationError> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size == 0 {
        return Err(ValidationError::Empty);
    }

    let mut header = Vec::with_capacity(PDF_HEADER.len());
    (&mut file)
        .take(PDF_HEADER.len() as u64)
        .read_to_end(&mut header)?;
    if header != PDF_HEADER {
        file.seek(SeekFrom::Start(0))?;
        let mut head = Vec::new();
        (&mut file).take(PREVIEW_LEN).read_to_end(&mut head)?;
        return Err(ValidationError::BadHeader {
            preview: head.escape_ascii().to_string(),
        });
    }

    file.seek(SeekFrom::Start(size.saturating_sub(TRAILER_WINDOW)))?;
    let mut trailer = Vec::new();
    file.read_to_end(&mut trailer)?;
    trailer.make_ascii_lowercase();
    if !trailer.windows(EOF_MARKER.len()).any(|w| w == EOF_MARKER) {
        return Err(ValidationError::MissingEof);
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn minimal_pdf(padding: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend(std::iter::repeat(b' ').take(padding));
        bytes.extend_from_slice(b"\n%%EOF\n");
        bytes
    }

    #[test]
    fn test_zero_byte_file_is_rejected() {
        let file = file_with(b"");
        assert!(matches!(
            validate_pdf(file.path()),
            Err(ValidationError::Empty)
        ));
    }

    #[test]
    fn test_bad_header_is_rejected_with_preview() {
        let file = file_with(b"<!DOCTYPE html><html>Access denied</html>");
        match validate_pdf(file.path()) {
            Err(ValidationError::BadHeader { preview }) => {
                assert!(preview.starts_with("<!DOCTYPE html>"));
            }
            other => panic!("expected bad header, got {other:?}"),
        }
    }

    #[test]
    fn test_preview_is_limited_and_escaped() {
        let mut bytes = vec![0u8, 1, 2];
        bytes.extend(std::iter::repeat(b'x').take(500));
        let file = file_with(&bytes);
        match validate_pdf(file.path()) {
            Err(ValidationError::BadHeader { preview }) => {
                assert!(preview.starts_with("\\x00\\x01\\x02"));
                assert_eq!(preview.matches('x').count(), 97 + 3);
            }
            other => panic!("expected bad header, got {other:?}"),
        }
    }

    #[test]
    fn test_file_shorter_than_header_is_rejected() {
        let file = file_with(b"%PD");
        assert!(matches!(
            validate_pdf(file.path()),
            Err(ValidationError::BadHeader { .. })
        ));
    }

    #[test]
    fn test_missing_eof_is_rejected() {
        let file = file_with(b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n");
        assert!(matches!(
            validate_pdf(file.path()),
            Err(ValidationError::MissingEof)
        ));
    }

    #[test]
    fn test_eof_outside_trailer_window_is_rejected() {
        let mut bytes = b"%PDF-1.4\n%%EOF\n".to_vec();
        bytes.extend(std::iter::repeat(b'0').take(2048));
        let file = file_with(&bytes);
        assert!(matches!(
            validate_pdf(file.path()),
            Err(ValidationError::MissingEof)
        ));
    }

    #[test]
    fn test_minimal_pdf_passes_with_size() {
        let bytes = minimal_pdf(16);
        let file = file_with(&bytes);
        assert_eq!(validate_pdf(file.path()).unwrap(), bytes.len() as u64);
    }

    #[test]
    fn test_large_pdf_checks_only_trailer() {
        let bytes = minimal_pdf(10_000);
        let file = file_with(&bytes);
        assert_eq!(validate_pdf(file.path()).unwrap(), bytes.len() as u64);
    }

    #[test]
    fn test_lowercase_eof_marker_is_accepted() {
        let file = file_with(b"%PDF-1.3\n...\n%%eof");
        assert!(validate_pdf(file.path()).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_pdf(&dir.path().join("absent.pdf")),
            Err(ValidationError::Io(_))
        ));
    }
}
