//! Document text extraction.
//!
//! Extraction is an ordered list of strategies. The first strategy that
//! returns text wins; when every strategy fails, the error carries each
//! attempt so the skipped-document log explains what was tried.
//!
//! Binary formats such as PDF are handled by plugging in a [`TextExtractor`]
//! backed by an external tool, or by shipping a pre-extracted text sidecar
//! next to the document.

use std::path::{Path, PathBuf};

use crate::error::ExtractError;

/// One way of turning a document into plain text.
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "text"];

/// Reads UTF-8 text files (`.txt`, `.md`, `.text`).
#[derive(Debug, Default, Clone)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| PLAIN_TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !supported {
            return Err(ExtractError::Unsupported {
                strategy: self.name().to_string(),
                path: path.to_path_buf(),
            });
        }
        std::fs::read_to_string(path).map_err(|e| failed(self.name(), e))
    }
}

/// Reads a pre-extracted `<sidecar_dir>/<stem>.txt` for any document, such as
/// OCR output produced out of band. Without a sidecar directory the file is
/// looked up next to the document.
#[derive(Debug, Clone, Default)]
pub struct SidecarTextExtractor {
    sidecar_dir: Option<PathBuf>,
}

impl SidecarTextExtractor {
    pub fn new(sidecar_dir: impl Into<PathBuf>) -> Self {
        Self {
            sidecar_dir: Some(sidecar_dir.into()),
        }
    }

    pub fn beside_document() -> Self {
        Self::default()
    }

    fn sidecar_path(&self, path: &Path) -> Option<PathBuf> {
        let mut name = path.file_stem()?.to_os_string();
        name.push(".txt");
        let dir = match &self.sidecar_dir {
            Some(dir) => dir.clone(),
            None => path.parent()?.to_path_buf(),
        };
        Some(dir.join(name))
    }
}

impl TextExtractor for SidecarTextExtractor {
    fn name(&self) -> &str {
        "sidecar"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let sidecar = self
            .sidecar_path(path)
            .filter(|p| p.is_file() && p.as_path() != path)
            .ok_or_else(|| ExtractError::Unsupported {
                strategy: self.name().to_string(),
                path: path.to_path_buf(),
            })?;
        std::fs::read_to_string(&sidecar).map_err(|e| failed(self.name(), e))
    }
}

/// Byte prefixes of container formats that need a real parser.
const BINARY_MAGIC: &[&[u8]] = &[b"%PDF-", b"PK\x03\x04", b"\xD0\xCF\x11\xE0"];

/// Largest share of U+FFFD replacement characters tolerated in lossy text.
const MAX_REPLACEMENT_RATIO: f64 = 0.1;

/// Decodes mostly-text files with an unknown extension as lossy UTF-8.
///
/// Binary content is refused: known container magic (PDF, ZIP/DOCX, OLE),
/// NUL bytes, or more than 10% replacement characters after decoding. Text
/// without any alphanumeric character is refused too.
#[derive(Debug, Default, Clone)]
pub struct LossyTextExtractor;

impl TextExtractor for LossyTextExtractor {
    fn name(&self) -> &str {
        "lossy"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| failed(self.name(), e))?;
        if BINARY_MAGIC.iter().any(|magic| bytes.starts_with(magic)) {
            return Err(failed(self.name(), "binary document format"));
        }
        if bytes.contains(&0) {
            return Err(failed(self.name(), "binary content (NUL bytes)"));
        }
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let total = text.chars().count();
        let replaced = text.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
        if total > 0 && replaced as f64 / total as f64 > MAX_REPLACEMENT_RATIO {
            return Err(failed(self.name(), "binary content (undecodable bytes)"));
        }
        if !text.chars().any(char::is_alphanumeric) {
            return Err(failed(self.name(), "no readable text"));
        }
        Ok(text)
    }
}

fn failed(strategy: &str, err: impl std::fmt::Display) -> ExtractError {
    ExtractError::Failed {
        strategy: strategy.to_string(),
        message: err.to_string(),
    }
}

/// Ordered list of extraction strategies.
pub struct ExtractionChain {
    strategies: Vec<Box<dyn TextExtractor>>,
}

impl ExtractionChain {
    pub fn new(strategies: Vec<Box<dyn TextExtractor>>) -> Self {
        Self { strategies }
    }

    /// Plain text, then a sidecar in the document's own directory, then lossy
    /// decoding.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(PlainTextExtractor),
            Box::new(SidecarTextExtractor::beside_document()),
            Box::new(LossyTextExtractor),
        ])
    }

    /// Like [`standard`](Self::standard) but sidecars are looked up in
    /// `sidecar_dir`.
    pub fn with_sidecar_dir(sidecar_dir: impl Into<PathBuf>) -> Self {
        Self::new(vec![
            Box::new(PlainTextExtractor),
            Box::new(SidecarTextExtractor::new(sidecar_dir)),
            Box::new(LossyTextExtractor),
        ])
    }

    pub fn push(&mut self, extractor: Box<dyn TextExtractor>) {
        self.strategies.push(extractor);
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies in order and return the first success.
    pub fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match strategy.extract(path) {
                Ok(text) => {
                    tracing::debug!(
                        path = %path.display(),
                        strategy = strategy.name(),
                        chars = text.len(),
                        "Extracted text"
                    );
                    return Ok(text);
                }
                Err(e) => attempts.push(e.to_string()),
            }
        }
        Err(ExtractError::AllStrategiesFailed {
            path: path.to_path_buf(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixed(&'static str, Result<String, ExtractError>);

    impl TextExtractor for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn extract(&self, _path: &Path) -> Result<String, ExtractError> {
            self.1.clone()
        }
    }

    #[test]
    fn test_plain_text_supported_extensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lease.TXT");
        std::fs::write(&path, "Rent is due.").unwrap();
        assert_eq!(PlainTextExtractor.extract(&path).unwrap(), "Rent is due.");

        let pdf = dir.path().join("lease.pdf");
        std::fs::write(&pdf, "%PDF-1.7").unwrap();
        assert!(matches!(
            PlainTextExtractor.extract(&pdf),
            Err(ExtractError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_sidecar_lookup() {
        let docs = TempDir::new().unwrap();
        let ocr = TempDir::new().unwrap();
        let pdf = docs.path().join("policy.pdf");
        std::fs::write(&pdf, [0u8, 159, 146, 150]).unwrap();

        let extractor = SidecarTextExtractor::new(ocr.path());
        assert!(extractor.extract(&pdf).is_err());

        std::fs::write(ocr.path().join("policy.txt"), "Coverage excludes floods.").unwrap();
        assert_eq!(extractor.extract(&pdf).unwrap(), "Coverage excludes floods.");
    }

    #[test]
    fn test_sidecar_beside_document() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("claim.pdf");
        std::fs::write(&pdf, [0u8, 1]).unwrap();
        std::fs::write(dir.path().join("claim.txt"), "Claim form text.").unwrap();
        assert_eq!(
            SidecarTextExtractor::beside_document().extract(&pdf).unwrap(),
            "Claim form text."
        );
    }

    #[test]
    fn test_sidecar_ignores_document_itself() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(SidecarTextExtractor::new(dir.path()).extract(&path).is_err());
    }

    #[test]
    fn test_lossy_rejects_binary_noise() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0u8, 0xff, 0xfe, 0x01]).unwrap();
        assert!(matches!(
            LossyTextExtractor.extract(&path),
            Err(ExtractError::Failed { .. })
        ));

        std::fs::write(&path, b"\xffClause 7 text").unwrap();
        assert!(LossyTextExtractor.extract(&path).unwrap().contains("Clause 7 text"));
    }

    #[test]
    fn test_lossy_rejects_pdf_without_sidecar() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("policy.pdf");
        std::fs::write(
            &path,
            b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\ntrailer\n%%EOF\n",
        )
        .unwrap();
        assert!(LossyTextExtractor.extract(&path).is_err());
        assert!(matches!(
            ExtractionChain::standard().extract(&path),
            Err(ExtractError::AllStrategiesFailed { .. })
        ));
    }

    #[test]
    fn test_lossy_rejects_mostly_undecodable_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.dat");
        let mut bytes = b"ab".to_vec();
        bytes.extend(std::iter::repeat_n(0xffu8, 20));
        std::fs::write(&path, bytes).unwrap();
        assert!(LossyTextExtractor.extract(&path).is_err());
    }

    #[test]
    fn test_lossy_accepts_unknown_text_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rider.rtf");
        std::fs::write(&path, "Rider: flood coverage applies.").unwrap();
        assert_eq!(
            ExtractionChain::standard().extract(&path).unwrap(),
            "Rider: flood coverage applies."
        );
    }

    #[test]
    fn test_chain_first_success_wins() {
        let chain = ExtractionChain::new(vec![
            Box::new(Fixed(
                "first",
                Err(ExtractError::Failed {
                    strategy: "first".into(),
                    message: "boom".into(),
                }),
            )),
            Box::new(Fixed("second", Ok("second text".into()))),
            Box::new(Fixed("third", Ok("third text".into()))),
        ]);
        assert_eq!(chain.extract(Path::new("x.pdf")).unwrap(), "second text");
    }

    #[test]
    fn test_chain_aggregates_failures() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, [0u8, 1, 2, 3]).unwrap();

        let chain = ExtractionChain::with_sidecar_dir(dir.path().join("ocr"));
        match chain.extract(&path) {
            Err(ExtractError::AllStrategiesFailed { attempts, .. }) => {
                assert_eq!(attempts.len(), 3);
                assert!(attempts[0].starts_with("plain-text"));
                assert!(attempts[2].starts_with("lossy"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_strategy_names() {
        let mut chain = ExtractionChain::standard();
        chain.push(Box::new(Fixed("custom", Ok(String::new()))));
        assert_eq!(
            chain.strategy_names(),
            vec!["plain-text", "sidecar", "lossy", "custom"]
        );
    }
}
