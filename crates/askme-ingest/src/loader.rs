//! Loader selection and text extraction for uploaded files.

use std::path::Path;

use serde_json::json;

use askme_core::{Error, Result};

/// How an uploaded file is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    Pdf,
    Text,
}

/// Extracted text plus the metadata every chunk inherits.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub text: String,
    pub metadata: serde_json::Value,
}

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "json", "log", "xml", "yaml", "yml", "html", "htm", "rst",
];

impl Loader {
    /// Pick a loader from the declared MIME type.
    ///
    /// A missing or `application/octet-stream` type falls back to the
    /// extension of `filename`.
    pub fn detect(mime: Option<&str>, filename: &str) -> Result<Self> {
        let essence = mime
            .map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .unwrap_or_default();

        match essence.as_str() {
            "application/pdf" => Ok(Self::Pdf),
            m if m.starts_with("text/") => Ok(Self::Text),
            "application/json"
            | "application/xml"
            | "application/x-yaml"
            | "application/x-ndjson" => Ok(Self::Text),
            "" | "application/octet-stream" => Self::from_extension(filename).ok_or_else(|| {
                Error::UnsupportedMediaType(if essence.is_empty() {
                    format!("unknown type for {}", filename)
                } else {
                    essence.clone()
                })
            }),
            other => Err(Error::UnsupportedMediaType(other.to_string())),
        }
    }

    pub fn from_extension(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        if ext == "pdf" {
            Some(Self::Pdf)
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Text)
        } else {
            None
        }
    }

    /// MIME type recorded when the upload declared none.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Text => "text/plain",
        }
    }

    /// Extract the text of each page. Plain text is a single page.
    pub fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        match self {
            Self::Text => String::from_utf8(bytes.to_vec())
                .map(|text| vec![text])
                .map_err(|e| Error::Parse(format!("file is not valid UTF-8: {}", e))),
            // pdf-extract panics on some malformed files.
            Self::Pdf => std::panic::catch_unwind(|| {
                pdf_extract::extract_text_from_mem_by_pages(bytes)
            })
            .map_err(|_| Error::Parse("PDF extraction aborted".into()))?
            .map_err(|e| Error::Parse(format!("PDF extraction failed: {}", e))),
        }
    }

    /// Extract `bytes` into documents whose `source` is `path`.
    ///
    /// A PDF yields one document per page that has text, tagged with
    /// `loc.pageNumber` (1-based) and `pdf.totalPages`, so no chunk spans
    /// two pages.
    pub fn load(&self, path: &Path, bytes: &[u8]) -> Result<Vec<LoadedDocument>> {
        let source = path.to_string_lossy();
        let pages = self.extract_pages(bytes)?;
        match self {
            Self::Text => Ok(pages
                .into_iter()
                .map(|text| LoadedDocument {
                    text,
                    metadata: json!({ "source": source }),
                })
                .collect()),
            Self::Pdf => {
                let total = pages.len();
                Ok(pages
                    .into_iter()
                    .enumerate()
                    .filter(|(_, text)| !text.trim().is_empty())
                    .map(|(i, text)| LoadedDocument {
                        text,
                        metadata: json!({
                            "source": source,
                            "pdf": { "totalPages": total },
                            "loc": { "pageNumber": i + 1 },
                        }),
                    })
                    .collect())
            }
        }
    }
}
