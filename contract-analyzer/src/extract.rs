//! Text extraction for uploaded contracts

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use thiserror::Error;
use tracing::debug;

/// Errors from validating or reading an uploaded document
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Nenhum arquivo selecionado")]
    EmptyFilename,

    #[error("Extensão {ext} não suportada. Use: {supported}")]
    UnsupportedExtension { ext: String, supported: String },

    #[error("Falha ao ler o PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Falha ao ler o DOCX: {0}")]
    DocxArchive(#[from] zip::result::ZipError),

    #[error("Falha ao ler o DOCX: {0}")]
    DocxXml(#[from] quick_xml::Error),

    #[error("Não foi possível extrair texto do documento.")]
    NoText,
}

/// Reduce an uploaded filename to a safe basename.
///
/// Directory components are dropped, anything outside `[A-Za-z0-9._-]`
/// becomes `_`, and leading dots/underscores are trimmed so the result can
/// never name a hidden file or walk up the tree.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Lower-cased extension including the dot, or an empty string
pub fn extension_of(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => filename[idx..].to_lowercase(),
        _ => String::new(),
    }
}

/// Validates uploads against the configured extensions and extracts their text
#[derive(Debug, Clone)]
pub struct TextExtractor {
    supported: Vec<String>,
}

impl TextExtractor {
    pub fn new(supported: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            supported: supported
                .into_iter()
                .map(|ext| ext.into().to_lowercase())
                .collect(),
        }
    }

    fn unsupported(&self, ext: String) -> ExtractError {
        ExtractError::UnsupportedExtension {
            ext,
            supported: self.supported.join(", "),
        }
    }

    /// Sanitize `filename` and check its extension, returning the safe name
    pub fn check(&self, filename: &str) -> Result<String, ExtractError> {
        let safe = sanitize_filename(filename).ok_or(ExtractError::EmptyFilename)?;
        let ext = extension_of(&safe);
        if !self.supported.iter().any(|s| *s == ext) {
            return Err(self.unsupported(ext));
        }
        Ok(safe)
    }

    /// Extract the plain text of an uploaded document
    pub fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
        let safe = self.check(filename)?;
        let text = match extension_of(&safe).as_str() {
            ".pdf" => extract_pdf(bytes)?,
            ".docx" => extract_docx(bytes)?,
            ".txt" => String::from_utf8_lossy(bytes).trim().to_string(),
            other => return Err(self.unsupported(other.to_string())),
        };

        if text.is_empty() {
            return Err(ExtractError::NoText);
        }

        debug!(filename = %safe, chars = text.len(), "Extracted document text");
        Ok(text)
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let document = lopdf::Document::load_mem(bytes)?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    pages.push(text.to_string());
                }
            }
            // Scanned or oddly encoded pages are skipped, not fatal
            Err(e) => debug!(page = page_number, error = %e, "Skipping unreadable PDF page"),
        }
    }

    Ok(pages.join("\n\n").trim().to_string())
}

/// Text of `word/document.xml`, one line per non-empty paragraph
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)
        .map_err(zip::result::ZipError::from)?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(text) if in_text => current.push_str(&text.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}
