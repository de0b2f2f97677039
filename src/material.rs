//! Plain text extraction from uploaded course material

use std::io::Read;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

/// Uploads larger than this are rejected
pub const MAX_MATERIAL_BYTES: usize = 10 * 1024 * 1024;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"\s+").expect("whitespace pattern is valid")
});
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"\n{3,}").expect("blank line pattern is valid")
});
static XML_TAG_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"<[^>]+>").expect("tag pattern is valid")
});
static PARAGRAPH_END_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").expect("paragraph pattern is valid")
});
static TAB_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"<w:tab\s*/>").expect("tab pattern is valid")
});

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind
{   Pdf
  , Docx
  , Txt
}

impl MaterialKind
{   /// Case-insensitive, with or without the leading dot
    pub fn from_extension(extension: &str) -> Result<Self, Error>
    {   match extension.trim().trim_start_matches('.').to_lowercase().as_str()
        {   "pdf" => Ok(MaterialKind::Pdf)
          , "docx" => Ok(MaterialKind::Docx)
          , "txt" => Ok(MaterialKind::Txt)
          , other => Err(Error::UnsupportedInput(
              format!("unsupported format: {}", other)
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialTextExtractor;

impl MaterialTextExtractor
{   pub fn new() -> Self
    {   MaterialTextExtractor
    }

    /// Extract UTF-8 text from file bytes of the declared extension
    pub fn extract(
      &self
    , bytes: &[u8]
    , extension: &str
    ) -> Result<String, Error>
    {   let kind = MaterialKind::from_extension(extension)?;
        if bytes.len() > MAX_MATERIAL_BYTES
        {   return Err(Error::UnsupportedInput(
              format!("file exceeds {} bytes", MAX_MATERIAL_BYTES)
            ));
        }
        debug!("Extracting {:?} text from {} bytes", kind, bytes.len());
        match kind
        {   MaterialKind::Pdf => extract_pdf(bytes)
          , MaterialKind::Docx => extract_docx(bytes)
          , MaterialKind::Txt => Ok(extract_txt(bytes))
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, Error>
{   let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
      warn!("PDF extraction failed: {}", e);
      Error::UnsupportedInput(format!("unreadable pdf: {}", e))
    })?;
    // one run of text, line breaks included
    Ok(WHITESPACE_RE.replace_all(&text, " ").trim().to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, Error>
{   let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
      .map_err(|e| {
        warn!("DOCX container unreadable: {}", e);
        Error::UnsupportedInput(format!("unreadable docx: {}", e))
      })?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")
      .map_err(|e| {
        Error::UnsupportedInput(format!("docx without document body: {}", e))
      })?
      .read_to_string(&mut xml)?;

    let text = PARAGRAPH_END_RE.replace_all(&xml, "\n");
    let text = TAB_RE.replace_all(&text, "\t");
    let text = XML_TAG_RE.replace_all(&text, "");
    let text = unescape_xml(&text);
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");
    Ok(text.trim().to_string())
}

/// UTF-8 when valid, Windows-1252 otherwise
fn extract_txt(bytes: &[u8]) -> String
{   let text = match std::str::from_utf8(bytes)
    {   Ok(text) => text.to_string()
      , Err(_) => {
          debug!("Material is not UTF-8, decoding as Windows-1252");
          let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
          text.into_owned()
        }
    };
    text.trim_start_matches('\u{feff}').trim().to_string()
}

fn unescape_xml(text: &str) -> String
{   text.replace("&lt;", "<")
      .replace("&gt;", ">")
      .replace("&quot;", "\"")
      .replace("&apos;", "'")
      .replace("&amp;", "&")
}
