//! Multi-format plain-text extraction (Word, PowerPoint, Excel, PDF, text).
//!
//! Each format is split into its logical sections: pages for PDF, slides for
//! pptx, worksheets for xlsx, and a single section for Word documents and
//! plain text. Formatting is dropped; Word paragraphs become lines.

use std::io::Read;

use quick_xml::events::Event;
use thiserror::Error;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Docx,
    Pptx,
    Xlsx,
    Pdf,
    PlainText,
}

impl Format {
    /// Maps a lowercased file extension to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "docx" => Some(Format::Docx),
            "pptx" => Some(Format::Pptx),
            "xlsx" => Some(Format::Xlsx),
            "pdf" => Some(Format::Pdf),
            "txt" | "md" => Some(Format::PlainText),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),

    #[error("text is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Extracts the ordered text sections of a document.
///
/// Always returns at least one section; a document with no text yields a
/// single empty section.
pub fn extract_sections(bytes: &[u8], format: Format) -> Result<Vec<String>, ExtractError> {
    let mut sections = match format {
        Format::Docx => vec![extract_docx(bytes)?],
        Format::Pptx => extract_pptx(bytes)?,
        Format::Xlsx => extract_xlsx(bytes)?,
        Format::Pdf => extract_pdf(bytes)?,
        Format::PlainText => vec![std::str::from_utf8(bytes)?.to_string()],
    };
    if sections.is_empty() {
        sections.push(String::new());
    }
    Ok(sections)
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    extract_paragraph_text(&xml, b"p")
}

/// Collects every `<*:t>` text run, ending a line at each closing
/// `paragraph` element.
fn extract_paragraph_text(xml: &[u8], paragraph: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    in_text = false;
                } else if name.as_ref() == paragraph && !out.is_empty() && !out.ends_with('\n')
                {
                    out.push('\n');
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let slide_names = numbered_entries(&archive, "ppt/slides/slide");
    let mut slides = Vec::with_capacity(slide_names.len());
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        slides.push(extract_paragraph_text(&xml, b"p")?);
    }
    Ok(slides)
}

/// Entries named `{prefix}{N}.xml`, ordered by `N`.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn extract_xlsx(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = if archive
        .file_names()
        .any(|n| n == "xl/sharedStrings.xml")
    {
        read_shared_strings(&mut archive)?
    } else {
        Vec::new()
    };
    let sheet_names = numbered_entries(&archive, "xl/worksheets/sheet");
    let mut sheets = Vec::new();
    for name in sheet_names.into_iter().take(XLSX_MAX_SHEETS) {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        sheets.push(extract_xlsx_sheet_cells(&sheet_xml, &shared_strings)?);
    }
    Ok(sheets)
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"si" => {
                current = Some(String::new());
            }
            Ok(Event::Text(te)) => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"si" => {
                strings.push(current.take().unwrap_or_default());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn extract_xlsx_sheet_cells(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    let mut cells: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_v = false;
    let mut cell_is_shared_str = false;
    while cells.len() < XLSX_MAX_CELLS_PER_SHEET {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                } else if e.local_name().as_ref() == b"v" {
                    in_v = true;
                }
            }
            Ok(Event::Text(te)) if in_v => {
                let v = te.unescape().unwrap_or_default();
                let s = v.trim();
                if cell_is_shared_str {
                    if let Some(text) = s.parse::<usize>().ok().and_then(|i| shared_strings.get(i))
                    {
                        cells.push(text.clone());
                    }
                } else if !s.is_empty() {
                    cells.push(s.to_string());
                }
                in_v = false;
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"v" {
                    in_v = false;
                } else if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells.join(" "))
}
