//! Text extraction for uploaded files.
//!
//! [`FileExtractor`] is the application's [`TextExtractor`]: it turns file
//! bytes plus a [`DocumentFormat`] into raw text for the core pipeline.
//!
//! | Format | Method |
//! |--------|--------|
//! | PDF | `pdf-extract` |
//! | DOCX | `<w:t>` runs of `word/document.xml`, one line per paragraph |
//! | PPTX | `<a:t>` runs of every `ppt/slides/slideN.xml`, in slide order |
//! | XLSX | cell values of every worksheet, in sheet order |
//! | Text, Markdown | UTF-8, falling back to Latin-1 |
//!
//! Failures never panic; they come back as
//! [`IngestionError::CorruptFile`] so a batch can skip the file.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use docchat_core::error::IngestionError;
use docchat_core::ingest::TextExtractor;
use docchat_core::models::DocumentFormat;

/// Upper bound on sheets read from one workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Upper bound on cells read from one sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Upper bound on the decompressed size of one ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl TextExtractor for FileExtractor {
    fn extract(&self, bytes: &[u8], format: DocumentFormat) -> Result<String, IngestionError> {
        let text = match format {
            DocumentFormat::Pdf => extract_pdf(bytes)?,
            DocumentFormat::Docx => extract_docx(bytes)?,
            DocumentFormat::Pptx => extract_pptx(bytes)?,
            DocumentFormat::Xlsx => extract_xlsx(bytes)?,
            DocumentFormat::Text | DocumentFormat::Markdown => decode_text(bytes),
        };
        debug!(format = format.label(), bytes = bytes.len(), chars = text.len(), "extracted text");
        Ok(text)
    }
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> IngestionError {
    IngestionError::CorruptFile(format!("{}: {}", what, err))
}

/// UTF-8 when valid, otherwise Latin-1 (every byte maps to one char).
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, IngestionError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| corrupt("PDF", e))
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, IngestionError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt("ZIP container", e))
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, IngestionError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| corrupt(&format!("missing {}", name), e))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| corrupt(name, e))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(IngestionError::CorruptFile(format!(
            "{} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Entry names `<prefix>N.xml`, ordered by N.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Collect the text of every `<text_tag>` element, starting a new line at
/// the end of each `<para_tag>` element.
fn collect_runs(xml: &[u8], text_tag: &[u8], para_tag: &[u8]) -> Result<String, IngestionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == text_tag => in_text = true,
            Ok(Event::Text(t)) if in_text => {
                let s = t.unescape().map_err(|e| corrupt("XML text", e))?;
                out.push_str(&s);
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == text_tag {
                    in_text = false;
                } else if name.as_ref() == para_tag && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(corrupt("XML", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, IngestionError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    collect_runs(&xml, b"t", b"p")
}

fn extract_pptx(bytes: &[u8]) -> Result<String, IngestionError> {
    let mut archive = open_archive(bytes)?;
    let mut out = String::new();
    for name in numbered_entries(&archive, "ppt/slides/slide") {
        let xml = read_entry(&mut archive, &name)?;
        let text = collect_runs(&xml, b"t", b"p")?;
        if !text.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(text.trim_end());
        }
    }
    Ok(out)
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, IngestionError> {
    let mut archive = open_archive(bytes)?;
    let has_shared = archive.file_names().any(|n| n == "xl/sharedStrings.xml");
    let shared = if has_shared {
        shared_strings(&read_entry(&mut archive, "xl/sharedStrings.xml")?)?
    } else {
        Vec::new()
    };

    let mut sheets = Vec::new();
    for name in numbered_entries(&archive, "xl/worksheets/sheet")
        .into_iter()
        .take(XLSX_MAX_SHEETS)
    {
        let xml = read_entry(&mut archive, &name)?;
        let cells = sheet_cells(&xml, &shared)?;
        if !cells.is_empty() {
            sheets.push(cells.join(" "));
        }
    }
    Ok(sheets.join("\n"))
}

/// One string per `<si>` item, concatenating its rich-text runs.
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, IngestionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = current.is_some(),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape().map_err(|e| corrupt("shared strings", e))?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(corrupt("shared strings", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Cell values of one sheet in document order, resolving shared strings.
fn sheet_cells(xml: &[u8], shared: &[String]) -> Result<Vec<String>, IngestionError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut cells = Vec::new();
    let mut shared_cell = false;
    let mut in_value = false;
    loop {
        if cells.len() >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared_cell = e.attributes().flatten().any(|a| {
                        a.key.as_ref() == b"t" && a.value.as_ref() == b"s"
                    });
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_value => {
                let raw = t.unescape().map_err(|e| corrupt("worksheet", e))?;
                let value = raw.trim();
                if shared_cell {
                    if let Some(s) = value.parse::<usize>().ok().and_then(|i| shared.get(i)) {
                        cells.push(s.clone());
                    }
                } else if !value.is_empty() {
                    cells.push(value.to_string());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => shared_cell = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(corrupt("worksheet", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_fallback() {
        let bytes = b"caf\xe9 cr\xe8me";
        assert_eq!(decode_text(bytes), "café crème");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        assert_eq!(decode_text("\u{feff}hello".as_bytes()), "hello");
    }

    #[test]
    fn test_invalid_pdf_is_corrupt() {
        let err = FileExtractor.extract(b"not a pdf", DocumentFormat::Pdf).unwrap_err();
        assert!(matches!(err, IngestionError::CorruptFile(_)));
    }

    #[test]
    fn test_invalid_zip_is_corrupt() {
        for format in [DocumentFormat::Docx, DocumentFormat::Pptx, DocumentFormat::Xlsx] {
            let err = FileExtractor.extract(b"not a zip", format).unwrap_err();
            assert!(matches!(err, IngestionError::CorruptFile(_)));
        }
    }

    #[test]
    fn test_collect_runs_paragraphs() {
        let xml = br#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world.</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second &amp; last.</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = collect_runs(xml, b"t", b"p").unwrap();
        assert_eq!(text, "Hello world.\nSecond & last.\n");
    }

    #[test]
    fn test_sheet_cells_shared_and_inline() {
        let shared = vec!["Revenue".to_string(), "Costs".to_string()];
        let xml = br#"<worksheet><sheetData>
            <row><c r="A1" t="s"><v>0</v></c><c r="B1"><v>42</v></c></row>
            <row><c r="A2" t="s"><v>1</v></c><c r="B2" t="inlineStr"><is><t>note</t></is></c></row>
        </sheetData></worksheet>"#;
        assert_eq!(sheet_cells(xml, &shared).unwrap(), vec!["Revenue", "42", "Costs", "note"]);
    }
}
