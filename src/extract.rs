//! Multi-format text extraction (PDF, DOCX, XLSX/XLS, TXT).
//!
//! Callers supply a file name and its bytes; dispatch is on the lower-cased
//! extension. Extraction is fail-closed: an error never comes with partial
//! text, and every error names the originating file.

use std::io::Read;

use bidvault_core::error::{Error, Result};
use bidvault_core::models::file_extension;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extracts plain text from `bytes`, choosing a reader by the extension of `file_name`.
pub fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String> {
    let ext = file_extension(file_name);
    let result = match ext.as_str() {
        "txt" => Ok(extract_txt(bytes)),
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        "xlsx" | "xls" => extract_workbook(bytes),
        _ => {
            return Err(Error::UnsupportedFormat {
                file: file_name.to_string(),
                extension: ext,
            })
        }
    };

    match result {
        Ok(text) => {
            tracing::debug!(file = file_name, chars = text.len(), "extracted text");
            Ok(text)
        }
        Err(reason) => {
            tracing::warn!(file = file_name, %reason, "extraction failed");
            Err(Error::ExtractionFailed {
                file: file_name.to_string(),
                reason,
            })
        }
    }
}

fn extract_txt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

/// One `[Page N]` block per page, runs joined by single spaces.
///
/// `pdf-extract` panics on some malformed inputs (dangling object
/// references, for one); those are reported as ordinary failures.
fn extract_pdf(bytes: &[u8]) -> std::result::Result<String, String> {
    let pages = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|panic| format!("malformed PDF: {}", panic_message(panic.as_ref())))?
    .map_err(|e| format!("PDF extraction failed: {}", e))?;

    let mut out = String::new();
    let mut any_text = false;
    for (i, page) in pages.iter().enumerate() {
        let runs = page.split_whitespace().collect::<Vec<_>>().join(" ");
        any_text |= !runs.is_empty();
        out.push_str(&format!("[Page {}]\n{}\n\n", i + 1, runs));
    }

    if !any_text {
        return Err(
            "no extractable text; the PDF may be scanned or image-only".to_string(),
        );
    }
    Ok(out)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("the PDF reader aborted")
}

fn extract_docx(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| format!("not a valid DOCX archive: {}", e))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| "word/document.xml not found".to_string())?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| e.to_string())?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }
    wordprocessing_text(&doc_xml)
}

/// Raw text of a WordprocessingML body: `w:t` runs, one blank line per paragraph.
fn wordprocessing_text(xml: &[u8]) -> std::result::Result<String, String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().map_err(|e| e.to_string())?.as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed document XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

/// First sheet only, serialized as comma-separated rows.
fn extract_workbook(bytes: &[u8]) -> std::result::Result<String, String> {
    use calamine::Reader;

    let cursor = std::io::Cursor::new(bytes);
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|e| format!("not a readable workbook: {}", e))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "workbook has no sheets".to_string())?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| format!("cannot read sheet '{}': {}", first, e))?;

    let lines: Vec<String> = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| csv_field(&cell.to_string()))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    Ok(lines.join("\n"))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    /// A one-page PDF whose `/F1` font points at object 9, which does not exist.
    fn pdf_with_dangling_font() -> Vec<u8> {
        let content = "BT /F1 12 Tf 72 720 Td (Hello) Tj ET";
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 9 0 R >> >> >>".to_string(),
            format!("<< /Length {} >> stream\n{}\nendstream", content.len(), content),
        ];

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
        }
        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );
        out
    }

    /// Two-sheet workbook: "Answers" (shared and inline strings, a number)
    /// followed by "Hidden".
    fn two_sheet_xlsx() -> Vec<u8> {
        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#,
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Answers" sheetId="1" r:id="rId1"/><sheet name="Hidden" sheetId="2" r:id="rId2"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#,
            ),
            (
                "xl/sharedStrings.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4"><si><t>Question</t></si><si><t>Answer</t></si><si><t>Hosting</t></si><si><t>UK, ISO 27001</t></si></sst>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2" t="s"><v>3</v></c></row><row r="3"><c r="A3" t="inlineStr"><is><t>Staff</t></is></c><c r="B3"><v>42</v></c></row></sheetData></worksheet>"#,
            ),
            (
                "xl/worksheets/sheet2.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>secret pricing</t></is></c></row></sheetData></worksheet>"#,
            ),
        ];

        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, xml) in parts {
                zip.start_file(name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(xml.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn plain_text_round_trips_exactly() {
        let original = "Q1: Describe your approach.\n\nQ2: Pricing?  \n";
        assert_eq!(extract_text("tender.txt", original.as_bytes()).unwrap(), original);
    }

    #[test]
    fn txt_extension_is_case_insensitive_and_bom_is_dropped() {
        let text = extract_text("NOTES.TXT", "\u{feff}hello".as_bytes()).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn unsupported_extension_returns_error() {
        let err = extract_text("deck.pptx", b"foo").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn invalid_pdf_returns_error_with_file_name() {
        let err = extract_text("broken.pdf", b"not a pdf").unwrap_err();
        match err {
            Error::ExtractionFailed { file, .. } => assert_eq!(file, "broken.pdf"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn pdf_with_dangling_font_fails_without_panicking() {
        let err = extract_text("broken.pdf", &pdf_with_dangling_font()).unwrap_err();
        match err {
            Error::ExtractionFailed { file, .. } => assert_eq!(file, "broken.pdf"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text("x.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[test]
    fn docx_paragraphs_are_separated() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>First</w:t></w:r><w:r><w:t xml:space=\"preserve\"> line</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p>",
        );
        let text = extract_text("t.docx", &bytes).unwrap();
        assert_eq!(text, "First line\n\nSecond & last");
    }

    #[test]
    fn docx_without_document_part_fails() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_text("t.docx", &buf).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn invalid_workbook_fails() {
        let err = extract_text("book.xlsx", b"garbage").unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
        let err = extract_text("book.xls", b"garbage").unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[test]
    fn workbook_reads_first_sheet_as_csv() {
        let text = extract_text("answers.xlsx", &two_sheet_xlsx()).unwrap();
        assert_eq!(text, "Question,Answer\nHosting,\"UK, ISO 27001\"\nStaff,42");
        assert!(!text.contains("secret pricing"));
    }

    #[test]
    fn csv_fields_are_quoted_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }
}
