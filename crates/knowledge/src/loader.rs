//! Guideline document loading and text extraction.

use crate::types::{LoadFailure, LoadReport, SourceDocument};
use measles_core::{AppError, AppResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Pdf,
    Docx,
    PlainText,
    Unsupported,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            Some("txt") | Some("md") => Self::PlainText,
            _ => Self::Unsupported,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "text",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Load every supported document in `dir`, in file-name order.
///
/// A missing directory is created and reported as awaiting content. Files that
/// fail to load are collected in `failures`; they never abort the batch.
pub fn load_directory(dir: &Path) -> AppResult<LoadReport> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        tracing::warn!(
            "Content directory {:?} did not exist; created it and awaiting content",
            dir
        );
        return Ok(LoadReport {
            awaiting_content: true,
            ..LoadReport::default()
        });
    }

    if !dir.is_dir() {
        return Err(AppError::Config(format!(
            "Content path {:?} is not a directory",
            dir
        )));
    }

    let mut report = LoadReport::default();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Failed to read directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let content_type = ContentType::from_path(path);
        if content_type == ContentType::Unsupported {
            tracing::debug!("Skipping unsupported file: {:?}", path);
            continue;
        }

        match load_file(path) {
            Ok(document) => {
                tracing::debug!(
                    "Loaded {} ({}, {} chars)",
                    document.source_id,
                    content_type.as_str(),
                    document.raw_text.chars().count()
                );
                report.documents.push(document);
            }
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", path, e);
                report.failures.push(LoadFailure {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Loaded {} document(s) from {:?} ({} failed)",
        report.documents.len(),
        dir,
        report.failures.len()
    );

    Ok(report)
}

/// Load a single document and extract its text.
pub fn load_file(path: &Path) -> AppResult<SourceDocument> {
    let source_id = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| AppError::Ingestion(format!("No file name in {:?}", path)))?;

    let raw_text = match ContentType::from_path(path) {
        ContentType::Pdf => extract_pdf(path)?,
        ContentType::Docx => extract_docx(path)?,
        ContentType::PlainText => fs::read_to_string(path)
            .map_err(|e| AppError::Ingestion(format!("Failed to read {:?}: {}", path, e)))?,
        ContentType::Unsupported => {
            return Err(AppError::Ingestion(format!(
                "Unsupported file type: {:?}",
                path
            )))
        }
    };

    if raw_text.trim().is_empty() {
        return Err(AppError::Ingestion(format!(
            "No extractable text in {:?}",
            path
        )));
    }

    Ok(SourceDocument {
        source_id,
        raw_text,
    })
}

/// Extract text from every page of a PDF, pages separated by blank lines.
fn extract_pdf(path: &Path) -> AppResult<String> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| AppError::Ingestion(format!("Failed to parse PDF {:?}: {}", path, e)))?;

    let mut page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page_number in page_numbers {
        match doc.extract_text(&[page_number]) {
            Ok(text) => {
                let normalized = normalize_text(&text);
                if !normalized.is_empty() {
                    pages.push(normalized);
                }
            }
            Err(e) => {
                tracing::debug!("No text on page {} of {:?}: {}", page_number, path, e);
            }
        }
    }

    Ok(pages.join("\n\n"))
}

/// Extract paragraph text from a DOCX package.
fn extract_docx(path: &Path) -> AppResult<String> {
    let file = fs::File::open(path)
        .map_err(|e| AppError::Ingestion(format!("Failed to open {:?}: {}", path, e)))?;

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AppError::Ingestion(format!("Invalid DOCX archive {:?}: {}", path, e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| AppError::Ingestion(format!("No document body in {:?}: {}", path, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| AppError::Ingestion(format!("Failed to read {:?}: {}", path, e)))?;

    docx_xml_to_text(&xml)
}

/// Collect `<w:t>` runs from WordprocessingML, one line per paragraph.
fn docx_xml_to_text(xml: &str) -> AppResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::with_capacity(xml.len() / 4);
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_run_text => {
                let decoded = e
                    .unescape()
                    .map_err(|e| AppError::Ingestion(format!("Invalid DOCX text: {}", e)))?;
                text.push_str(&decoded);
            }
            Ok(Event::CData(e)) if in_run_text => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::Ingestion(format!(
                    "Malformed DOCX XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(normalize_text(&text))
}

/// Trim every line and drop blank ones.
fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_docx(path: &Path, body: &str) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    fn write_pdf(path: &Path, line: &str) {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_content_type_detection() {
        assert_eq!(ContentType::from_path(Path::new("idsr.pdf")), ContentType::Pdf);
        assert_eq!(ContentType::from_path(Path::new("SOP.DOCX")), ContentType::Docx);
        assert_eq!(
            ContentType::from_path(Path::new("notes.md")),
            ContentType::PlainText
        );
        assert_eq!(
            ContentType::from_path(Path::new("photo.jpg")),
            ContentType::Unsupported
        );
    }

    #[test]
    fn test_docx_xml_to_text() {
        let xml = r#"<w:document><w:body>
<w:p><w:r><w:t>Suspected case:</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve"> fever &amp; rash</w:t></w:r></w:p>
<w:p><w:r><w:t>Store at 2&#8211;8 &#176;C</w:t><w:br/><w:t>mid</w:t><w:t><![CDATA[<cold chain>]]></w:t></w:r></w:p>
</w:body></w:document>"#;

        let text = docx_xml_to_text(xml).unwrap();
        assert_eq!(
            text,
            "Suspected case:\t fever & rash\nStore at 2\u{2013}8 \u{b0}C\nmid<cold chain>"
        );
    }

    #[test]
    fn test_docx_text_outside_runs_is_ignored() {
        let xml = "<w:p><w:pPr><w:pStyle w:val=\"Heading1\"/></w:pPr>stray<w:r><w:t>Alert threshold</w:t></w:r></w:p>";
        assert_eq!(docx_xml_to_text(xml).unwrap(), "Alert threshold");
    }

    #[test]
    fn test_malformed_docx_xml_is_ingestion_error() {
        let result = docx_xml_to_text("<w:p><w:t>unclosed</w:p>");
        assert!(matches!(result, Err(AppError::Ingestion(_))));
    }

    #[test]
    fn test_pdf_text_is_loaded_with_file_name_as_source() {
        let temp = TempDir::new().unwrap();
        write_pdf(&temp.path().join("idsr-measles.pdf"), "Alert threshold one suspected case");

        let report = load_directory(temp.path()).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].source_id, "idsr-measles.pdf");
        assert!(report.documents[0]
            .raw_text
            .contains("Alert threshold one suspected case"));
    }

    #[test]
    fn test_missing_directory_is_created() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("guidelines");

        let report = load_directory(&dir).unwrap();
        assert!(report.awaiting_content);
        assert!(report.documents.is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_partial_failures_do_not_abort() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();

        fs::write(dir.join("b-notes.txt"), "Alert threshold is one suspected case.").unwrap();
        fs::write(dir.join("a-broken.pdf"), "this is not a pdf").unwrap();
        fs::write(dir.join("c-image.png"), [0u8, 1, 2]).unwrap();
        write_docx(
            &dir.join("d-sop.docx"),
            "<w:p><w:r><w:t>Collect serum within 28 days.</w:t></w:r></w:p>",
        );
        fs::write(dir.join("e-empty.md"), "   \n").unwrap();

        let report = load_directory(dir).unwrap();
        assert!(!report.awaiting_content);

        let ids: Vec<&str> = report
            .documents
            .iter()
            .map(|d| d.source_id.as_str())
            .collect();
        assert_eq!(ids, vec!["b-notes.txt", "d-sop.docx"]);
        assert_eq!(report.documents[1].raw_text, "Collect serum within 28 days.");

        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].path.ends_with("a-broken.pdf"));
        assert!(report.failures[1].error.contains("No extractable text"));
    }
}
