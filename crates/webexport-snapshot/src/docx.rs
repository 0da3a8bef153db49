//! HTML → Word conversion.
//!
//! [`AltChunkConverter`] wraps the HTML in an Office Open XML package whose
//! body is a single `w:altChunk` importing `word/afchunk.mht`. Word renders
//! the imported part as HTML when the document is opened. Embedded `data:`
//! images are lifted out of the markup into their own MIME parts.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use webexport_core::{Error, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const MHT_BOUNDARY: &str = "----=mhtDocumentPart";
const QP_LINE_LIMIT: usize = 76;
const BASE64_LINE_LIMIT: usize = 76;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Default Extension="mht" ContentType="message/rfc822"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rDocument" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="/word/document.xml"/>
</Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="htmlChunk" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/aFChunk" Target="/word/afchunk.mht"/>
</Relationships>"#;

/// Turns a self-contained HTML document into Word document bytes.
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, html: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page margins in twentieths of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
    pub header: u32,
    pub footer: u32,
    pub gutter: u32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 1440,
            right: 1440,
            bottom: 1440,
            left: 1440,
            header: 720,
            footer: 720,
            gutter: 0,
        }
    }
}

/// Section properties written into `word/document.xml`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSetup {
    pub orientation: Orientation,
    pub margins: Margins,
}

/// DOCX writer that imports the HTML through an altChunk.
#[derive(Debug, Clone, Default)]
pub struct AltChunkConverter {
    setup: PageSetup,
}

impl AltChunkConverter {
    pub fn new(setup: PageSetup) -> Self {
        Self { setup }
    }

    fn document_xml(&self) -> String {
        // US Letter
        let (width, height, orient) = match self.setup.orientation {
            Orientation::Portrait => (12240, 15840, "portrait"),
            Orientation::Landscape => (15840, 12240, "landscape"),
        };
        let m = self.setup.margins;
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <w:body>
    <w:altChunk r:id="htmlChunk"/>
    <w:sectPr>
      <w:pgSz w:w="{width}" w:h="{height}" w:orient="{orient}"/>
      <w:pgMar w:top="{}" w:right="{}" w:bottom="{}" w:left="{}" w:header="{}" w:footer="{}" w:gutter="{}"/>
    </w:sectPr>
  </w:body>
</w:document>"#,
            m.top, m.right, m.bottom, m.left, m.header, m.footer, m.gutter
        )
    }
}

impl DocumentConverter for AltChunkConverter {
    fn convert(&self, html: &str) -> Result<Vec<u8>> {
        let document = self.document_xml();
        let mht = mht_document(html);

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("_rels/.rels", ROOT_RELS_XML),
            ("word/document.xml", document.as_str()),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML),
            ("word/afchunk.mht", mht.as_str()),
        ];
        for (name, content) in parts {
            zip.start_file(name, options)
                .map_err(|e| Error::Conversion(format!("Failed to add {}: {}", name, e)))?;
            zip.write_all(content.as_bytes())?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| Error::Conversion(format!("Failed to finish document: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

/// An embedded resource carried as its own MIME part.
struct MhtPart {
    mime: String,
    location: String,
    base64: String,
}

fn mht_document(html: &str) -> String {
    let (html, parts) = extract_embedded_images(html);

    let mut out = String::with_capacity(html.len() + parts.iter().map(|p| p.base64.len()).sum::<usize>() + 1024);
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str("Content-Type: multipart/related;\r\n");
    out.push_str("    type=\"text/html\";\r\n");
    let _ = write!(out, "    boundary=\"{}\"\r\n\r\n\r\n", MHT_BOUNDARY);

    let _ = write!(out, "--{}\r\n", MHT_BOUNDARY);
    out.push_str("Content-Type: text/html;\r\n");
    out.push_str("    charset=\"utf-8\"\r\n");
    out.push_str("Content-Transfer-Encoding: quoted-printable\r\n");
    out.push_str("Content-Location: file:///C:/fake/document.html\r\n\r\n");
    out.push_str(&quoted_printable(&html));
    out.push_str("\r\n\r\n");

    for part in &parts {
        let _ = write!(out, "--{}\r\n", MHT_BOUNDARY);
        let _ = write!(out, "Content-Type: {}\r\n", part.mime);
        out.push_str("Content-Transfer-Encoding: base64\r\n");
        let _ = write!(out, "Content-Location: {}\r\n\r\n", part.location);
        for line in part.base64.as_bytes().chunks(BASE64_LINE_LIMIT) {
            // base64 is ASCII, chunk boundaries are char boundaries
            out.push_str(std::str::from_utf8(line).unwrap_or_default());
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
    }

    let _ = write!(out, "--{}--\r\n", MHT_BOUNDARY);
    out
}

const DATA_SOURCE: &str = "src=\"data:";

/// Replace every `src="data:...;base64,..."` attribute with a
/// `file:///C:/fake/...` location and return the lifted payloads.
fn extract_embedded_images(html: &str) -> (String, Vec<MhtPart>) {
    const PREFIX_LEN: usize = "src=\"".len();

    let mut out = String::with_capacity(html.len());
    let mut parts = Vec::new();
    let mut copied = 0;
    let mut search = 0;

    while let Some(pos) = next_data_source(html, search) {
        let value_start = pos + PREFIX_LEN;
        let Some(value_len) = html[value_start..].find('"') else {
            break;
        };
        let value = &html[value_start..value_start + value_len];
        out.push_str(&html[copied..value_start]);

        match parse_base64_data_url(value) {
            Some((mime, payload)) => {
                let location = format!(
                    "file:///C:/fake/image{}.{}",
                    parts.len(),
                    extension_for(mime)
                );
                out.push_str(&location);
                parts.push(MhtPart {
                    mime: mime.to_string(),
                    location,
                    base64: payload.to_string(),
                });
            }
            None => out.push_str(value),
        }
        copied = value_start + value_len;
        search = copied;
    }
    out.push_str(&html[copied..]);

    (out, parts)
}

/// Offset of the next `src="data:` that is a whole attribute, skipping
/// `<script>` bodies and names like `data-src`.
fn next_data_source(html: &str, from: usize) -> Option<usize> {
    let mut search = from;
    loop {
        let rest = &html[search..];
        let found = search + rest.find(DATA_SOURCE)?;
        if let Some(script) = rest.find("<script").map(|i| search + i).filter(|&i| i < found) {
            search = script + html[script..].find("</script>")?;
            continue;
        }
        search = found + DATA_SOURCE.len();
        if html[..found].ends_with(|c: char| c.is_ascii_whitespace()) {
            return Some(found);
        }
    }
}

fn parse_base64_data_url(value: &str) -> Option<(&str, &str)> {
    let (meta, payload) = value.strip_prefix("data:")?.split_once(',')?;
    let meta = meta.strip_suffix(";base64")?;
    let mime = meta.split(';').next().unwrap_or_default();
    Some((if mime.is_empty() { "application/octet-stream" } else { mime }, payload))
}

fn extension_for(mime: &str) -> &str {
    let subtype = mime.split_once('/').map(|(_, s)| s).unwrap_or("bin");
    match subtype {
        "svg+xml" => "svg",
        "x-icon" | "vnd.microsoft.icon" => "ico",
        "octet-stream" => "bin",
        other => other.split('+').next().unwrap_or("bin"),
    }
}

/// RFC 2045 quoted-printable with CRLF line endings and soft breaks.
fn quoted_printable(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for (i, line) in input.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        let bytes = line.strip_suffix('\r').unwrap_or(line).as_bytes();
        let mut width = 0;
        for (j, &byte) in bytes.iter().enumerate() {
            let last = j + 1 == bytes.len();
            let literal = match byte {
                b'=' => false,
                b' ' | b'\t' => !last,
                33..=126 => true,
                _ => false,
            };
            let needed = if literal { 1 } else { 3 };
            // Leave room for the trailing '=' of a soft break
            if width + needed > QP_LINE_LIMIT - 1 {
                out.push_str("=\r\n");
                width = 0;
            }
            if literal {
                out.push(byte as char);
            } else {
                let _ = write!(out, "={:02X}", byte);
            }
            width += needed;
        }
    }
    out
}
