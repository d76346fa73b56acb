//! PDF report backend
//!
//! A4 pages with the standard PDF fonts, so no font files are needed. Text
//! outside printable ASCII is replaced with `?`.

use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};

use super::report::{Block, ReportDocument, ReportInput, ReportRenderer};
use super::RenderedArtifact;
use crate::error::{ApiError, ApiResult};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
const PT_TO_MM: f32 = 0.3528;

/// Average glyph advance as a fraction of the font size
const PROPORTIONAL_ADVANCE: f32 = 0.5;
const MONOSPACE_ADVANCE: f32 = 0.6;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 14.0;
const SUBHEADING_SIZE: f32 = 11.0;
const BODY_SIZE: f32 = 10.0;
const TABLE_SIZE: f32 = 8.0;

/// Columns printed per table; the rest are summarized in a note
const MAX_TABLE_COLUMNS: usize = 12;

/// PDF report
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfReport;

impl ReportRenderer for PdfReport {
    fn render(&self, input: &ReportInput<'_>) -> ApiResult<RenderedArtifact> {
        let document = ReportDocument::build(input)?;
        let (bytes, pages) = write_pdf(&document)?;
        tracing::debug!(pages, bytes = bytes.len(), "Laid out PDF report");
        Ok(RenderedArtifact {
            content_type: "application/pdf",
            file_extension: "pdf",
            bytes,
        })
    }
}

/// Lay out every block; returns the file and its page count
fn write_pdf(document: &ReportDocument) -> ApiResult<(Vec<u8>, usize)> {
    let mut page = PageWriter::new(&document.title)?;
    let table_chars =
        ((PAGE_WIDTH - 2.0 * MARGIN) / (TABLE_SIZE * PT_TO_MM * MONOSPACE_ADVANCE)) as usize;

    for block in &document.blocks {
        match block {
            Block::Title(text) => {
                page.wrapped(text, TITLE_SIZE, Face::Bold, 0.0);
                page.gap(4.0);
            }
            Block::Heading(text) => {
                page.gap(3.0);
                // keep a heading on the same page as its first line
                page.reserve(PageWriter::line_height(HEADING_SIZE) * 3.0);
                page.wrapped(text, HEADING_SIZE, Face::Bold, 0.0);
                page.gap(2.0);
            }
            Block::Subheading(text) => {
                page.gap(2.0);
                page.wrapped(text, SUBHEADING_SIZE, Face::Bold, 0.0);
                page.gap(1.0);
            }
            Block::Paragraph(text) => {
                page.wrapped(text, BODY_SIZE, Face::Regular, 0.0);
                page.gap(2.0);
            }
            Block::Bullets(items) => {
                for item in items {
                    page.wrapped(&format!("- {}", item), BODY_SIZE, Face::Regular, 4.0);
                }
                page.gap(2.0);
            }
            Block::Table { header, rows } => {
                for (i, line) in table_lines(header, rows, table_chars).iter().enumerate() {
                    let face = if i == 0 { Face::MonoBold } else { Face::Mono };
                    page.line(line, TABLE_SIZE, face, 0.0);
                }
                page.gap(3.0);
            }
        }
    }

    let pages = page.pages;
    Ok((page.finish()?, pages))
}

#[derive(Debug, Clone, Copy)]
enum Face {
    Regular = 0,
    Bold = 1,
    Mono = 2,
    MonoBold = 3,
}

impl Face {
    fn advance(self) -> f32 {
        match self {
            Face::Mono | Face::MonoBold => MONOSPACE_ADVANCE,
            Face::Regular | Face::Bold => PROPORTIONAL_ADVANCE,
        }
    }
}

/// Top-down text cursor that adds pages as it runs out of room
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: [IndirectFontRef; 4],
    /// Baseline of the last line, in millimetres from the page bottom
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> ApiResult<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let fonts = [
            doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
            doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
            doc.add_builtin_font(BuiltinFont::Courier).map_err(pdf_error)?,
            doc.add_builtin_font(BuiltinFont::CourierBold).map_err(pdf_error)?,
        ];

        Ok(Self {
            doc,
            layer,
            fonts,
            y: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    fn line_height(size: f32) -> f32 {
        size * PT_TO_MM * 1.35
    }

    /// Start a new page unless `height` millimetres still fit
    fn reserve(&mut self, height: f32) {
        if self.y - height >= MARGIN {
            return;
        }
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Layer {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn line(&mut self, text: &str, size: f32, face: Face, indent: f32) {
        let height = Self::line_height(size);
        self.reserve(height);
        self.y -= height;
        self.layer.use_text(
            printable(text),
            size,
            Mm(MARGIN + indent),
            Mm(self.y),
            &self.fonts[face as usize],
        );
    }

    fn wrapped(&mut self, text: &str, size: f32, face: Face, indent: f32) {
        let width = PAGE_WIDTH - 2.0 * MARGIN - indent;
        let columns = (width / (size * PT_TO_MM * face.advance())) as usize;
        for line in wrap(text, columns.max(10)) {
            self.line(&line, size, face, indent);
        }
    }

    fn finish(self) -> ApiResult<Vec<u8>> {
        self.doc.save_to_bytes().map_err(pdf_error)
    }
}

/// Greedy word wrap; words longer than a line are split
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..columns).collect());
        }
        if word.is_empty() {
            continue;
        }

        let needed = word.len() + usize::from(!current.is_empty());
        if current.chars().count() + needed > columns {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Fixed-width text rows for a table: header, rule, body
fn table_lines(header: &[String], rows: &[Vec<String>], line_chars: usize) -> Vec<String> {
    let shown = header.len().min(MAX_TABLE_COLUMNS);
    let cap = (line_chars.saturating_sub(shown.saturating_sub(1)) / shown.max(1)).max(4);

    let widths: Vec<usize> = (0..shown)
        .map(|col| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .chain(header.get(col))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .clamp(1, cap)
        })
        .collect();

    let render = |cells: &[String]| {
        widths
            .iter()
            .enumerate()
            .map(|(col, width)| fit(cells.get(col).map(String::as_str).unwrap_or(""), *width))
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push(render(header));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join(" "),
    );
    lines.extend(rows.iter().map(|row| render(row)));
    if header.len() > shown {
        lines.push(format!("(+{} more columns)", header.len() - shown));
    }
    lines
}

/// Pad or cut a cell to exactly `width` characters
fn fit(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    } else {
        format!("{:<width$}", text, width = width)
    }
}

fn printable(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c,
            '\t' | '\n' | '\r' => ' ',
            _ => '?',
        })
        .collect()
}

fn pdf_error(e: printpdf::Error) -> ApiError {
    ApiError::Internal(format!("PDF rendering failed: {:?}", e))
}
