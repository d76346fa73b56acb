//! Read-only rendering of session state (charts, reports)

pub mod chart;
pub mod pdf;
pub mod plot;
pub mod report;

pub use chart::{build_chart, ChartData, ChartSpec, ChartType};
pub use pdf::PdfReport;
pub use plot::{ChartRenderer, PngChart};
pub use report::{MarkdownReport, ReportDocument, ReportInput, ReportRenderer};

/// Opaque rendered file
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub content_type: &'static str,
    pub file_extension: &'static str,
    pub bytes: Vec<u8>,
}
