//! EDA report content
//!
//! [`ReportDocument`] holds the sections of a report independently of the
//! output format. Backends ([`MarkdownReport`], [`super::pdf::PdfReport`])
//! only lay the blocks out.

use std::collections::HashSet;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use eda_common::sanitize::finite;
use polars::prelude::*;
use serde_json::Value;

use super::RenderedArtifact;
use crate::dataset::{ColumnKind, Dataset};
use crate::error::{ApiError, ApiResult};

/// Rows shown in the data sample section
pub const SAMPLE_ROWS: usize = 5;

/// Widest correlation matrix included in a report
pub const MAX_CORRELATION_COLUMNS: usize = 8;

/// Everything a renderer may read; renderers never see the store
#[derive(Debug)]
pub struct ReportInput<'a> {
    pub filename: &'a str,
    pub current: &'a Dataset,
    pub original_shape: [usize; 2],
    /// Server-side action log
    pub actions: &'a [String],
    /// Free-form history supplied by the dashboard
    pub user_actions: &'a [Value],
    pub generated_at: DateTime<Utc>,
}

/// Turns a session's state into a downloadable document
pub trait ReportRenderer: Send + Sync {
    fn render(&self, input: &ReportInput<'_>) -> ApiResult<RenderedArtifact>;
}

/// One layout unit of a report
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    Subheading(String),
    Paragraph(String),
    Bullets(Vec<String>),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

/// Format-independent report content
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl ReportDocument {
    pub fn build(input: &ReportInput<'_>) -> ApiResult<Self> {
        let table = input.current;
        let title = "Exploratory Data Analysis Report".to_string();
        let mut blocks = vec![
            Block::Title(title.clone()),
            Block::Bullets(vec![
                format!("File: {}", input.filename),
                format!(
                    "Generated: {}",
                    input.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                format!(
                    "Rows: {}, Columns: {} (uploaded with {} rows, {} columns)",
                    table.height(),
                    table.width(),
                    input.original_shape[0],
                    input.original_shape[1]
                ),
            ]),
        ];

        let missing: usize = table.null_counts().values().sum();
        let numeric = table.columns_where(ColumnKind::is_numeric);
        let categorical = table.columns_where(|kind| !kind.is_numeric());

        blocks.push(Block::Heading("1. Data Overview".to_string()));
        blocks.push(Block::Bullets(vec![
            format!("Missing Values: {}", missing),
            format!("Duplicate Rows: {}", duplicate_rows(table)?),
            format!("Numeric Columns: {}", numeric.join(", ")),
            format!("Categorical Columns: {}", categorical.join(", ")),
        ]));

        if table.width() > 0 {
            blocks.push(Block::Subheading(format!(
                "Data Sample (first {} rows)",
                SAMPLE_ROWS
            )));
            let rows = (0..SAMPLE_ROWS.min(table.height()))
                .map(|row| table.row_text(row))
                .collect::<ApiResult<Vec<_>>>()?;
            blocks.push(Block::Table {
                header: table.column_names(),
                rows,
            });
        }

        blocks.push(Block::Heading("2. Processing Steps".to_string()));
        if input.actions.is_empty() {
            blocks.push(Block::Paragraph(
                "No processing steps recorded".to_string(),
            ));
        } else {
            blocks.push(Block::Bullets(input.actions.to_vec()));
        }

        if !numeric.is_empty() {
            blocks.push(Block::Heading("3. Numeric Summary".to_string()));
            blocks.push(numeric_summary(table, &numeric)?);

            if numeric.len() > 1 {
                let shown = &numeric[..numeric.len().min(MAX_CORRELATION_COLUMNS)];
                blocks.push(Block::Subheading("Correlation Matrix".to_string()));
                blocks.push(correlation_table(table, shown)?);
            }
        }

        if !input.user_actions.is_empty() {
            blocks.push(Block::Heading("4. User Actions".to_string()));
            blocks.push(Block::Bullets(
                input
                    .user_actions
                    .iter()
                    .map(|action| match action {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ));
        }

        Ok(Self { title, blocks })
    }
}

fn numeric_summary(table: &Dataset, numeric: &[String]) -> ApiResult<Block> {
    let header = ["column", "count", "mean", "std", "min", "max"]
        .map(String::from)
        .to_vec();
    let mut rows = Vec::with_capacity(numeric.len());
    for column in numeric {
        let values = table.float_chunked(column)?;
        rows.push(vec![
            column.clone(),
            (values.len() - values.null_count()).to_string(),
            number(values.mean()),
            number(values.std(1)),
            number(values.min()),
            number(values.max()),
        ]);
    }
    Ok(Block::Table { header, rows })
}

fn correlation_table(table: &Dataset, columns: &[String]) -> ApiResult<Block> {
    let values = columns
        .iter()
        .map(|column| table.float_values(column))
        .collect::<ApiResult<Vec<_>>>()?;

    let mut header = vec![String::new()];
    header.extend(columns.iter().cloned());
    let rows = columns
        .iter()
        .zip(&values)
        .map(|(name, left)| {
            let mut row = vec![name.clone()];
            row.extend(values.iter().map(|right| number(pearson(left, right))));
            row
        })
        .collect();
    Ok(Block::Table { header, rows })
}

/// Pearson correlation over rows where both values are present
pub fn pearson(left: &[Option<f64>], right: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = left
        .iter()
        .zip(right)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0f64, 0.0f64, 0.0f64);
    for (a, b) in &pairs {
        cov += (a - mean_a) * (b - mean_b);
        var_a += (a - mean_a).powi(2);
        var_b += (b - mean_b).powi(2);
    }
    finite(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Rows identical to an earlier row
fn duplicate_rows(table: &Dataset) -> ApiResult<usize> {
    let mut seen = HashSet::with_capacity(table.height());
    let mut duplicates = 0;
    for row in 0..table.height() {
        if !seen.insert(table.row_text(row)?) {
            duplicates += 1;
        }
    }
    Ok(duplicates)
}

fn number(value: Option<f64>) -> String {
    match value.and_then(finite) {
        Some(v) => format!("{:.4}", v),
        None => "n/a".to_string(),
    }
}

/// Markdown report
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownReport;

impl ReportRenderer for MarkdownReport {
    fn render(&self, input: &ReportInput<'_>) -> ApiResult<RenderedArtifact> {
        let document = ReportDocument::build(input)?;
        let text = markdown(&document).map_err(fmt_error)?;
        Ok(RenderedArtifact {
            content_type: "text/markdown; charset=utf-8",
            file_extension: "md",
            bytes: text.into_bytes(),
        })
    }
}

fn markdown(document: &ReportDocument) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    for block in &document.blocks {
        match block {
            Block::Title(text) => writeln!(out, "# {}\n", text)?,
            Block::Heading(text) => writeln!(out, "## {}\n", text)?,
            Block::Subheading(text) => writeln!(out, "### {}\n", text)?,
            Block::Paragraph(text) => writeln!(out, "{}\n", text)?,
            Block::Bullets(items) => {
                for item in items {
                    writeln!(out, "- {}", item)?;
                }
                out.push('\n');
            }
            Block::Table { header, rows } => {
                let header: Vec<String> = header.iter().map(|c| escape_cell(c)).collect();
                writeln!(out, "| {} |", header.join(" | "))?;
                writeln!(out, "|{}", "---|".repeat(header.len()))?;
                for row in rows {
                    let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
                    writeln!(out, "| {} |", cells.join(" | "))?;
                }
                out.push('\n');
            }
        }
    }
    Ok(out)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn fmt_error(e: std::fmt::Error) -> ApiError {
    ApiError::Internal(format!("Report formatting failed: {}", e))
}
