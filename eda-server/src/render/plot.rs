//! PNG chart drawing
//!
//! Charts are drawn from [`ChartData`] only, so the picture always matches
//! the JSON the data endpoint returns. Titles and axis labels need a font
//! file (`charts.font_path`); without one the plot is drawn unlabeled.

use std::error::Error as StdError;
use std::ops::Range;
use std::path::Path;

use eda_common::config::ChartConfig;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use tracing::info;

use super::chart::{ChartData, ChartType, SeriesData};
use super::RenderedArtifact;
use crate::error::{ApiError, ApiResult};

/// Family name the label font is registered under
const LABEL_FONT: &str = "sans-serif";

/// Share of a category slot covered by its bars or boxes
const SLOT_FILL: f64 = 0.8;

type DrawResult = Result<(), Box<dyn StdError>>;

/// Turns chart data into an image
pub trait ChartRenderer: Send + Sync {
    fn render(&self, chart: &ChartData) -> ApiResult<RenderedArtifact>;

    /// Whether titles and axis labels are drawn
    fn labelled(&self) -> bool {
        false
    }
}

/// Bitmap charts encoded as PNG
#[derive(Debug, Clone, Copy)]
pub struct PngChart {
    width: u32,
    height: u32,
    labels: bool,
}

impl PngChart {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            labels: false,
        }
    }

    /// Size from config, with labels when a font file is configured
    pub fn from_config(config: &ChartConfig) -> eda_common::Result<Self> {
        let chart = Self::new(config.width, config.height);
        match &config.font_path {
            Some(path) => chart.with_label_font(path),
            None => Ok(chart),
        }
    }

    /// Register a TrueType/OpenType font and draw titles and axis labels
    pub fn with_label_font(mut self, path: &Path) -> eda_common::Result<Self> {
        let bytes = std::fs::read(path)?;
        // plotters keeps registered fonts for the life of the process
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        register_font(LABEL_FONT, FontStyle::Normal, bytes).map_err(|_| {
            eda_common::Error::Config(format!("{} is not a usable font", path.display()))
        })?;

        info!(font = %path.display(), "Chart labels enabled");
        self.labels = true;
        Ok(self)
    }

    fn draw(&self, chart: &ChartData, pixels: &mut [u8]) -> DrawResult {
        let root = BitMapBackend::with_buffer(pixels, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let frame = Frame::of(chart);
        let mut builder = ChartBuilder::on(&root);
        builder.margin(20);
        if self.labels {
            builder
                .caption(title(chart), (LABEL_FONT, 22).into_font())
                .x_label_area_size(40)
                .y_label_area_size(60);
        }
        let mut plot = builder.build_cartesian_2d(frame.x.clone(), frame.y.clone())?;

        if self.labels {
            let categories = frame.categories.clone();
            let category_label = move |x: &f64| category_at(&categories, *x);
            let mut mesh = plot.configure_mesh();
            mesh.disable_x_mesh().x_desc(chart.x_col.as_str());
            if let Some(y_col) = &chart.y_col {
                mesh.y_desc(y_col.as_str());
            } else if chart.chart_type == ChartType::Histogram {
                mesh.y_desc("count");
            }
            if !frame.categories.is_empty() {
                mesh.x_labels(frame.categories.len())
                    .x_label_formatter(&category_label);
            }
            mesh.draw()?;
        } else {
            plot.plotting_area().draw(&Rectangle::new(
                [(frame.x.start, frame.y.start), (frame.x.end, frame.y.end)],
                BLACK.stroke_width(1),
            ))?;
        }

        let area = plot.plotting_area();
        let count = chart.series.len();
        for (index, series) in chart.series.iter().enumerate() {
            let color = Palette99::pick(index);

            match &series.data {
                SeriesData::Grouped { labels, values } => {
                    let placed: Vec<(usize, f64)> = labels
                        .iter()
                        .zip(values)
                        .filter_map(|(label, value)| Some((frame.slot(label)?, (*value)?)))
                        .collect();

                    if chart.chart_type == ChartType::Bar {
                        for (slot, value) in placed {
                            let (left, right) = band(slot, index, count);
                            area.draw(&Rectangle::new([(left, 0.0), (right, value)], color.filled()))?;
                        }
                    } else {
                        let points: Vec<(f64, f64)> = placed
                            .into_iter()
                            .map(|(slot, value)| (slot as f64, value))
                            .collect();
                        area.draw(&PathElement::new(points.clone(), color.stroke_width(2)))?;
                        for point in points {
                            area.draw(&Circle::new(point, 3, color.filled()))?;
                        }
                    }
                }
                SeriesData::Points { x, y } => {
                    for point in x.iter().copied().zip(y.iter().copied()) {
                        area.draw(&Circle::new(point, 3, color.mix(0.7).filled()))?;
                    }
                }
                SeriesData::Bins { edges, counts } => {
                    for (edge, hits) in edges.windows(2).zip(counts) {
                        let corners = [(edge[0], 0.0), (edge[1], *hits as f64)];
                        area.draw(&Rectangle::new(corners, color.mix(0.5).filled()))?;
                        area.draw(&Rectangle::new(corners, color.stroke_width(1)))?;
                    }
                }
                SeriesData::Boxes { labels, boxes } => {
                    for (label, summary) in labels.iter().zip(boxes) {
                        let Some(slot) = frame.slot(label) else {
                            continue;
                        };
                        let (left, right) = band(slot, index, count);
                        let mid = (left + right) / 2.0;
                        let body = [(left, summary.q1), (right, summary.q3)];

                        area.draw(&Rectangle::new(body, color.mix(0.3).filled()))?;
                        area.draw(&Rectangle::new(body, color.stroke_width(1)))?;
                        for segment in [
                            [(left, summary.median), (right, summary.median)],
                            [(mid, summary.min), (mid, summary.q1)],
                            [(mid, summary.q3), (mid, summary.max)],
                            [(mid - (mid - left) / 2.0, summary.min), (mid + (mid - left) / 2.0, summary.min)],
                            [(mid - (mid - left) / 2.0, summary.max), (mid + (mid - left) / 2.0, summary.max)],
                        ] {
                            area.draw(&PathElement::new(segment.to_vec(), color.stroke_width(2)))?;
                        }
                    }
                }
            }
        }

        root.present()?;
        Ok(())
    }
}

impl ChartRenderer for PngChart {
    fn render(&self, chart: &ChartData) -> ApiResult<RenderedArtifact> {
        let mut pixels = vec![0u8; self.width as usize * self.height as usize * 3];
        self.draw(chart, &mut pixels)
            .map_err(|e| ApiError::Internal(format!("Chart drawing failed: {}", e)))?;

        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(&pixels, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| ApiError::Internal(format!("PNG encoding failed: {}", e)))?;

        Ok(RenderedArtifact {
            content_type: "image/png",
            file_extension: "png",
            bytes,
        })
    }

    fn labelled(&self) -> bool {
        self.labels
    }
}

fn title(chart: &ChartData) -> String {
    let kind = chart.chart_type.as_str();
    let base = match &chart.y_col {
        Some(y) => format!("{} chart of {} by {}", kind, y, chart.x_col),
        None => format!("{} of {}", kind, chart.x_col),
    };
    match &chart.hue_col {
        Some(hue) => format!("{} (hue: {})", base, hue),
        None => base,
    }
}

/// Category name for an integer x position, blank between slots
fn category_at(categories: &[String], x: f64) -> String {
    let slot = x.round();
    if (x - slot).abs() > 1e-6 || slot < 0.0 {
        return String::new();
    }
    categories.get(slot as usize).cloned().unwrap_or_default()
}

/// Horizontal span of series `series` (of `count`) inside slot `slot`
fn band(slot: usize, series: usize, count: usize) -> (f64, f64) {
    let width = SLOT_FILL / count.max(1) as f64;
    let left = slot as f64 - SLOT_FILL / 2.0 + width * series as f64;
    (left + width * 0.1, left + width * 0.9)
}

/// Coordinate ranges and category slots of a chart
#[derive(Debug, PartialEq)]
struct Frame {
    x: Range<f64>,
    y: Range<f64>,
    /// x labels in first-seen order across series; empty for numeric x
    categories: Vec<String>,
}

impl Frame {
    fn of(chart: &ChartData) -> Self {
        let mut categories: Vec<String> = Vec::new();
        let mut xs = Extent::default();
        let mut ys = Extent::default();

        let mut add_categories = |labels: &[String]| {
            for label in labels {
                if !categories.contains(label) {
                    categories.push(label.clone());
                }
            }
        };

        for series in &chart.series {
            match &series.data {
                SeriesData::Grouped { labels, values } => {
                    add_categories(labels);
                    values.iter().flatten().for_each(|v| ys.include(*v));
                    if chart.chart_type == ChartType::Bar {
                        ys.include(0.0);
                    }
                }
                SeriesData::Points { x, y } => {
                    x.iter().for_each(|v| xs.include(*v));
                    y.iter().for_each(|v| ys.include(*v));
                }
                SeriesData::Bins { edges, counts } => {
                    edges.iter().for_each(|v| xs.include(*v));
                    counts.iter().for_each(|c| ys.include(*c as f64));
                    ys.include(0.0);
                }
                SeriesData::Boxes { labels, boxes } => {
                    add_categories(labels);
                    for summary in boxes {
                        ys.include(summary.min);
                        ys.include(summary.max);
                    }
                }
            }
        }

        let x = if categories.is_empty() {
            xs.range()
        } else {
            -0.5..categories.len() as f64 - 0.5
        };
        Self {
            x,
            y: ys.range(),
            categories,
        }
    }

    fn slot(&self, label: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == label)
    }
}

/// Running min/max of finite values
#[derive(Debug, Default)]
struct Extent(Option<(f64, f64)>);

impl Extent {
    fn include(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.0 = Some(match self.0 {
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
            None => (value, value),
        });
    }

    /// Padded range; degenerate extents still get a visible span
    fn range(&self) -> Range<f64> {
        match self.0 {
            None => 0.0..1.0,
            Some((lo, hi)) if lo == hi => {
                let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
                (lo - pad)..(hi + pad)
            }
            Some((lo, hi)) => {
                let pad = (hi - lo) * 0.05;
                (lo - pad)..(hi + pad)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::chart::{ChartSeries, FiveNumberSummary};
    use image::{GenericImageView, ImageFormat};

    fn chart(chart_type: ChartType, series: Vec<ChartSeries>) -> ChartData {
        ChartData {
            chart_type,
            x_col: "x".to_string(),
            y_col: Some("y".to_string()),
            hue_col: None,
            series,
        }
    }

    fn unnamed(data: SeriesData) -> ChartSeries {
        ChartSeries { name: None, data }
    }

    fn decode(bytes: &[u8]) -> image::DynamicImage {
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
        image::load_from_memory_with_format(bytes, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_bar_chart_png() {
        let data = chart(
            ChartType::Bar,
            vec![unnamed(SeriesData::Grouped {
                labels: vec!["a".to_string(), "b".to_string()],
                values: vec![Some(2.0), Some(4.0)],
            })],
        );
        let artifact = PngChart::new(320, 240).render(&data).unwrap();
        assert_eq!(artifact.content_type, "image/png");

        let picture = decode(&artifact.bytes);
        assert_eq!(picture.dimensions(), (320, 240));
        assert!(picture
            .to_rgb8()
            .pixels()
            .any(|p| p.0 != [255, 255, 255] && p.0 != [0, 0, 0]));
    }

    #[test]
    fn test_every_chart_shape_renders() {
        let renderer = PngChart::new(300, 200);
        let shapes = vec![
            chart(
                ChartType::Line,
                vec![unnamed(SeriesData::Grouped {
                    labels: vec!["jan".to_string(), "feb".to_string()],
                    values: vec![Some(1.0), None],
                })],
            ),
            chart(
                ChartType::Scatter,
                vec![unnamed(SeriesData::Points {
                    x: vec![1.0, 2.0],
                    y: vec![-3.0, 5.0],
                })],
            ),
            chart(
                ChartType::Histogram,
                vec![unnamed(SeriesData::Bins {
                    edges: Vec::new(),
                    counts: Vec::new(),
                })],
            ),
            chart(
                ChartType::Box,
                vec![unnamed(SeriesData::Boxes {
                    labels: vec!["a".to_string()],
                    boxes: vec![FiveNumberSummary {
                        min: 1.0,
                        q1: 2.0,
                        median: 3.0,
                        q3: 4.0,
                        max: 9.0,
                    }],
                })],
            ),
        ];

        for data in shapes {
            let artifact = renderer.render(&data).unwrap();
            assert_eq!(decode(&artifact.bytes).dimensions(), (300, 200));
        }
    }

    #[test]
    fn test_frame_merges_categories_across_series() {
        let data = chart(
            ChartType::Bar,
            vec![
                ChartSeries {
                    name: Some("east".to_string()),
                    data: SeriesData::Grouped {
                        labels: vec!["a".to_string(), "b".to_string()],
                        values: vec![Some(10.0), Some(20.0)],
                    },
                },
                ChartSeries {
                    name: Some("west".to_string()),
                    data: SeriesData::Grouped {
                        labels: vec!["c".to_string(), "a".to_string()],
                        values: vec![Some(5.0), None],
                    },
                },
            ],
        );
        let frame = Frame::of(&data);
        assert_eq!(frame.categories, vec!["a", "b", "c"]);
        assert_eq!(frame.x, -0.5..2.5);
        assert!((frame.y.start + 1.0).abs() < 1e-9 && (frame.y.end - 21.0).abs() < 1e-9);
        assert_eq!(frame.slot("c"), Some(2));
    }

    #[test]
    fn test_histogram_frame_spans_edges() {
        let data = chart(
            ChartType::Histogram,
            vec![unnamed(SeriesData::Bins {
                edges: vec![0.0, 5.0, 10.0],
                counts: vec![3, 1],
            })],
        );
        let frame = Frame::of(&data);
        assert!(frame.categories.is_empty());
        assert_eq!(frame.x, -0.5..10.5);
        assert!((frame.y.start + 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_bands_split_a_slot() {
        let (left, right) = band(1, 0, 1);
        assert!((left - 0.68).abs() < 1e-9 && (right - 1.32).abs() < 1e-9);

        let (_, first_right) = band(0, 0, 2);
        let (second_left, _) = band(0, 1, 2);
        assert!(first_right < second_left);
    }

    #[test]
    fn test_category_labels_only_on_slots() {
        let categories = vec!["a".to_string(), "b".to_string()];
        assert_eq!(category_at(&categories, 1.0), "b");
        assert_eq!(category_at(&categories, 0.5), "");
        assert_eq!(category_at(&categories, 5.0), "");
        assert_eq!(category_at(&categories, -1.0), "");
    }

    #[test]
    fn test_missing_font_file_rejected() {
        let err = PngChart::new(300, 200)
            .with_label_font(Path::new("/nonexistent/label.ttf"))
            .unwrap_err();
        assert!(matches!(err, eda_common::Error::Io(_)));
    }
}
