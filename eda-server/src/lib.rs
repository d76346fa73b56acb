//! eda-server library
//!
//! HTTP backend for the EDA dashboard: uploaded tables live in in-memory
//! sessions and are cleaned through a small mutation pipeline.

pub mod api;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use eda_common::config::{ReportFormat, TomlConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::render::{ChartRenderer, MarkdownReport, PdfReport, PngChart, ReportRenderer};
use crate::session::SessionStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Dataset sessions
    pub sessions: SessionStore,
    /// Resolved bootstrap configuration
    pub config: Arc<TomlConfig>,
    /// Report backend used by /api/report
    pub report_renderer: Arc<dyn ReportRenderer>,
    /// Image backend used by /api/visualization/generate
    pub chart_renderer: Arc<dyn ChartRenderer>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: TomlConfig) -> Self {
        let report_renderer: Arc<dyn ReportRenderer> = match config.reports.format {
            ReportFormat::Pdf => Arc::new(PdfReport),
            ReportFormat::Markdown => Arc::new(MarkdownReport),
        };
        let chart_renderer = PngChart::from_config(&config.charts).unwrap_or_else(|e| {
            warn!("Chart labels disabled: {}", e);
            PngChart::new(config.charts.width, config.charts.height)
        });

        Self {
            sessions: SessionStore::new(config.lock_timeout()),
            config: Arc::new(config),
            report_renderer,
            chart_renderer: Arc::new(chart_renderer),
            startup_time: Utc::now(),
        }
    }

    /// Swap the report backend
    pub fn with_report_renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.report_renderer = renderer;
        self
    }

    /// Swap the chart backend
    pub fn with_chart_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.chart_renderer = renderer;
        self
    }

    /// Rows included in table previews
    pub fn preview_rows(&self) -> usize {
        self.config.preview_rows
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(api::root_routes())
        .merge(api::health_routes())
        .merge(api::upload_routes(state.config.max_upload_bytes))
        .merge(api::overview_routes())
        .merge(api::cleaning_routes())
        .merge(api::outlier_routes())
        .merge(api::visualization_routes())
        .merge(api::download_routes())
        .merge(api::report_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
