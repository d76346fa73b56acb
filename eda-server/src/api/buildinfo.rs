//! Build stamp of the running binary
//!
//! GET /api/buildinfo

use std::fmt;

use axum::{extract::State, Json};
use eda_common::config::ReportFormat;
use serde::Serialize;

use crate::AppState;

/// Values captured by build.rs
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_commit: &'static str,
    /// Working tree had uncommitted changes at build time
    pub git_dirty: bool,
    pub built_at: &'static str,
    pub profile: &'static str,
    pub target: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_commit: env!("EDA_GIT_COMMIT"),
            git_dirty: matches!(env!("EDA_GIT_DIRTY"), "true"),
            built_at: env!("EDA_BUILT_AT"),
            profile: env!("EDA_BUILD_PROFILE"),
            target: env!("EDA_BUILD_TARGET"),
        }
    }
}

impl fmt::Display for BuildInfo {
    /// `0.1.0 (1a2b3c4d-dirty, release, x86_64-unknown-linux-gnu, built ...)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.version, self.git_commit)?;
        if self.git_dirty {
            f.write_str("-dirty")?;
        }
        write!(f, ", {}, {}, built {})", self.profile, self.target, self.built_at)
    }
}

/// Build stamp plus the rendering backends this instance serves
#[derive(Debug, Serialize)]
pub struct BuildInfoResponse {
    #[serde(flatten)]
    pub build: BuildInfo,
    pub report_format: ReportFormat,
    pub chart_labels: bool,
}

/// GET /api/buildinfo
pub async fn get_build_info(State(state): State<AppState>) -> Json<BuildInfoResponse> {
    Json(BuildInfoResponse {
        build: BuildInfo::current(),
        report_format: state.config.reports.format,
        chart_labels: state.chart_renderer.labelled(),
    })
}
