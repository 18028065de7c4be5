//! Per-step reports printed by the warming-dl CLI

use std::fmt;

use log::error;
use serde::Serialize;
use warming_dl::QueueSummary;

use crate::cli::catalog::Dataset;
use crate::cli::progress::ProgressManager;
use crate::cli::series::{self, SeriesSummary};

/// One line of CLI output
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StepReport<'a> {
    Series {
        index: usize,
        title: &'a str,
        color: &'a str,
        primary: bool,
        #[serde(flatten)]
        summary: SeriesSummary,
    },
    FollowUp {
        index: usize,
        title: &'a str,
        url: String,
    },
    Failed {
        index: usize,
        title: &'a str,
        error: String,
    },
    Completed {
        #[serde(flatten)]
        summary: QueueSummary,
    },
}

fn format_value(value: Option<f32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

impl fmt::Display for StepReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepReport::Series { index, title, primary, summary, .. } => {
                let marker = if *primary { "★" } else { "✅" };
                write!(
                    f,
                    "{marker} [{index}] {title}: {} points ({} .. {}), min {}, max {}, last {}",
                    summary.points,
                    summary.first_label.as_deref().unwrap_or("-"),
                    summary.last_label.as_deref().unwrap_or("-"),
                    format_value(summary.min),
                    format_value(summary.max),
                    format_value(summary.last),
                )
            }
            StepReport::FollowUp { index, title, url } => {
                write!(f, "🔗 [{index}] {title}: following {url}")
            }
            StepReport::Failed { index, title, error } => {
                write!(f, "❌ [{index}] Cannot download {title}: {error}")
            }
            StepReport::Completed { summary } => {
                write!(
                    f,
                    "🌍 All data downloaded: {} succeeded, {} failed",
                    summary.succeeded, summary.failed
                )
            }
        }
    }
}

/// Formats reports as text or JSON lines and keeps the progress bar in step
pub struct Reporter {
    json: bool,
    progress: ProgressManager,
}

impl Reporter {
    pub fn new(json: bool, progress: ProgressManager) -> Self {
        Self { json, progress }
    }

    pub fn emit(&self, report: &StepReport<'_>) {
        let line = if self.json {
            match serde_json::to_string(report) {
                Ok(line) => line,
                Err(e) => {
                    error!("Cannot serialize report: {e}");
                    return;
                }
            }
        } else {
            report.to_string()
        };
        self.progress.println(&line);
    }

    /// Turn downloaded CSV into a series report, or a failure if it doesn't parse
    pub fn series(&self, index: usize, dataset: &Dataset, data: &str) {
        let extracted = series::extract(
            data,
            dataset.header_rows,
            dataset.value_column,
            dataset.label_column,
        );
        match extracted {
            Ok(series) if series.is_empty() => {
                self.failed(index, dataset, "no data rows after the header")
            }
            Ok(series) => self.emit(&StepReport::Series {
                index,
                title: &dataset.title,
                color: &dataset.color,
                primary: dataset.primary,
                summary: series.summary(),
            }),
            Err(e) => self.failed(index, dataset, &format!("invalid data: {e}")),
        }
    }

    pub fn failed(&self, index: usize, dataset: &Dataset, error: &str) {
        self.emit(&StepReport::Failed {
            index,
            title: &dataset.title,
            error: error.to_string(),
        });
    }

    pub fn progress(&self) -> &ProgressManager {
        &self.progress
    }
}
