//! Data models for the dashboard.
//!
//! This module contains the core data structures used throughout the
//! application: normalized feed tables, aggregates, and the assembled
//! dashboard handed to the report generator.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of one HIS feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedId {
    /// Operation theater schedule.
    Ot,
    /// Admissions for the reporting window.
    Admissions,
    /// Discharge tracking report.
    Discharges,
    /// Radiology patient bookings.
    Radiology,
    /// Doctor-wise outpatient appointments.
    Opd,
    /// Current bed status (inpatient occupancy).
    BedStatus,
}

impl FeedId {
    /// Returns the short identifier used in logs and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedId::Ot => "ot",
            FeedId::Admissions => "admissions",
            FeedId::Discharges => "discharges",
            FeedId::Radiology => "radiology",
            FeedId::Opd => "opd",
            FeedId::BedStatus => "bed-status",
        }
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One record of a feed: column name to scalar JSON value.
pub type Row = Map<String, Value>;

/// Normalized result of one feed fetch.
///
/// Columns are the keys of the first row, in payload order. Later rows may
/// be ragged; a key missing from a row reads as null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table from already-normalized parts.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether any row carries the column.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name) || self.rows.iter().any(|r| r.contains_key(name))
    }

    /// Text value of a cell, or `None` for null and absent cells.
    #[cfg(test)]
    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        self.rows.get(row)?.get(column).and_then(cell_text)
    }

    /// Text values of a column in row order.
    pub fn column_text<'a>(&'a self, column: &'a str) -> impl Iterator<Item = Option<String>> + 'a {
        self.rows.iter().map(move |r| r.get(column).and_then(cell_text))
    }

    /// Returns a new table with an extra (or replaced) column.
    ///
    /// `values` is aligned with the rows; `None` stores a null.
    pub fn with_column(&self, name: &str, values: Vec<Option<String>>) -> Table {
        let mut columns = self.columns.clone();
        if !columns.iter().any(|c| c == name) {
            columns.push(name.to_string());
        }

        let rows = self
            .rows
            .iter()
            .zip(values.into_iter().chain(std::iter::repeat(None)))
            .map(|(row, value)| {
                let mut row = row.clone();
                row.insert(
                    name.to_string(),
                    value.map(Value::String).unwrap_or(Value::Null),
                );
                row
            })
            .collect();

        Table { columns, rows }
    }
}

/// Render a scalar cell as a grouping key.
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// One group of a grouped count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: String,
    pub count: usize,
}

/// A named grouped count over one dimension, sorted by descending count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounts {
    pub name: String,
    pub dimension: String,
    pub groups: Vec<GroupCount>,
}

impl GroupCounts {
    /// Sum of all group counts.
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Count for one group, zero when the group is absent.
    pub fn get(&self, key: &str) -> usize {
        self.groups
            .iter()
            .find(|g| g.key == key)
            .map(|g| g.count)
            .unwrap_or(0)
    }

    /// The first `n` groups plus the summed count of the rest.
    pub fn top(&self, n: usize) -> (&[GroupCount], usize) {
        let split = n.min(self.groups.len());
        let rest = self.groups[split..].iter().map(|g| g.count).sum();
        (&self.groups[..split], rest)
    }

    /// Named scalar counts, in group order.
    pub fn as_named_counts(&self) -> Vec<(String, usize)> {
        self.groups
            .iter()
            .map(|g| (g.key.clone(), g.count))
            .collect()
    }
}

/// One entry of a percentage split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub name: String,
    pub count: usize,
    /// Share of the total in percent (0.0 - 100.0).
    pub percent: f64,
}

/// Age bracket derived from a HIS age string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBracket {
    Adult,
    Paediatric,
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeBracket::Adult => write!(f, "Adult"),
            AgeBracket::Paediatric => write!(f, "Paediatric"),
        }
    }
}

/// How the presentation layer should draw a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Area,
    Line,
    Pie,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKind::Bar => write!(f, "bar"),
            ChartKind::Area => write!(f, "area"),
            ChartKind::Line => write!(f, "line"),
            ChartKind::Pie => write!(f, "pie"),
        }
    }
}

/// The aggregate behind a panel's chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breakdown {
    Counts(GroupCounts),
    Split { shares: Vec<Share> },
}

/// Content of a panel: either computed values or the feed error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PanelContent {
    Ready {
        /// Headline number shown in the tile.
        tile: usize,
        breakdown: Breakdown,
        /// Optional remark, e.g. "no data for range".
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Failed {
        error: String,
        /// Start of the rejected response body, when the feed sent one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

/// One cell of the dashboard grid: a tile plus a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// Tile title.
    pub title: String,
    /// Chart title.
    pub chart_title: String,
    pub chart: ChartKind,
    /// Feeds the panel is computed from.
    pub feeds: Vec<FeedId>,
    pub content: PanelContent,
}

impl Panel {
    pub fn is_failed(&self) -> bool {
        matches!(self.content, PanelContent::Failed { .. })
    }

    /// Tile value, `None` for failed panels.
    pub fn tile(&self) -> Option<usize> {
        match self.content {
            PanelContent::Ready { tile, .. } => Some(tile),
            PanelContent::Failed { .. } => None,
        }
    }
}

/// Outcome of fetching one feed during the cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedStatus {
    pub feed: FeedId,
    pub name: String,
    pub url: String,
    /// Row count when the feed loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    /// Error message when the feed failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Start of the rejected response body, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FeedStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Metadata about one render cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetadata {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    /// Calendar day treated as "today" for date-windowed feeds.
    pub report_date: NaiveDate,
    pub base_url: String,
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    pub duration_seconds: f64,
}

/// The complete dashboard of one render cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub metadata: DashboardMetadata,
    pub feeds: Vec<FeedStatus>,
    pub panels: Vec<Panel>,
}

impl Dashboard {
    pub fn failed_panels(&self) -> usize {
        self.panels.iter().filter(|p| p.is_failed()).count()
    }
}
