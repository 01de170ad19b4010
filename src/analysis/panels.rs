//! Dashboard assembly.
//!
//! Maps the tables of one render cycle onto the fixed grid of panels.
//! A panel whose feed failed carries the error instead of values; the
//! other panels are computed normally.

use crate::analysis::aggregator::{
    age_bracket_counts, classify_into, filter_count, group_count, group_count_where,
    non_null_count, percent_split, row_count, Buckets, LIVER_BUCKET, LIVER_SPECIALTIES,
    NON_LIVER_BUCKET,
};
use crate::error::{AggregateError, FeedError};
use crate::models::{
    Breakdown, ChartKind, Dashboard, DashboardMetadata, FeedId, FeedStatus, Panel, PanelContent,
    Table,
};
use crate::source::{Feed, FeedLoad};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tracing::debug;

pub const DASHBOARD_TITLE: &str = "SLT Dashboard";

/// Note attached to panels computed from a feed with no rows.
pub const NO_DATA_NOTE: &str = "no data for range";

/// Tunables for panel computation.
#[derive(Debug, Clone)]
pub struct PanelSettings {
    /// Substring marking intensive care wards.
    pub icu_marker: String,
    /// Speciality names grouped as liver services.
    pub liver_specialties: Vec<String>,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            icu_marker: "ICU".to_string(),
            liver_specialties: LIVER_SPECIALTIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Facts about the cycle that end up in the dashboard metadata.
#[derive(Debug, Clone)]
pub struct CycleInfo {
    pub report_date: NaiveDate,
    pub base_url: String,
    pub duration_seconds: f64,
}

/// Tables of one cycle, or the failure of each failed feed.
type FeedTables = HashMap<FeedId, Result<Table, FeedFailure>>;

/// Error message of a failed feed plus optional response detail.
#[derive(Debug, Clone)]
struct FeedFailure {
    message: String,
    detail: Option<String>,
}

/// Computed tile value, breakdown and optional note.
struct Computed {
    tile: usize,
    breakdown: Breakdown,
    note: Option<String>,
}

impl Computed {
    fn new(tile: usize, breakdown: Breakdown) -> Self {
        Self {
            tile,
            breakdown,
            note: None,
        }
    }
}

/// True when every feed failed because the host could not be reached.
pub fn host_unreachable(loads: &[FeedLoad]) -> bool {
    !loads.is_empty()
        && loads
            .iter()
            .all(|l| matches!(&l.result, Err(e) if e.is_transport()))
}

/// Assemble the dashboard from the loaded feeds.
pub fn build_dashboard(loads: Vec<FeedLoad>, settings: &PanelSettings, info: CycleInfo) -> Dashboard {
    let feeds: Vec<FeedStatus> = loads
        .iter()
        .map(|load| FeedStatus {
            feed: load.feed,
            name: Feed::get(load.feed).name.to_string(),
            url: load.url.clone(),
            rows: load.result.as_ref().ok().map(Table::row_count),
            error: load.result.as_ref().err().map(|e| e.to_string()),
            detail: load.result.as_ref().err().and_then(FeedError::detail),
        })
        .collect();

    let tables: FeedTables = loads
        .into_iter()
        .map(|load| {
            let result = load.result.map_err(|e| FeedFailure {
                message: e.to_string(),
                detail: e.detail(),
            });
            (load.feed, result)
        })
        .collect();

    let panels = build_panels(&tables, settings);

    let feeds_ok = feeds.iter().filter(|f| f.is_ok()).count();
    let metadata = DashboardMetadata {
        title: DASHBOARD_TITLE.to_string(),
        generated_at: Utc::now(),
        report_date: info.report_date,
        base_url: info.base_url,
        feeds_ok,
        feeds_failed: feeds.len() - feeds_ok,
        duration_seconds: info.duration_seconds,
    };

    Dashboard {
        metadata,
        feeds,
        panels,
    }
}

/// Compute every panel of the grid, in display order.
fn build_panels(tables: &FeedTables, settings: &PanelSettings) -> Vec<Panel> {
    let liver = Buckets::liver(&settings.liver_specialties);

    vec![
        panel(
            tables,
            "OPD Appointments",
            "Live Appointments by Doctor",
            ChartKind::Bar,
            &[FeedId::Opd],
            |t| {
                let tile = non_null_count(t[0], "patientName")?;
                let counts = group_count(t[0], "Appointments", "doctorName")?;
                Ok(Computed::new(tile, Breakdown::Counts(counts)))
            },
        ),
        panel(
            tables,
            "IP Occupancy",
            "Current Admissions by Doctor",
            ChartKind::Area,
            &[FeedId::BedStatus],
            |t| {
                let counts = group_count(t[0], "Admissions", "doctorname")?;
                Ok(Computed::new(row_count(t[0]), Breakdown::Counts(counts)))
            },
        ),
        panel(
            tables,
            "Yesterday Admissions & Discharges",
            "Yesterday Admissions & Discharges",
            ChartKind::Line,
            &[FeedId::Admissions, FeedId::Discharges],
            |t| {
                let admissions = row_count(t[0]);
                let discharges = row_count(t[1]);
                let shares = percent_split(&[
                    ("Admissions".to_string(), admissions),
                    ("Discharges".to_string(), discharges),
                ]);
                Ok(Computed::new(admissions, Breakdown::Split { shares }))
            },
        ),
        counts_panel(tables, "Ward Occupancy", "Ward Breakdown", "ward"),
        panel(
            tables,
            "ICU Occupancy",
            "ICU Occupancy",
            ChartKind::Line,
            &[FeedId::BedStatus],
            |t| {
                let counts = group_count_where(t[0], "Count", "ward", &settings.icu_marker)?;
                Ok(Computed::new(counts.total(), Breakdown::Counts(counts)))
            },
        ),
        panel(
            tables,
            "Liver Occupancy",
            "Liver vs Non-Liver Split",
            ChartKind::Pie,
            &[FeedId::BedStatus],
            |t| {
                let derived = classify_into(t[0], "speciality", "specialityGroup", &liver)?;
                let counts = group_count(&derived, "Patients", "specialityGroup")?;
                let liver_count = filter_count(&derived, "specialityGroup", LIVER_BUCKET)?;
                let shares = percent_split(&[
                    (LIVER_BUCKET.to_string(), counts.get(LIVER_BUCKET)),
                    (NON_LIVER_BUCKET.to_string(), counts.get(NON_LIVER_BUCKET)),
                ]);
                Ok(Computed::new(liver_count, Breakdown::Split { shares }))
            },
        ),
        panel(
            tables,
            "Operation Theater",
            "OT Bookings",
            ChartKind::Bar,
            &[FeedId::Ot],
            |t| {
                let counts = group_count(t[0], "Count", "departmentName")?;
                Ok(Computed::new(counts.total(), Breakdown::Counts(counts)))
            },
        ),
        panel(
            tables,
            "Modality",
            "Radiology Bookings",
            ChartKind::Bar,
            &[FeedId::Radiology],
            |t| {
                let counts = group_count(t[0], "Count", "departmentName")?;
                Ok(Computed::new(counts.total(), Breakdown::Counts(counts)))
            },
        ),
        counts_panel(tables, "Bed Category", "Bed Category Breakdown", "bedtype"),
        counts_panel(tables, "Nationality", "Nationality Breakdown", "nationality"),
        counts_panel(tables, "Admission Type", "Admission Type Breakdown", "patType"),
        panel(
            tables,
            "Gender",
            "Gender Breakdown",
            ChartKind::Pie,
            &[FeedId::BedStatus],
            |t| {
                let counts = group_count(t[0], "Count", "gender")?;
                let shares = percent_split(&counts.as_named_counts());
                Ok(Computed::new(counts.total(), Breakdown::Split { shares }))
            },
        ),
        panel(
            tables,
            "Adult vs Paediatric",
            "Age Group Breakdown (Adult vs Paediatric)",
            ChartKind::Pie,
            &[FeedId::BedStatus],
            |t| {
                let brackets = age_bracket_counts(t[0], "Count", "age")?;
                let shares = percent_split(&brackets.counts.as_named_counts());
                let mut computed = Computed::new(brackets.counts.total(), Breakdown::Split { shares });
                if brackets.excluded > 0 {
                    computed.note = Some(format!(
                        "{} patients with an unreadable age excluded",
                        brackets.excluded
                    ));
                }
                Ok(computed)
            },
        ),
    ]
}

/// Bar panel over one bed-status column; the tile is the grouped total.
fn counts_panel(tables: &FeedTables, title: &str, chart_title: &str, column: &str) -> Panel {
    panel(tables, title, chart_title, ChartKind::Bar, &[FeedId::BedStatus], |t| {
        let counts = group_count(t[0], "Count", column)?;
        Ok(Computed::new(counts.total(), Breakdown::Counts(counts)))
    })
}

/// Build one panel, or a failed panel when a feed or aggregate failed.
fn panel<F>(
    tables: &FeedTables,
    title: &str,
    chart_title: &str,
    chart: ChartKind,
    feeds: &[FeedId],
    compute: F,
) -> Panel
where
    F: FnOnce(&[&Table]) -> Result<Computed, AggregateError>,
{
    let content = match collect_tables(tables, feeds) {
        Err(failure) => PanelContent::Failed {
            error: failure.message,
            detail: failure.detail,
        },
        Ok(inputs) => match compute(inputs.as_slice()) {
            Ok(computed) => {
                let note = computed.note.or_else(|| {
                    inputs
                        .iter()
                        .all(|t| t.is_empty())
                        .then(|| NO_DATA_NOTE.to_string())
                });
                PanelContent::Ready {
                    tile: computed.tile,
                    breakdown: computed.breakdown,
                    note,
                }
            }
            Err(e) => {
                debug!("panel '{}' failed: {}", title, e);
                PanelContent::Failed {
                    error: e.to_string(),
                    detail: None,
                }
            }
        },
    };

    Panel {
        title: title.to_string(),
        chart_title: chart_title.to_string(),
        chart,
        feeds: feeds.to_vec(),
        content,
    }
}

/// Borrow the tables of `feeds`, or describe the first failed feed.
fn collect_tables<'a>(
    tables: &'a FeedTables,
    feeds: &[FeedId],
) -> Result<Vec<&'a Table>, FeedFailure> {
    feeds
        .iter()
        .map(|id| {
            let name = Feed::get(*id).name;
            match tables.get(id) {
                Some(Ok(table)) => Ok(table),
                Some(Err(e)) => Err(FeedFailure {
                    message: format!("{} feed unavailable: {}", name, e.message),
                    detail: e.detail.clone(),
                }),
                None => Err(FeedFailure {
                    message: format!("{} feed was not loaded", name),
                    detail: None,
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::report::{generate_json_report, generate_markdown_report, RenderOptions};
    use crate::source::decode_response;

    const BED_STATUS: &str = include_str!("../../fixtures/bed_status.json");
    const OPD: &str = include_str!("../../fixtures/opd_appointments.json");

    fn loaded(feed: FeedId, body: &str) -> FeedLoad {
        FeedLoad {
            feed,
            url: format!("http://his.test/{}", Feed::get(feed).path),
            result: decode_response(200, body.to_string()).map_err(FeedError::from),
        }
    }

    fn failed(feed: FeedId, status: u16) -> FeedLoad {
        FeedLoad {
            feed,
            url: format!("http://his.test/{}", Feed::get(feed).path),
            result: Err(FetchError::HttpStatus(status).into()),
        }
    }

    fn info() -> CycleInfo {
        CycleInfo {
            report_date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            base_url: "http://his.test".to_string(),
            duration_seconds: 0.5,
        }
    }

    fn all_loaded() -> Vec<FeedLoad> {
        vec![
            loaded(FeedId::Ot, r#"[{"departmentName": "General Surgery"}, {"departmentName": "Urology"}, {"departmentName": "General Surgery"}]"#),
            loaded(FeedId::Admissions, r#"[{"uhid": "U1"}, {"uhid": "U2"}, {"uhid": "U3"}]"#),
            loaded(FeedId::Discharges, r#"[{"uhid": "U9"}]"#),
            loaded(FeedId::Radiology, r#"[{"departmentName": "CT"}, {"departmentName": "MRI"}]"#),
            loaded(FeedId::Opd, OPD),
            loaded(FeedId::BedStatus, BED_STATUS),
        ]
    }

    fn find<'a>(dashboard: &'a Dashboard, title: &str) -> &'a Panel {
        dashboard.panels.iter().find(|p| p.title == title).unwrap()
    }

    fn shares(panel: &Panel) -> Vec<(String, usize)> {
        match &panel.content {
            PanelContent::Ready {
                breakdown: Breakdown::Split { shares },
                ..
            } => shares.iter().map(|s| (s.name.clone(), s.count)).collect(),
            other => panic!("expected split, got {:?}", other),
        }
    }

    #[test]
    fn test_full_dashboard() {
        let dashboard = build_dashboard(all_loaded(), &PanelSettings::default(), info());

        assert_eq!(dashboard.panels.len(), 13);
        assert_eq!(dashboard.failed_panels(), 0);
        assert_eq!(dashboard.metadata.feeds_ok, 6);
        assert_eq!(dashboard.metadata.feeds_failed, 0);

        assert_eq!(find(&dashboard, "OPD Appointments").tile(), Some(4));
        assert_eq!(find(&dashboard, "IP Occupancy").tile(), Some(6));
        assert_eq!(find(&dashboard, "Ward Occupancy").tile(), Some(6));
        assert_eq!(find(&dashboard, "ICU Occupancy").tile(), Some(3));
        assert_eq!(find(&dashboard, "Liver Occupancy").tile(), Some(2));
        assert_eq!(find(&dashboard, "Operation Theater").tile(), Some(3));
        assert_eq!(find(&dashboard, "Modality").tile(), Some(2));
        assert_eq!(find(&dashboard, "Yesterday Admissions & Discharges").tile(), Some(3));
    }

    #[test]
    fn test_split_panels() {
        let dashboard = build_dashboard(all_loaded(), &PanelSettings::default(), info());

        assert_eq!(
            shares(find(&dashboard, "Liver Occupancy")),
            vec![("Liver".to_string(), 2), ("Non-Liver".to_string(), 4)]
        );
        assert_eq!(
            shares(find(&dashboard, "Yesterday Admissions & Discharges")),
            vec![("Admissions".to_string(), 3), ("Discharges".to_string(), 1)]
        );

        let age = find(&dashboard, "Adult vs Paediatric");
        assert_eq!(age.tile(), Some(5));
        match &age.content {
            PanelContent::Ready { note, .. } => assert!(note.as_deref().unwrap().contains("1 patients")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_failed_feed_isolated() {
        let mut loads = all_loaded();
        loads[5] = failed(FeedId::BedStatus, 500);

        let dashboard = build_dashboard(loads, &PanelSettings::default(), info());

        assert_eq!(dashboard.metadata.feeds_failed, 1);
        assert_eq!(dashboard.failed_panels(), 9);

        let ward = find(&dashboard, "Ward Occupancy");
        match &ward.content {
            PanelContent::Failed { error, .. } => {
                assert_eq!(error, "Bed status feed unavailable: HIS API returned HTTP 500")
            }
            other => panic!("expected failure, got {:?}", other),
        }

        assert_eq!(find(&dashboard, "OPD Appointments").tile(), Some(4));
        assert_eq!(find(&dashboard, "Operation Theater").tile(), Some(3));
    }

    #[test]
    fn test_two_feed_panel_needs_both() {
        let mut loads = all_loaded();
        loads[2] = failed(FeedId::Discharges, 502);

        let dashboard = build_dashboard(loads, &PanelSettings::default(), info());
        assert!(find(&dashboard, "Yesterday Admissions & Discharges").is_failed());
    }

    #[test]
    fn test_empty_feed_renders_zero_tile() {
        let mut loads = all_loaded();
        loads[4] = loaded(FeedId::Opd, "[]");

        let dashboard = build_dashboard(loads, &PanelSettings::default(), info());
        let opd = find(&dashboard, "OPD Appointments");

        match &opd.content {
            PanelContent::Ready {
                tile,
                breakdown: Breakdown::Counts(counts),
                note,
            } => {
                assert_eq!(*tile, 0);
                assert!(counts.is_empty());
                assert_eq!(note.as_deref(), Some(NO_DATA_NOTE));
            }
            other => panic!("expected zero tile, got {:?}", other),
        }
    }

    #[test]
    fn test_host_unreachable() {
        let loads = vec![failed(FeedId::Ot, 500)];
        assert!(!host_unreachable(&loads));
        assert!(!host_unreachable(&[]));
        assert!(!host_unreachable(&all_loaded()));
    }

    #[test]
    fn test_feed_statuses() {
        let mut loads = all_loaded();
        loads[0] = failed(FeedId::Ot, 404);

        let dashboard = build_dashboard(loads, &PanelSettings::default(), info());
        let ot = &dashboard.feeds[0];
        assert_eq!(ot.feed, FeedId::Ot);
        assert_eq!(ot.name, "OT schedule");
        assert!(!ot.is_ok());
        assert_eq!(ot.detail, None);
        assert_eq!(dashboard.feeds[5].rows, Some(6));
    }

    #[test]
    fn test_rejected_body_reaches_output() {
        let mut loads = all_loaded();
        loads[0] = loaded(FeedId::Ot, "<html>HIS maintenance until 09:00</html>");

        let dashboard = build_dashboard(loads, &PanelSettings::default(), info());
        assert_eq!(
            dashboard.feeds[0].detail.as_deref(),
            Some("<html>HIS maintenance until 09:00</html>")
        );
        match &find(&dashboard, "Operation Theater").content {
            PanelContent::Failed { error, detail } => {
                assert!(error.contains("invalid JSON payload"));
                assert!(detail.as_deref().unwrap().contains("maintenance"));
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let markdown = generate_markdown_report(&dashboard, &RenderOptions::default());
        let json = generate_json_report(&dashboard).unwrap();
        assert!(markdown.contains("HIS maintenance until 09:00"));
        assert!(json.contains("HIS maintenance until 09:00"));
    }
}
