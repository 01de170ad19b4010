//! Static definitions of the HIS feeds polled by the dashboard.

use crate::models::FeedId;
use chrono::{Days, NaiveDate};

/// Which calendar window a feed is queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    /// No date parameters are sent.
    None,
    /// `FromDate = ToDate = today`.
    Today,
    /// `FromDate = ToDate = yesterday`.
    Yesterday,
}

/// An inclusive date range sent as `FromDate`/`ToDate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn single(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    /// Query parameters in the `YYYY-MM-DD` format the HIS API expects.
    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("FromDate", self.from.format("%Y-%m-%d").to_string()),
            ("ToDate", self.to.format("%Y-%m-%d").to_string()),
        ]
    }
}

impl DateWindow {
    /// Resolve the window against the reporting day.
    pub fn resolve(&self, today: NaiveDate) -> Option<DateRange> {
        match self {
            DateWindow::None => None,
            DateWindow::Today => Some(DateRange::single(today)),
            DateWindow::Yesterday => today.checked_sub_days(Days::new(1)).map(DateRange::single),
        }
    }
}

/// A remote data source of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: FeedId,
    /// Human-readable name for status lines and error panels.
    pub name: &'static str,
    /// Endpoint path relative to the base URL.
    pub path: &'static str,
    pub window: DateWindow,
    /// Columns the aggregates index by; checked before aggregation.
    pub required: &'static [&'static str],
}

/// All feeds, in fetch order.
pub static FEEDS: [Feed; 6] = [
    Feed {
        id: FeedId::Ot,
        name: "OT schedule",
        path: "Get_OT_Scheduleing",
        window: DateWindow::None,
        required: &["departmentName"],
    },
    Feed {
        id: FeedId::Admissions,
        name: "Admissions",
        path: "Get_ListOfAdmission",
        window: DateWindow::Yesterday,
        required: &[],
    },
    Feed {
        id: FeedId::Discharges,
        name: "Discharges",
        path: "Get_DischargeTrackingreport",
        window: DateWindow::Yesterday,
        required: &[],
    },
    Feed {
        id: FeedId::Radiology,
        name: "Radiology bookings",
        path: "Get_Radiologypatientsearch",
        window: DateWindow::None,
        required: &["departmentName"],
    },
    Feed {
        id: FeedId::Opd,
        name: "OPD appointments",
        path: "Get_Doctorwiseappointmentlist",
        window: DateWindow::Today,
        required: &["patientName", "doctorName"],
    },
    Feed {
        id: FeedId::BedStatus,
        name: "Bed status",
        path: "Get_BedStatusViewDetails",
        window: DateWindow::None,
        required: &[
            "doctorname",
            "ward",
            "speciality",
            "bedtype",
            "nationality",
            "patType",
            "gender",
            "age",
        ],
    },
];

impl Feed {
    /// Look up the definition of a feed.
    pub fn get(id: FeedId) -> &'static Feed {
        FEEDS
            .iter()
            .find(|f| f.id == id)
            .unwrap_or_else(|| unreachable!("every FeedId has a definition"))
    }

    /// Full endpoint URL under `base_url` (without query parameters).
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.path)
    }
}
