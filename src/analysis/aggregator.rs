//! Table aggregation.
//!
//! Pure functions computing grouped counts, filtered counts, derived
//! classifications and percentage splits over a normalized [`Table`].
//! None of them mutate their input.

use crate::error::AggregateError;
use crate::models::{AgeBracket, GroupCount, GroupCounts, Share, Table};
use std::collections::HashMap;
use tracing::warn;

/// Specialities counted as liver services.
pub const LIVER_SPECIALTIES: [&str; 3] = [
    "Hepatology",
    "Pediatric Hepatology",
    "Liver Disease and Transplantation",
];

pub const LIVER_BUCKET: &str = "Liver";
pub const NON_LIVER_BUCKET: &str = "Non-Liver";

/// Age in years from which a patient counts as an adult.
pub const ADULT_AGE_YEARS: f64 = 18.0;

/// Fail with `UnknownColumn` when a non-empty table lacks the column.
fn require_column(table: &Table, column: &str) -> Result<(), AggregateError> {
    if !table.is_empty() && !table.has_column(column) {
        return Err(AggregateError::UnknownColumn(column.to_string()));
    }
    Ok(())
}

/// Number of rows in the table.
pub fn row_count(table: &Table) -> usize {
    table.row_count()
}

/// Number of rows whose value in `column` is not null.
pub fn non_null_count(table: &Table, column: &str) -> Result<usize, AggregateError> {
    require_column(table, column)?;
    Ok(table.column_text(column).flatten().count())
}

/// Number of rows where `column == literal` (exact match).
pub fn filter_count(table: &Table, column: &str, literal: &str) -> Result<usize, AggregateError> {
    require_column(table, column)?;
    Ok(table
        .column_text(column)
        .filter(|v| v.as_deref() == Some(literal))
        .count())
}

/// Count values per group, most frequent first.
///
/// Null values are skipped. The sort is stable, so groups with equal
/// counts keep the order in which they were first seen.
pub fn count_values<I>(name: &str, dimension: &str, values: I) -> GroupCounts
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<GroupCount> = Vec::new();

    for value in values.into_iter().flatten() {
        match index.get(&value) {
            Some(&i) => groups[i].count += 1,
            None => {
                index.insert(value.clone(), groups.len());
                groups.push(GroupCount { key: value, count: 1 });
            }
        }
    }

    groups.sort_by_key(|g| std::cmp::Reverse(g.count));

    GroupCounts {
        name: name.to_string(),
        dimension: dimension.to_string(),
        groups,
    }
}

/// Group rows by `column` and count them.
pub fn group_count(table: &Table, name: &str, column: &str) -> Result<GroupCounts, AggregateError> {
    require_column(table, column)?;
    Ok(count_values(name, column, table.column_text(column)))
}

/// Group rows by `column`, keeping only values that contain `marker`.
pub fn group_count_where(
    table: &Table,
    name: &str,
    column: &str,
    marker: &str,
) -> Result<GroupCounts, AggregateError> {
    require_column(table, column)?;
    let values = table
        .column_text(column)
        .map(|v| v.filter(|s| s.contains(marker)));
    Ok(count_values(name, column, values))
}

/// Mapping from raw values to bucket labels, with a default bucket.
#[derive(Debug, Clone)]
pub struct Buckets {
    map: HashMap<String, String>,
    default: String,
}

impl Buckets {
    pub fn new(default: &str) -> Self {
        Self {
            map: HashMap::new(),
            default: default.to_string(),
        }
    }

    /// Map every value of an allow-list to one bucket.
    pub fn allow_list<S: AsRef<str>>(values: &[S], bucket: &str, default: &str) -> Self {
        let mut buckets = Self::new(default);
        for value in values {
            buckets.insert(value.as_ref(), bucket);
        }
        buckets
    }

    /// Liver / Non-Liver split over the given speciality names.
    pub fn liver<S: AsRef<str>>(specialties: &[S]) -> Self {
        Self::allow_list(specialties, LIVER_BUCKET, NON_LIVER_BUCKET)
    }

    pub fn insert(&mut self, raw: &str, bucket: &str) {
        self.map.insert(raw.to_string(), bucket.to_string());
    }

    /// Bucket for a raw value. Exact match only; nulls go to the default.
    pub fn bucket_for(&self, raw: Option<&str>) -> &str {
        raw.and_then(|r| self.map.get(r))
            .map(String::as_str)
            .unwrap_or(&self.default)
    }
}

/// Derive a bucket label for every row of `column`.
pub fn classify(table: &Table, column: &str, buckets: &Buckets) -> Result<Vec<String>, AggregateError> {
    require_column(table, column)?;
    Ok(table
        .column_text(column)
        .map(|v| buckets.bucket_for(v.as_deref()).to_string())
        .collect())
}

/// Classify `column` into a new `derived` column of a copy of the table.
///
/// Grouping or filtering the derived column then works on bucket labels.
pub fn classify_into(
    table: &Table,
    column: &str,
    derived: &str,
    buckets: &Buckets,
) -> Result<Table, AggregateError> {
    let labels = classify(table, column, buckets)?;
    Ok(table.with_column(derived, labels.into_iter().map(Some).collect()))
}

/// Parse a HIS age string into years.
///
/// `"<int>A"` is years and `"<int>m"` is months. Anything else is `None`.
pub fn parse_age(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some(years) = raw.strip_suffix('A') {
        years.trim().parse::<u32>().ok().map(f64::from)
    } else if let Some(months) = raw.strip_suffix('m') {
        months.trim().parse::<u32>().ok().map(|m| f64::from(m) / 12.0)
    } else {
        None
    }
}

/// Age bracket of a HIS age string, `None` when malformed.
pub fn age_bracket(raw: &str) -> Option<AgeBracket> {
    parse_age(raw).map(|years| {
        if years >= ADULT_AGE_YEARS {
            AgeBracket::Adult
        } else {
            AgeBracket::Paediatric
        }
    })
}

/// Bracket counts plus the number of rows that could not be bracketed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketCounts {
    pub counts: GroupCounts,
    pub excluded: usize,
}

/// Count rows per age bracket.
///
/// Malformed or null ages are excluded from every count and reported as a
/// data-quality warning.
pub fn age_bracket_counts(
    table: &Table,
    name: &str,
    column: &str,
) -> Result<BracketCounts, AggregateError> {
    require_column(table, column)?;

    let mut excluded = 0;
    let brackets: Vec<Option<String>> = table
        .column_text(column)
        .map(|v| {
            let bracket = v.as_deref().and_then(age_bracket);
            if bracket.is_none() {
                excluded += 1;
            }
            bracket.map(|b| b.to_string())
        })
        .collect();

    if excluded > 0 {
        warn!(
            "{} of {} rows have an unreadable '{}' value and are excluded from {}",
            excluded,
            table.row_count(),
            column,
            name
        );
    }

    Ok(BracketCounts {
        counts: count_values(name, column, brackets),
        excluded,
    })
}

/// Share of the total for each named count.
///
/// A zero total yields 0% for every entry.
pub fn percent_split(counts: &[(String, usize)]) -> Vec<Share> {
    let total: usize = counts.iter().map(|(_, c)| c).sum();

    counts
        .iter()
        .map(|(name, count)| Share {
            name: name.clone(),
            count: *count,
            percent: if total == 0 {
                0.0
            } else {
                *count as f64 * 100.0 / total as f64
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::{json, Value};

    fn table(value: Value) -> Table {
        normalize(serde_json::from_value(value).unwrap())
    }

    fn keys(counts: &GroupCounts) -> Vec<&str> {
        counts.groups.iter().map(|g| g.key.as_str()).collect()
    }

    #[test]
    fn test_group_count_sorted_descending() {
        let t = table(json!([
            {"doctorName": "Dr B"},
            {"doctorName": "Dr A"},
            {"doctorName": "Dr A"},
            {"doctorName": "Dr C"},
            {"doctorName": "Dr A"},
            {"doctorName": "Dr C"}
        ]));

        let counts = group_count(&t, "appointments", "doctorName").unwrap();
        assert_eq!(keys(&counts), vec!["Dr A", "Dr C", "Dr B"]);
        assert_eq!(counts.groups[0].count, 3);
        assert_eq!(counts.dimension, "doctorName");
    }

    #[test]
    fn test_group_count_ties_keep_first_seen_order() {
        let t = table(json!([
            {"ward": "W3"}, {"ward": "W1"}, {"ward": "W2"},
            {"ward": "W1"}, {"ward": "W3"}, {"ward": "W2"}
        ]));

        let counts = group_count(&t, "wards", "ward").unwrap();
        assert_eq!(keys(&counts), vec!["W3", "W1", "W2"]);
    }

    #[test]
    fn test_group_count_sum_equals_row_count() {
        let t = table(json!([
            {"gender": "F"}, {"gender": "M"}, {"gender": "F"}, {"gender": "U"}
        ]));

        let counts = group_count(&t, "gender", "gender").unwrap();
        assert_eq!(counts.total(), row_count(&t));
    }

    #[test]
    fn test_group_count_skips_nulls() {
        let t = table(json!([{"ward": "W1"}, {"ward": null}, {"other": 1}]));

        let counts = group_count(&t, "wards", "ward").unwrap();
        assert_eq!(counts.total(), 1);
        assert_eq!(row_count(&t), 3);
    }

    #[test]
    fn test_group_count_empty_table() {
        let t = normalize(Vec::new());
        let counts = group_count(&t, "wards", "ward").unwrap();
        assert!(counts.is_empty());
        assert_eq!(counts.total(), 0);
    }

    #[test]
    fn test_unknown_column() {
        let t = table(json!([{"ward": "W1"}]));
        assert_eq!(
            group_count(&t, "x", "doctorname"),
            Err(AggregateError::UnknownColumn("doctorname".to_string()))
        );
        assert!(filter_count(&t, "speciality", "Liver").is_err());
        assert!(age_bracket_counts(&t, "ages", "age").is_err());
    }

    #[test]
    fn test_filter_and_non_null_count() {
        let t = table(json!([
            {"patientName": "P1", "uhid": "Admitted"},
            {"patientName": null, "uhid": "Discharged"},
            {"patientName": "P3", "uhid": "Admitted"}
        ]));

        assert_eq!(filter_count(&t, "uhid", "Admitted").unwrap(), 2);
        assert_eq!(filter_count(&t, "uhid", "admitted").unwrap(), 0);
        assert_eq!(non_null_count(&t, "patientName").unwrap(), 2);
    }

    #[test]
    fn test_group_count_where_marker() {
        let t = table(json!([
            {"ward": "MICU"}, {"ward": "General"}, {"ward": "ICU 2"}, {"ward": "MICU"}
        ]));

        let counts = group_count_where(&t, "icu", "ward", "ICU").unwrap();
        assert_eq!(keys(&counts), vec!["MICU", "ICU 2"]);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_classify_liver_specialties() {
        let t = table(json!([{"speciality": "Hepatology"}, {"speciality": "Cardiology"}]));

        let derived =
            classify_into(&t, "speciality", "group", &Buckets::liver(&LIVER_SPECIALTIES)).unwrap();
        let counts = group_count(&derived, "Patients", "group").unwrap();
        assert_eq!(counts.get(LIVER_BUCKET), 1);
        assert_eq!(counts.get(NON_LIVER_BUCKET), 1);
        assert_eq!(filter_count(&derived, "group", LIVER_BUCKET).unwrap(), 1);
        assert!(!t.has_column("group"));
    }

    #[test]
    fn test_classify_is_exact_match() {
        let buckets = Buckets::liver(&LIVER_SPECIALTIES);
        assert_eq!(buckets.bucket_for(Some("Hepatology")), LIVER_BUCKET);
        assert_eq!(buckets.bucket_for(Some("hepatology")), NON_LIVER_BUCKET);
        assert_eq!(buckets.bucket_for(Some("Hepatology ")), NON_LIVER_BUCKET);
        assert_eq!(buckets.bucket_for(Some("Adult Hepatology")), NON_LIVER_BUCKET);
        assert_eq!(buckets.bucket_for(None), NON_LIVER_BUCKET);
    }

    #[test]
    fn test_age_bracket() {
        assert_eq!(age_bracket("18A"), Some(AgeBracket::Adult));
        assert_eq!(age_bracket("17A"), Some(AgeBracket::Paediatric));
        assert_eq!(age_bracket("6m"), Some(AgeBracket::Paediatric));
        assert_eq!(age_bracket(" 45A "), Some(AgeBracket::Adult));
        assert_eq!(age_bracket("216m"), Some(AgeBracket::Adult));
        assert_eq!(age_bracket("bad"), None);
        assert_eq!(age_bracket("12y"), None);
        assert_eq!(age_bracket("A"), None);
        assert_eq!(age_bracket(""), None);
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age("30A"), Some(30.0));
        assert_eq!(parse_age("6m"), Some(0.5));
        assert_eq!(parse_age("x6m"), None);
    }

    #[test]
    fn test_age_bracket_counts_excludes_malformed() {
        let t = table(json!([
            {"age": "18A"}, {"age": "17A"}, {"age": "6m"},
            {"age": "bad"}, {"age": null}, {"age": "70A"}
        ]));

        let result = age_bracket_counts(&t, "ages", "age").unwrap();
        assert_eq!(result.counts.get("Adult"), 2);
        assert_eq!(result.counts.get("Paediatric"), 2);
        assert_eq!(result.counts.total(), 4);
        assert_eq!(result.excluded, 2);
    }

    #[test]
    fn test_percent_split() {
        let shares = percent_split(&[("A".to_string(), 1), ("B".to_string(), 3)]);
        assert_eq!(shares[0].percent, 25.0);
        assert_eq!(shares[1].percent, 75.0);
        assert_eq!(shares[1].count, 3);
    }

    #[test]
    fn test_percent_split_zero_total() {
        let shares = percent_split(&[("A".to_string(), 0), ("B".to_string(), 0)]);
        assert_eq!(shares.len(), 2);
        assert!(shares.iter().all(|s| s.percent == 0.0));
    }
}
