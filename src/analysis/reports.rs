/// Report shapes built from a cleaned result table.
///
/// All four generators are pure. The originating `RemoteQueryParams` are
/// accepted so every report has the same call shape, but only the
/// pipeline echoes them; they never affect the numbers.
///
/// Empty or insufficient input is not an error: summary and trend return
/// explicit sentinel payloads so callers can tell "nothing found" from
/// "pipeline broke".

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{Column, OrderedMap, RemoteQueryParams, ResultRow, ResultTable};

/// How many entries the summary's frequency rankings keep.
pub const TOP_N: usize = 10;

/// Detailed rows included in a comparison report.
pub const COMPARISON_RECORD_LIMIT: usize = 100;

/// Columns projected into detailed records, in output order.
pub const DETAIL_COLUMNS: [Column; 8] = [
    Column::OrganizationIdentifier,
    Column::MonitoringLocationIdentifier,
    Column::ActivityStartDate,
    Column::CharacteristicName,
    Column::ResultMeasureValue,
    Column::ResultMeasureUnitCode,
    Column::ResultStatusIdentifier,
    Column::ResultCommentText,
];

pub const INSUFFICIENT_TREND_DATA: &str = "Insufficient data for trend analysis";

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Name -> count, highest count first.
pub type Ranking = OrderedMap<String, usize>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Summary when the table has rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub total_records: usize,
    pub date_range: DateRange,
    pub parameters: Ranking,
    pub organizations: Ranking,
    pub locations: usize,
    pub unique_parameters: usize,
}

/// Fixed "no data" summary shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmptySummary {
    pub total_records: usize,
    pub date_range: &'static str,
    pub parameters: Vec<String>,
    pub organizations: Vec<String>,
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryReport {
    NoData(EmptySummary),
    Statistics(SummaryStatistics),
}

impl SummaryReport {
    pub fn no_data() -> Self {
        SummaryReport::NoData(EmptySummary {
            total_records: 0,
            date_range: "No data",
            parameters: Vec::new(),
            organizations: Vec::new(),
            locations: Vec::new(),
        })
    }
}

/// One row of a detailed report: present detail columns only, in
/// `DETAIL_COLUMNS` order. Missing values are `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetailedRecord(pub OrderedMap<&'static str, Value>);

impl DetailedRecord {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }
}

/// Per-year statistics of `ResultMeasureValue`, rounded to 3 places.
/// Statistics over zero values (and `std` over fewer than two) are `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyStatistics {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacteristicTrend {
    pub yearly_statistics: BTreeMap<i32, YearlyStatistics>,
    pub total_samples: usize,
    pub years_covered: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrendReport {
    Insufficient { error: String },
    /// Keyed by characteristic name in first-seen order.
    Trends(OrderedMap<String, CharacteristicTrend>),
}

impl TrendReport {
    pub fn insufficient() -> Self {
        TrendReport::Insufficient {
            error: INSUFFICIENT_TREND_DATA.to_string(),
        }
    }
}

/// Summary plus the first `COMPARISON_RECORD_LIMIT` detailed records.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub summary: SummaryReport,
    pub records: Vec<DetailedRecord>,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Row count, date span, top-10 characteristics and organizations, and
/// distinct location/characteristic counts.
///
/// Frequency ties are broken by first appearance in the table.
pub fn summary_report(table: &ResultTable, _params: &RemoteQueryParams) -> SummaryReport {
    if table.is_empty() {
        return SummaryReport::no_data();
    }

    let dates = || table.rows.iter().filter_map(|r| r.activity_start_date);
    let date_range = DateRange {
        start: dates().min().map(iso_timestamp),
        end: dates().max().map(iso_timestamp),
    };

    let names = || table.rows.iter().filter_map(|r| r.characteristic_name.as_deref());

    SummaryReport::Statistics(SummaryStatistics {
        total_records: table.len(),
        date_range,
        parameters: top_frequencies(names(), TOP_N),
        organizations: top_frequencies(
            table.rows.iter().filter_map(|r| r.organization_id.as_deref()),
            TOP_N,
        ),
        locations: count_distinct(
            table.rows.iter().filter_map(|r| r.monitoring_location_id.as_deref()),
        ),
        unique_parameters: count_distinct(names()),
    })
}

/// Counts values and keeps the `n` most frequent: count descending, then
/// first-seen index ascending.
pub fn top_frequencies<'a, I>(values: I, n: usize) -> Ranking
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, value) in values.into_iter().enumerate() {
        counts.entry(value).or_insert((0, idx)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(value, (count, first_seen))| (value, count, first_seen))
        .collect();
    ranked.sort_by_key(|&(_, count, first_seen)| (Reverse(count), first_seen));

    OrderedMap(
        ranked
            .into_iter()
            .take(n)
            .map(|(value, count, _)| (value.to_string(), count))
            .collect(),
    )
}

fn count_distinct<'a, I>(values: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().collect::<HashSet<_>>().len()
}

/// Calendar day rendered as a midnight timestamp: `2023-01-05T00:00:00`.
pub fn iso_timestamp(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

// ---------------------------------------------------------------------------
// Detailed
// ---------------------------------------------------------------------------

/// Projects every row onto the detail columns present in the table.
pub fn detailed_report(table: &ResultTable, _params: &RemoteQueryParams) -> Vec<DetailedRecord> {
    if table.is_empty() {
        return Vec::new();
    }

    let columns: Vec<Column> = DETAIL_COLUMNS
        .into_iter()
        .filter(|c| table.has_column(*c))
        .collect();

    table
        .rows
        .iter()
        .map(|row| {
            DetailedRecord(OrderedMap(
                columns.iter().map(|c| (c.name(), detail_value(row, *c))).collect(),
            ))
        })
        .collect()
}

fn detail_value(row: &ResultRow, column: Column) -> Value {
    let text = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
    match column {
        Column::OrganizationIdentifier => text(&row.organization_id),
        Column::MonitoringLocationIdentifier => text(&row.monitoring_location_id),
        Column::ActivityStartDate => row
            .activity_start_date
            .map(|d| Value::String(iso_timestamp(d)))
            .unwrap_or(Value::Null),
        Column::ActivityEndDate => row
            .activity_end_date
            .map(|d| Value::String(iso_timestamp(d)))
            .unwrap_or(Value::Null),
        Column::CharacteristicName => text(&row.characteristic_name),
        Column::ResultMeasureValue => number_value(row.result_value),
        Column::ResultMeasureUnitCode => text(&row.result_unit),
        Column::ResultStatusIdentifier => text(&row.result_status),
        Column::ResultCommentText => text(&row.comment),
        Column::DetectionLimitValue => number_value(row.detection_limit),
    }
}

fn number_value(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

/// Year-over-year statistics of the result value per characteristic.
///
/// Rows with no characteristic name are skipped. Rows whose start date
/// did not parse count toward `total_samples` but fall in no year. When
/// the table has no `ResultMeasureValue` column, no characteristic gets an
/// entry.
pub fn trend_report(table: &ResultTable, _params: &RemoteQueryParams) -> TrendReport {
    if table.is_empty() || !table.has_column(Column::ActivityStartDate) {
        return TrendReport::insufficient();
    }

    let mut trends = OrderedMap::new();
    if !table.has_column(Column::ResultMeasureValue) {
        return TrendReport::Trends(trends);
    }

    // name -> (row count, year -> values)
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, (usize, BTreeMap<i32, Vec<f64>>)> = HashMap::new();

    for row in &table.rows {
        let Some(name) = row.characteristic_name.as_deref() else {
            continue;
        };
        let entry = grouped.entry(name).or_insert_with(|| {
            order.push(name);
            (0, BTreeMap::new())
        });
        entry.0 += 1;

        if let Some(date) = row.activity_start_date {
            let values = entry.1.entry(date.year()).or_default();
            if let Some(v) = row.result_value {
                values.push(v);
            }
        }
    }

    for name in order {
        if let Some((total_samples, years)) = grouped.remove(name) {
            let yearly_statistics: BTreeMap<i32, YearlyStatistics> = years
                .into_iter()
                .map(|(year, values)| (year, yearly_statistics(values)))
                .collect();
            trends.push(
                name.to_string(),
                CharacteristicTrend {
                    years_covered: yearly_statistics.len(),
                    yearly_statistics,
                    total_samples,
                },
            );
        }
    }

    TrendReport::Trends(trends)
}

/// count / mean / median / sample std / min / max, rounded to 3 places.
pub fn yearly_statistics(mut values: Vec<f64>) -> YearlyStatistics {
    let count = values.len();
    if count == 0 {
        return YearlyStatistics {
            count,
            mean: None,
            median: None,
            std: None,
            min: None,
            max: None,
        };
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let n = count as f64;
    let mean = values.iter().sum::<f64>() / n;
    let median = if count % 2 == 1 {
        values[count / 2]
    } else {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    };
    let std = if count > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        Some(round3((ss / (n - 1.0)).sqrt()))
    } else {
        None
    };

    YearlyStatistics {
        count,
        mean: Some(round3(mean)),
        median: Some(round3(median)),
        std,
        min: Some(round3(values[0])),
        max: Some(round3(values[count - 1])),
    }
}

/// Three decimal places, ties to even.
fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Summary plus at most `COMPARISON_RECORD_LIMIT` detailed records.
pub fn comparison_report(table: &ResultTable, params: &RemoteQueryParams) -> ComparisonReport {
    let mut records = detailed_report(table, params);
    records.truncate(COMPARISON_RECORD_LIMIT);
    ComparisonReport {
        summary: summary_report(table, params),
        records,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
