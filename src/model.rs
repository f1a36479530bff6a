/// Shared data types for the water-quality reporting pipeline.
///
/// Request side: `QueryFilter`, `ReportConfig`, `ReportType`.
/// Wire side: `RemoteQueryParams` (portal parameter encoding),
/// `RawResultTable` (as fetched), `ResultTable` (cleaned and typed),
/// `QueryMetadata`, `SiteInfo`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Ordered JSON objects
// ---------------------------------------------------------------------------

/// Key/value pairs that serialize as a JSON object in insertion order.
///
/// Used wherever the order of an object's keys carries meaning (ranked
/// frequencies, first-seen characteristic order, parameter echo).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<K, V>(pub Vec<(K, V)>);

impl<K, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, key: K, value: V) {
        self.0.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(K, V)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.0.iter().map(|(k, _)| k)
    }
}

impl<K: PartialEq, V> OrderedMap<K, V> {
    pub fn get<Q>(&self, key: Q) -> Option<&V>
    where
        K: PartialEq<Q>,
    {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Serialize, V: Serialize> Serialize for OrderedMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Remote query parameters
// ---------------------------------------------------------------------------

/// A single value in the portal's flat parameter encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    List(Vec<String>),
    Text(String),
}

impl ParamValue {
    /// Renders the value for a query string, joining lists with `separator`.
    pub fn joined(&self, separator: &str) -> String {
        match self {
            ParamValue::List(items) => items.join(separator),
            ParamValue::Text(text) => text.clone(),
        }
    }
}

/// Remote-API parameter mapping derived once per request from a
/// `QueryFilter`. Echoed back to the caller as `query_info`.
pub type RemoteQueryParams = OrderedMap<&'static str, ParamValue>;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

fn default_state_cd() -> Option<Vec<String>> {
    Some(vec!["CA".to_string()])
}

fn default_sample_media() -> Option<Vec<String>> {
    Some(vec!["Water".to_string()])
}

/// Structured filter for a water-quality query.
///
/// Absent `state_cd` / `sample_media` default to `["CA"]` / `["Water"]`;
/// an explicit `null` clears them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryFilter {
    #[serde(default)]
    pub site_no: Option<Vec<String>>,
    #[serde(default = "default_state_cd")]
    pub state_cd: Option<Vec<String>>,
    #[serde(default)]
    pub county_cd: Option<Vec<String>>,
    #[serde(default)]
    pub huc: Option<Vec<String>>,
    /// `[min_x, min_y, max_x, max_y]`
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
    #[serde(default)]
    pub characteristic_name: Option<Vec<String>>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_sample_media")]
    pub sample_media: Option<Vec<String>>,
    #[serde(default)]
    pub organization: Option<Vec<String>>,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            site_no: None,
            state_cd: default_state_cd(),
            county_cd: None,
            huc: None,
            bbox: None,
            characteristic_name: None,
            start_date: None,
            end_date: None,
            sample_media: default_sample_media(),
            organization: None,
        }
    }
}

impl QueryFilter {
    /// A filter with every field unset (no defaults applied).
    pub fn empty() -> Self {
        Self {
            state_cd: None,
            sample_media: None,
            ..Self::default()
        }
    }

    /// Rejects an inverted date range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ValidationError::DateOrder {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Which report shape to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    Summary,
    Detailed,
    Trend,
    Comparison,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Summary => "summary",
            ReportType::Detailed => "detailed",
            ReportType::Trend => "trend",
            ReportType::Comparison => "comparison",
        }
    }
}

/// Default per-request record cap.
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

fn default_include_metadata() -> bool {
    true
}

fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}

/// Report generation options accompanying a query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub report_type: ReportType,
    #[serde(default = "default_include_metadata")]
    pub include_metadata: bool,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report_type: ReportType::default(),
            include_metadata: default_include_metadata(),
            max_records: default_max_records(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result tables
// ---------------------------------------------------------------------------

/// The result columns this service understands. Anything else the portal
/// returns is ignored at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    OrganizationIdentifier,
    MonitoringLocationIdentifier,
    ActivityStartDate,
    ActivityEndDate,
    CharacteristicName,
    ResultMeasureValue,
    ResultMeasureUnitCode,
    ResultStatusIdentifier,
    ResultCommentText,
    DetectionLimitValue,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::OrganizationIdentifier,
        Column::MonitoringLocationIdentifier,
        Column::ActivityStartDate,
        Column::ActivityEndDate,
        Column::CharacteristicName,
        Column::ResultMeasureValue,
        Column::ResultMeasureUnitCode,
        Column::ResultStatusIdentifier,
        Column::ResultCommentText,
        Column::DetectionLimitValue,
    ];

    /// Canonical (flat) column name used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Column::OrganizationIdentifier => "OrganizationIdentifier",
            Column::MonitoringLocationIdentifier => "MonitoringLocationIdentifier",
            Column::ActivityStartDate => "ActivityStartDate",
            Column::ActivityEndDate => "ActivityEndDate",
            Column::CharacteristicName => "CharacteristicName",
            Column::ResultMeasureValue => "ResultMeasureValue",
            Column::ResultMeasureUnitCode => "ResultMeasureUnitCode",
            Column::ResultStatusIdentifier => "ResultStatusIdentifier",
            Column::ResultCommentText => "ResultCommentText",
            Column::DetectionLimitValue => "DetectionQuantitationLimitMeasureValue",
        }
    }

    /// Recognizes a CSV header, accepting the portal's slash-qualified
    /// spelling as well as the flat one.
    pub fn from_header(header: &str) -> Option<Column> {
        match header.trim() {
            "ResultMeasure/MeasureUnitCode" => Some(Column::ResultMeasureUnitCode),
            "DetectionQuantitationLimitMeasure/MeasureValue" => Some(Column::DetectionLimitValue),
            other => Column::ALL.into_iter().find(|c| c.name() == other),
        }
    }
}

/// Which known columns were present in a fetched table.
pub type ColumnSet = BTreeSet<Column>;

/// All known columns; convenient for tables built in code.
pub fn all_columns() -> ColumnSet {
    Column::ALL.into_iter().collect()
}

/// One observation exactly as the portal returned it. Empty CSV fields are
/// `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultRow {
    pub organization_id: Option<String>,
    pub monitoring_location_id: Option<String>,
    pub activity_start_date: Option<String>,
    pub activity_end_date: Option<String>,
    pub characteristic_name: Option<String>,
    pub result_value: Option<String>,
    pub result_unit: Option<String>,
    pub result_status: Option<String>,
    pub comment: Option<String>,
    pub detection_limit: Option<String>,
}

impl RawResultRow {
    pub fn get(&self, column: Column) -> Option<&str> {
        let field = match column {
            Column::OrganizationIdentifier => &self.organization_id,
            Column::MonitoringLocationIdentifier => &self.monitoring_location_id,
            Column::ActivityStartDate => &self.activity_start_date,
            Column::ActivityEndDate => &self.activity_end_date,
            Column::CharacteristicName => &self.characteristic_name,
            Column::ResultMeasureValue => &self.result_value,
            Column::ResultMeasureUnitCode => &self.result_unit,
            Column::ResultStatusIdentifier => &self.result_status,
            Column::ResultCommentText => &self.comment,
            Column::DetectionLimitValue => &self.detection_limit,
        };
        field.as_deref()
    }

    pub fn set(&mut self, column: Column, value: Option<String>) {
        let field = match column {
            Column::OrganizationIdentifier => &mut self.organization_id,
            Column::MonitoringLocationIdentifier => &mut self.monitoring_location_id,
            Column::ActivityStartDate => &mut self.activity_start_date,
            Column::ActivityEndDate => &mut self.activity_end_date,
            Column::CharacteristicName => &mut self.characteristic_name,
            Column::ResultMeasureValue => &mut self.result_value,
            Column::ResultMeasureUnitCode => &mut self.result_unit,
            Column::ResultStatusIdentifier => &mut self.result_status,
            Column::ResultCommentText => &mut self.comment,
            Column::DetectionLimitValue => &mut self.detection_limit,
        };
        *field = value;
    }
}

/// Results table as fetched, before cleaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultTable {
    pub columns: ColumnSet,
    pub rows: Vec<RawResultRow>,
}

impl RawResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One cleaned observation. Numeric and date columns are typed; values
/// that could not be coerced are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    pub organization_id: Option<String>,
    pub monitoring_location_id: Option<String>,
    pub activity_start_date: Option<NaiveDate>,
    pub activity_end_date: Option<NaiveDate>,
    pub characteristic_name: Option<String>,
    pub result_value: Option<f64>,
    pub result_unit: Option<String>,
    pub result_status: Option<String>,
    pub comment: Option<String>,
    pub detection_limit: Option<f64>,
}

/// Cleaned results table. `columns` still records which columns the
/// portal returned, so reports can tell "absent" from "all null".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: ColumnSet,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(columns: ColumnSet, rows: Vec<ResultRow>) -> Self {
        Self { columns, rows }
    }

    /// Table carrying every known column.
    pub fn with_all_columns(rows: Vec<ResultRow>) -> Self {
        Self::new(all_columns(), rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }
}

/// Companion information about a results fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetadata {
    pub url: String,
    pub query_time: DateTime<Utc>,
    /// `Total-*` response headers (site/activity/result counts).
    pub counts: OrderedMap<String, String>,
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

/// A monitoring site record from the NWIS site service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteInfo {
    pub agency_cd: Option<String>,
    pub site_no: String,
    pub station_nm: Option<String>,
    pub site_tp_cd: Option<String>,
    pub dec_lat_va: Option<f64>,
    pub dec_long_va: Option<f64>,
    pub dec_coord_datum_cd: Option<String>,
    pub state_cd: Option<String>,
    pub county_cd: Option<String>,
    pub huc_cd: Option<String>,
    pub drain_area_va: Option<f64>,
}
