/// Water Quality Portal (WQP) result search: parameter building, URL
/// construction, and CSV parsing.
///
///   https://www.waterqualitydata.us/data/Result/search
///
/// The portal takes flat query parameters (lists separated by `;`) and
/// returns a CSV table, one row per result. See `fixtures.rs` for examples.

use chrono::{DateTime, NaiveDate, Utc};
use csv::ReaderBuilder;

use crate::error::FetchError;
use crate::model::{
    Column, OrderedMap, ParamValue, QueryFilter, QueryMetadata, RawResultRow, RawResultTable,
    RemoteQueryParams,
};

const RESULT_SEARCH_PATH: &str = "/data/Result/search";

/// WQP's list separator within a single parameter value.
pub const LIST_SEPARATOR: &str = ";";

/// Date format the portal expects for `startDateLo` / `startDateHi`.
pub const WQP_DATE_FORMAT: &str = "%m-%d-%Y";

// ---------------------------------------------------------------------------
// Parameter building
// ---------------------------------------------------------------------------

/// Translates a `QueryFilter` into the portal's parameter encoding.
///
/// Each present, non-empty filter field yields exactly one entry; absent
/// fields are omitted. No validation happens here.
pub fn build_query_params(filter: &QueryFilter) -> RemoteQueryParams {
    let mut params = RemoteQueryParams::new();

    push_list(&mut params, "siteid", &filter.site_no);
    push_list(&mut params, "statecode", &filter.state_cd);
    push_list(&mut params, "countycode", &filter.county_cd);
    push_list(&mut params, "huc", &filter.huc);
    if let Some(bbox) = &filter.bbox {
        let joined = bbox
            .iter()
            .map(|v| format_coordinate(*v))
            .collect::<Vec<_>>()
            .join(",");
        params.push("bbox", ParamValue::Text(joined));
    }
    push_list(&mut params, "characteristicName", &filter.characteristic_name);
    if let Some(start) = filter.start_date {
        params.push("startDateLo", ParamValue::Text(format_wqp_date(start)));
    }
    if let Some(end) = filter.end_date {
        params.push("startDateHi", ParamValue::Text(format_wqp_date(end)));
    }
    push_list(&mut params, "sampleMedia", &filter.sample_media);
    push_list(&mut params, "organization", &filter.organization);

    params
}

fn push_list(params: &mut RemoteQueryParams, key: &'static str, values: &Option<Vec<String>>) {
    if let Some(values) = values {
        if !values.is_empty() {
            params.push(key, ParamValue::List(values.clone()));
        }
    }
}

/// `2023-01-01` -> `01-01-2023`
pub fn format_wqp_date(date: NaiveDate) -> String {
    date.format(WQP_DATE_FORMAT).to_string()
}

/// Whole numbers keep one decimal place (`1.0`, not `1`).
fn format_coordinate(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Builds the result-search URL. Always requests uncompressed CSV.
pub fn build_results_url(base_url: &str, params: &RemoteQueryParams) -> String {
    let mut query: Vec<String> = params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&value.joined(LIST_SEPARATOR))
            )
        })
        .collect();
    query.push("mimeType=csv".to_string());
    query.push("zip=no".to_string());

    format!(
        "{}{}?{}",
        base_url.trim_end_matches('/'),
        RESULT_SEARCH_PATH,
        query.join("&")
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parses a WQP CSV body into a raw table.
///
/// Unknown columns are ignored; blank fields become `None`. An empty body
/// is an empty table with no columns.
///
/// # Errors
/// `FetchError::Csv` if the body is not readable CSV.
pub fn parse_results_csv(body: &str) -> Result<RawResultTable, FetchError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let layout: Vec<Option<Column>> = reader.headers()?.iter().map(Column::from_header).collect();

    let mut table = RawResultTable {
        columns: layout.iter().flatten().copied().collect(),
        rows: Vec::new(),
    };

    for record in reader.records() {
        let record = record?;
        let mut row = RawResultRow::default();
        for (column, field) in layout.iter().zip(record.iter()) {
            if let Some(column) = column {
                let trimmed = field.trim();
                if !trimmed.is_empty() {
                    row.set(*column, Some(trimmed.to_string()));
                }
            }
        }
        table.rows.push(row);
    }

    Ok(table)
}

/// Collects the `Total-*` count headers the portal attaches to a result
/// search, in the order they were received.
///
/// HTTP clients lowercase header names, so keys are rewritten to the
/// portal's spelling (`total-result-count` -> `Total-Result-Count`).
pub fn extract_metadata<'a, I>(url: &str, query_time: DateTime<Utc>, headers: I) -> QueryMetadata
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut counts = OrderedMap::new();
    for (name, value) in headers {
        if name.to_ascii_lowercase().starts_with("total-") {
            counts.push(canonical_header_name(name), value.to_string());
        }
    }

    QueryMetadata {
        url: url.to_string(),
        query_time,
        counts,
    }
}

fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
