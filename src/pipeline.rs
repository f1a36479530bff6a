/// Query-to-report pipeline.
///
/// build params -> fetch -> clean -> limit -> report -> envelope
///
/// Data flows one way and every stage runs sequentially on the calling
/// worker. Any stage failure aborts the request with a `ProcessingError`;
/// there are no partial results and no retries.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Serialize, Serializer};

use crate::analysis::cleaning;
use crate::analysis::reports::{
    self, ComparisonReport, DetailedRecord, SummaryReport, TrendReport,
};
use crate::error::ProcessingError;
use crate::ingest::nwis::SiteQuery;
use crate::ingest::{WaterDataSource, wqp};
use crate::model::{
    OrderedMap, ParamValue, QueryFilter, QueryMetadata, RemoteQueryParams, ReportConfig,
    ReportType, ResultTable, SiteInfo,
};

// ---------------------------------------------------------------------------
// Report envelope
// ---------------------------------------------------------------------------

/// The generated report body, one variant per report type.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportPayload {
    Summary(SummaryReport),
    Detailed(Vec<DetailedRecord>),
    Trend(TrendReport),
    Comparison(ComparisonReport),
}

impl ReportPayload {
    pub fn report_type(&self) -> ReportType {
        match self {
            ReportPayload::Summary(_) => ReportType::Summary,
            ReportPayload::Detailed(_) => ReportType::Detailed,
            ReportPayload::Trend(_) => ReportType::Trend,
            ReportPayload::Comparison(_) => ReportType::Comparison,
        }
    }
}

/// Terminal artifact of a query.
///
/// Serializes as the response envelope:
/// `{query_info, report_type, generated_at, data_summary, records_processed, data, metadata}`
/// where `data_summary` carries the summary/trend payload and `data` the
/// detailed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub query_info: RemoteQueryParams,
    pub generated_at: DateTime<Utc>,
    pub records_processed: usize,
    pub payload: ReportPayload,
    pub metadata: Option<QueryMetadata>,
}

#[derive(Serialize)]
struct EmptyObject {}

#[derive(Serialize)]
#[serde(untagged)]
enum DataSummary<'a> {
    Summary(&'a SummaryReport),
    Trend(&'a TrendReport),
    Empty(EmptyObject),
}

#[derive(Serialize)]
struct Envelope<'a> {
    query_info: &'a RemoteQueryParams,
    report_type: &'static str,
    generated_at: &'a DateTime<Utc>,
    data_summary: DataSummary<'a>,
    records_processed: usize,
    data: &'a [DetailedRecord],
    metadata: Option<&'a QueryMetadata>,
}

const NO_RECORDS: &[DetailedRecord] = &[];

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (data_summary, data): (DataSummary, &[DetailedRecord]) = match &self.payload {
            ReportPayload::Summary(summary) => (DataSummary::Summary(summary), NO_RECORDS),
            ReportPayload::Detailed(records) => {
                (DataSummary::Empty(EmptyObject {}), records.as_slice())
            }
            ReportPayload::Trend(trend) => (DataSummary::Trend(trend), NO_RECORDS),
            ReportPayload::Comparison(cmp) => {
                (DataSummary::Summary(&cmp.summary), cmp.records.as_slice())
            }
        };

        Envelope {
            query_info: &self.query_info,
            report_type: self.payload.report_type().as_str(),
            generated_at: &self.generated_at,
            data_summary,
            records_processed: self.records_processed,
            data,
            metadata: self.metadata.as_ref(),
        }
        .serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Dispatches a cleaned table to the requested report generator.
pub fn generate_report(
    table: &ResultTable,
    params: &RemoteQueryParams,
    report_type: ReportType,
) -> ReportPayload {
    match report_type {
        ReportType::Summary => ReportPayload::Summary(reports::summary_report(table, params)),
        ReportType::Detailed => ReportPayload::Detailed(reports::detailed_report(table, params)),
        ReportType::Trend => ReportPayload::Trend(reports::trend_report(table, params)),
        ReportType::Comparison => {
            ReportPayload::Comparison(reports::comparison_report(table, params))
        }
    }
}

/// Runs one query end to end.
///
/// `record_cap` is the service-wide ceiling; the effective limit is the
/// smaller of it and `config.max_records`. Metadata is attached only when
/// requested and the source supplied some.
pub fn run_query(
    source: &dyn WaterDataSource,
    filter: &QueryFilter,
    config: &ReportConfig,
    record_cap: usize,
) -> Result<Report, ProcessingError> {
    let params = wqp::build_query_params(filter);

    let fetched = source.fetch_results(&params)?;
    let fetched_rows = fetched.table.len();

    let cleaned = cleaning::clean(fetched.table);
    let cleaned_rows = cleaned.len();

    let max_records = config.max_records.min(record_cap);
    let table = cleaning::limit(cleaned, max_records);

    info!(
        "{} report: {} rows fetched, {} after cleaning, {} processed",
        config.report_type.as_str(),
        fetched_rows,
        cleaned_rows,
        table.len()
    );

    let payload = generate_report(&table, &params, config.report_type);

    Ok(Report {
        records_processed: table.len(),
        query_info: params,
        generated_at: Utc::now(),
        payload,
        metadata: fetched.metadata.filter(|_| config.include_metadata),
    })
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

/// Response body for a site listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitesResponse {
    pub sites: Vec<SiteInfo>,
    pub count: usize,
    /// Echo of the request as given (site types before mapping); empty
    /// when nothing matched.
    pub query_params: OrderedMap<&'static str, ParamValue>,
}

/// Fetches monitoring sites for the given states and site types.
pub fn list_sites(
    source: &dyn WaterDataSource,
    query: &SiteQuery,
) -> Result<SitesResponse, ProcessingError> {
    let sites = source.fetch_site_info(query)?;
    if sites.is_empty() {
        return Ok(SitesResponse {
            sites,
            count: 0,
            query_params: OrderedMap::new(),
        });
    }

    let mut query_params = OrderedMap::new();
    query_params.push("stateCd", ParamValue::List(query.state_cd.clone()));
    query_params.push("siteType", ParamValue::List(query.site_type.clone()));
    if let Some(since) = query.has_data_since {
        query_params.push("startDt", ParamValue::Text(since.format("%Y-%m-%d").to_string()));
    }

    Ok(SitesResponse {
        count: sites.len(),
        sites,
        query_params,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
