/// Integration tests for the query-to-report pipeline
///
/// These tests verify:
/// 1. Portal parameters are built from the filter and handed to the source
/// 2. CSV -> clean -> limit -> report for each report type
/// 3. The JSON envelope callers receive
/// 4. Upstream failures surface as a single processing error
/// 5. Routing through the endpoint without a socket
///
/// No network access: an in-memory `WaterDataSource` serves inline CSV.
///
/// Run with: cargo test --test pipeline_integration

use wq_report_service::config::Settings;
use wq_report_service::endpoint::{self, AppContext};
use wq_report_service::error::{FetchError, ProcessingError};
use wq_report_service::ingest::nwis::{self, SiteQuery};
use wq_report_service::ingest::{FetchedResults, WaterDataSource, wqp};
use wq_report_service::model::{
    DEFAULT_MAX_RECORDS, ParamValue, QueryFilter, RemoteQueryParams, ReportConfig, ReportType,
    SiteInfo,
};
use wq_report_service::pipeline::{self, ReportPayload};

use chrono::{NaiveDate, Utc};
use serde_json::json;
use std::sync::Mutex;

// Dissolved oxygen and nitrate at two American River sites, 2021-2023.
// The last row has no organization and must be dropped by cleaning.
const TEST_CSV: &str = "\
OrganizationIdentifier,ActivityStartDate,MonitoringLocationIdentifier,CharacteristicName,ResultMeasureValue,ResultMeasure/MeasureUnitCode,ResultStatusIdentifier
USGS-CA,2021-04-02,USGS-11446500,Dissolved oxygen,10.8,mg/l,Accepted
USGS-CA,2021-09-14,USGS-11446500,Dissolved oxygen,8.2,mg/l,Accepted
USGS-CA,2022-04-05,USGS-11446500,Dissolved oxygen,10.4,mg/l,Accepted
USGS-CA,2023-04-11,USGS-11446500,Dissolved oxygen,11.0,mg/l,Accepted
SWRCB,2022-06-01,CEDEN-514ASB001,Nitrate,0.21,mg/l,Preliminary
SWRCB,2022-06-01,CEDEN-514ASB001,Nitrate,ND,mg/l,Preliminary
,2022-07-01,CEDEN-514ASB001,Nitrate,0.30,mg/l,Preliminary
";

const TEST_RDB: &str = "\
# US Geological Survey
#
agency_cd\tsite_no\tstation_nm\tsite_tp_cd\tdec_lat_va\tdec_long_va
5s\t15s\t50s\t7s\t16s\t16s
USGS\t11446500\tAMERICAN R A FAIR OAKS CA\tST\t38.63546\t-121.22774
";

struct InMemorySource {
    csv: &'static str,
    fail: bool,
    requests: Mutex<Vec<RemoteQueryParams>>,
}

impl InMemorySource {
    fn new() -> Self {
        Self { csv: TEST_CSV, fail: false, requests: Mutex::new(Vec::new()) }
    }

    fn unreachable() -> Self {
        Self { csv: "", fail: true, requests: Mutex::new(Vec::new()) }
    }
}

impl WaterDataSource for InMemorySource {
    fn fetch_results(&self, params: &RemoteQueryParams) -> Result<FetchedResults, FetchError> {
        self.requests.lock().unwrap().push(params.clone());
        if self.fail {
            return Err(FetchError::Timeout {
                url: "https://www.waterqualitydata.us/data/Result/search".to_string(),
                seconds: 30,
            });
        }
        let table = wqp::parse_results_csv(self.csv)?;
        let metadata = wqp::extract_metadata(
            "https://www.waterqualitydata.us/data/Result/search",
            Utc::now(),
            // Header names arrive lowercased, as reqwest delivers them.
            vec![("total-site-count", "2"), ("total-result-count", "7")],
        );
        Ok(FetchedResults { table, metadata: Some(metadata) })
    }

    fn fetch_site_info(&self, _query: &SiteQuery) -> Result<Vec<SiteInfo>, FetchError> {
        nwis::parse_site_rdb(TEST_RDB)
    }
}

fn american_river_filter() -> QueryFilter {
    QueryFilter {
        huc: Some(vec!["18020111".to_string()]),
        characteristic_name: Some(vec!["Dissolved oxygen".to_string(), "Nitrate".to_string()]),
        start_date: NaiveDate::from_ymd_opt(2021, 1, 1),
        end_date: NaiveDate::from_ymd_opt(2023, 12, 31),
        ..QueryFilter::default()
    }
}

fn run(report_type: ReportType) -> serde_json::Value {
    let source = InMemorySource::new();
    let config = ReportConfig { report_type, ..ReportConfig::default() };
    let report = pipeline::run_query(&source, &american_river_filter(), &config, DEFAULT_MAX_RECORDS)
        .expect("in-memory query should succeed");
    serde_json::to_value(&report).expect("report should serialize")
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[test]
fn test_source_receives_portal_parameters() {
    let source = InMemorySource::new();
    pipeline::run_query(&source, &american_river_filter(), &ReportConfig::default(), DEFAULT_MAX_RECORDS)
        .unwrap();

    let requests = source.requests.lock().unwrap();
    assert_eq!(requests.len(), 1, "exactly one remote call per query");
    let params = &requests[0];
    assert_eq!(params.get("huc"), Some(&ParamValue::List(vec!["18020111".to_string()])));
    assert_eq!(params.get("startDateLo"), Some(&ParamValue::Text("01-01-2021".to_string())));
    assert_eq!(params.get("startDateHi"), Some(&ParamValue::Text("12-31-2023".to_string())));
    assert_eq!(params.get("sampleMedia"), Some(&ParamValue::List(vec!["Water".to_string()])));
    assert!(params.get("siteid").is_none(), "unset fields are omitted");
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[test]
fn test_summary_report() {
    let json = run(ReportType::Summary);

    assert_eq!(json["report_type"], "summary");
    assert_eq!(json["records_processed"], 6, "row without organization is dropped");

    let summary = &json["data_summary"];
    assert_eq!(summary["total_records"], 6);
    assert_eq!(summary["date_range"]["start"], "2021-04-02T00:00:00");
    assert_eq!(summary["date_range"]["end"], "2023-04-11T00:00:00");
    assert_eq!(summary["parameters"]["Dissolved oxygen"], 4);
    assert_eq!(summary["parameters"]["Nitrate"], 2);
    assert_eq!(summary["organizations"]["USGS-CA"], 4);
    assert_eq!(summary["locations"], 2);
    assert_eq!(summary["unique_parameters"], 2);
    assert_eq!(json["data"], json!([]));
}

#[test]
fn test_detailed_report() {
    let json = run(ReportType::Detailed);
    let data = json["data"].as_array().expect("data is a list");

    assert_eq!(data.len(), 6);
    assert_eq!(json["data_summary"], json!({}));
    assert_eq!(data[0]["ActivityStartDate"], "2021-04-02T00:00:00");
    assert_eq!(data[0]["ResultMeasureValue"], 10.8);
    assert_eq!(data[5]["ResultMeasureValue"], json!(null), "ND is not a number");
    assert!(data[0].get("ResultCommentText").is_none(), "absent column is not projected");
}

#[test]
fn test_trend_report() {
    let json = run(ReportType::Trend);
    let trends = &json["data_summary"];

    let oxygen = &trends["Dissolved oxygen"];
    assert_eq!(oxygen["total_samples"], 4);
    assert_eq!(oxygen["years_covered"], 3);
    assert_eq!(oxygen["yearly_statistics"]["2021"]["count"], 2);
    assert_eq!(oxygen["yearly_statistics"]["2021"]["mean"], 9.5);
    assert_eq!(oxygen["yearly_statistics"]["2021"]["min"], 8.2);
    assert_eq!(oxygen["yearly_statistics"]["2021"]["max"], 10.8);

    // ND is counted as a sample but contributes no value.
    let nitrate = &trends["Nitrate"];
    assert_eq!(nitrate["total_samples"], 2);
    assert_eq!(nitrate["years_covered"], 1);
    assert_eq!(nitrate["yearly_statistics"]["2022"]["count"], 1);
    assert_eq!(nitrate["yearly_statistics"]["2022"]["std"], json!(null));
}

#[test]
fn test_comparison_report() {
    let json = run(ReportType::Comparison);
    assert_eq!(json["report_type"], "comparison");
    assert_eq!(json["data_summary"]["total_records"], 6);
    assert_eq!(json["data"].as_array().map(|d| d.len()), Some(6));
}

#[test]
fn test_record_cap_applies_before_reporting() {
    let source = InMemorySource::new();
    let config = ReportConfig { max_records: 2, report_type: ReportType::Summary, ..ReportConfig::default() };
    let report = pipeline::run_query(&source, &american_river_filter(), &config, DEFAULT_MAX_RECORDS).unwrap();

    assert_eq!(report.records_processed, 2);
    match report.payload {
        ReportPayload::Summary(_) => {}
        other => panic!("expected summary payload, got {:?}", other),
    }
}

#[test]
fn test_metadata_counts_pass_through() {
    let json = run(ReportType::Summary);
    assert_eq!(json["metadata"]["counts"]["Total-Result-Count"], "7");
    assert_eq!(json["metadata"]["counts"]["Total-Site-Count"], "2");
    assert!(json["metadata"]["url"].as_str().unwrap().contains("waterqualitydata"));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn test_timeout_surfaces_as_processing_error() {
    let source = InMemorySource::unreachable();
    let err = pipeline::run_query(&source, &QueryFilter::default(), &ReportConfig::default(), DEFAULT_MAX_RECORDS)
        .expect_err("unreachable source must fail");

    assert!(matches!(err, ProcessingError::Fetch(FetchError::Timeout { .. })));
    assert!(err.to_string().contains("timed out after 30 s"));
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

#[test]
fn test_endpoint_round_trip() {
    let ctx = AppContext {
        settings: Settings::default(),
        source: Box::new(InMemorySource::new()),
    };

    let body = json!({
        "query": { "huc": ["18020111"], "start_date": "2021-01-01" },
        "config": { "report_type": "trend", "include_metadata": false }
    })
    .to_string();

    let resp = endpoint::route(&ctx, "POST", "/water-quality/query", &body);
    assert_eq!(resp.status, 200);
    let report = resp.body.expect("report body");
    assert_eq!(report["report_type"], "trend");
    assert_eq!(report["metadata"], json!(null));

    let sites = endpoint::route(&ctx, "GET", "/water-quality/sites?state_cd=CA&site_type=Stream", "");
    let sites = sites.body.expect("sites body");
    assert_eq!(sites["count"], 1);
    assert_eq!(sites["sites"][0]["station_nm"], "AMERICAN R A FAIR OAKS CA");
}

#[test]
fn test_endpoint_timeout_is_500() {
    let ctx = AppContext {
        settings: Settings::default(),
        source: Box::new(InMemorySource::unreachable()),
    };
    let resp = endpoint::route(&ctx, "POST", "/water-quality/query", r#"{"query": {}}"#);
    assert_eq!(resp.status, 500);
    let detail = resp.body.unwrap()["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Error querying data: request to"), "got: {}", detail);
}
