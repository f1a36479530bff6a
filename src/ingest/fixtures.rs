/// Test fixtures: representative payloads from the Water Quality Portal
/// and the NWIS site service.
///
/// These are truncated to the columns the parsers care about plus a few
/// they must ignore. They reflect the shapes returned by:
///   https://www.waterqualitydata.us/data/Result/search?mimeType=csv&...
///   https://waterservices.usgs.gov/nwis/site/?format=rdb&siteOutput=expanded&...
///
/// WQP CSV notes:
///   - unit and detection limit headers are slash-qualified
///     (`ResultMeasure/MeasureUnitCode`)
///   - missing values are empty fields, never "NA"
///   - censored results show up as text such as "<0.5"; they are not numbers

/// Five Yuba/American River observations across two years, two
/// characteristics, and two organizations. Every row is valid.
#[cfg(test)]
pub(crate) fn fixture_wqp_results_csv() -> &'static str {
    "OrganizationIdentifier,OrganizationFormalName,ActivityIdentifier,ActivityMediaName,ActivityStartDate,ActivityEndDate,MonitoringLocationIdentifier,CharacteristicName,ResultMeasureValue,ResultMeasure/MeasureUnitCode,ResultStatusIdentifier,ResultCommentText,DetectionQuantitationLimitMeasure/MeasureValue
USGS-CA,USGS California Water Science Center,nwisca.01.02201,Water,2022-03-14,2022-03-14,USGS-11421000,Temperature,9.5,deg C,Accepted,,
USGS-CA,USGS California Water Science Center,nwisca.01.02202,Water,2022-08-02,,USGS-11421000,Temperature,18.1,deg C,Accepted,,
CEDEN,California Environmental Data Exchange Network,ceden.0045,Water,2023-02-20,2023-02-20,CEDEN-514YUB001,pH,7.4,std units,Final,\"field sonde, recalibrated\",
USGS-CA,USGS California Water Science Center,nwisca.01.03301,Water,2023-07-11,2023-07-11,USGS-11446500,Temperature,21.3,deg C,Accepted,,0.1
CEDEN,California Environmental Data Exchange Network,ceden.0046,Water,2023-09-05,2023-09-05,CEDEN-514YUB001,pH,<0.5,std units,Final,below reporting limit,0.5
"
}

/// Three observations: the second is missing its CharacteristicName, the
/// third has an unparseable start date.
#[cfg(test)]
pub(crate) fn fixture_wqp_missing_fields_csv() -> &'static str {
    "OrganizationIdentifier,MonitoringLocationIdentifier,ActivityStartDate,CharacteristicName,ResultMeasureValue
USGS-CA,USGS-11421000,2023-01-05,Temperature,12.0
USGS-CA,USGS-11421000,2023-01-06,,13.0
USGS-CA,USGS-11421000,not-a-date,Temperature,14.0
"
}

/// Header row only: the portal's answer when nothing matched.
#[cfg(test)]
pub(crate) fn fixture_wqp_header_only_csv() -> &'static str {
    "OrganizationIdentifier,MonitoringLocationIdentifier,ActivityStartDate,CharacteristicName,ResultMeasureValue\n"
}

/// Expanded site listing for two California stream sites.
#[cfg(test)]
pub(crate) fn fixture_nwis_sites_rdb() -> &'static str {
    "#
# US Geological Survey
# retrieved: 2024-05-01 12:00:00 -04:00
#
# The Site File stores location and general information about groundwater,
# surface water, and meteorological sites
#
agency_cd\tsite_no\tstation_nm\tsite_tp_cd\tlat_va\tlong_va\tdec_lat_va\tdec_long_va\tcoord_meth_cd\tdec_coord_datum_cd\tdistrict_cd\tstate_cd\tcounty_cd\thuc_cd\tdrain_area_va
5s\t15s\t50s\t7s\t11s\t12s\t16s\t16s\t1s\t10s\t3s\t2s\t3s\t16s\t8s
USGS\t11421000\tYUBA R NR MARYSVILLE CA\tST\t391031\t1213124\t39.1757\t-121.5233\tM\tNAD83\t06\t06\t115\t18020125\t1339
USGS\t11446500\tAMERICAN R A FAIR OAKS CA\tST\t383808\t1211338\t38.6355\t-121.2272\tM\tNAD83\t06\t06\t067\t18020111\t
"
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

#[cfg(test)]
use crate::error::FetchError;
#[cfg(test)]
use crate::ingest::{nwis, wqp, FetchedResults, WaterDataSource};
#[cfg(test)]
use crate::model::{RemoteQueryParams, SiteInfo};

/// `WaterDataSource` that serves fixture payloads and records every
/// result search it was asked to run.
#[cfg(test)]
pub(crate) struct FixtureSource {
    csv: &'static str,
    fail: bool,
    pub seen: std::sync::Arc<std::sync::Mutex<Vec<RemoteQueryParams>>>,
}

#[cfg(test)]
impl FixtureSource {
    pub fn new(csv: &'static str) -> Self {
        Self { csv, fail: false, seen: Default::default() }
    }

    /// Shared view of the recorded searches, usable after the source has
    /// been boxed into an `AppContext`.
    pub fn seen_handle(&self) -> std::sync::Arc<std::sync::Mutex<Vec<RemoteQueryParams>>> {
        std::sync::Arc::clone(&self.seen)
    }

    /// Every call fails as if the upstream answered 503.
    pub fn failing() -> Self {
        Self { csv: "", fail: true, seen: Default::default() }
    }
}

#[cfg(test)]
impl WaterDataSource for FixtureSource {
    fn fetch_results(&self, params: &RemoteQueryParams) -> Result<FetchedResults, FetchError> {
        self.seen.lock().unwrap().push(params.clone());
        if self.fail {
            return Err(FetchError::Status { status: 503, url: "https://wqp.test/".into() });
        }
        Ok(FetchedResults {
            table: wqp::parse_results_csv(self.csv)?,
            metadata: Some(wqp::extract_metadata(
                "https://wqp.test/",
                chrono::Utc::now(),
                vec![("total-result-count", "5")],
            )),
        })
    }

    fn fetch_site_info(&self, _query: &nwis::SiteQuery) -> Result<Vec<SiteInfo>, FetchError> {
        if self.fail {
            return Err(FetchError::Status { status: 503, url: "https://nwis.test/".into() });
        }
        nwis::parse_site_rdb(fixture_nwis_sites_rdb())
    }
}
