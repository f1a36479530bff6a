/// USGS NWIS Site Service client helpers: site-type vocabulary, URL
/// construction, and RDB parsing.
///
///   https://waterservices.usgs.gov/nwis/site/
///
/// Format: tab-delimited RDB. Lines starting with '#' are comments, the
/// first non-comment line holds column names, the second holds format
/// descriptors (e.g. "5s", "15s"), and the rest are data rows.

use chrono::NaiveDate;
use log::warn;
use std::collections::HashMap;

use crate::error::FetchError;
use crate::model::{OrderedMap, ParamValue, SiteInfo};

/// Human site-type names and their NWIS codes. Unknown names pass through.
pub static SITE_TYPE_CODES: &[(&str, &str)] = &[
    ("Stream", "ST"),
    ("Lake", "LK"),
    ("Groundwater", "GW"),
];

/// Filters for a site listing, as requested by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteQuery {
    pub state_cd: Vec<String>,
    pub site_type: Vec<String>,
    pub has_data_since: Option<NaiveDate>,
}

/// Site-service parameters, keyed by NWIS parameter name.
pub type SiteParams = OrderedMap<&'static str, ParamValue>;

/// `"Stream"` -> `"ST"`; anything unrecognized is returned unchanged.
pub fn map_site_type(name: &str) -> String {
    SITE_TYPE_CODES
        .iter()
        .find(|(human, _)| *human == name)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Builds the site-service parameters.
///
/// `siteOutput=expanded` is always set explicitly: the service does not
/// honor the capitalized "Expanded" spelling some clients default to.
pub fn build_site_params(query: &SiteQuery) -> SiteParams {
    let mut params = SiteParams::new();
    params.push("stateCd", ParamValue::List(query.state_cd.clone()));
    params.push(
        "siteType",
        ParamValue::List(query.site_type.iter().map(|t| map_site_type(t)).collect()),
    );
    params.push("siteOutput", ParamValue::Text("expanded".to_string()));
    if let Some(since) = query.has_data_since {
        params.push("startDt", ParamValue::Text(since.format("%Y-%m-%d").to_string()));
    }
    params
}

/// Builds the site-service URL. Always requests RDB.
pub fn build_site_url(base_url: &str, params: &SiteParams) -> String {
    let mut query = vec!["format=rdb".to_string()];
    for (key, value) in params.iter() {
        query.push(format!("{}={}", key, urlencoding::encode(&value.joined(","))));
    }
    format!("{}?{}", base_url, query.join("&"))
}

/// Parses an expanded-output site listing.
///
/// A body with no header line (comments only, or empty) yields no sites.
/// Rows without a `site_no` are skipped.
///
/// # Errors
/// `FetchError::Rdb` if the header is present but the format line is not,
/// or the `site_no` column is missing.
pub fn parse_site_rdb(rdb_text: &str) -> Result<Vec<SiteInfo>, FetchError> {
    let mut data_lines = rdb_text
        .lines()
        .filter(|line| !line.trim().starts_with('#') && !line.trim().is_empty());

    let header_line = match data_lines.next() {
        Some(line) => line,
        None => return Ok(Vec::new()),
    };
    let col_map: HashMap<&str, usize> = header_line
        .split('\t')
        .enumerate()
        .map(|(idx, name)| (name.trim(), idx))
        .collect();

    if !col_map.contains_key("site_no") {
        return Err(FetchError::Rdb("Missing site_no column".to_string()));
    }

    // Format descriptors (skip)
    data_lines
        .next()
        .ok_or_else(|| FetchError::Rdb("No format line found in RDB data".to_string()))?;

    let mut sites = Vec::new();
    for (line_no, line) in data_lines.enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        let text = |name: &str| -> Option<String> {
            col_map
                .get(name)
                .and_then(|&idx| fields.get(idx))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };
        let number = |name: &str| -> Option<f64> { text(name).and_then(|s| s.parse().ok()) };

        let Some(site_no) = text("site_no") else {
            warn!("Skipping site row {} without site_no", line_no + 1);
            continue;
        };

        sites.push(SiteInfo {
            agency_cd: text("agency_cd"),
            site_no,
            station_nm: text("station_nm"),
            site_tp_cd: text("site_tp_cd"),
            dec_lat_va: number("dec_lat_va"),
            dec_long_va: number("dec_long_va"),
            dec_coord_datum_cd: text("dec_coord_datum_cd"),
            state_cd: text("state_cd"),
            county_cd: text("county_cd"),
            huc_cd: text("huc_cd"),
            drain_area_va: number("drain_area_va"),
        });
    }

    Ok(sites)
}
