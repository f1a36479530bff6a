/// Static vocabularies served by the API: commonly monitored parameter
/// names, grouped by category, and a few canned example queries.

use serde::Serialize;
use serde_json::{json, Value};

/// Parameter names accepted by the portal's `characteristicName` filter.
#[derive(Debug, Serialize)]
pub struct ParameterCatalog {
    pub physical: &'static [&'static str],
    pub chemical: &'static [&'static str],
    pub biological: &'static [&'static str],
    pub metals: &'static [&'static str],
}

impl ParameterCatalog {
    pub const CATEGORY_COUNT: usize = 4;

    pub fn categories(&self) -> [(&'static str, &'static [&'static str]); 4] {
        [
            ("physical", self.physical),
            ("chemical", self.chemical),
            ("biological", self.biological),
            ("metals", self.metals),
        ]
    }
}

pub static PARAMETERS: ParameterCatalog = ParameterCatalog {
    physical: &[
        "Temperature",
        "pH",
        "Dissolved oxygen",
        "Turbidity",
        "Conductivity",
        "Total dissolved solids",
        "Salinity",
    ],
    chemical: &[
        "Nitrogen",
        "Phosphorus",
        "Nitrate",
        "Nitrite",
        "Ammonia",
        "Total nitrogen",
        "Total phosphorus",
        "Chloride",
        "Sulfate",
    ],
    biological: &[
        "Escherichia coli",
        "Fecal coliform",
        "Enterococcus",
        "Total coliform",
        "Chlorophyll a",
    ],
    metals: &[
        "Lead",
        "Mercury",
        "Arsenic",
        "Cadmium",
        "Copper",
        "Zinc",
        "Iron",
        "Manganese",
        "Aluminum",
    ],
};

pub const USAGE_NOTE: &str =
    "Use these parameter names in the 'characteristic_name' field when querying data";

/// Body of `GET /water-quality/parameters`.
#[derive(Debug, Serialize)]
pub struct ParametersResponse {
    pub parameters: &'static ParameterCatalog,
    pub total_categories: usize,
    pub usage_note: &'static str,
}

pub fn parameters_response() -> ParametersResponse {
    ParametersResponse {
        parameters: &PARAMETERS,
        total_categories: ParameterCatalog::CATEGORY_COUNT,
        usage_note: USAGE_NOTE,
    }
}

/// Body of `GET /water-quality/example-queries`. Each example's `query`
/// and `config` are valid request bodies for `POST /water-quality/query`.
pub fn example_queries() -> Value {
    json!({
        "examples": {
            "yuba_river_temperature": {
                "description": "Temperature data from Yuba River",
                "query": {
                    "huc": ["18020125"],
                    "characteristic_name": ["Temperature"],
                    "start_date": "2023-01-01",
                    "end_date": "2023-12-31",
                    "state_cd": ["CA"]
                },
                "config": { "report_type": "trend" }
            },
            "american_river_nutrients": {
                "description": "Nutrient data from American River",
                "query": {
                    "huc": ["18020111"],
                    "characteristic_name": ["Nitrogen", "Phosphorus"],
                    "start_date": "2023-01-01",
                    "end_date": "2023-12-31",
                    "state_cd": ["CA"]
                },
                "config": { "report_type": "detailed" }
            },
            "california_ph_summary": {
                "description": "pH summary for California water bodies",
                "query": {
                    "state_cd": ["CA"],
                    "characteristic_name": ["pH"],
                    "start_date": "2023-01-01",
                    "end_date": "2023-12-31"
                },
                "config": { "report_type": "summary" }
            }
        },
        "note": "Use these examples as templates for your own queries"
    })
}
