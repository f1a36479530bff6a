/// Cleaning and capping of fetched result tables.
///
/// `clean` drops rows that are missing an identifying field and coerces
/// the numeric and date columns; `limit` caps the row count. Neither
/// reorders rows: output order is whatever order the portal returned.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::model::{Column, RawResultRow, RawResultTable, ResultRow, ResultTable};

/// A row missing any of these (when the column exists) is dropped.
pub const ESSENTIAL_COLUMNS: [Column; 4] = [
    Column::OrganizationIdentifier,
    Column::MonitoringLocationIdentifier,
    Column::ActivityStartDate,
    Column::CharacteristicName,
];

/// Drops invalid rows and coerces typed columns.
///
/// Essential columns absent from the table are skipped rather than
/// treated as all-missing. Values that fail numeric or date coercion
/// become `None`; coercion never drops a row.
pub fn clean(table: RawResultTable) -> ResultTable {
    let RawResultTable { columns, rows } = table;
    if rows.is_empty() {
        return ResultTable::new(columns, Vec::new());
    }

    let required: Vec<Column> = ESSENTIAL_COLUMNS
        .into_iter()
        .filter(|c| columns.contains(c))
        .collect();

    let cleaned = rows
        .into_iter()
        .filter(|row| required.iter().all(|c| row.get(*c).is_some()))
        .map(coerce_row)
        .collect();

    ResultTable::new(columns, cleaned)
}

/// Keeps the first `max_records` rows, in existing order.
pub fn limit(mut table: ResultTable, max_records: usize) -> ResultTable {
    if table.rows.len() > max_records {
        table.rows.truncate(max_records);
    }
    table
}

fn coerce_row(raw: RawResultRow) -> ResultRow {
    ResultRow {
        activity_start_date: raw.activity_start_date.as_deref().and_then(parse_date),
        activity_end_date: raw.activity_end_date.as_deref().and_then(parse_date),
        result_value: raw.result_value.as_deref().and_then(parse_number),
        detection_limit: raw.detection_limit.as_deref().and_then(parse_number),
        organization_id: raw.organization_id,
        monitoring_location_id: raw.monitoring_location_id,
        characteristic_name: raw.characteristic_name,
        result_unit: raw.result_unit,
        result_status: raw.result_status,
        comment: raw.comment,
    }
}

/// Parses a finite number; `"<0.5"`, `"ND"` and `"NaN"` are missing.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses the date forms the portal emits, keeping only the calendar day.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                .map(|dt| dt.date())
                .ok()
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).map(|dt| dt.date_naive()).ok())
        .or_else(|| NaiveDate::parse_from_str(text, "%m/%d/%Y").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use crate::ingest::wqp::parse_results_csv;
    use crate::model::all_columns;

    fn raw_row(org: &str, loc: &str, date: &str, name: &str, value: &str) -> RawResultRow {
        let opt = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        RawResultRow {
            organization_id: opt(org),
            monitoring_location_id: opt(loc),
            activity_start_date: opt(date),
            characteristic_name: opt(name),
            result_value: opt(value),
            ..RawResultRow::default()
        }
    }

    fn numbered_table(n: usize) -> ResultTable {
        let rows = (0..n)
            .map(|i| ResultRow {
                monitoring_location_id: Some(format!("SITE-{}", i)),
                ..ResultRow::default()
            })
            .collect();
        ResultTable::with_all_columns(rows)
    }

    // --- clean ---------------------------------------------------------------

    #[test]
    fn test_clean_drops_row_missing_characteristic_name() {
        let raw = parse_results_csv(fixture_wqp_missing_fields_csv()).unwrap();
        let cleaned = clean(raw);

        assert_eq!(cleaned.len(), 2, "row without CharacteristicName should be dropped");
        assert!(cleaned.rows.iter().all(|r| r.characteristic_name.is_some()));
    }

    #[test]
    fn test_clean_keeps_row_with_unparseable_date_as_missing() {
        // Dropping happens on the raw value; coercion failure only nulls it.
        let raw = parse_results_csv(fixture_wqp_missing_fields_csv()).unwrap();
        let cleaned = clean(raw);

        let last = cleaned.rows.last().expect("two rows remain");
        assert!(last.activity_start_date.is_none());
        assert_eq!(last.result_value, Some(14.0));
    }

    #[test]
    fn test_clean_all_valid_rows_unchanged_except_types() {
        let raw = parse_results_csv(fixture_wqp_results_csv()).unwrap();
        let raw_count = raw.len();
        let cleaned = clean(raw.clone());

        assert_eq!(cleaned.len(), raw_count);
        assert_eq!(cleaned.columns, raw.columns);
        for (before, after) in raw.rows.iter().zip(&cleaned.rows) {
            assert_eq!(before.organization_id, after.organization_id);
            assert_eq!(before.monitoring_location_id, after.monitoring_location_id);
            assert_eq!(before.characteristic_name, after.characteristic_name);
            assert_eq!(before.result_unit, after.result_unit);
            assert_eq!(before.comment, after.comment);
        }
        assert_eq!(cleaned.rows[0].activity_start_date, NaiveDate::from_ymd_opt(2022, 3, 14));
        assert_eq!(cleaned.rows[0].result_value, Some(9.5));
    }

    #[test]
    fn test_clean_coerces_censored_value_to_missing() {
        let cleaned = clean(parse_results_csv(fixture_wqp_results_csv()).unwrap());
        let censored = &cleaned.rows[4];
        assert!(censored.result_value.is_none(), "'<0.5' is not a number");
        assert_eq!(censored.detection_limit, Some(0.5));
    }

    #[test]
    fn test_clean_skips_absent_essential_columns() {
        // No OrganizationIdentifier column at all: rows must survive.
        let mut columns = all_columns();
        columns.remove(&Column::OrganizationIdentifier);
        let raw = RawResultTable {
            columns,
            rows: vec![raw_row("", "USGS-1", "2023-01-01", "pH", "7.0")],
        };
        assert_eq!(clean(raw).len(), 1);
    }

    #[test]
    fn test_clean_drops_when_present_column_is_blank() {
        let raw = RawResultTable {
            columns: all_columns(),
            rows: vec![
                raw_row("", "USGS-1", "2023-01-01", "pH", "7.0"),
                raw_row("ORG", "", "2023-01-01", "pH", "7.0"),
                raw_row("ORG", "USGS-1", "", "pH", "7.0"),
                raw_row("ORG", "USGS-1", "2023-01-01", "pH", ""),
            ],
        };
        let cleaned = clean(raw);
        assert_eq!(cleaned.len(), 1, "only the row with all identifying fields survives");
        assert!(cleaned.rows[0].result_value.is_none());
    }

    #[test]
    fn test_clean_empty_table_is_noop() {
        let raw = RawResultTable {
            columns: all_columns(),
            rows: vec![],
        };
        let cleaned = clean(raw);
        assert!(cleaned.is_empty());
        assert_eq!(cleaned.columns, all_columns());
    }

    // --- coercion helpers ---------------------------------------------------

    #[test]
    fn test_parse_number_rejects_non_numeric() {
        assert_eq!(parse_number(" 7.25 "), Some(7.25));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number("<0.5"), None);
        assert_eq!(parse_number("ND"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_parse_date_forms() {
        let expected = NaiveDate::from_ymd_opt(2023, 7, 11);
        assert_eq!(parse_date("2023-07-11"), expected);
        assert_eq!(parse_date("2023-07-11 08:30:00"), expected);
        assert_eq!(parse_date("2023-07-11T08:30:00"), expected);
        assert_eq!(parse_date("2023-07-11T08:30:00-07:00"), expected);
        assert_eq!(parse_date("07/11/2023"), expected);
        assert_eq!(parse_date("2023-13-45"), None);
        assert_eq!(parse_date("not-a-date"), None);
    }

    // --- limit ---------------------------------------------------------------

    #[test]
    fn test_limit_keeps_first_rows_in_order() {
        let limited = limit(numbered_table(10), 5);
        assert_eq!(limited.len(), 5);
        for (i, row) in limited.rows.iter().enumerate() {
            assert_eq!(row.monitoring_location_id, Some(format!("SITE-{}", i)));
        }
    }

    #[test]
    fn test_limit_under_cap_is_unchanged() {
        let table = numbered_table(3);
        assert_eq!(limit(table.clone(), 5), table);
        assert_eq!(limit(table.clone(), 3), table);
    }

    #[test]
    fn test_limit_zero_empties_table() {
        assert!(limit(numbered_table(4), 0).is_empty());
    }
}
