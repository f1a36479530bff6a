/// Data analysis for the water-quality reporting service.
///
/// Submodules:
/// - `cleaning` — drops invalid rows, coerces typed columns, caps row count.
/// - `reports`  — summary, detailed, trend, and comparison report shapes.

pub mod cleaning;
pub mod reports;
