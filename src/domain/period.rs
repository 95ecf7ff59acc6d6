//! Filing period and key normalisation helpers.

use chrono::{Datelike, NaiveDate};

/// Period being filed on `today`: the previous calendar month as `YYYYMM`
pub fn current_filing_period(today: NaiveDate) -> String {
    let (year, month) = match today.month() {
        1 => (today.year() - 1, 12),
        m => (today.year(), m - 1),
    };
    format!("{}{:02}", year, month)
}

/// Registry key for a profile link text (`Registro de Contribuyentes` → `registro_de_contribuyentes`)
pub fn profile_field_key(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}
