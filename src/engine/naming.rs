//! Output file naming for the positional protocol.
//!
//! `Jadwal_Bulan_<MonthName>-<Year>_<HHMMSS>.xlsx`, month names in Indonesian,
//! time as 24-hour local wall clock at invocation.

use chrono::NaiveTime;

/// Indonesian month names, January first
pub const MONTH_NAMES: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// Full month name for 1-12
pub fn month_name(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|idx| MONTH_NAMES.get(idx as usize))
        .copied()
}

/// File name for a run started at `time`
pub fn output_file_name(month: u32, year: u32, time: NaiveTime) -> String {
    let name = month_name(month)
        .map(str::to_string)
        .unwrap_or_else(|| month.to_string());
    format!("Jadwal_Bulan_{}-{}_{}.xlsx", name, year, time.format("%H%M%S"))
}
