use chrono::{DateTime, Datelike, NaiveDate, Utc};

pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

pub fn month_short(date: NaiveDate) -> String {
    date.format("%b").to_string()
}

/// First days of the `n` calendar months ending with the month of `now`, oldest first.
pub fn trailing_month_starts(now: DateTime<Utc>, n: u32) -> Vec<NaiveDate> {
    let today = now.date_naive();
    let mut months = Vec::with_capacity(n as usize);
    for i in (0..n as i32).rev() {
        let mut year = today.year();
        let mut month = today.month() as i32 - i;
        while month <= 0 {
            month += 12;
            year -= 1;
        }
        if let Some(d) = NaiveDate::from_ymd_opt(year, month as u32, 1) {
            months.push(d);
        }
    }
    months
}

pub fn same_month(date: NaiveDate, month_start: NaiveDate) -> bool {
    date.year() == month_start.year() && date.month() == month_start.month()
}

/// Stable 32-bit project id (FNV-1a over the full name).
pub fn stable_id(full_name: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in full_name.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn trailing_months_cross_year_boundary() {
        let months = trailing_month_starts(at(2026, 2, 15), 4);
        let keys: Vec<String> = months.iter().map(|d| day_key(*d)).collect();
        assert_eq!(keys, vec!["2025-11-01", "2025-12-01", "2026-01-01", "2026-02-01"]);
    }

    #[test]
    fn month_labels() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(month_label(d), "Aug 2026");
        assert_eq!(month_short(d), "Aug");
    }

    #[test]
    fn stable_id_is_deterministic() {
        assert_eq!(stable_id("owner/repo"), stable_id("owner/repo"));
        assert_ne!(stable_id("owner/repo"), stable_id("owner/other"));
    }
}
