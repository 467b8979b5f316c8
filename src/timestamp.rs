use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// UTC+07:00 (Asia/Ho_Chi_Minh, no DST).
pub const OFFSET_SECS: i32 = 7 * 3600;
pub const OFFSET_SUFFIX: &str = "+0700";

pub fn report_zone() -> FixedOffset {
    FixedOffset::east_opt(OFFSET_SECS).expect("valid fixed offset")
}

/// `YYYY-MM-DD HH:MM:SS +0700` for the given instant, independent of host timezone.
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    let local = at.with_timezone(&report_zone());
    format!("{} {}", local.format("%Y-%m-%d %H:%M:%S"), OFFSET_SUFFIX)
}

/// Calendar date (`YYYY-MM-DD`) of the instant in the report timezone.
pub fn date_string<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    at.with_timezone(&report_zone()).format("%Y-%m-%d").to_string()
}

pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_fixed_zone() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 18, 30, 5).unwrap();
        assert_eq!(format_timestamp(&at), "2024-01-02 01:30:05 +0700");
    }

    #[test]
    fn date_rolls_over_at_local_midnight() {
        let before = Utc.with_ymd_and_hms(2024, 1, 1, 16, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 17, 0, 0).unwrap();
        assert_eq!(date_string(&before), "2024-01-01");
        assert_eq!(date_string(&after), "2024-01-02");
    }

    #[test]
    fn host_offset_is_ignored() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let at = tokyo.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        assert_eq!(format_timestamp(&at), "2024-03-10 07:00:00 +0700");
    }
}
