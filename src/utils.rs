use chrono::{DateTime, NaiveDate, TimeZone};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Date format used for every per-day key (ratings, success dates, moves)
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Milliseconds in one calendar day (used for "move to tomorrow")
pub const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "riselog-dev",
            Profile::Prod => "riselog",
        }
    }
}

/// Get the configuration directory path
/// If profile is Dev, uses "riselog-dev" instead of "riselog"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "riselog", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "riselog", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(date_str, DATE_KEY_FORMAT)
}

/// Calendar date key (yyyy-MM-dd) of `now` in its own timezone
pub fn date_key<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format(DATE_KEY_FORMAT).to_string()
}

/// Calendar date key of an epoch-millis timestamp, viewed in the timezone of `reference`
pub fn date_key_of_millis<Tz: TimeZone>(millis: i64, reference: &DateTime<Tz>) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    let tz = reference.timezone();
    tz.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format(DATE_KEY_FORMAT).to_string())
}

/// Parse a wall-clock "HH:MM" string, rejecting out-of-range values
pub fn parse_time_of_day(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.trim().split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

pub fn format_time_of_day(hour: u32, minute: u32) -> String {
    format!("{:02}:{:02}", hour, minute)
}

/// Render an epoch-millis timestamp as "dd/MM/yyyy HH:mm" in the timezone of `reference`
pub fn format_millis<Tz: TimeZone>(millis: i64, reference: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    reference
        .timezone()
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn parses_valid_times_only() {
        assert_eq!(parse_time_of_day("07:05"), Some((7, 5)));
        assert_eq!(parse_time_of_day(" 23:59 "), Some((23, 59)));
        assert_eq!(parse_time_of_day("24:00"), None);
        assert_eq!(parse_time_of_day("7-05"), None);
        assert_eq!(parse_time_of_day(""), None);
    }

    #[test]
    fn date_key_uses_reference_timezone() {
        let tehran = FixedOffset::east_opt(3 * 3600 + 1800).unwrap();
        let now = tehran.with_ymd_and_hms(2026, 3, 21, 1, 0, 0).unwrap();
        // 2026-03-20 22:00 UTC is already the 21st in Tehran
        let millis = chrono::Utc
            .with_ymd_and_hms(2026, 3, 20, 22, 0, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(date_key_of_millis(millis, &now).as_deref(), Some("2026-03-21"));
        assert_eq!(date_key(&now), "2026-03-21");
    }
}
