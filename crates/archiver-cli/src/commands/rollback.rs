//! Rollback command handlers

use std::io::Write;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use archiver_core::{Archive, RollbackRequest};

use crate::output::Output;

/// Naive formats accepted by `--date`, read in local time
const LOCAL_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Parse a `--date` argument
///
/// Accepts RFC 3339, `@<unix seconds>`, or a local date and time such as
/// `2024-03-01 12:00`. A bare date means local midnight.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Ok(date.with_timezone(&Utc));
    }
    if let Some(secs) = input.strip_prefix('@') {
        let secs: i64 = secs
            .parse()
            .with_context(|| format!("Invalid timestamp: {}", input))?;
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .with_context(|| format!("Timestamp out of range: {}", input));
    }

    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .map(|day| day.and_time(NaiveTime::MIN))
        });
    let Some(naive) = naive else {
        bail!(
            "Invalid date '{}': use RFC 3339, YYYY-MM-DD [HH:MM[:SS]] or @SECONDS",
            input
        );
    };

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .with_context(|| format!("'{}' does not exist in the local time zone", input))
}

/// Apply a rollback
pub fn apply(
    archive: &mut Archive,
    location: &str,
    request: &RollbackRequest,
    output: &Output,
) -> Result<()> {
    let report = archive
        .rollback(location, request, Utc::now())
        .with_context(|| format!("Rollback of '{}' failed", location))?;
    output.print_rollback_report(&report);
    Ok(())
}

/// Write what a rollback would produce without applying it
pub fn show(
    archive: &Archive,
    location: &str,
    request: &RollbackRequest,
    sink: &mut impl Write,
) -> Result<()> {
    archive
        .dump_rollback_data(location, request, sink)
        .with_context(|| format!("Could not compute rollback of '{}'", location))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use archiver_core::{RollbackTarget, StoreMask, Value};

    fn seeded() -> Archive {
        let mut archive = Archive::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (i, color) in ["#39374b", "#112233"].iter().enumerate() {
            archive
                .store_value(
                    "default",
                    "/bg/color1",
                    Value::from(*color),
                    t0 + chrono::Duration::seconds(i as i64),
                    StoreMask::Previous,
                )
                .unwrap();
        }
        archive
    }

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(
            parse_date("2024-03-01T12:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_unix_seconds() {
        assert_eq!(
            parse_date("@86400").unwrap(),
            Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 0).unwrap()
        );
        assert!(parse_date("@soon").is_err());
    }

    #[test]
    fn test_parse_local_forms() {
        let expected = Local
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_date("2024-03-01 12:30").unwrap(), expected);
        assert_eq!(parse_date("2024-03-01 12:30:00").unwrap(), expected);

        let midnight = Local
            .with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_date(" 2024-03-01 ").unwrap(), midnight);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2024-13-01").is_err());
    }

    #[test]
    fn test_show_then_apply() {
        let mut archive = seeded();
        let request = RollbackRequest::new(RollbackTarget::Last).with_backend("bg");

        let mut shown = Vec::new();
        show(&archive, "default", &request, &mut shown).unwrap();
        let shown = String::from_utf8(shown).unwrap();
        assert!(shown.contains("#39374b"));
        assert_eq!(
            archive.get("default", "/bg/color1").unwrap(),
            Some(&Value::from("#112233"))
        );

        apply(&mut archive, "default", &request, &Output::new(OutputFormat::Quiet)).unwrap();
        assert_eq!(
            archive.get("default", "/bg/color1").unwrap(),
            Some(&Value::from("#39374b"))
        );
    }
}
