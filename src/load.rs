use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::MatchConfig;
use crate::models::{ExecutionRecord, PlanningRecord, RegistrationFlags};
use crate::normalize::name_key;

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H.%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Deserialize)]
struct PlanningRow {
    client: String,
    #[serde(default)]
    intervention: String,
    #[serde(default)]
    scheduled_date: String,
    #[serde(default)]
    scheduled_time: String,
    #[serde(default)]
    performed_time: String,
    #[serde(default)]
    signed_by: String,
}

#[derive(Debug, Deserialize)]
struct ExecutionRow {
    client: String,
    staff: String,
    #[serde(default)]
    visit_type: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    on_site: String,
    #[serde(default)]
    manual_mobile: String,
    #[serde(default)]
    manual_desktop: String,
    #[serde(default)]
    updated_web: String,
    #[serde(default)]
    updated_mobile: String,
    #[serde(default)]
    mobile_time_changed: String,
}

pub fn load_planning_file(path: &Path, config: &MatchConfig) -> anyhow::Result<Vec<PlanningRecord>> {
    let file = File::open(path).with_context(|| format!("failed to open planning file {}", path.display()))?;
    load_planning(file, config).with_context(|| format!("failed to read planning file {}", path.display()))
}

pub fn load_execution_file(path: &Path, config: &MatchConfig) -> anyhow::Result<Vec<ExecutionRecord>> {
    let file = File::open(path).with_context(|| format!("failed to open execution file {}", path.display()))?;
    load_execution(file, config).with_context(|| format!("failed to read execution file {}", path.display()))
}

/// Reads the planning export. Every row is kept; rows whose scheduled time
/// does not parse carry `planned_at: None`.
pub fn load_planning<R: Read>(source: R, config: &MatchConfig) -> anyhow::Result<Vec<PlanningRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(source);
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<PlanningRow>().enumerate() {
        let row = result.with_context(|| format!("malformed planning row {}", index + 2))?;
        let planned_at = parse_timestamp(&row.scheduled_date, &row.scheduled_time);
        if planned_at.is_none() {
            debug!(row = index + 2, date = %row.scheduled_date, time = %row.scheduled_time, "unparseable planned time");
        }

        records.push(PlanningRecord {
            client_key: name_key(&row.client),
            signer_key: name_key(&row.signed_by),
            unsigned: row.performed_time.trim() == config.unsigned_marker.trim(),
            planned_at,
            client: row.client,
            intervention: row.intervention,
            scheduled_date: row.scheduled_date,
            scheduled_time: row.scheduled_time,
            signed_by: row.signed_by,
        });
    }

    info!(
        rows = records.len(),
        unsigned = records.iter().filter(|r| r.unsigned).count(),
        "loaded planning records"
    );
    Ok(records)
}

/// Reads the execution export, skipping the preamble rows above the header.
/// Rows without a date or with an unparseable visit time are dropped.
pub fn load_execution<R: Read>(source: R, config: &MatchConfig) -> anyhow::Result<Vec<ExecutionRecord>> {
    let mut buffered = BufReader::new(source);
    for _ in 0..config.execution_skip_rows {
        let mut preamble = String::new();
        if buffered.read_line(&mut preamble)? == 0 {
            break;
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(buffered);
    let mut records = Vec::new();
    let mut dropped = 0usize;
    let first_data_line = config.execution_skip_rows + 2;

    for (index, result) in reader.deserialize::<ExecutionRow>().enumerate() {
        let line = first_data_line + index;
        let row = result.with_context(|| format!("malformed execution row on line {line}"))?;
        if row.date.trim().is_empty() {
            dropped += 1;
            continue;
        }
        let Some(visited_at) = parse_timestamp(&row.date, &row.time) else {
            warn!(line, date = %row.date, time = %row.time, "dropping execution row with unparseable visit time");
            dropped += 1;
            continue;
        };

        records.push(ExecutionRecord {
            client_key: name_key(&row.client),
            staff_key: name_key(&row.staff),
            visited_at,
            flags: RegistrationFlags {
                on_site: is_yes(&row.on_site),
                manual_mobile: is_yes(&row.manual_mobile),
                manual_desktop: is_yes(&row.manual_desktop),
                updated_web: is_yes(&row.updated_web),
                updated_mobile: is_yes(&row.updated_mobile),
                mobile_time_changed: is_yes(&row.mobile_time_changed),
            },
            client: row.client,
            staff: row.staff,
            visit_type: row.visit_type,
            status: row.status,
        });
    }

    info!(rows = records.len(), dropped, "loaded execution records");
    Ok(records)
}

/// Combines a date cell and a time cell into a timestamp.
///
/// The time may carry a "kl " prefix or already hold the full date; a date
/// cell with a trailing midnight time is reduced to its date part.
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let time = time.trim();
    let time = time.strip_prefix("kl ").unwrap_or(time).trim();

    if let Some(full) = parse_datetime(time) {
        return Some(full);
    }

    let date = date.split_whitespace().next().unwrap_or("");
    if date.is_empty() {
        return None;
    }
    if time.is_empty() {
        return parse_date(date).and_then(|d| d.and_hms_opt(0, 0, 0));
    }
    parse_datetime(&format!("{date} {time}"))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn is_yes(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "yes" | "ja")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const PLANNING_CSV: &str = "\
client,intervention,scheduled_date,scheduled_time,performed_time,signed_by
\"Andersson, Eva\",Morning care,2024-05-01,kl 10:00,Ej signerad,
\"Karlsson, Ulla\",Lunch,2024-05-01,12:15,12:20,\"Nilsson, Per\"
Holm Sara,Evening care,2024-05-01,late,Ej signerad,
";

    const EXECUTION_CSV: &str = "\
Visit report,,,,,
Exported 2024-05-02,,,,,
client,staff,visit_type,date,time,status,on_site,manual_mobile
Eva Andersson,\"Nilsson, Per\",Personal care,2024-05-01,11:30,Completed,Ja,
Ulla Karlsson,Berg Lena,Personal care,2024-05-01,not a time,Completed,,Yes
,,,,,,,
Sara Holm,Berg Lena,Personal care,2024-05-01,2024-05-01 19:05:00,Missed visit,,ja
";

    #[test]
    fn planning_rows_carry_keys_and_unsigned_flag() {
        let records = load_planning(PLANNING_CSV.as_bytes(), &MatchConfig::default()).unwrap();
        assert_eq!(records.len(), 3);

        let eva = &records[0];
        assert!(eva.unsigned);
        assert_eq!(eva.client_key, "andersson eva");
        assert_eq!(eva.planned_at.map(|t| t.hour()), Some(10));

        let ulla = &records[1];
        assert!(!ulla.unsigned);
        assert_eq!(ulla.signer_key, "nilsson per");

        assert!(records[2].planned_at.is_none());
    }

    #[test]
    fn execution_skips_preamble_and_drops_bad_times() {
        let records = load_execution(EXECUTION_CSV.as_bytes(), &MatchConfig::default()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].staff_key, "nilsson per");
        assert!(records[0].flags.on_site);
        assert!(!records[0].flags.manual_mobile);

        assert_eq!(records[1].client_key, "holm sara");
        assert_eq!(records[1].visited_at.hour(), 19);
        assert!(records[1].flags.manual_mobile);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let csv = "intervention,scheduled_date\nLunch,2024-05-01\n";
        assert!(load_planning(csv.as_bytes(), &MatchConfig::default()).is_err());
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        assert!(parse_timestamp("2024-05-01", "10:00").is_some());
        assert!(parse_timestamp("2024-05-01", "kl 10:00").is_some());
        assert!(parse_timestamp("2024-05-01", "10:00:30").is_some());
        assert!(parse_timestamp("2024-05-01 00:00:00", "10:00").is_some());
        assert!(parse_timestamp("", "2024-05-01T10:00:00").is_some());
        assert_eq!(
            parse_timestamp("2024-05-01", "").map(|t| t.hour()),
            Some(0)
        );
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_timestamp("", "10:00").is_none());
        assert!(parse_timestamp("2024-05-01", "soon").is_none());
        assert!(parse_timestamp("yesterday", "10:00").is_none());
    }
}
