use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::matcher::MatchOutcome;
use crate::models::{ExceptionCategory, RegistrationSummary, SummaryRow};

#[derive(Debug, Serialize)]
struct SummaryLine<'a> {
    #[serde(rename = "Staff")]
    name: &'a str,
    #[serde(rename = "Signed")]
    signed: usize,
    #[serde(rename = "Unsigned")]
    unsigned: usize,
    #[serde(rename = "Total")]
    total: usize,
    #[serde(rename = "Unsigned share (%)")]
    unsigned_pct: f64,
}

#[derive(Debug, Serialize)]
struct AttributionLine<'a> {
    #[serde(rename = "Client")]
    client: &'a str,
    #[serde(rename = "Intervention")]
    intervention: &'a str,
    #[serde(rename = "Scheduled date")]
    scheduled_date: &'a str,
    #[serde(rename = "Scheduled time")]
    scheduled_time: &'a str,
    #[serde(rename = "Responsible for missing signature")]
    staff: &'a str,
}

#[derive(Debug, Serialize)]
struct ExceptionLine<'a> {
    #[serde(rename = "Client")]
    client: &'a str,
    #[serde(rename = "Intervention")]
    intervention: &'a str,
    #[serde(rename = "Scheduled date")]
    scheduled_date: &'a str,
    #[serde(rename = "Scheduled time")]
    scheduled_time: &'a str,
    #[serde(rename = "Reason")]
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct RegistrationLine<'a> {
    #[serde(rename = "Staff")]
    staff: &'a str,
    #[serde(rename = "On site")]
    on_site: usize,
    #[serde(rename = "Manual (mobile)")]
    manual_mobile: usize,
    #[serde(rename = "Manual (desktop)")]
    manual_desktop: usize,
    #[serde(rename = "Updated from web")]
    updated_web: usize,
    #[serde(rename = "Updated from mobile")]
    updated_mobile: usize,
    #[serde(rename = "Mobile time changed")]
    mobile_time_changed: usize,
    #[serde(rename = "Visits")]
    visits: usize,
    #[serde(rename = "Incorrectly registered (%)")]
    incorrect_pct: f64,
}

/// Writes every output table plus `report.md` into `out_dir`, returning the
/// paths written.
pub fn write_all(
    out_dir: &Path,
    summary: &[SummaryRow],
    outcome: &MatchOutcome,
    registration: &[RegistrationSummary],
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;
    let mut written = Vec::new();

    let path = out_dir.join("summary.csv");
    write_csv(&path, summary.iter().map(|row| SummaryLine {
        name: &row.name,
        signed: row.signed,
        unsigned: row.unsigned,
        total: row.total,
        unsigned_pct: row.unsigned_pct,
    }))?;
    written.push(path);

    let path = out_dir.join("unsigned.csv");
    write_csv(&path, outcome.attributions.iter().map(|a| AttributionLine {
        client: &a.record.client,
        intervention: &a.record.intervention,
        scheduled_date: &a.record.scheduled_date,
        scheduled_time: &a.record.scheduled_time,
        staff: &a.staff,
    }))?;
    written.push(path);

    for category in ExceptionCategory::ALL {
        if outcome.exceptions_in(category).next().is_none() {
            continue;
        }
        let path = out_dir.join(format!("{}.csv", category.file_stem()));
        write_csv(&path, outcome.exceptions_in(category).map(|e| ExceptionLine {
            client: &e.record.client,
            intervention: &e.record.intervention,
            scheduled_date: &e.record.scheduled_date,
            scheduled_time: &e.record.scheduled_time,
            reason: &e.reason,
        }))?;
        written.push(path);
    }

    let path = out_dir.join("registration.csv");
    write_csv(&path, registration.iter().map(|r| RegistrationLine {
        staff: &r.staff,
        on_site: r.on_site,
        manual_mobile: r.manual_mobile,
        manual_desktop: r.manual_desktop,
        updated_web: r.updated_web,
        updated_mobile: r.updated_mobile,
        mobile_time_changed: r.mobile_time_changed,
        visits: r.visits,
        incorrect_pct: r.incorrect_pct,
    }))?;
    written.push(path);

    let path = out_dir.join("report.md");
    std::fs::write(&path, build_report(summary, outcome))
        .with_context(|| format!("failed to write {}", path.display()))?;
    written.push(path);

    Ok(written)
}

// The header is written with the first row; an empty table is an empty file.
fn write_csv<T, I>(path: &Path, rows: I) -> anyhow::Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

/// Staff rows with the highest unsigned share, category rows excluded.
pub fn worst_offenders(summary: &[SummaryRow], limit: usize) -> Vec<&SummaryRow> {
    let labels: Vec<&str> = ExceptionCategory::ALL.iter().map(|c| c.label()).collect();
    let mut rows: Vec<&SummaryRow> = summary
        .iter()
        .filter(|row| !labels.contains(&row.name.as_str()) && row.unsigned > 0)
        .collect();
    rows.sort_by(|a, b| {
        b.unsigned_pct
            .partial_cmp(&a.unsigned_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.unsigned.cmp(&a.unsigned))
            .then_with(|| a.name.cmp(&b.name))
    });
    rows.truncate(limit);
    rows
}

pub fn build_report(summary: &[SummaryRow], outcome: &MatchOutcome) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Signature Reconciliation Report");
    let _ = writeln!(
        output,
        "{} unsigned visits reconciled: {} attributed, {} exceptions, {} skipped (no usable planned time)",
        outcome.processed(),
        outcome.attributions.len(),
        outcome.exceptions.len(),
        outcome.skipped
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if summary.is_empty() {
        let _ = writeln!(output, "No visits in this batch.");
    } else {
        let _ = writeln!(output, "| Staff | Signed | Unsigned | Total | Unsigned share (%) |");
        let _ = writeln!(output, "|---|---:|---:|---:|---:|");
        for row in summary {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {:.1} |",
                row.name, row.signed, row.unsigned, row.total, row.unsigned_pct
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Exceptions");

    if outcome.exceptions.is_empty() {
        let _ = writeln!(output, "Every unsigned visit was attributed.");
    } else {
        for category in ExceptionCategory::ALL {
            let count = outcome.exceptions_in(category).count();
            if count > 0 {
                let _ = writeln!(output, "- {}: {}", category.label(), count);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Unsigned Share");

    let offenders = worst_offenders(summary, 10);
    if offenders.is_empty() {
        let _ = writeln!(output, "No staff with unsigned visits.");
    } else {
        for row in offenders {
            let _ = writeln!(
                output,
                "- {}: {:.1}% unsigned ({} of {})",
                row.name, row.unsigned_pct, row.unsigned, row.total
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> Vec<SummaryRow> {
        vec![
            SummaryRow::new("Berg Lena".to_string(), 9, 1),
            SummaryRow::new("Name mismatch".to_string(), 0, 2),
            SummaryRow::new("Nilsson Per".to_string(), 2, 2),
            SummaryRow::new("Svensson Lars".to_string(), 4, 0),
        ]
    }

    #[test]
    fn offenders_exclude_categories_and_clean_staff() {
        let summary = sample_summary();
        let names: Vec<&str> = worst_offenders(&summary, 10)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Nilsson Per", "Berg Lena"]);
    }

    #[test]
    fn offenders_respect_limit() {
        let summary = sample_summary();
        assert_eq!(worst_offenders(&summary, 1).len(), 1);
    }

    #[test]
    fn report_lists_summary_rows() {
        let report = build_report(&sample_summary(), &MatchOutcome::default());
        assert!(report.starts_with("# Signature Reconciliation Report"));
        assert!(report.contains("| Nilsson Per | 2 | 2 | 4 | 50.0 |"));
        assert!(report.contains("Every unsigned visit was attributed."));
        assert!(report.contains("- Nilsson Per: 50.0% unsigned (2 of 4)"));
    }

    #[test]
    fn empty_batch_report_says_so() {
        let report = build_report(&[], &MatchOutcome::default());
        assert!(report.contains("No visits in this batch."));
        assert!(report.contains("No staff with unsigned visits."));
    }
}
