use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::cluster::KeyClusters;
use crate::matcher::MatchOutcome;
use crate::models::{
    share_pct, CategorizedException, ExceptionCategory, ExecutionRecord, PlanningRecord,
    RegistrationSummary, SummaryRow,
};
use crate::normalize::display_form;

const UNKNOWN_STAFF: &str = "(unknown)";
const EXCLUDED_VISIT_TYPES: [&str; 4] = ["shopping", "escort", "inköp", "ledsagning"];
const EXCLUDED_CLIENTS: [&str; 2] = ["group time", "grupptid"];

/// Signed and attributed counts for one cluster of staff keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRow {
    pub representative: String,
    pub display: String,
    pub signed: usize,
    pub unsigned: usize,
}

/// Best known spelling per name key. Planning spellings win over execution
/// spellings; within a source the first spelling seen wins.
pub fn display_names(planning: &[PlanningRecord], execution: &[ExecutionRecord]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for record in planning {
        if !record.signed_by.trim().is_empty() {
            names
                .entry(record.signer_key.clone())
                .or_insert_with(|| record.signed_by.clone());
        }
    }
    for record in execution {
        if !record.staff.trim().is_empty() {
            names
                .entry(record.staff_key.clone())
                .or_insert_with(|| record.staff.clone());
        }
    }
    names
}

/// Per-staff summary plus one row per exception category present.
pub fn summarize(
    planning: &[PlanningRecord],
    outcome: &MatchOutcome,
    names: &HashMap<String, String>,
    merge_threshold: u8,
) -> Vec<SummaryRow> {
    let keys = planning
        .iter()
        .map(|r| r.signer_key.as_str())
        .chain(outcome.attributions.iter().map(|a| a.staff_key.as_str()));
    let clusters = KeyClusters::build(keys, merge_threshold);
    info!(
        identities = clusters.len(),
        merged = clusters.merged_count(),
        "clustered staff identities"
    );

    let identities = merge_by_identity(planning, &outcome.tally, &clusters, names);
    regroup_by_display(&identities, &outcome.exceptions)
}

/// Folds signed visits and the attribution tally onto cluster representatives.
pub fn merge_by_identity(
    planning: &[PlanningRecord],
    tally: &BTreeMap<String, usize>,
    clusters: &KeyClusters,
    names: &HashMap<String, String>,
) -> Vec<IdentityRow> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for record in planning.iter().filter(|r| !r.unsigned) {
        counts.entry(clusters.representative(&record.signer_key)).or_default().0 += 1;
    }
    for (key, count) in tally {
        counts.entry(clusters.representative(key)).or_default().1 += count;
    }

    counts
        .into_iter()
        .map(|(rep, (signed, unsigned))| IdentityRow {
            representative: rep.to_string(),
            display: cluster_display_name(rep, clusters, names),
            signed,
            unsigned,
        })
        .collect()
}

/// Display spelling for a cluster, taken from its first member with a known spelling.
fn cluster_display_name(rep: &str, clusters: &KeyClusters, names: &HashMap<String, String>) -> String {
    let mut members = clusters.members(rep);
    if members.is_empty() {
        members.push(rep);
    }

    let display = members
        .iter()
        .find_map(|key| names.get(*key))
        .map(|spelling| display_form(spelling))
        .unwrap_or_else(|| rep.to_string());

    if display.trim().is_empty() {
        UNKNOWN_STAFF.to_string()
    } else {
        display
    }
}

/// Sums rows sharing a display name and recomputes shares from the sums.
pub fn regroup_by_display(identities: &[IdentityRow], exceptions: &[CategorizedException]) -> Vec<SummaryRow> {
    let mut grouped: BTreeMap<String, (usize, usize)> = BTreeMap::new();

    for row in identities {
        debug!(representative = %row.representative, display = %row.display, "grouping identity under display name");
        let entry = grouped.entry(row.display.trim().to_string()).or_default();
        entry.0 += row.signed;
        entry.1 += row.unsigned;
    }

    for category in ExceptionCategory::ALL {
        let count = exceptions.iter().filter(|e| e.category == category).count();
        if count > 0 {
            grouped.entry(category.label().to_string()).or_default().1 += count;
        }
    }

    grouped
        .into_iter()
        .map(|(name, (signed, unsigned))| SummaryRow::new(name, signed, unsigned))
        .collect()
}

fn planned_for_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s*\((planned for|planerad för).*?\)").expect("valid planned-for pattern")
    })
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Staff name without a "(planned for ...)" annotation, whitespace collapsed.
pub fn clean_staff_name(raw: &str) -> String {
    let stripped = planned_for_pattern().replace_all(raw, "");
    whitespace_pattern().replace_all(stripped.trim(), " ").into_owned()
}

fn counts_toward_registration(record: &ExecutionRecord) -> bool {
    let visit_type = record.visit_type.to_lowercase();
    let client = record.client.to_lowercase();
    !EXCLUDED_VISIT_TYPES.iter().any(|k| visit_type.contains(k))
        && !EXCLUDED_CLIENTS.iter().any(|k| client.contains(k))
}

/// How each staff member registered their visits in the field app.
pub fn registration_stats(execution: &[ExecutionRecord]) -> Vec<RegistrationSummary> {
    let mut by_staff: BTreeMap<String, RegistrationSummary> = BTreeMap::new();

    for record in execution.iter().filter(|r| counts_toward_registration(r)) {
        let staff = clean_staff_name(&record.staff);
        let entry = by_staff.entry(staff.clone()).or_insert_with(|| RegistrationSummary {
            staff,
            on_site: 0,
            manual_mobile: 0,
            manual_desktop: 0,
            updated_web: 0,
            updated_mobile: 0,
            mobile_time_changed: 0,
            visits: 0,
            incorrect_pct: 0.0,
        });

        let flags = &record.flags;
        entry.on_site += usize::from(flags.on_site);
        entry.manual_mobile += usize::from(flags.manual_mobile);
        entry.manual_desktop += usize::from(flags.manual_desktop);
        entry.updated_web += usize::from(flags.updated_web);
        entry.updated_mobile += usize::from(flags.updated_mobile);
        entry.mobile_time_changed += usize::from(flags.mobile_time_changed);
        entry.visits += 1;
    }

    by_staff
        .into_values()
        .map(|mut summary| {
            summary.incorrect_pct =
                share_pct(summary.manual_mobile + summary.manual_desktop, summary.visits);
            summary
        })
        .collect()
}
