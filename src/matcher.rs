use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::config::{MatchConfig, NOT_PERFORMED_STATUSES};
use crate::fuzzy;
use crate::models::{
    Attribution, CategorizedException, ExceptionCategory, ExecutionRecord, PlanningRecord,
};

/// Result of reconciling every unsigned planning record against the execution log.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub attributions: Vec<Attribution>,
    pub exceptions: Vec<CategorizedException>,
    /// Attributed visits per staff key.
    pub tally: BTreeMap<String, usize>,
    /// Unsigned records left out because their planned time did not parse.
    pub skipped: usize,
}

impl MatchOutcome {
    pub fn processed(&self) -> usize {
        self.attributions.len() + self.exceptions.len()
    }

    pub fn exceptions_in(&self, category: ExceptionCategory) -> impl Iterator<Item = &CategorizedException> {
        self.exceptions.iter().filter(move |e| e.category == category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Attributed { staff: String, staff_key: String },
    Exception { category: ExceptionCategory, reason: String },
}

pub fn match_visits(
    planning: &[PlanningRecord],
    execution: &[ExecutionRecord],
    config: &MatchConfig,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for record in planning.iter().filter(|r| r.unsigned) {
        let Some(planned_at) = record.planned_at else {
            warn!(client = %record.client, date = %record.scheduled_date, "unsigned visit has no usable planned time, skipping");
            outcome.skipped += 1;
            continue;
        };

        match classify(record, planned_at, execution, config) {
            Decision::Attributed { staff, staff_key } => {
                debug!(client = %record.client, staff = %staff, "attributed unsigned visit");
                *outcome.tally.entry(staff_key.clone()).or_insert(0) += 1;
                outcome.attributions.push(Attribution {
                    record: record.clone(),
                    staff,
                    staff_key,
                });
            }
            Decision::Exception { category, reason } => {
                debug!(client = %record.client, category = category.label(), reason = %reason, "unsigned visit not attributed");
                outcome.exceptions.push(CategorizedException {
                    record: record.clone(),
                    category,
                    reason,
                });
            }
        }
    }

    info!(
        attributed = outcome.attributions.len(),
        exceptions = outcome.exceptions.len(),
        skipped = outcome.skipped,
        "matched unsigned visits"
    );
    outcome
}

/// Decides the fate of one unsigned planning record.
pub fn classify(
    record: &PlanningRecord,
    planned_at: NaiveDateTime,
    execution: &[ExecutionRecord],
    config: &MatchConfig,
) -> Decision {
    let start = Duration::try_minutes(config.window_before)
        .and_then(|before| planned_at.checked_sub_signed(before))
        .unwrap_or(NaiveDateTime::MIN);
    let end = Duration::try_minutes(config.window_after)
        .and_then(|after| planned_at.checked_add_signed(after))
        .unwrap_or(NaiveDateTime::MAX);
    let window: Vec<&ExecutionRecord> = execution
        .iter()
        .filter(|e| e.visited_at >= start && e.visited_at <= end)
        .collect();

    if window.is_empty() {
        return Decision::Exception {
            category: ExceptionCategory::NotInTes,
            reason: "No visit in time window".to_string(),
        };
    }

    // First exact key match in log order wins.
    let chosen = match window.iter().find(|e| e.client_key == record.client_key) {
        Some(exact) => *exact,
        None => match best_fuzzy_candidate(&record.client, &window) {
            Some((candidate, score)) if score >= config.base_score() => {
                debug!(planned = %record.client, logged = %candidate.client, score, "fuzzy client match");
                candidate
            }
            _ => {
                return Decision::Exception {
                    category: ExceptionCategory::NameMismatch,
                    reason: "Name does not match".to_string(),
                }
            }
        },
    };

    let status = chosen.status.trim().to_lowercase();
    if NOT_PERFORMED_STATUSES.contains(&status.as_str()) {
        return Decision::Exception {
            category: ExceptionCategory::NotPerformed,
            reason: format!("Status: {status}"),
        };
    }

    Decision::Attributed {
        staff: chosen.staff.clone(),
        staff_key: chosen.staff_key.clone(),
    }
}

/// Highest-scoring candidate against the raw client name; ties keep the
/// earliest and a zero score never qualifies.
fn best_fuzzy_candidate<'a>(
    client: &str,
    window: &[&'a ExecutionRecord],
) -> Option<(&'a ExecutionRecord, u8)> {
    let mut best: Option<(&ExecutionRecord, u8)> = None;
    for candidate in window {
        let score = fuzzy::score(client, &candidate.client);
        if score > best.map_or(0, |(_, top)| top) {
            best = Some((*candidate, score));
        }
    }
    best
}
