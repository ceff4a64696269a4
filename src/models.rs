use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct PlanningRecord {
    pub client: String,
    pub intervention: String,
    pub scheduled_date: String,
    pub scheduled_time: String,
    pub planned_at: Option<NaiveDateTime>,
    pub signed_by: String,
    pub unsigned: bool,
    pub client_key: String,
    pub signer_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFlags {
    pub on_site: bool,
    pub manual_mobile: bool,
    pub manual_desktop: bool,
    pub updated_web: bool,
    pub updated_mobile: bool,
    pub mobile_time_changed: bool,
}

#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub client: String,
    pub staff: String,
    pub visit_type: String,
    pub visited_at: NaiveDateTime,
    pub status: String,
    pub client_key: String,
    pub staff_key: String,
    pub flags: RegistrationFlags,
}

/// Reasons an unsigned planning record could not be attributed to a staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExceptionCategory {
    NotInTes,
    NotPerformed,
    NameMismatch,
}

impl ExceptionCategory {
    pub const ALL: [ExceptionCategory; 3] = [
        ExceptionCategory::NotInTes,
        ExceptionCategory::NotPerformed,
        ExceptionCategory::NameMismatch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ExceptionCategory::NotInTes => "Not in TES",
            ExceptionCategory::NotPerformed => "Visit not performed",
            ExceptionCategory::NameMismatch => "Name mismatch",
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            ExceptionCategory::NotInTes => "not_in_tes",
            ExceptionCategory::NotPerformed => "not_performed",
            ExceptionCategory::NameMismatch => "name_mismatch",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategorizedException {
    pub record: PlanningRecord,
    pub category: ExceptionCategory,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Attribution {
    pub record: PlanningRecord,
    pub staff: String,
    pub staff_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub name: String,
    pub signed: usize,
    pub unsigned: usize,
    pub total: usize,
    pub unsigned_pct: f64,
}

impl SummaryRow {
    pub fn new(name: String, signed: usize, unsigned: usize) -> Self {
        let total = signed + unsigned;
        SummaryRow {
            name,
            signed,
            unsigned,
            total,
            unsigned_pct: share_pct(unsigned, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationSummary {
    pub staff: String,
    pub on_site: usize,
    pub manual_mobile: usize,
    pub manual_desktop: usize,
    pub updated_web: usize,
    pub updated_mobile: usize,
    pub mobile_time_changed: usize,
    pub visits: usize,
    pub incorrect_pct: f64,
}

/// Percentage of `part` in `total`, one decimal with halves rounded to even.
/// A zero total divides by one.
pub fn share_pct(part: usize, total: usize) -> f64 {
    let denominator = total.max(1) as f64;
    (part as f64 / denominator * 1000.0).round_ties_even() / 10.0
}
