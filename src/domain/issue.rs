//! Validation issues
//!
//! Issues are typed findings from the validator (and a few scheduler edge
//! cases). The repair loop's progress invariant is measured through the
//! severity-weighted sum.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Weight used for the repair progress invariant
    pub fn weight(&self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 3,
            Self::High => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    OverTime,
    TooMuchTravel,
    OverBudget,
    BudgetUnrealistic,
    PaceMismatch,
    TravelTimeInvalid,
    MissingFacts,
    RouteBacktracking,
    DuplicatePoiDay,
    MissingBackup,
    MustVisitClosed,
}

impl IssueCode {
    /// Default severity for this code
    pub fn severity(&self) -> Severity {
        match self {
            Self::OverTime
            | Self::TooMuchTravel
            | Self::OverBudget
            | Self::TravelTimeInvalid
            | Self::MissingFacts
            | Self::DuplicatePoiDay
            | Self::MustVisitClosed => Severity::High,
            Self::BudgetUnrealistic | Self::PaceMismatch | Self::RouteBacktracking => {
                Severity::Medium
            }
            Self::MissingBackup => Severity::Low,
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::OverTime => "OVER_TIME",
            Self::TooMuchTravel => "TOO_MUCH_TRAVEL",
            Self::OverBudget => "OVER_BUDGET",
            Self::BudgetUnrealistic => "BUDGET_UNREALISTIC",
            Self::PaceMismatch => "PACE_MISMATCH",
            Self::TravelTimeInvalid => "TRAVEL_TIME_INVALID",
            Self::MissingFacts => "MISSING_FACTS",
            Self::RouteBacktracking => "ROUTE_BACKTRACKING",
            Self::DuplicatePoiDay => "DUPLICATE_POI_DAY",
            Self::MissingBackup => "MISSING_BACKUP",
            Self::MustVisitClosed => "MUST_VISIT_CLOSED",
        };
        write!(f, "{text}")
    }
}

/// One validator finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub code: IssueCode,
    pub severity: Severity,
    pub day_number: Option<u32>,
    pub poi_id: Option<String>,

    /// Human-readable supporting detail ("day 2 travel 210m of 480m")
    pub evidence: String,
}

impl Issue {
    pub fn new(code: IssueCode, evidence: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            day_number: None,
            poi_id: None,
            evidence: evidence.into(),
        }
    }

    pub fn on_day(mut self, day_number: u32) -> Self {
        self.day_number = Some(day_number);
        self
    }

    pub fn on_poi(mut self, poi_id: impl Into<String>) -> Self {
        self.poi_id = Some(poi_id.into());
        self
    }
}

/// Severity-weighted sum over a set of issues.
///
/// Each repair round must strictly decrease either this sum or the total
/// cost, which bounds the validate/repair fixpoint.
pub fn severity_weighted_sum(issues: &[Issue]) -> u32 {
    issues.iter().map(|i| i.severity.weight()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_code_default_severity() {
        assert_eq!(IssueCode::OverTime.severity(), Severity::High);
        assert_eq!(IssueCode::PaceMismatch.severity(), Severity::Medium);
        assert_eq!(IssueCode::MissingBackup.severity(), Severity::Low);
        assert_eq!(IssueCode::MustVisitClosed.severity(), Severity::High);
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&IssueCode::TooMuchTravel).unwrap();
        assert_eq!(json, "\"TOO_MUCH_TRAVEL\"");
        let json = serde_json::to_string(&IssueCode::DuplicatePoiDay).unwrap();
        assert_eq!(json, "\"DUPLICATE_POI_DAY\"");
    }

    #[test]
    fn test_severity_weighted_sum() {
        let issues = vec![
            Issue::new(IssueCode::OverTime, "day too long").on_day(1),
            Issue::new(IssueCode::PaceMismatch, "too many stops").on_day(2),
            Issue::new(IssueCode::MissingBackup, "no backup").on_day(2),
        ];
        assert_eq!(severity_weighted_sum(&issues), 9 + 3 + 1);
    }
}
