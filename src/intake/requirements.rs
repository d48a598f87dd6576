//! Required and recommended intake fields

use serde::{Deserialize, Serialize};

use super::ConstraintDraft;

/// Fields the clarify stage can ask about, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    City,
    Days,
    Dates,
    Budget,
    Themes,
}

impl RequiredField {
    /// Question priority: city > days > dates > budget > themes
    pub const PRIORITY_ORDER: [RequiredField; 5] = [
        RequiredField::City,
        RequiredField::Days,
        RequiredField::Dates,
        RequiredField::Budget,
        RequiredField::Themes,
    ];

    /// Planning cannot start without these
    pub fn is_required(&self) -> bool {
        matches!(self, Self::City | Self::Days)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Days => "days",
            Self::Dates => "dates",
            Self::Budget => "budget",
            Self::Themes => "themes",
        }
    }

    /// Fixed question phrasing for template mode
    pub fn template_question(&self) -> &'static str {
        match self {
            Self::City => "Which city would you like to visit?",
            Self::Days => "How many days will your trip be?",
            Self::Dates => "Do you have travel dates in mind? An arrival date helps with opening hours.",
            Self::Budget => "Roughly what is your budget per day?",
            Self::Themes => "Any themes you care about, like history, food, or nature?",
        }
    }
}

/// Fields still absent from the draft, in priority order
pub fn missing_fields(draft: &ConstraintDraft, themes_known: bool) -> Vec<RequiredField> {
    let mut missing = Vec::new();
    for field in RequiredField::PRIORITY_ORDER {
        let absent = match field {
            RequiredField::City => draft.city.as_deref().map_or(true, |c| c.trim().is_empty()),
            RequiredField::Days => draft.days.map_or(true, |d| d == 0),
            RequiredField::Dates => draft.date_start.is_none(),
            RequiredField::Budget => draft.daily_budget.is_none(),
            RequiredField::Themes => !themes_known,
        };
        if absent {
            missing.push(field);
        }
    }
    missing
}

/// The required subset of `missing_fields`
pub fn missing_required(draft: &ConstraintDraft) -> Vec<RequiredField> {
    missing_fields(draft, true)
        .into_iter()
        .filter(RequiredField::is_required)
        .collect()
}
