//! Heuristic text extraction
//!
//! The deterministic safety net under the LLM parse: token scans over the
//! user message. Runs on every request and fills any field the LLM missed;
//! for city and days it also outranks the LLM, since explicit text evidence
//! beats a model's paraphrase.

use chrono::NaiveDate;

use crate::domain::{Pace, TransportMode, TravelersType};

/// Theme vocabulary recognized in free text
const THEME_KEYWORDS: [&str; 12] = [
    "history", "food", "art", "nature", "museum", "temple", "shopping", "night", "family",
    "landmark", "hiking", "photography",
];

const DIETARY_KEYWORDS: [&str; 5] = ["vegetarian", "vegan", "halal", "kosher", "gluten-free"];

/// A budget mention, daily or for the whole trip
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetMention {
    Daily(f64),
    Total(f64),
}

/// Find a known city name mentioned in the text (case-insensitive)
pub fn extract_city(text: &str, known_cities: &[String]) -> Option<String> {
    let lowered = text.to_lowercase();
    known_cities
        .iter()
        .find(|city| lowered.contains(&city.to_lowercase()))
        .cloned()
}

/// Find "N day"/"N days"/"N-day" in the text
pub fn extract_days(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    for (number, rest) in number_mentions(&lowered) {
        let following = rest.trim_start_matches(['-', ' ']);
        if following.starts_with("day") {
            let days = number as u32;
            if days >= 1 {
                return Some(days);
            }
        }
    }
    None
}

/// Find a budget amount near the word "budget" or an "N/day" mention
pub fn extract_budget(text: &str) -> Option<BudgetMention> {
    let lowered = text.to_lowercase();

    if let Some(idx) = lowered.find("budget") {
        let after = &lowered[idx + "budget".len()..];
        if let Some((number, rest)) = number_mentions(after).into_iter().next() {
            return Some(if is_daily_marker(rest) {
                BudgetMention::Daily(number)
            } else {
                BudgetMention::Total(number)
            });
        }
    }

    // Bare "600/day" style
    for (number, rest) in number_mentions(&lowered) {
        if is_daily_marker(rest) {
            return Some(BudgetMention::Daily(number));
        }
    }
    None
}

fn is_daily_marker(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.starts_with("/day")
        || rest.starts_with("per day")
        || rest.starts_with("a day")
        || rest.starts_with("daily")
        || rest.starts_with("/ day")
}

/// Numbers in the text with the remainder of the string after each
fn number_mentions(text: &str) -> Vec<(f64, &str)> {
    let bytes = text.as_bytes();
    let mut results = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            // Skip digits inside a word like "route66"
            let preceded_by_alpha = i > 0 && bytes[i - 1].is_ascii_alphabetic();
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            if !preceded_by_alpha {
                if let Ok(number) = text[start..i].trim_end_matches('.').parse::<f64>() {
                    results.push((number, &text[i..]));
                }
            }
        } else {
            i += 1;
        }
    }
    results
}

pub fn extract_pace(text: &str) -> Option<Pace> {
    let lowered = text.to_lowercase();
    if ["relaxed", "easy pace", "slow pace", "leisurely"].iter().any(|k| lowered.contains(k)) {
        Some(Pace::Relaxed)
    } else if ["intensive", "packed", "fast pace", "as much as possible"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        Some(Pace::Intensive)
    } else if lowered.contains("moderate") {
        Some(Pace::Moderate)
    } else {
        None
    }
}

pub fn extract_transport(text: &str) -> Option<TransportMode> {
    let lowered = text.to_lowercase();
    if ["walking", "on foot", "walk everywhere"].iter().any(|k| lowered.contains(k)) {
        Some(TransportMode::Walking)
    } else if ["metro", "subway", "public transit", "public transport", "by bus"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        Some(TransportMode::PublicTransit)
    } else if ["taxi", "cab", "ride-hailing", "didi"].iter().any(|k| lowered.contains(k)) {
        Some(TransportMode::Taxi)
    } else if ["driving", "rental car", "self-drive", "by car"].iter().any(|k| lowered.contains(k)) {
        Some(TransportMode::Driving)
    } else {
        None
    }
}

pub fn extract_travelers_type(text: &str) -> Option<TravelersType> {
    let lowered = text.to_lowercase();
    if ["solo", "by myself", "alone"].iter().any(|k| lowered.contains(k)) {
        Some(TravelersType::Solo)
    } else if ["couple", "my wife", "my husband", "my partner"].iter().any(|k| lowered.contains(k)) {
        Some(TravelersType::Couple)
    } else if ["family", "kids", "children", "my parents and"].iter().any(|k| lowered.contains(k)) {
        Some(TravelersType::Family)
    } else if ["friends", "group of"].iter().any(|k| lowered.contains(k)) {
        Some(TravelersType::Friends)
    } else if ["elderly", "grandparents", "senior"].iter().any(|k| lowered.contains(k)) {
        Some(TravelersType::Elderly)
    } else {
        None
    }
}

pub fn extract_themes(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    THEME_KEYWORDS
        .iter()
        .filter(|k| lowered.contains(*k))
        .map(|k| k.to_string())
        .collect()
}

pub fn extract_dietary(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    DIETARY_KEYWORDS
        .iter()
        .filter(|k| lowered.contains(*k))
        .map(|k| k.to_string())
        .collect()
}

/// Names after "must_visit=", "must visit", or "must see"
pub fn extract_must_visit(text: &str) -> Vec<String> {
    names_after_marker(text, &["must_visit=", "must visit ", "must see "])
}

/// Names after "avoid" or "skip"
pub fn extract_avoid(text: &str) -> Vec<String> {
    names_after_marker(text, &["avoid=", "avoid ", "skip "])
        .into_iter()
        .filter(|name| name.split(' ').count() <= 4)
        .collect()
}

fn names_after_marker(text: &str, markers: &[&str]) -> Vec<String> {
    let lowered = text.to_lowercase();
    for marker in markers {
        if let Some(idx) = lowered.find(marker) {
            let start = idx + marker.len();
            // Lowercasing can shift byte offsets in non-ASCII text; fall
            // back to the lowered copy when the original slice misaligns.
            let after = text.get(start..).unwrap_or(&lowered[start..]);
            let chunk = after.split(['.', ';', '\n']).next().unwrap_or("").trim();
            return chunk
                .split(" and ")
                .flat_map(|part| part.split(','))
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
        }
    }
    Vec::new()
}

/// Whether the message mentions the spring festival period
pub fn mentions_spring_festival(text: &str) -> bool {
    let lowered = text.to_lowercase();
    ["spring festival", "chinese new year", "lunar new year"]
        .iter()
        .any(|k| lowered.contains(k))
}

/// First ISO "YYYY-MM-DD" date token in the text
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    for token in text.split(|c: char| c.is_whitespace() || c == ',') {
        let token = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '-');
        if token.len() == 10 {
            if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
                return Some(date);
            }
        }
    }
    None
}
