//! Intake: free-form message -> TripConstraints + UserProfile
//!
//! Two strategies in order: an LLM-guided parse emitting strict JSON when a
//! provider is configured, then the regex/heuristic safety net which always
//! runs. Explicit text evidence for city and days outranks the LLM result,
//! so a paraphrasing model cannot move the trip to another city.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod extract;
mod requirements;

pub use requirements::{missing_fields, missing_required, RequiredField};

use crate::domain::{Pace, TransportMode, TravelersType, TripConstraints, UserProfile};
use crate::llm::{extract_json_block, CompletionRequest, LlmClient, Message};
use crate::prompts::PromptLoader;
use crate::retry::{call_with_retry, Deadline};

/// Where a constraint field's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldEvidence {
    /// Structured constraints supplied by the caller
    Caller,
    /// LLM-guided parse
    Llm,
    /// Regex/heuristic text scan
    Heuristic,
    /// Carried over from the session's earlier turns
    Session,
}

/// All-optional working copy of TripConstraints while intake is underway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintDraft {
    pub city: Option<String>,
    pub days: Option<u32>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub daily_budget: Option<f64>,
    pub total_budget: Option<f64>,
    pub transport_mode: Option<TransportMode>,
    pub pace: Option<Pace>,
    pub must_visit: Vec<String>,
    pub avoid: Vec<String>,
    pub travelers_count: Option<u32>,
}

impl ConstraintDraft {
    /// Merge `other` on top of self: present fields win, lists union
    pub fn merge_from(&mut self, other: &ConstraintDraft) {
        if other.city.is_some() {
            self.city = other.city.clone();
        }
        if other.days.is_some() {
            self.days = other.days;
        }
        if other.date_start.is_some() {
            self.date_start = other.date_start;
        }
        if other.date_end.is_some() {
            self.date_end = other.date_end;
        }
        if other.daily_budget.is_some() {
            self.daily_budget = other.daily_budget;
        }
        if other.total_budget.is_some() {
            self.total_budget = other.total_budget;
        }
        if other.transport_mode.is_some() {
            self.transport_mode = other.transport_mode;
        }
        if other.pace.is_some() {
            self.pace = other.pace;
        }
        if other.travelers_count.is_some() {
            self.travelers_count = other.travelers_count;
        }
        for name in &other.must_visit {
            if !self.must_visit.contains(name) {
                self.must_visit.push(name.clone());
            }
        }
        for name in &other.avoid {
            if !self.avoid.contains(name) {
                self.avoid.push(name.clone());
            }
        }
    }

    /// Freeze the draft into immutable constraints. Requires city and days.
    pub fn into_constraints(mut self) -> Option<TripConstraints> {
        let city = self.city.take().filter(|c| !c.trim().is_empty())?;
        let days = self.days.filter(|d| *d >= 1)?;

        // A total-budget mention resolves to daily once the length is known
        let daily_budget = self
            .daily_budget
            .or_else(|| self.total_budget.map(|t| t / days as f64))
            .filter(|b| *b > 0.0);

        let date_start = self.date_start;
        let date_end = self.date_end.or_else(|| {
            date_start.and_then(|d| d.checked_add_days(chrono::Days::new(u64::from(days - 1))))
        });

        Some(TripConstraints {
            city,
            days,
            date_start,
            date_end,
            daily_budget,
            transport_mode: self.transport_mode.unwrap_or_default(),
            pace: self.pace.unwrap_or_default(),
            must_visit: self.must_visit,
            avoid: self.avoid,
            travelers_count: self.travelers_count,
        })
    }
}

/// Strict JSON shape the LLM extraction prompt asks for
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LlmExtraction {
    city: Option<String>,
    days: Option<u32>,
    daily_budget: Option<f64>,
    date_start: Option<NaiveDate>,
    pace: Option<Pace>,
    transport_mode: Option<TransportMode>,
    travelers_count: Option<u32>,
    travelers_type: Option<TravelersType>,
    themes: Vec<String>,
    must_visit: Vec<String>,
    avoid: Vec<String>,
    dietary: Vec<String>,
}

/// Result of an intake pass
#[derive(Debug, Clone)]
pub struct IntakeOutput {
    pub draft: ConstraintDraft,
    pub profile: UserProfile,

    /// Required fields still absent; non-empty means clarify
    pub missing: Vec<RequiredField>,

    /// Per-field provenance, surfaced on the response
    pub field_evidence: BTreeMap<String, FieldEvidence>,
}

/// Intake stage
pub struct Intake {
    llm: Option<Arc<dyn LlmClient>>,
    prompts: Arc<PromptLoader>,
    known_cities: Vec<String>,
    llm_timeout: Duration,
    spring_festival_date: NaiveDate,
}

impl Intake {
    pub fn new(
        llm: Option<Arc<dyn LlmClient>>,
        prompts: Arc<PromptLoader>,
        known_cities: Vec<String>,
        llm_timeout: Duration,
        spring_festival_date: NaiveDate,
    ) -> Self {
        Self {
            llm,
            prompts,
            known_cities,
            llm_timeout,
            spring_festival_date,
        }
    }

    /// Parse one message, layered over any prior session state and
    /// caller-supplied structured constraints.
    pub async fn run(
        &self,
        message: &str,
        caller: Option<&ConstraintDraft>,
        prior: Option<(&ConstraintDraft, &UserProfile)>,
        deadline: Deadline,
    ) -> IntakeOutput {
        debug!(message_len = message.len(), has_prior = prior.is_some(), "intake: run");
        let mut evidence: BTreeMap<String, FieldEvidence> = BTreeMap::new();
        let mut draft = ConstraintDraft::default();
        let mut profile = UserProfile::default();

        if let Some((prior_draft, prior_profile)) = prior {
            draft = prior_draft.clone();
            profile = prior_profile.clone();
            mark_present(&draft, &mut evidence, FieldEvidence::Session);
        }

        if let Some(caller_draft) = caller {
            draft.merge_from(caller_draft);
            mark_present(caller_draft, &mut evidence, FieldEvidence::Caller);
        }

        // Strategy 1: LLM-guided parse
        if let Some(extraction) = self.llm_extract(message, deadline).await {
            self.apply_llm(extraction, &mut draft, &mut profile, &mut evidence);
        }

        // Strategy 2: heuristic net. City/days text evidence outranks the LLM.
        self.apply_heuristics(message, &mut draft, &mut profile, &mut evidence);

        let missing = requirements::missing_required(&draft);
        IntakeOutput {
            draft,
            profile,
            missing,
            field_evidence: evidence,
        }
    }

    async fn llm_extract(&self, message: &str, deadline: Deadline) -> Option<LlmExtraction> {
        let llm = self.llm.as_ref()?;

        for template in ["intake-extract", "intake-extract-strict"] {
            let prompt = match self
                .prompts
                .render(template, &serde_json::json!({ "message": message }))
            {
                Ok(prompt) => prompt,
                Err(e) => {
                    warn!(error = %e, "intake: prompt render failed");
                    return None;
                }
            };

            let request = CompletionRequest {
                system_prompt: String::new(),
                messages: vec![Message::user(prompt)],
                max_tokens: 512,
            };

            let response =
                call_with_retry("intake_extract", self.llm_timeout, deadline, || llm.complete(request.clone()))
                    .await;

            match response {
                Ok(completion) => {
                    let json = extract_json_block(&completion.content);
                    match serde_json::from_str::<LlmExtraction>(json) {
                        Ok(extraction) => return Some(extraction),
                        Err(e) => {
                            // Parse failures get one retry with the stricter prompt
                            warn!(error = %e, template, "intake: LLM output not parseable");
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "intake: LLM extraction failed, falling back to heuristics");
                    return None;
                }
            }
        }
        None
    }

    fn apply_llm(
        &self,
        extraction: LlmExtraction,
        draft: &mut ConstraintDraft,
        profile: &mut UserProfile,
        evidence: &mut BTreeMap<String, FieldEvidence>,
    ) {
        let mut set = |field: &str| {
            evidence.insert(field.to_string(), FieldEvidence::Llm);
        };

        if let Some(city) = extraction.city.filter(|c| !c.trim().is_empty()) {
            draft.city = Some(city);
            set("city");
        }
        if let Some(days) = extraction.days.filter(|d| *d >= 1) {
            draft.days = Some(days);
            set("days");
        }
        if let Some(budget) = extraction.daily_budget.filter(|b| *b > 0.0) {
            draft.daily_budget = Some(budget);
            set("daily_budget");
        }
        if let Some(date) = extraction.date_start {
            draft.date_start = Some(date);
            set("date_start");
        }
        if let Some(pace) = extraction.pace {
            draft.pace = Some(pace);
            set("pace");
        }
        if let Some(mode) = extraction.transport_mode {
            draft.transport_mode = Some(mode);
            set("transport_mode");
        }
        if let Some(count) = extraction.travelers_count.filter(|c| *c >= 1) {
            draft.travelers_count = Some(count);
            set("travelers_count");
        }
        if let Some(travelers) = extraction.travelers_type {
            profile.travelers_type = travelers;
            set("travelers_type");
        }
        for theme in extraction.themes {
            if !profile.themes.iter().any(|t| t.eq_ignore_ascii_case(&theme)) {
                profile.themes.push(theme.to_lowercase());
                set("themes");
            }
        }
        for name in extraction.must_visit {
            if !draft.must_visit.contains(&name) {
                draft.must_visit.push(name);
                set("must_visit");
            }
        }
        for name in extraction.avoid {
            if !draft.avoid.contains(&name) {
                draft.avoid.push(name);
                set("avoid");
            }
        }
        for item in extraction.dietary {
            if !profile.dietary.contains(&item) {
                profile.dietary.push(item);
                set("dietary");
            }
        }
    }

    fn apply_heuristics(
        &self,
        message: &str,
        draft: &mut ConstraintDraft,
        profile: &mut UserProfile,
        evidence: &mut BTreeMap<String, FieldEvidence>,
    ) {
        // Text evidence overrides for the required fields
        if let Some(city) = extract::extract_city(message, &self.known_cities) {
            if draft.city.as_deref() != Some(city.as_str()) {
                draft.city = Some(city);
                evidence.insert("city".to_string(), FieldEvidence::Heuristic);
            }
        }
        if let Some(days) = extract::extract_days(message) {
            if draft.days != Some(days) {
                draft.days = Some(days);
                evidence.insert("days".to_string(), FieldEvidence::Heuristic);
            }
        }

        // Fill-if-absent for everything else
        if draft.daily_budget.is_none() && draft.total_budget.is_none() {
            match extract::extract_budget(message) {
                Some(extract::BudgetMention::Daily(amount)) => {
                    draft.daily_budget = Some(amount);
                    evidence.insert("daily_budget".to_string(), FieldEvidence::Heuristic);
                }
                Some(extract::BudgetMention::Total(amount)) => {
                    draft.total_budget = Some(amount);
                    evidence.insert("daily_budget".to_string(), FieldEvidence::Heuristic);
                }
                None => {}
            }
        }
        if draft.pace.is_none() {
            if let Some(pace) = extract::extract_pace(message) {
                draft.pace = Some(pace);
                evidence.insert("pace".to_string(), FieldEvidence::Heuristic);
            }
        }
        if draft.transport_mode.is_none() {
            if let Some(mode) = extract::extract_transport(message) {
                draft.transport_mode = Some(mode);
                evidence.insert("transport_mode".to_string(), FieldEvidence::Heuristic);
            }
        }
        if let Some(travelers) = extract::extract_travelers_type(message) {
            profile.travelers_type = travelers;
            evidence
                .entry("travelers_type".to_string())
                .or_insert(FieldEvidence::Heuristic);
        }
        for theme in extract::extract_themes(message) {
            if !profile.themes.iter().any(|t| t.eq_ignore_ascii_case(&theme)) {
                profile.themes.push(theme);
                evidence
                    .entry("themes".to_string())
                    .or_insert(FieldEvidence::Heuristic);
            }
        }
        for item in extract::extract_dietary(message) {
            if !profile.dietary.contains(&item) {
                profile.dietary.push(item);
                evidence
                    .entry("dietary".to_string())
                    .or_insert(FieldEvidence::Heuristic);
            }
        }
        for name in extract::extract_must_visit(message) {
            if !draft.must_visit.contains(&name) {
                draft.must_visit.push(name);
                evidence
                    .entry("must_visit".to_string())
                    .or_insert(FieldEvidence::Heuristic);
            }
        }
        for name in extract::extract_avoid(message) {
            if !draft.avoid.contains(&name) {
                draft.avoid.push(name);
                evidence
                    .entry("avoid".to_string())
                    .or_insert(FieldEvidence::Heuristic);
            }
        }
        if let Some(date) = extract::extract_date(message) {
            if draft.date_start.is_none() {
                draft.date_start = Some(date);
                evidence.insert("date_start".to_string(), FieldEvidence::Heuristic);
            }
        }
        // A spring-festival mention anchors the trip to the configured window
        if draft.date_start.is_none() && extract::mentions_spring_festival(message) {
            draft.date_start = Some(self.spring_festival_date);
            evidence.insert("date_start".to_string(), FieldEvidence::Heuristic);
        }
    }
}

fn mark_present(
    draft: &ConstraintDraft,
    evidence: &mut BTreeMap<String, FieldEvidence>,
    source: FieldEvidence,
) {
    if draft.city.is_some() {
        evidence.insert("city".to_string(), source);
    }
    if draft.days.is_some() {
        evidence.insert("days".to_string(), source);
    }
    if draft.daily_budget.is_some() || draft.total_budget.is_some() {
        evidence.insert("daily_budget".to_string(), source);
    }
    if draft.date_start.is_some() {
        evidence.insert("date_start".to_string(), source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake() -> Intake {
        Intake::new(
            None,
            Arc::new(PromptLoader::default()),
            vec!["Beijing".to_string(), "Shanghai".to_string(), "Chengdu".to_string()],
            Duration::from_secs(30),
            NaiveDate::from_ymd_opt(2026, 2, 17).unwrap(),
        )
    }

    fn far_deadline() -> Deadline {
        Deadline::after(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_full_message_extraction() {
        let output = intake()
            .run("Beijing 4 days, Spring Festival, history+food, budget 600/day", None, None, far_deadline())
            .await;

        assert!(output.missing.is_empty());
        let draft = output.draft.clone();
        assert_eq!(draft.city.as_deref(), Some("Beijing"));
        assert_eq!(draft.days, Some(4));
        assert_eq!(draft.daily_budget, Some(600.0));
        // Spring festival mention anchors the date window
        assert_eq!(draft.date_start, NaiveDate::from_ymd_opt(2026, 2, 17));
        assert!(output.profile.themes.contains(&"history".to_string()));
        assert!(output.profile.themes.contains(&"food".to_string()));

        let constraints = draft.into_constraints().unwrap();
        assert_eq!(constraints.daily_budget, Some(600.0));
        assert_eq!(constraints.date_end, NaiveDate::from_ymd_opt(2026, 2, 20));
    }

    #[tokio::test]
    async fn test_vague_message_yields_missing_fields() {
        let output = intake().run("I want to travel", None, None, far_deadline()).await;

        assert_eq!(output.missing, vec![RequiredField::City, RequiredField::Days]);
        assert!(output.draft.clone().into_constraints().is_none());
    }

    #[tokio::test]
    async fn test_prior_session_state_is_merged() {
        let prior_draft = ConstraintDraft {
            city: Some("Chengdu".to_string()),
            ..Default::default()
        };
        let prior_profile = UserProfile::default();

        let output = intake()
            .run("3 days please", None, Some((&prior_draft, &prior_profile)), far_deadline())
            .await;

        assert!(output.missing.is_empty());
        assert_eq!(output.draft.city.as_deref(), Some("Chengdu"));
        assert_eq!(output.draft.days, Some(3));
        assert_eq!(output.field_evidence.get("city"), Some(&FieldEvidence::Session));
        assert_eq!(output.field_evidence.get("days"), Some(&FieldEvidence::Heuristic));
    }

    #[tokio::test]
    async fn test_caller_constraints_apply() {
        let caller = ConstraintDraft {
            daily_budget: Some(300.0),
            ..Default::default()
        };

        let output = intake()
            .run("Shanghai 2 days", Some(&caller), None, far_deadline())
            .await;

        assert_eq!(output.draft.daily_budget, Some(300.0));
        assert_eq!(output.field_evidence.get("daily_budget"), Some(&FieldEvidence::Caller));
    }

    #[tokio::test]
    async fn test_must_visit_extracted() {
        let output = intake()
            .run("Chengdu 3 days, must_visit=Panda Base", None, None, far_deadline())
            .await;

        assert_eq!(output.draft.must_visit, vec!["Panda Base".to_string()]);
    }

    #[test]
    fn test_total_budget_resolves_to_daily() {
        let draft = ConstraintDraft {
            city: Some("Beijing".to_string()),
            days: Some(4),
            total_budget: Some(2000.0),
            ..Default::default()
        };
        let constraints = draft.into_constraints().unwrap();
        assert_eq!(constraints.daily_budget, Some(500.0));
    }
}
