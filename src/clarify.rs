//! Clarify: targeted follow-up questions for missing fields
//!
//! Emits one to three questions ordered by field priority. With an LLM
//! configured the phrasing is generated; otherwise fixed templates are used.
//! Returns immediately, no scheduling happens on this path.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::intake::{missing_fields, ConstraintDraft, RequiredField};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::PromptLoader;
use crate::retry::{call_with_retry, Deadline};

/// Cap on questions per clarify turn
const MAX_QUESTIONS: usize = 3;

pub struct Clarify {
    llm: Option<Arc<dyn LlmClient>>,
    prompts: Arc<PromptLoader>,
    llm_timeout: Duration,
}

impl Clarify {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, prompts: Arc<PromptLoader>, llm_timeout: Duration) -> Self {
        Self {
            llm,
            prompts,
            llm_timeout,
        }
    }

    /// Questions to send back, highest-priority missing fields first.
    ///
    /// Required fields trigger the clarify turn; recommended ones (dates,
    /// budget, themes) ride along up to the cap.
    pub async fn questions(
        &self,
        message: &str,
        draft: &ConstraintDraft,
        themes_known: bool,
        deadline: Deadline,
    ) -> Vec<String> {
        let fields: Vec<RequiredField> = missing_fields(draft, themes_known)
            .into_iter()
            .take(MAX_QUESTIONS)
            .collect();
        if fields.is_empty() {
            return Vec::new();
        }

        if let Some(generated) = self.llm_questions(message, &fields, deadline).await {
            return generated;
        }

        fields.iter().map(|f| f.template_question().to_string()).collect()
    }

    async fn llm_questions(
        &self,
        message: &str,
        fields: &[RequiredField],
        deadline: Deadline,
    ) -> Option<Vec<String>> {
        let llm = self.llm.as_ref()?;

        let missing_names = fields.iter().map(|f| f.name()).collect::<Vec<_>>().join(", ");
        let prompt = self
            .prompts
            .render(
                "clarify",
                &serde_json::json!({ "message": message, "missing_fields": missing_names }),
            )
            .ok()?;

        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![Message::user(prompt)],
            max_tokens: 256,
        };

        match call_with_retry("clarify", self.llm_timeout, deadline, || llm.complete(request.clone())).await {
            Ok(response) if !response.content.trim().is_empty() => {
                Some(vec![response.content.trim().to_string()])
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "clarify: LLM phrasing failed, using templates");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clarify() -> Clarify {
        Clarify::new(None, Arc::new(PromptLoader::default()), Duration::from_secs(30))
    }

    fn far_deadline() -> Deadline {
        Deadline::after(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_empty_draft_asks_city_and_days_first() {
        let draft = ConstraintDraft::default();
        let questions = clarify().questions("I want to travel", &draft, false, far_deadline()).await;

        assert_eq!(questions.len(), MAX_QUESTIONS);
        assert!(questions[0].to_lowercase().contains("city"));
        assert!(questions[1].to_lowercase().contains("days"));
    }

    #[tokio::test]
    async fn test_complete_draft_asks_nothing() {
        let draft = ConstraintDraft {
            city: Some("Beijing".to_string()),
            days: Some(3),
            daily_budget: Some(500.0),
            date_start: chrono::NaiveDate::from_ymd_opt(2026, 5, 1),
            ..Default::default()
        };
        let questions = clarify().questions("Beijing 3 days", &draft, true, far_deadline()).await;
        assert!(questions.is_empty());
    }

    #[tokio::test]
    async fn test_question_cap() {
        let draft = ConstraintDraft {
            city: Some("Beijing".to_string()),
            ..Default::default()
        };
        // days, dates, budget, themes all missing; capped at three
        let questions = clarify().questions("Beijing", &draft, false, far_deadline()).await;
        assert_eq!(questions.len(), 3);
        assert!(questions[0].to_lowercase().contains("days"));
    }
}
