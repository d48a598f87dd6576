//! The planner service
//!
//! Owns every stage and drives the pipeline: intake -> clarify | retrieve ->
//! schedule -> validate -> [repair -> validate]* -> finalize, with the
//! bounded backward edge and the per-request deadline. The plan state is
//! owned exclusively here; stages receive it by reference and hand back new
//! values.

use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clarify::Clarify;
use crate::config::{Config, RuntimeFlags};
use crate::dataset::PoiDataset;
use crate::domain::{DegradeLevel, Itinerary, RunFingerprint};
use crate::error::PlanError;
use crate::intake::{Intake, RequiredField};
use crate::llm::{create_client, LlmClient};
use crate::prompts::PromptLoader;
use crate::providers::{build_providers, ProviderSet};
use crate::ratelimit::{Admission, RateLimiter};
use crate::repair::{apply_edit, Repairer};
use crate::retrieve::{CandidatePool, Retriever};
use crate::retry::Deadline;
use crate::scheduler::Scheduler;
use crate::session::{SessionHandle, SessionState, SessionStore};
use crate::trust;
use crate::validator::{needs_repair, run_all_validators};

use super::result::{PlanRequest, PlanResponse, PlanStatus};
use super::state::{next_after_intake, next_after_validate, PlanState, Stage};

/// The orchestrator. One instance serves many concurrent requests; each
/// request runs the pipeline sequentially on its own task.
pub struct Planner {
    config: Config,
    flags: Arc<RuntimeFlags>,
    dataset: Arc<PoiDataset>,
    providers: Arc<ProviderSet>,
    llm: Option<Arc<dyn LlmClient>>,
    intake: Intake,
    clarify: Clarify,
    retriever: Retriever,
    scheduler: Scheduler,
    sessions: SessionStore,
    limiter: RateLimiter,
}

impl Planner {
    /// Wire up all stages from configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let dataset = match &config.providers.poi_dataset_path {
            Some(path) => PoiDataset::load_from_file(path)?,
            None => PoiDataset::embedded()?,
        };
        let dataset = Arc::new(dataset);

        let providers = Arc::new(build_providers(&config, dataset.clone()));
        let llm = create_client(&config.llm).map_err(|e| eyre::eyre!("LLM configuration: {e}"))?;
        let prompts = Arc::new(PromptLoader::new(None)?);

        let llm_timeout = Duration::from_millis(config.llm.timeout_ms);
        let map_timeout = Duration::from_millis(config.providers.map_timeout_ms);
        let cache_ttl = Duration::from_secs(config.cache.ttl_secs);

        let intake = Intake::new(
            llm.clone(),
            prompts.clone(),
            dataset.known_cities(),
            llm_timeout,
            config.planner.spring_festival_date,
        );
        let clarify = Clarify::new(llm.clone(), prompts.clone(), llm_timeout);
        let retriever = Retriever::new(
            providers.clone(),
            llm.clone(),
            prompts.clone(),
            config.cache.capacity,
            cache_ttl,
            config.providers.strict_external_data,
            map_timeout,
            llm_timeout,
        );
        let scheduler = Scheduler::new(
            providers.routes.clone(),
            config.planner.clone(),
            config.budget.clone(),
        );
        let sessions = SessionStore::new(
            Duration::from_secs(config.session.ttl_secs),
            config.session.max_sessions,
        );
        let limiter = RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        );

        info!(
            pois = dataset.total_pois(),
            poi_provider = providers.poi_provider_name(),
            route_provider = providers.route_provider_name(),
            "planner ready"
        );

        Ok(Self {
            config,
            flags: Arc::new(RuntimeFlags::default()),
            dataset,
            providers,
            llm,
            intake,
            clarify,
            retriever,
            scheduler,
            sessions,
            limiter,
        })
    }

    pub fn runtime_flags(&self) -> Arc<RuntimeFlags> {
        self.flags.clone()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn llm_provider_name(&self) -> &str {
        self.llm.as_deref().map(|c| c.provider_name()).unwrap_or("template")
    }

    fn fingerprint(&self, trace_id: &str) -> RunFingerprint {
        trust::build_fingerprint(
            self.providers.poi_provider_name(),
            self.providers.route_provider_name(),
            self.llm_provider_name(),
            self.config.providers.strict_external_data,
            &self.config.env_source,
            trace_id,
        )
    }

    /// Plan a trip. Never panics and never returns a bare error: every
    /// outcome is a structured response.
    pub async fn plan(&self, request: PlanRequest) -> PlanResponse {
        let request_id = Uuid::now_v7().to_string();
        let trace_id = Uuid::new_v4().simple().to_string();
        debug!(%request_id, %trace_id, "plan: request received");

        let session = self.sessions.get_or_create(request.session_id.as_deref());
        let skeleton =
            PlanResponse::skeleton(&session.id, &request_id, &trace_id, self.fingerprint(&trace_id));

        let client_key = request
            .client_key
            .clone()
            .or_else(|| request.session_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        if let Admission::Limited { retry_after } = self.limiter.check(&client_key) {
            return PlanResponse::from_error(skeleton, &PlanError::RateLimited { retry_after });
        }

        if request.message.trim().is_empty() && request.edit_patch.is_none() {
            return PlanResponse::from_error(
                skeleton,
                &PlanError::InputInvalid("message must not be empty".to_string()),
            );
        }

        let deadline_duration = Duration::from_millis(self.config.planner.request_deadline_ms);
        match tokio::time::timeout(
            deadline_duration,
            self.run_pipeline(&request, &session, &request_id, skeleton.clone()),
        )
        .await
        {
            Ok(response) => response,
            Err(_) => {
                // Dropping the pipeline future released the session lock and
                // aborted any in-flight provider calls.
                warn!(%request_id, "plan: deadline exceeded");
                PlanResponse::from_error(skeleton, &PlanError::DeadlineExceeded)
            }
        }
    }

    /// Continue a session conversationally; `/chat` is `plan` with a session
    pub async fn chat(&self, session_id: &str, message: &str, edit_patch: Option<crate::repair::EditPatch>) -> PlanResponse {
        self.plan(PlanRequest {
            message: message.to_string(),
            session_id: Some(session_id.to_string()),
            edit_patch,
            ..Default::default()
        })
        .await
    }

    async fn run_pipeline(
        &self,
        request: &PlanRequest,
        session: &SessionHandle,
        request_id: &str,
        mut response: PlanResponse,
    ) -> PlanResponse {
        // Per-session mutex held until the response is built
        let mut session_state = session.acquire().await;
        session_state.seq += 1;
        response.session_seq = session_state.seq;

        let deadline = Deadline::after(Duration::from_millis(
            self.config.planner.request_deadline_ms,
        ));

        let mut state = PlanState {
            message: request.message.clone(),
            ..Default::default()
        };

        // Edit patches short-circuit intake/retrieve/schedule and jump
        // straight to validation of the edited itinerary.
        let mut stage = match &request.edit_patch {
            Some(patch) => {
                match self
                    .apply_edit_patch(patch, &mut state, &mut session_state, deadline)
                    .await
                {
                    Ok(()) => Stage::Validate,
                    Err(e) => {
                        session_state.record_turn(request_id, &request.message, "error");
                        return PlanResponse::from_error(response, &e);
                    }
                }
            }
            None => Stage::Intake,
        };

        loop {
            stage = match stage {
                Stage::Intake => {
                    let output = self
                        .intake
                        .run(
                            &state.message,
                            request.constraints.as_ref(),
                            Some((&session_state.draft, &session_state.profile)),
                            deadline,
                        )
                        .await;
                    state.draft = output.draft;
                    state.profile = output.profile;
                    state.missing = output.missing;
                    state.field_evidence = output.field_evidence;

                    // The strict-required flag promotes budget to required
                    if self.flags.strict_required_fields()
                        && state.draft.daily_budget.is_none()
                        && state.draft.total_budget.is_none()
                    {
                        state.missing.push(RequiredField::Budget);
                    }
                    next_after_intake(&state)
                }

                Stage::Clarify => {
                    let questions = self
                        .clarify
                        .questions(
                            &state.message,
                            &state.draft,
                            !state.profile.themes.is_empty(),
                            deadline,
                        )
                        .await;

                    // Keep the partial draft so the next turn can fill it in
                    session_state.draft = state.draft.clone();
                    session_state.profile = state.profile.clone();
                    session_state.record_turn(request_id, &state.message, "clarifying");

                    response.status = PlanStatus::Clarifying;
                    response.message = "I need a little more information to plan this trip.".to_string();
                    response.next_questions = questions;
                    response.field_evidence = state.field_evidence.clone();
                    response.degrade_level = DegradeLevel::L0;
                    return response;
                }

                Stage::Retrieve => {
                    let constraints = match state.draft.clone().into_constraints() {
                        Some(constraints) => constraints,
                        None => {
                            session_state.record_turn(request_id, &state.message, "error");
                            return PlanResponse::from_error(
                                response,
                                &PlanError::InputInvalid("constraints incomplete after intake".to_string()),
                            );
                        }
                    };
                    state.constraints = Some(constraints);

                    let constraints = state.constraints.as_ref().expect("set above");
                    match self.retriever.run(constraints, &state.profile, deadline).await {
                        Ok(pool) if pool.pois.is_empty() => {
                            session_state.record_turn(request_id, &state.message, "error");
                            return PlanResponse::from_error(
                                response,
                                &PlanError::InputInvalid(format!(
                                    "no attractions found for {}",
                                    constraints.city
                                )),
                            );
                        }
                        Ok(pool) => {
                            state.pool = Some(pool);
                            Stage::Schedule
                        }
                        Err(e) => {
                            session_state.record_turn(request_id, &state.message, "error");
                            return PlanResponse::from_error(response, &e);
                        }
                    }
                }

                Stage::Schedule => {
                    let constraints = state.constraints.as_ref().expect("retrieve set constraints");
                    let pool = state.pool.as_ref().expect("retrieve set pool");

                    let mut itinerary = self
                        .scheduler
                        .build_itinerary(pool, constraints, &state.profile, deadline)
                        .await;
                    for name in &pool.unmatched_must_visit {
                        itinerary
                            .assumptions
                            .push(format!("could not find requested stop: {name}"));
                    }
                    state.itinerary = Some(itinerary);
                    Stage::Validate
                }

                Stage::Validate => {
                    let constraints = state.constraints.as_ref().expect("constraints present");
                    let itinerary = state.itinerary.as_ref().expect("itinerary present");

                    let mut issues = run_all_validators(itinerary, constraints);
                    // Scheduler-raised issues (must-visit closures) persist
                    issues.extend(itinerary.issues.iter().cloned());
                    state.issues = issues;

                    next_after_validate(&state, self.config.planner.max_repair_rounds)
                }

                Stage::Repair => {
                    let constraints = state.constraints.as_ref().expect("constraints present");
                    let pool = state.pool.as_ref().expect("pool present");
                    let itinerary = state.itinerary.as_mut().expect("itinerary present");

                    let weighted: u32 = state.issues.iter().map(|i| i.severity.weight()).sum();
                    state.progress_snapshot = Some((itinerary.total_cost, weighted));

                    let repairer =
                        Repairer::new(&self.scheduler, pool, constraints, &state.profile, deadline);
                    let report = repairer.repair_round(itinerary, &state.issues).await;

                    state.repair_rounds += 1;
                    state.repair_actions.extend(report.actions);
                    debug!(round = state.repair_rounds, "repair: round executed");
                    Stage::Validate
                }

                Stage::Finalize => {
                    return self
                        .finalize(request_id, &mut state, &mut session_state, response)
                        .await;
                }
            };
        }
    }

    async fn apply_edit_patch(
        &self,
        patch: &crate::repair::EditPatch,
        state: &mut PlanState,
        session_state: &mut OwnedMutexGuard<SessionState>,
        deadline: Deadline,
    ) -> Result<(), PlanError> {
        let mut itinerary = session_state
            .itinerary
            .clone()
            .ok_or_else(|| PlanError::InputInvalid("no itinerary in this session to edit".to_string()))?;
        let constraints = session_state
            .constraints
            .clone()
            .ok_or_else(|| PlanError::InputInvalid("session has no stored constraints".to_string()))?;
        let profile = session_state.profile.clone();

        let actions = apply_edit(
            &mut itinerary,
            patch,
            &self.dataset,
            &self.scheduler,
            &constraints,
            &profile,
            deadline,
        )
        .await?;
        itinerary.assumptions.extend(actions);

        // Repair substitutions draw from the plan's own arena
        state.pool = Some(pool_from_itinerary(&itinerary));
        state.profile = profile;
        state.constraints = Some(constraints);
        state.itinerary = Some(itinerary);
        Ok(())
    }

    async fn finalize(
        &self,
        request_id: &str,
        state: &mut PlanState,
        session_state: &mut OwnedMutexGuard<SessionState>,
        mut response: PlanResponse,
    ) -> PlanResponse {
        let constraints = state.constraints.clone().expect("constraints present");
        let mut itinerary = state.itinerary.take().expect("itinerary present");

        itinerary.assumptions.extend(state.repair_actions.iter().cloned());

        let summary = trust::assess(&itinerary, response.run_fingerprint.run_mode);

        // Degrade is the worst of the trust assessment, the repair ladder
        // consumption, and exhaustion. Exhaustion covers both the round
        // bound and a stalled ladder: repair ran and actionable issues
        // still survived.
        let repair_degrade = DegradeLevel::from_steps(state.repair_rounds);
        let exhausted = needs_repair(&state.issues) && state.repair_rounds > 0;
        let mut degrade = summary.degrade_level.max(if state.repair_rounds > 0 {
            repair_degrade
        } else {
            DegradeLevel::L0
        });
        if exhausted {
            degrade = DegradeLevel::L3;
        }

        itinerary.confidence_score = summary.confidence_score;
        itinerary.degrade_level = degrade;
        itinerary.issues = state.issues.clone();

        session_state.draft = state.draft.clone();
        session_state.profile = state.profile.clone();
        session_state.constraints = Some(constraints);
        session_state.itinerary = Some(itinerary.clone());
        session_state.record_turn(request_id, &state.message, "done");

        info!(
            days = itinerary.days.len(),
            confidence = summary.confidence_score,
            degrade = %degrade,
            issues = state.issues.len(),
            "plan: finalized"
        );

        response.status = PlanStatus::Done;
        response.message = itinerary.summary.clone();
        response.confidence_score = summary.confidence_score;
        response.degrade_level = degrade;
        response.issues = state.issues.clone();
        response.field_evidence = state.field_evidence.clone();
        response.itinerary = Some(itinerary);
        response
    }
}

/// A surrogate pool for the edit path, scored by popularity
fn pool_from_itinerary(itinerary: &Itinerary) -> CandidatePool {
    let pois: Vec<_> = itinerary.pois.iter().cloned().collect();
    let scores = pois.iter().map(|p| (p.id.clone(), p.popularity)).collect();
    CandidatePool {
        pois,
        scores,
        unmatched_must_visit: Vec::new(),
    }
}
