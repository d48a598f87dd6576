//! TripAgent - deterministic multi-day trip planning pipeline
//!
//! TripAgent turns a natural-language trip request into a validated,
//! repairable, provenance-tracked itinerary. The pipeline is a linear state
//! machine with one bounded backward edge:
//!
//! intake -> (clarify) | retrieve -> schedule -> validate -> [repair ->
//! validate]* -> finalize
//!
//! # Core concepts
//!
//! - **Greedy scheduling**: geographic clustering, nearest-neighbor ordering,
//!   time-boxed days with meal windows and security buffers
//! - **Bounded repair**: a strategy ladder applied at most
//!   `max-repair-rounds` times, with a cost-or-severity progress invariant
//! - **Provenance everywhere**: each POI fact is tagged verified/curated/
//!   heuristic/fallback and the trust layer folds the tags into one
//!   confidence score and degrade level
//! - **Typed providers**: curated dataset, real map, and fixture variants
//!   behind `PoiSearch`/`RouteBetween` capability traits
//!
//! # Modules
//!
//! - [`orchestrator`] - plan state, transitions, and the `Planner` service
//! - [`intake`] / [`clarify`] - constraint extraction and follow-up questions
//! - [`retrieve`] - candidate pool assembly with provenance fusion
//! - [`scheduler`] - the four scheduling phases
//! - [`validator`] / [`repair`] - rule checks and the repair ladder
//! - [`trust`] - confidence scoring and the run fingerprint
//! - [`llm`] / [`providers`] - external collaborators behind traits

pub mod cache;
pub mod clarify;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod export;
pub mod intake;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod ratelimit;
pub mod repair;
pub mod retrieve;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod trust;
pub mod validator;

// Re-export commonly used types
pub use config::{Config, LlmConfig, RuntimeFlags};
pub use dataset::PoiDataset;
pub use domain::{
    DegradeLevel, Issue, IssueCode, Itinerary, ItineraryDay, Pace, Poi, PoiArena, RunFingerprint,
    RunMode, ScheduleItem, Severity, SourceType, TimeOfDay, TimeSlot, TransportMode,
    TravelersType, TripConstraints, UserProfile,
};
pub use error::PlanError;
pub use orchestrator::{Planner, PlanRequest, PlanResponse, PlanStatus};
pub use repair::EditPatch;
pub use session::{SessionState, SessionStore};
pub use trust::TrustSummary;
