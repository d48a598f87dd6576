//! Orchestration: plan state, stage transitions, and the planner service

mod core;
mod result;
mod state;

pub use self::core::Planner;
pub use result::{PlanRequest, PlanResponse, PlanStatus};
pub use state::{next_after_intake, next_after_validate, PlanState, Stage};
