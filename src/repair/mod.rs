//! Repair: strategy ladder and edit patches
//!
//! Given a non-empty issue set the ladder applies remediations from least to
//! most destructive; chat-driven edit patches are the restricted form that
//! touches a single day.

mod edit;
mod ladder;

pub use edit::{apply_edit, AddStop, AdjustTime, EditPatch, LunchBreak, RemoveStop, ReplaceStop};
pub use ladder::{actionable, made_progress, RepairReport, Repairer};
