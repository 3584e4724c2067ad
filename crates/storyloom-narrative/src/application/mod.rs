//! Application services for the Narrative Orchestration context.

pub mod combat_narration;
pub mod dispatcher;
pub mod orchestrator;
