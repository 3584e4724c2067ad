//! Domain types for the Narrative Orchestration context.

pub mod events;
pub mod prompts;
