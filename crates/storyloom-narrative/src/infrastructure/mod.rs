//! Adapters owned by the Narrative Orchestration context.

pub mod mock_narration;
pub mod openai_narration;
