//! Storyloom — Narrative Orchestration bounded context.
//!
//! Runs a turn end to end: resolves combat when the campaign is fighting,
//! picks the instruction template, drives the narration model (buffered or
//! streamed), reports progress to observers and syncs the world state.

pub mod application;
pub mod domain;
pub mod infrastructure;
