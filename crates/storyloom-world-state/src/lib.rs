//! Storyloom — World State bounded context.
//!
//! Owns the campaign aggregate (player, cast, locations, combat flag),
//! extracts structured facts from narration and persists the result.

pub mod application;
pub mod domain;
