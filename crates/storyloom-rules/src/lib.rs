//! Storyloom — Rules & Resolution bounded context.
//!
//! Resolves a two-sided combat exchange between the player and a single
//! opponent: who hits, and for how much. Everything here is pure and driven
//! by an injected RNG.

pub mod domain;
