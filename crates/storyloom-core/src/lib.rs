//! Storyloom Core — shared domain abstractions.
//!
//! This crate defines the message model, the narration adapter port and the
//! determinism seams (clock, RNG) that every other crate depends on. It
//! contains no infrastructure code.

pub mod clock;
pub mod error;
pub mod message;
pub mod narration;
pub mod rng;
