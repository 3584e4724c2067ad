//! Domain model for the World State context.

pub mod aggregates;
pub mod commands;
pub mod payload;
pub mod repository;
