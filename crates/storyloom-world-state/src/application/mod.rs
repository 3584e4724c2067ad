//! Application services for the World State context.

pub mod command_handlers;
pub mod query_handlers;
pub mod synchronizer;
