//! Core configuration logic: types, schemas, shapes, merging, planning, state.

pub mod app;
pub mod definition;
pub mod merge;
pub mod parser;
pub mod planner;
pub mod resolve;
pub mod schema;
pub mod shape;
pub mod state;
pub mod types;
