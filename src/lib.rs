//! Stackdef: typed configuration defaulting for infrastructure stacks.
//!
//! A sparse config tree is merged with a defaults tree whose `<key>_defaults`
//! entries describe the defaults for `<key>`, including every element of an
//! array. Schemas mark which fields may be defaulted; derived shapes check the
//! defaults and the resolved result.

pub mod cli;
pub mod core;
pub mod error;
pub mod logging;
pub mod tripwire;
