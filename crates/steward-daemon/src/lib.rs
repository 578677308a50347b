//! steward-daemon - Claim dispatch daemon library
//!
//! Runtime wiring around the `steward-core` engine: daemon configuration,
//! the built-in stakeholder manifest, and the people/profile document the
//! built-in workflows operate on.
//!
//! # Modules
//!
//! - [`config`]: TOML daemon configuration wrapping the engine knobs
//! - [`people`]: the per-project people roster document (logins, skills)
//! - [`stk`]: built-in stakeholders (join workflow, skills lookup, the
//!   notification sink) and the startup manifest that registers them

pub mod config;
pub mod people;
pub mod stk;
