//! Core primitives: persistence, logging, configuration, and process execution.
//!
//! Everything in `plugins` and `web` is built from these pieces.

pub mod config;
pub mod document;
pub mod error;
pub mod external_action;
pub mod logging;
pub mod output;
pub mod pool;
pub mod rotating_log;
pub mod store;
pub mod time;
