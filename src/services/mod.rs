//! Agent-facing services.

#![allow(missing_docs)]

pub mod tee;

pub use tee::TEEService;
