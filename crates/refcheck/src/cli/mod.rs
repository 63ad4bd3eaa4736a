//! CLI module for refcheck
//!
//! `check` runs the whole pipeline; `reports` and `config` are standalone
//! utilities that never scan.

pub mod check;
pub mod config;
pub mod context;
pub mod error;
pub mod output;
pub mod reports;
