//! Terminal client for the marketlens research service.

pub mod config;
pub mod console;
pub mod history;
pub mod reports;
pub mod run;
