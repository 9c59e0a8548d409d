pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod gemini;
pub mod generate;
pub mod ledger;
pub mod logging;
pub mod preset;
pub mod prompt;
pub mod spec;
pub mod storage;
pub mod store;
