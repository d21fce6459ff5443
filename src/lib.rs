//! VALUEBET: Sports exchange value finder
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod analysis;
pub mod app;
pub mod config;
pub mod engine;
pub mod feed;
pub mod storage;
pub mod strategy;
pub mod types;
