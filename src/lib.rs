//! Backend core for a health-study platform.
//!
//! This crate implements two cooperating service cores:
//! - the questionnaire service: instance lifecycle, answer capture with
//!   release versioning, and conditional question/answer-option visibility
//! - the SORMAS integration service: bridging released symptom-diary answers
//!   into an external epidemiological surveillance system
//!
//! HTTP wiring, message transports and the external REST clients live outside
//! this crate; collaborators are narrow traits so everything here is testable
//! against in-memory fakes.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod service;
pub mod sormas;
