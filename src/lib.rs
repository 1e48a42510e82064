//! Evaluation review workflow for teacher inscriptions: the evaluator's
//! queue, cursor navigation between inscriptions, and the unsaved-draft guard.

pub mod config;
pub mod db;
pub mod draft;
pub mod error;
pub mod models;
pub mod navigation;
pub mod queue;
pub mod report;
pub mod scoring;
pub mod store;
