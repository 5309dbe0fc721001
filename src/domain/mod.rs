//! Core domain types and logic.

pub mod audit;
pub mod bar;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod indicator;
pub mod indicator_helpers;
pub mod metrics;
pub mod portfolio;
pub mod position;
pub mod prediction;
pub mod risk;
pub mod signal;
pub mod signal_policy;
pub mod simulation;
pub mod strategy;
