//! Phoenix - Bootstrap change-point detection for benchmark regressions
//!
//! This library compares two samples of benchmark runs (an old and a new
//! version of the system under test) and decides whether the new version
//! regressed, with a p-value and a relative effect size. Around the detector
//! it provides run-size policies, adaptive stopping controls trained on
//! synthetic regressions, ground-truth caching, and run-count estimation.

pub mod cli;
pub mod config;
pub mod control;
pub mod detection;
pub mod dimension;
pub mod error;
pub mod estimates;
pub mod ground_truth;
pub mod mutation_model;
pub mod persist;
pub mod pool;
pub mod run_size;
pub mod sample;
pub mod training;

pub use error::{PhoenixError, Result};
