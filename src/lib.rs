//! workerimg library exports.
//!
//! The binary is a thin CLI over these modules; integration tests drive the
//! pipeline and the exporter through them with a scripted command runner.

pub mod artifact;
pub mod cleanup;
pub mod commands;
pub mod common;
pub mod config;
pub mod env;
pub mod error;
pub mod export;
pub mod health;
pub mod install;
pub mod manifest;
pub mod mirror;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod retry;
pub mod timing;
pub mod verify;
