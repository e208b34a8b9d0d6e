//! Wakamiti CLI - submit commands to a Wakamiti service and stream their progress.

pub mod config;
pub mod display;
pub mod exec;
