pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod docker;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod platform;
pub mod runtime;
pub mod ui;
