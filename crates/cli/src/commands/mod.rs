//! Subcommand implementations

pub mod config;
pub mod create;
pub mod doctor;
pub mod list;
mod services;
