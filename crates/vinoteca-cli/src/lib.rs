//! Vinoteca CLI - Command-line interface for the Vinoteca wine journal
//!
//! This crate provides the CLI application that ties together all Vinoteca components.

pub mod config;
pub mod output;

pub use config::{cellar_filter, Command, Config, DetailArgs, EntryArgs, ExportFormat, SortArg};
