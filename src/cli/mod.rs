//! CLI command handlers.
//!
//! This module provides testable command handlers that are invoked by main.rs.
//! Each handler implements the business logic for a specific CLI subcommand.

mod scan;

pub use scan::{resolve_scanner, run_scan, ScanConfig};
