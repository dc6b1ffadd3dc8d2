//! Tableau Workbook Migrator
//!
//! Automation for copying Tableau Server workbooks, projects, and sites
//! between servers, and for exporting workbooks to Nexus and GitHub.

pub mod cli;
pub mod client;
pub mod export;
pub mod migrate;
pub mod storage;
pub mod tableau;

// Re-exports for convenience
pub use client::{Auth, TableauClient};
pub use export::{ExportPipeline, GithubClient, NexusUploader};
pub use migrate::{Migrator, plan_passes};
pub use storage::DownloadDir;
