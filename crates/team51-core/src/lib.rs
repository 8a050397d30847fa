//! Core domain types and helpers for the team51 operations CLI.
//!
//! This crate contains:
//! - Site references and WordPress.com site helpers
//! - The uniform command outcome type
//! - Table rendering and file exports
//! - PHP error log parsing and summarising
//! - The email deliverability heuristic
//! - Password generation and the credential vault abstraction
//! - Bounded parallel fan-out

pub mod error;
pub mod export;
pub mod fanout;
pub mod mail;
pub mod outcome;
pub mod output;
pub mod password;
pub mod php_log;
pub mod site;
pub mod vault;

pub use error::{Error, Result};
pub use outcome::CommandOutcome;
pub use output::{OutputFormat, Table};
pub use site::SiteRef;
