//! Chat front end for the `labres` machine registry.
//!
//! - [`commands`]: chat line parsing, dispatch to the registry and reply text
//! - [`importer`]: wiki machines-table fetching and parsing
//! - [`format`]: list and interval formatting shared by the replies

pub mod commands;
pub mod format;
pub mod importer;


pub use commands::{Command, CommandHandler, Reply};
pub use importer::{ImportError, PageSource, parse_table};
