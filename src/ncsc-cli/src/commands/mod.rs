//! Command handlers for the ncsc CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod configure;
pub mod convert;
pub mod inspect;
