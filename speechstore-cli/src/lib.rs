//! Subcommands of the `sst` binary.

pub mod cli;
pub mod init;
pub mod inspect;
pub mod list;
pub mod unit;
