//! Shared plumbing for the `daqlink` command-line tools: connection arguments,
//! config file loading and logging setup.

pub mod cli;
