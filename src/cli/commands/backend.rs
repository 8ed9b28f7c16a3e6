use crate::config::{DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT_SECONDS};
use clap::{Arg, Command};
use std::path::PathBuf;

pub const ARG_API_BASE_URL: &str = "api-base-url";
pub const ARG_STATE_DIR: &str = "state-dir";
pub const ARG_TIMEOUT: &str = "timeout";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_BASE_URL)
                .long(ARG_API_BASE_URL)
                .help("Base URL of the Sentinel REST API")
                .default_value(DEFAULT_API_BASE_URL)
                .env("SENTINEL_API_BASE_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_STATE_DIR)
                .long(ARG_STATE_DIR)
                .help("Directory holding the stored session (default: <config dir>/sentinel)")
                .env("SENTINEL_STATE_DIR")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long(ARG_TIMEOUT)
                .help(format!("Request timeout in seconds (default: {DEFAULT_TIMEOUT_SECONDS})"))
                .env("SENTINEL_TIMEOUT_SECONDS")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

