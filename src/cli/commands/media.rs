use crate::config::DEFAULT_POLL_INTERVAL_SECONDS;
use clap::{Arg, Command};
use std::path::PathBuf;

pub const CMD_SETTINGS: &str = "settings";
pub const CMD_WATCH: &str = "watch";
pub const CMD_STATS: &str = "stats";
pub const CMD_DETECT: &str = "detect";
pub const CMD_UPLOAD: &str = "upload";

pub const ARG_INTERVAL: &str = "interval";
pub const ARG_PATH: &str = "path";
pub const ARG_FRAMES: &str = "frames";
pub const ARG_UPLOAD_ID: &str = "upload-id";

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(Command::new(CMD_SETTINGS).about("Print the public system settings"))
        .subcommand(
            Command::new(CMD_WATCH)
                .about("Follow the maintenance flag until interrupted")
                .arg(
                    Arg::new(ARG_INTERVAL)
                        .long(ARG_INTERVAL)
                        .help(format!(
                            "Seconds between settings reads (default: {DEFAULT_POLL_INTERVAL_SECONDS})"
                        ))
                        .env("SENTINEL_POLL_INTERVAL_SECONDS")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                ),
        )
        .subcommand(Command::new(CMD_STATS).about("Print detection statistics for the signed-in user"))
        .subcommand(detect())
        .subcommand(upload())
}

fn path_arg() -> Arg {
    Arg::new(ARG_PATH)
        .help("Media file")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
}

fn detect() -> Command {
    Command::new(CMD_DETECT)
        .about("Run threat detection on media")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("image").about("Upload an image").arg(path_arg()))
        .subcommand(Command::new("video").about("Upload a video").arg(path_arg()))
        .subcommand(
            Command::new("live")
                .about("Submit a frame file every 500 ms, skipping ticks while a frame is in flight")
                .arg(path_arg().help("Frame image, rewritten in place by the capture source"))
                .arg(
                    Arg::new(ARG_FRAMES)
                        .long(ARG_FRAMES)
                        .help("Stop after this many results (default: run until interrupted)")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                ),
        )
}

fn upload() -> Command {
    let id = || Arg::new(ARG_UPLOAD_ID).help("Upload id").required(true);
    Command::new(CMD_UPLOAD)
        .about("Inspect or delete a previous upload")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("show").about("Print an upload").arg(id()))
        .subcommand(Command::new("delete").about("Delete an upload").arg(id()))
}
