use super::output::print_json;
use crate::{
    cli::globals::GlobalArgs,
    features::{
        live::{DETECTION_PERIOD, LiveDetector},
        user::{self, DetectionResponse, MediaKind},
    },
};
use anyhow::Result;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Upload(MediaKind),
    /// Stop after this many results, or run until interrupted.
    Live(Option<u64>),
}

#[derive(Debug)]
pub struct Args {
    pub mode: Mode,
    pub path: PathBuf,
}

#[derive(Debug)]
pub enum UploadCommand {
    Show(String),
    Delete(String),
}

/// # Errors
/// Returns the API failure.
pub async fn stats(globals: &GlobalArgs) -> Result<()> {
    let context = globals.connect()?;
    print_json(&user::stats(&context.client).await?)
}

/// # Errors
/// Returns an error if the file cannot be read or the upload fails.
pub async fn execute(globals: &GlobalArgs, args: Args) -> Result<()> {
    let context = globals.connect()?;

    match args.mode {
        Mode::Upload(kind) => {
            let response = user::detect_file(&context.client, kind, &args.path).await?;
            report(&response);
            print_json(&response)
        }
        Mode::Live(limit) => live(context.client, args.path, limit).await,
    }
}

async fn live(client: crate::api::ApiClient, path: PathBuf, limit: Option<u64>) -> Result<()> {
    let (tx, mut results) = mpsc::channel(8);
    let client = Arc::new(client);
    let path = Arc::new(path);

    let detector = LiveDetector::spawn(
        DETECTION_PERIOD,
        move || {
            let client = Arc::clone(&client);
            let path = Arc::clone(&path);
            async move { user::detect_file(&client, MediaKind::Image, &path).await }
        },
        tx,
    );

    let mut received = 0_u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            outcome = results.recv() => {
                let Some(outcome) = outcome else { break };
                received += 1;
                match outcome {
                    Ok(response) => {
                        report(&response);
                        println!("{}", serde_json::to_string(&response)?);
                    }
                    Err(err) => warn!("frame rejected: {err}"),
                }
                if limit.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
        }
    }

    let counters = detector.counters();
    info!(
        sent = counters.sent(),
        skipped = counters.skipped(),
        failed = counters.failed(),
        "live detection stopped"
    );
    detector.stop();
    Ok(())
}

fn report(response: &DetectionResponse) {
    let dangerous = response.dangerous().count();
    if dangerous > 0 {
        warn!(
            upload_id = %response.upload_id,
            dangerous,
            "dangerous objects detected"
        );
    } else {
        info!(
            upload_id = %response.upload_id,
            detections = response.detections.len(),
            "no dangerous objects"
        );
    }
    for warning in &response.warnings {
        warn!("{warning}");
    }
}

/// # Errors
/// Returns the API failure.
pub async fn upload(globals: &GlobalArgs, command: UploadCommand) -> Result<()> {
    let context = globals.connect()?;
    match command {
        UploadCommand::Show(id) => print_json(&user::get_upload(&context.client, &id).await?),
        UploadCommand::Delete(id) => print_json(&user::delete_upload(&context.client, &id).await?),
    }
}
