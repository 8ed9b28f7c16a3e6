use super::output::print_json;
use crate::{
    auth::{
        AuthSnapshot, GuardDecision, client,
        guards::{dashboard_for, protected_route},
    },
    cli::globals::GlobalArgs,
    maintenance::{self, MaintenancePoller},
};
use anyhow::Result;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct StatusArgs {
    pub refresh: bool,
}

#[derive(Debug, Default)]
pub struct WatchArgs {
    pub interval: Option<Duration>,
}

/// Server logout is best effort; the local session is always dropped.
/// # Errors
/// Returns an error if the client cannot be built.
pub async fn logout(globals: &GlobalArgs) -> Result<()> {
    let context = globals.connect()?;

    if context.machine.state().has_token {
        match client::logout(&context.client).await {
            Ok(response) => debug!(message = %response.message, "server session revoked"),
            Err(err) => warn!("server logout failed: {err}"),
        }
    }

    let state = context.machine.logout();
    print_json(&json!({ "logged_out": state.user.is_none() }))
}

/// # Errors
/// Returns an error if the client cannot be built or the profile refresh is
/// rejected.
pub async fn status(globals: &GlobalArgs, args: StatusArgs) -> Result<()> {
    let context = globals.connect()?;

    if args.refresh && context.machine.state().has_token {
        let user = client::me(&context.client).await?;
        if let Value::Object(fields) = serde_json::to_value(&user)? {
            context.machine.update_user(&fields);
        }
    }

    maintenance::refresh_once(&context.client, &context.machine).await;
    print_json(&describe(&context.machine.state()))
}

fn describe(state: &AuthSnapshot) -> Value {
    let landing = match protected_route(state, None) {
        GuardDecision::Allow => dashboard_for(state.role),
        GuardDecision::Redirect(path) => path,
        GuardDecision::Wait => "",
    };

    json!({
        "authenticated": state.user.is_some(),
        "user": state.user,
        "role": state.role.to_string(),
        "step": state.step.to_string(),
        "maintenance": state.maintenance,
        "landing": landing,
    })
}

/// # Errors
/// Returns the API failure.
pub async fn settings(globals: &GlobalArgs) -> Result<()> {
    let context = globals.connect()?;
    let settings = maintenance::fetch_settings(&context.client).await?;
    print_json(&settings)
}

/// Prints one JSON line per maintenance flag change until Ctrl-C.
/// # Errors
/// Returns an error if the client cannot be built.
pub async fn watch(globals: &GlobalArgs, args: WatchArgs) -> Result<()> {
    let context = globals.connect()?;
    let period = args.interval.unwrap_or(context.config.poll_interval);
    let mut updates = context.machine.subscribe();
    let poller = MaintenancePoller::spawn(context.client.clone(), context.machine.clone(), period);
    info!(?period, "watching maintenance mode");

    let mut last = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let maintenance = updates.borrow_and_update().maintenance;
                if last != Some(maintenance) {
                    last = Some(maintenance);
                    println!("{}", json!({ "maintenance": maintenance }));
                }
            }
        }
    }

    poller.stop();
    Ok(())
}
