pub mod admin;
pub mod auth;
pub mod backend;
pub mod logging;
pub mod media;

use clap::{
    ColorChoice, Command,
    builder::{
        ValueParser,
        styling::{AnsiColor, Effects, Styles},
    },
};
use serde_json::Value;

/// Parses `key=value`. The value is read as JSON when it parses, so
/// `enabled=true` yields a boolean and `name=Alice` stays a string.
#[must_use]
pub fn validator_assignment() -> ValueParser {
    ValueParser::from(move |raw: &str| -> std::result::Result<(String, Value), String> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err("empty key".to_string());
        }
        let value = serde_json::from_str(value.trim())
            .unwrap_or_else(|_| Value::String(value.trim().to_string()));
        Ok((key.to_string(), value))
    })
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("sentinel")
        .about("Ob AI Sentinel console client")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true);

    let command = backend::with_args(command);
    let command = auth::with_subcommands(command);
    let command = media::with_subcommands(command);
    let command = admin::with_subcommands(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "sentinel");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Ob AI Sentinel console client".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_command_tree_is_valid() {
        new().debug_assert();
    }

    #[test]
    fn test_global_args_after_subcommand() {
        temp_env::with_vars(
            [
                ("SENTINEL_API_BASE_URL", None::<&str>),
                ("SENTINEL_STATE_DIR", None),
                ("SENTINEL_TIMEOUT_SECONDS", None),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "sentinel",
                    "status",
                    "--api-base-url",
                    "https://sentinel.obai.io/api/v1",
                    "--state-dir",
                    "/tmp/sentinel",
                    "--timeout",
                    "5",
                ]);

                assert_eq!(
                    matches
                        .get_one::<String>(backend::ARG_API_BASE_URL)
                        .cloned(),
                    Some("https://sentinel.obai.io/api/v1".to_string())
                );
                assert_eq!(
                    matches.get_one::<PathBuf>(backend::ARG_STATE_DIR).cloned(),
                    Some(PathBuf::from("/tmp/sentinel"))
                );
                assert_eq!(matches.get_one::<u64>(backend::ARG_TIMEOUT).copied(), Some(5));
                assert_eq!(matches.subcommand_name(), Some(auth::CMD_STATUS));
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("SENTINEL_API_BASE_URL", Some("http://10.0.0.5:8000/api/v1")),
                ("SENTINEL_TIMEOUT_SECONDS", Some("30")),
                ("SENTINEL_EMAIL", Some("alice@obai.io")),
                ("SENTINEL_PASSWORD", Some("hunter2")),
                ("SENTINEL_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["sentinel", "login"]);
                assert_eq!(
                    matches
                        .get_one::<String>(backend::ARG_API_BASE_URL)
                        .cloned(),
                    Some("http://10.0.0.5:8000/api/v1".to_string())
                );
                assert_eq!(matches.get_one::<u64>(backend::ARG_TIMEOUT).copied(), Some(30));
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );

                let login = matches.subcommand_matches(auth::CMD_LOGIN);
                assert_eq!(
                    login.and_then(|m| m.get_one::<String>(auth::ARG_EMAIL).cloned()),
                    Some("alice@obai.io".to_string())
                );
                assert_eq!(
                    login.and_then(|m| m.get_one::<String>(auth::ARG_PASSWORD).cloned()),
                    Some("hunter2".to_string())
                );
            },
        );
    }

    #[test]
    fn test_default_base_url() {
        temp_env::with_vars([("SENTINEL_API_BASE_URL", None::<&str>)], || {
            let matches = new().get_matches_from(vec!["sentinel", "settings"]);
            assert_eq!(
                matches
                    .get_one::<String>(backend::ARG_API_BASE_URL)
                    .cloned(),
                Some(crate::config::DEFAULT_API_BASE_URL.to_string())
            );
        });
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("SENTINEL_LOG_LEVEL", Some(level))], || {
                let matches = new().get_matches_from(vec!["sentinel", "settings"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for count in 0..5_u8 {
            temp_env::with_vars([("SENTINEL_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["sentinel".to_string(), "settings".to_string()];
                if count > 0 {
                    args.push(format!("-{}", "v".repeat(usize::from(count))));
                }

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(count)
                );
            });
        }
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        let result = new().try_get_matches_from(vec!["sentinel"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_update_alert_needs_a_change() {
        let result =
            new().try_get_matches_from(vec!["sentinel", "admin", "update-alert", "a1"]);
        assert!(result.is_err());

        let result = new().try_get_matches_from(vec![
            "sentinel",
            "admin",
            "update-alert",
            "a1",
            "--status",
            "acknowledged",
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_assignments_parse_json_values() {
        let matches = new().get_matches_from(vec![
            "sentinel",
            "admin",
            "update-settings",
            "--set",
            "maintenance_mode=true",
            "--set",
            "primary_engine=yolo",
            "--set",
            "max_image_size_mb=10",
        ]);
        let values: Vec<(String, serde_json::Value)> = matches
            .subcommand_matches(admin::CMD_ADMIN)
            .and_then(|m| m.subcommand_matches("update-settings"))
            .and_then(|m| m.get_many::<(String, serde_json::Value)>(admin::ARG_SET))
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        assert_eq!(
            values,
            vec![
                ("maintenance_mode".to_string(), json!(true)),
                ("primary_engine".to_string(), json!("yolo")),
                ("max_image_size_mb".to_string(), json!(10)),
            ]
        );
    }

    #[test]
    fn test_assignment_requires_a_key() {
        let result = new().try_get_matches_from(vec![
            "sentinel", "account", "profile", "--set", "=Alice",
        ]);
        assert!(result.is_err());
        let result = new().try_get_matches_from(vec![
            "sentinel", "account", "profile", "--set", "Alice",
        ]);
        assert!(result.is_err());
    }
}
