//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{MirrorError, MirrorResult};
use console::style;

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
) -> MirrorResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let mut config = config.clone();
            set_value(&mut config, &key, &value)?;
            config.validate().map_err(MirrorError::User)?;
            manager.save(&config).await?;
            println!("{} Set {} = {}", style("✓").green(), key, value);
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> MirrorResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> MirrorResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!(
            "{} Config already exists at {}",
            style("!").yellow(),
            path.display()
        );
        println!("  {}", style("Use --force to overwrite").dim());
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    println!(
        "{} Configuration initialized at {}",
        style("✓").green(),
        path.display()
    );

    Ok(())
}

/// Apply a dot-separated `key = value` to `config`
fn set_value(config: &mut Config, key: &str, value: &str) -> MirrorResult<()> {
    // Seed keys may themselves contain dots
    let parts: Vec<&str> = key.splitn(3, '.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,

        ["store", "backend"] => config.store.backend = value.to_string(),
        ["store", "host"] => config.store.host = value.to_string(),
        ["store", "port"] => config.store.port = parse_num(value)?,
        ["store", "db"] => config.store.db = parse_num(value)?,
        ["store", "password"] => config.store.password = Some(value.to_string()),
        ["store", "connect_timeout_ms"] => config.store.connect_timeout_ms = parse_num(value)?,
        ["store", "enable_keyspace_events"] => {
            config.store.enable_keyspace_events = parse_bool(value)?
        }
        ["store", "scan_count"] => config.store.scan_count = parse_num(value)?,
        ["store", "seed", seed_key] => {
            config
                .store
                .seed
                .insert((*seed_key).to_string(), value.to_string());
        }

        ["mirror", "pattern"] => config.mirror.pattern = value.to_string(),
        ["mirror", "channel_capacity"] => config.mirror.channel_capacity = parse_num(value)?,

        ["sketch", "color_key"] => config.sketch.color_key = value.to_string(),
        ["sketch", "fps"] => config.sketch.fps = parse_num(value)?,
        ["sketch", "angle_step"] => config.sketch.angle_step = parse_num(value)?,
        ["sketch", "radius"] => config.sketch.radius = parse_num(value)?,
        ["sketch", "report_every"] => config.sketch.report_every = parse_num(value)?,

        _ => {
            return Err(MirrorError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "store.backend",
    "store.host",
    "store.port",
    "store.db",
    "store.password",
    "store.connect_timeout_ms",
    "store.enable_keyspace_events",
    "store.scan_count",
    "store.seed.<key>",
    "mirror.pattern",
    "mirror.channel_capacity",
    "sketch.color_key",
    "sketch.fps",
    "sketch.angle_step",
    "sketch.radius",
    "sketch.report_every",
];

fn parse_log_format(value: &str) -> MirrorResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(MirrorError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}

fn parse_bool(value: &str) -> MirrorResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(MirrorError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(value: &str) -> MirrorResult<T> {
    value
        .parse()
        .map_err(|_| MirrorError::User(format!("Invalid number: {}", value)))
}
