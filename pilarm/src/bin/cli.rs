//! Operator helper for pilarm.
//!
//! Checks config files and sends test messages without starting the monitor.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use pilarm::config::Config;
use pilarm::gpio::sysfs;
use pilarm::notify::{AlertKind, NotificationClient, SlackClient};

const DEFAULT_CONFIG: &str = "pilarm.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: pilarm-cli <command> [config]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  check-config    Validate a config file and print the effective values");
        eprintln!("  send-test       Post a test message to the configured Slack channel");
        eprintln!();
        eprintln!("Environment:");
        eprintln!("  PILARM_CONFIG            Config path (default: {DEFAULT_CONFIG})");
        eprintln!("  PILARM_SLACK_API_TOKEN   Overrides slack_api_token from the file");
        std::process::exit(1);
    }

    let command = &args[1];
    let path = config_path(args.get(2));

    match command.as_str() {
        "check-config" => cmd_check_config(path)?,
        "send-test" => cmd_send_test(path).await?,
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Explicit argument, then PILARM_CONFIG, then the default.
fn config_path(arg: Option<&String>) -> PathBuf {
    match arg {
        Some(path) => PathBuf::from(path),
        None => env::var("PILARM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG)),
    }
}

fn load(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Print the validated config, secrets redacted.
fn cmd_check_config(path: PathBuf) -> Result<()> {
    let config = load(&path)?;

    println!("# {} is valid", path.display());
    println!("{config}");

    let uses_gpio = !config.disable_gpio && (!config.dev_mode || config.status_light.is_some());
    if uses_gpio && !sysfs::is_available(&config.gpio.sysfs_root) {
        println!();
        println!(
            "# warning: {} has no export file; GPIO will fail at startup",
            config.gpio.sysfs_root.display()
        );
    }

    Ok(())
}

/// Resolve the channel and post one test message.
async fn cmd_send_test(path: PathBuf) -> Result<()> {
    let config = load(&path)?;
    let client = SlackClient::new(&config.slack)?;

    let channel_id = client
        .resolve_channel(&config.slack.channel)
        .await
        .with_context(|| format!("failed to resolve #{}", config.slack.channel))?;
    println!("Channel: #{} ({})", config.slack.channel, channel_id);

    let text = format!(
        "[test] {}",
        config.templates.render(AlertKind::DoorOpen, &Local::now())
    );
    let receipt = client.post(&channel_id, &text).await?;

    println!("Sent:    {text}");
    println!("Receipt: channel={} ts={}", receipt.channel, receipt.ts);

    Ok(())
}
