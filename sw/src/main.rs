//! SkillSwap - peer skill-exchange matching
//!
//! CLI entry point: an in-process demo of two users matching and chatting.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::info;

use skillswap::cli::{Cli, Command};
use skillswap::config::Config;
use skillswap::coordinator::MatchCoordinator;
use skillswap::domain::{Identity, Message};
use skillswap::session::{ScriptedTutor, Session};
use skillswap::state::{RequestStore, StoreManager};

/// How long the demo waits for a projection to catch up
const VIEW_WAIT: Duration = Duration::from_secs(5);

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skillswap")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = match level {
        Some(level) => level
            .parse::<tracing::Level>()
            .map_err(|e| eyre!("Invalid log level '{}': {}", level, e))?,
        None => tracing::Level::INFO,
    };
    let log_file = fs::File::create(log_dir.join("skillswap.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI flag wins over the config file
    let level = cli
        .log_level
        .clone()
        .or_else(|| Config::load_log_level(cli.config.as_ref()));
    setup_logging(level.as_deref()).context("Failed to setup logging")?;

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(
        "SkillSwap loaded config: claim-attempts={}, reply-delay-ms={}, reply-policy={}",
        config.matching.claim_attempts, config.assistant.reply_delay_ms, config.assistant.reply_policy
    );

    // Dispatch command
    match cli.command {
        Some(Command::Demo {
            offered,
            wanted,
            message,
            reply_delay_ms,
            seed,
            anonymous,
        }) => {
            if let Some(delay) = reply_delay_ms {
                config.assistant.reply_delay_ms = delay;
            }
            if seed.is_some() {
                config.assistant.seed = seed;
            }
            let (first, second) = if anonymous {
                (Identity::anonymous(), Identity::anonymous())
            } else {
                (Identity::new("alice"), Identity::new("bob"))
            };
            cmd_demo(&config, [first, second], &offered, &wanted, &message).await
        }
        Some(Command::Config) => cmd_config(&config),
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

/// Walk two users through search, match, chat and clear
async fn cmd_demo(config: &Config, users: [Identity; 2], offered: &str, wanted: &str, message: &str) -> Result<()> {
    let store = Arc::new(StoreManager::spawn(&config.store));
    let shared: Arc<dyn RequestStore> = store.clone();

    let [first, second] = users;
    let alice = MatchCoordinator::new(first, shared.clone(), config.matching.clone());
    let bob = MatchCoordinator::new(second, shared.clone(), config.matching.clone());
    let mut view = alice.watch_match();

    // A: the first search waits
    println!("{}", "Scenario A: first search".bold());
    let outcome = alice
        .search_for_match(offered, wanted)
        .await
        .context("First search failed")?;
    println!(
        "  {} offers {}, wants {} -> {}",
        alice.identity().to_string().cyan(),
        offered,
        wanted,
        outcome.to_string().yellow()
    );

    // B: the complementary search matches immediately
    println!("{}", "Scenario B: complementary search".bold());
    let outcome = bob
        .search_for_match(wanted, offered)
        .await
        .context("Complementary search failed")?;
    println!(
        "  {} offers {}, wants {} -> {}",
        bob.identity().to_string().cyan(),
        wanted,
        offered,
        outcome.to_string().green()
    );
    let matched = view
        .wait_for_match(VIEW_WAIT)
        .await
        .ok_or_else(|| eyre!("{} never observed the match", alice.identity()))?;
    let [me, partner] = matched.participants();
    println!(
        "  {} sees partner {} (offers {}, wants {})",
        me.to_string().cyan(),
        partner.to_string().cyan(),
        matched.partner_offered,
        matched.partner_wanted
    );

    // C: chat with a delayed assistant reply
    println!("{}", "Scenario C: chat".bold());
    let tutor = Arc::new(ScriptedTutor::from_seed(config.assistant.seed));
    let session = Session::open(shared.clone(), matched, tutor, &config.assistant);
    let mut composing = session.composing();

    session.send(message).await.context("Failed to send message")?;
    tokio::time::timeout(VIEW_WAIT, composing.wait_for(|busy| *busy))
        .await
        .context("Reply was never scheduled")?
        .context("Composing signal closed")?;
    println!("  composing: {}", session.is_composing().to_string().yellow());

    let deadline = config.assistant.reply_delay() + VIEW_WAIT;
    tokio::time::timeout(deadline, composing.wait_for(|busy| !*busy))
        .await
        .context("Assistant did not reply in time")?
        .context("Composing signal closed")?;
    println!("  composing: {}", session.is_composing().to_string().yellow());

    for line in session.history().await.context("Failed to read transcript")? {
        print_message(&line);
    }
    session.close().await;

    // D: clearing resets the view and a fresh search works
    println!("{}", "Scenario D: clear and search again".bold());
    let removed = alice.clear_all_matches().await.context("Clear failed")?;
    let cleared = view.wait_for_none(VIEW_WAIT).await;
    println!(
        "  {} cleared {} request(s), current match: {}",
        alice.identity().to_string().cyan(),
        removed,
        if cleared { "none".green() } else { "still set".red() }
    );
    bob.clear_all_matches().await.context("Clear failed")?;

    let outcome = alice
        .search_for_match(offered, wanted)
        .await
        .context("Fresh search failed")?;
    println!(
        "  {} searches again -> {}",
        alice.identity().to_string().cyan(),
        outcome.to_string().yellow()
    );
    alice.cancel_search().await.context("Cancel failed")?;

    view.stop();
    store.shutdown().await.context("Failed to stop store")?;
    Ok(())
}

fn print_message(message: &Message) {
    let time = chrono::DateTime::from_timestamp_millis(message.sent_at)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| message.sent_at.to_string());
    let who = match message.sender.identity() {
        Some(identity) => identity.to_string().cyan(),
        None => "assistant".magenta(),
    };
    println!("  {} {}: {}", time.dimmed(), who, message.text);
}
