//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SkillSwap - peer skill-exchange matching
#[derive(Parser)]
#[command(
    name = "skillswap",
    about = "Match complementary skill swaps and chat with your partner",
    version,
    after_help = "Logs are written to: ~/.local/share/skillswap/logs/skillswap.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run two in-process users through search, match, chat and clear
    Demo {
        /// Skill the first user offers
        #[arg(long, default_value = "Guitar")]
        offered: String,

        /// Skill the first user wants
        #[arg(long, default_value = "Spanish")]
        wanted: String,

        /// Opening chat message
        #[arg(short, long, default_value = "Hi, ready to learn")]
        message: String,

        /// Override the assistant reply delay
        #[arg(long)]
        reply_delay_ms: Option<u64>,

        /// Seed for the scripted tutor
        #[arg(long)]
        seed: Option<u64>,

        /// Use fresh anonymous identities instead of alice and bob
        #[arg(long)]
        anonymous: bool,
    },

    /// Print the effective configuration as YAML
    Config,
}
