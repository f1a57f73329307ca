//! CLI argument definitions for chattore.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// chattore -- inspect and edit the player-state store.
#[derive(Parser)]
#[command(
    name = "chattore",
    version,
    about = "chattore -- player-state store maintenance",
    long_about = "Reads and writes the profiles, nicknames, settings, cached usernames and \
                  mail that the chat proxy keeps per player."
)]
pub struct Cli {
    /// Store file to open (overrides config and CHATTORE_DB).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Configuration file.
    #[arg(long, global = true, default_value = chattore_store::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Profile ("about") text.
    About {
        #[command(subcommand)]
        action: AboutAction,
    },

    /// Display nicknames.
    Nick {
        #[command(subcommand)]
        action: NickAction,
    },

    /// Typed per-player settings.
    Setting {
        #[command(subcommand)]
        action: SettingAction,
    },

    /// Cached usernames.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Offline mail.
    Mail {
        #[command(subcommand)]
        action: MailAction,
    },

    /// Show schema version and row counts.
    Status,
}

#[derive(Subcommand)]
pub enum AboutAction {
    /// Print a player's profile text.
    Get {
        /// Player UUID or cached username.
        player: String,
    },
    /// Replace a player's profile text.
    Set { player: String, text: String },
}

#[derive(Subcommand)]
pub enum NickAction {
    Get { player: String },
    Set { player: String, nickname: String },
    /// Remove a player's nickname (no-op if none is set).
    Remove { player: String },
}

#[derive(Subcommand)]
pub enum SettingAction {
    /// Print one setting by key.
    Get { player: String, key: String },
    /// List every stored setting, including keys this build does not know.
    List { player: String },
    /// Delete a setting by key.
    Unset { player: String, key: String },
    /// Toggle command spy.
    Spy { player: String },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Record a login: cache the username, apply the rename nickname policy
    /// and report unread mail.
    Login {
        /// Player UUID.
        uuid: String,
        username: String,
    },
    /// Resolve a username to a UUID or a UUID to a username.
    Whois { query: String },
}

#[derive(Subcommand)]
pub enum MailAction {
    /// Send mail from one player to another.
    Send {
        from: String,
        to: String,
        message: String,
    },
    /// List a player's mailbox, newest first.
    List { player: String },
    /// Open one item, marking it read.
    Read { player: String, id: i64 },
}
