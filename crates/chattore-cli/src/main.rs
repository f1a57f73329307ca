//! CLI entry point for chattore.
//!
//! The `chattore` binary opens the player-state store and runs one
//! maintenance subcommand against it.

mod cli;
mod helpers;

use anyhow::{Context, Result, bail};
use chattore_store::{AnySetting, PlayerStore, RawSetting, SettingKind, StoreConfig};
use clap::Parser;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cli::{AboutAction, Cli, Commands, MailAction, NickAction, SettingAction, UserAction};
use crate::helpers::{display_player, format_timestamp, init_tracing, resolve_player};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let mut config = StoreConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(db) = cli.db {
        config.store.database_path = db;
    }

    init_tracing(&config.logging.level);
    debug!(?config, "configuration loaded");

    let store = PlayerStore::open(&config.store).await.with_context(|| {
        format!(
            "failed to open store at {}",
            config.store.database_path.display()
        )
    })?;

    match cli.command {
        Commands::About { action } => cmd_about(&store, action).await,
        Commands::Nick { action } => cmd_nick(&store, action).await,
        Commands::Setting { action } => cmd_setting(&store, action).await,
        Commands::User { action } => {
            cmd_user(&store, action, config.store.clear_nickname_on_change).await
        }
        Commands::Mail { action } => cmd_mail(&store, action).await,
        Commands::Status => cmd_status(&store, &config).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: about / nick
// ---------------------------------------------------------------------------

async fn cmd_about(store: &PlayerStore, action: AboutAction) -> Result<()> {
    match action {
        AboutAction::Get { player } => {
            let uuid = resolve_player(store, &player)?;
            match store.get_profile(uuid).await? {
                Some(text) => println!("{text}"),
                None => println!("{} has not set a profile.", display_player(store, &uuid)),
            }
        }
        AboutAction::Set { player, text } => {
            let uuid = resolve_player(store, &player)?;
            store.set_profile(uuid, &text).await?;
            info!(%uuid, "profile updated");
        }
    }
    Ok(())
}

async fn cmd_nick(store: &PlayerStore, action: NickAction) -> Result<()> {
    match action {
        NickAction::Get { player } => {
            let uuid = resolve_player(store, &player)?;
            match store.get_nickname(uuid).await? {
                Some(nick) => println!("{nick}"),
                None => println!("{} has no nickname.", display_player(store, &uuid)),
            }
        }
        NickAction::Set { player, nickname } => {
            let uuid = resolve_player(store, &player)?;
            store.set_nickname(uuid, &nickname).await?;
        }
        NickAction::Remove { player } => {
            let uuid = resolve_player(store, &player)?;
            if !store.remove_nickname(uuid).await? {
                println!("{} had no nickname.", display_player(store, &uuid));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: setting
// ---------------------------------------------------------------------------

async fn cmd_setting(store: &PlayerStore, action: SettingAction) -> Result<()> {
    match action {
        SettingAction::Get { player, key } => {
            let uuid = resolve_player(store, &player)?;
            match store.get_raw_setting(uuid, &key).await? {
                Some(bytes) => match RawSetting::from_bytes(key.as_str(), &bytes) {
                    Ok(raw) => match AnySetting::from_raw(&raw) {
                        Ok(setting) => println!("{setting}"),
                        Err(_) => println!("{key}: {}", raw.value),
                    },
                    Err(e) => println!("{key}: {} ({e})", String::from_utf8_lossy(&bytes)),
                },
                None => println!("{key}: unset"),
            }
        }
        SettingAction::List { player } => {
            let uuid = resolve_player(store, &player)?;
            let all = store.get_all_settings(uuid).await?;
            if all.is_empty() {
                println!("No settings stored.");
            }
            for (key, entry) in &all {
                match entry {
                    Ok(raw) => match AnySetting::from_raw(raw) {
                        Ok(setting) => println!("  {setting}"),
                        Err(_) => println!("  {key}: {} (unknown kind)", raw.value),
                    },
                    Err(e) => println!("  {key}: unreadable ({e})"),
                }
            }
        }
        SettingAction::Unset { player, key } => {
            let uuid = resolve_player(store, &player)?;
            if SettingKind::from_key(&key).is_err() {
                debug!(%key, "unsetting unregistered key");
            }
            if !store.unset_setting(uuid, &key).await? {
                println!("{key} was not set.");
            }
        }
        SettingAction::Spy { player } => {
            let uuid = resolve_player(store, &player)?;
            if store.toggle_spy(uuid).await? {
                println!("{} is now spying on commands.", display_player(store, &uuid));
            } else {
                println!(
                    "{} is no longer spying on commands.",
                    display_player(store, &uuid)
                );
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: user
// ---------------------------------------------------------------------------

async fn cmd_user(
    store: &PlayerStore,
    action: UserAction,
    clear_nickname_on_change: bool,
) -> Result<()> {
    match action {
        UserAction::Login { uuid, username } => {
            let uuid = Uuid::parse_str(&uuid).with_context(|| format!("invalid UUID `{uuid}`"))?;
            let outcome = store
                .record_login(uuid, &username, clear_nickname_on_change)
                .await?;
            if let Some(previous) = &outcome.previous_username
                && outcome.renamed(&username)
            {
                println!("{previous} is now known as {username}.");
            }
            if outcome.nickname_cleared {
                println!("Cleared the nickname of {username}.");
            }
            if outcome.unread > 0 {
                println!("{username} has {} unread message(s).", outcome.unread);
            }
        }
        UserAction::Whois { query } => {
            if let Ok(uuid) = Uuid::parse_str(&query) {
                match store.lookup_username(&uuid) {
                    Some(name) => println!("{uuid} is {name}"),
                    None => bail!("no cached username for {uuid}"),
                }
            } else {
                match store.lookup_identity(&query) {
                    Some(uuid) => println!("{query} is {uuid}"),
                    None => bail!("no cached player named {query}"),
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: mail
// ---------------------------------------------------------------------------

async fn cmd_mail(store: &PlayerStore, action: MailAction) -> Result<()> {
    match action {
        MailAction::Send { from, to, message } => {
            let sender = resolve_player(store, &from)?;
            let recipient = resolve_player(store, &to)?;
            let id = store.send_message(sender, recipient, &message).await?;
            println!("Sent message #{id} to {}.", display_player(store, &recipient));
        }
        MailAction::List { player } => {
            let uuid = resolve_player(store, &player)?;
            let items = store.list_messages(uuid).await?;
            if items.is_empty() {
                println!("Mailbox is empty.");
            }
            for item in &items {
                println!(
                    "  #{:<5} {}  {:<16} {}",
                    item.id,
                    format_timestamp(item.timestamp),
                    display_player(store, &item.sender),
                    if item.read { "" } else { "(unread)" },
                );
            }
        }
        MailAction::Read { player, id } => {
            let uuid = resolve_player(store, &player)?;
            match store.read_message(uuid, id).await? {
                Some((sender, message)) => {
                    println!("From {}: {message}", display_player(store, &sender));
                }
                None => bail!("no message #{id} in this mailbox"),
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

async fn cmd_status(store: &PlayerStore, config: &StoreConfig) -> Result<()> {
    let status = store.status().await?;

    println!();
    println!("  chattore store");
    println!("  ==============");
    println!();
    println!("  File:             {}", config.store.database_path.display());
    println!("  Schema version:   {}", status.schema_version);
    println!("  Profiles:         {}", status.profiles);
    println!("  Nicknames:        {}", status.nicknames);
    println!("  Cached usernames: {}", status.usernames);
    println!("  Settings:         {}", status.settings);
    println!(
        "  Mail:             {} ({} unread)",
        status.mail, status.unread_mail
    );
    println!();

    Ok(())
}
