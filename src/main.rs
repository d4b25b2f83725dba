use gm_connect::config::{FileConfig, Settings};
use gm_connect::{display, BatchProgress, FilterCriteria, Manager};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn batch_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:30.cyan/blue} {pos}/{len} deleted ({msg})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

#[derive(Parser)]
#[command(
    name = "gm-connect",
    about = "List, read, delete and move email over IMAP"
)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List folders on the server
    Folders,
    /// Show the most recent messages in a folder
    Recent {
        /// Folder to read
        #[arg(short, long, default_value = "INBOX")]
        folder: String,

        /// Number of messages
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete one message by UID
    Delete {
        uid: u32,

        #[arg(short, long, default_value = "INBOX")]
        folder: String,
    },
    /// Delete every message matching the filters, in batches
    BulkDelete(BulkDeleteArgs),
    /// Move one message by UID to another folder
    Move {
        uid: u32,

        /// Destination folder
        #[arg(long)]
        to: String,

        /// Source folder
        #[arg(short, long, default_value = "INBOX")]
        folder: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate for (bash, zsh, fish, powershell, elvish)
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page
    #[command(hide = true)]
    Manpage,
}

#[derive(Parser)]
struct BulkDeleteArgs {
    /// Messages older than N days
    #[arg(long)]
    days_old: Option<u32>,

    /// Sender address contains
    #[arg(long)]
    from: Option<String>,

    /// Folder to delete from
    #[arg(short, long, default_value = "INBOX")]
    folder: String,

    /// UIDs per STORE + EXPUNGE round trip [default: from config, else 50]
    #[arg(long)]
    batch_size: Option<usize>,

    /// Skip confirmation
    #[arg(long)]
    yes: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "gm_connect=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn get_password() -> Result<String> {
    inquire::Password::new("IMAP password:")
        .without_confirmation()
        .prompt()
        .context("Password prompt failed")
}

fn cmd_bulk_delete(manager: &mut Manager, args: &BulkDeleteArgs) -> Result<()> {
    let criteria = FilterCriteria {
        max_age_days: args.days_old,
        from_sender: args.from.clone(),
    };
    if criteria.is_empty() {
        println!("{}", gm_connect::Error::Criteria);
        return Ok(());
    }

    if !args.yes {
        let mut what = Vec::new();
        if let Some(days) = args.days_old {
            what.push(format!("older than {days} day(s)"));
        }
        if let Some(from) = criteria.sender() {
            what.push(format!("from {from}"));
        }
        let confirm = inquire::Confirm::new(&format!(
            "Permanently delete messages in {} {}?",
            args.folder,
            what.join(" and ")
        ))
        .with_default(false)
        .prompt()
        .context("Prompt failed")?;

        if !confirm {
            println!("Aborted.");
            return Ok(());
        }
    }

    let bar = batch_bar();
    let result = manager.bulk_delete_with_progress(
        args.days_old,
        args.from.as_deref(),
        &args.folder,
        args.batch_size,
        |p: &BatchProgress| {
            bar.set_length(p.total as u64);
            bar.set_position(p.processed as u64);
            bar.set_message(format!("batch {}/{}", p.batch, p.batches));
        },
    );
    bar.finish_and_clear();
    let result = result.context("Bulk delete failed")?;

    println!("{result}");
    for failure in &result.per_batch_errors {
        eprintln!(
            "  batch {} ({} message(s)): {}",
            failure.batch,
            failure.uids.len(),
            failure.error
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle commands that don't need an IMAP connection
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "gm-connect",
                &mut std::io::stdout(),
            );
            return Ok(());
        }
        Commands::Manpage => {
            clap_mangen::Man::new(Cli::command()).render(&mut std::io::stdout())?;
            return Ok(());
        }
        _ => {}
    }

    init_tracing();

    let mut file = FileConfig::load(cli.config.as_deref())?;
    let env_pass = std::env::var("EMAIL_PASSWORD").unwrap_or_default();
    if env_pass.trim().is_empty() && file.password.is_none() {
        file.password = Some(get_password()?);
    }
    let settings = Settings::from_env(file)?;

    let mut manager = Manager::from_settings(&settings);
    drop(settings);

    let result: Result<()> = match &cli.command {
        Commands::Folders => {
            let sp = spinner("Listing folders...");
            let folders = manager.list_folders();
            sp.finish_and_clear();
            folders.map(|f| display::display_folders(&f)).map_err(Into::into)
        }
        Commands::Recent {
            folder,
            limit,
            json,
        } => {
            let sp = spinner("Fetching messages...");
            let messages = manager.get_recent_emails(folder, *limit);
            sp.finish_and_clear();
            match messages {
                Ok(messages) if *json => serde_json::to_string_pretty(&messages)
                    .map(|out| println!("{out}"))
                    .map_err(Into::into),
                Ok(messages) => {
                    display::display_messages(&messages);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Delete { uid, folder } => manager
            .delete_email(*uid, folder)
            .map(|status| println!("{status}"))
            .with_context(|| format!("Failed to delete {uid} from '{folder}'")),
        Commands::BulkDelete(args) => cmd_bulk_delete(&mut manager, args),
        Commands::Move { uid, to, folder } => manager
            .move_email(*uid, to, folder)
            .map(|status| println!("{status}"))
            .with_context(|| format!("Failed to move {uid} from '{folder}' to '{to}'")),
        Commands::Completions { .. } | Commands::Manpage => unreachable!(),
    };

    manager.close();
    result
}
