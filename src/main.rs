//! CLI entry point for `mailnorm`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mailnorm::adapter::{AdapterOptions, IncomingMessage, MessageAdapter};
use mailnorm::config::{self, Config};
use mailnorm::model::attachment::Attachment;
use mailnorm::normalize::conversation::ConversationIdMode;
use mailnorm::store::eml_dir::EmlDirStore;
use mailnorm::store::{FolderId, ItemId};

#[derive(Parser)]
#[command(
    name = "mailnorm",
    version,
    about = "Normalize inbound mail items into a uniform message model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Conversation id mode (index, guid-only). Overrides the config file.
    #[arg(long, global = true, value_name = "MODE")]
    mode: Option<ConversationIdMode>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a normalized message
    Show {
        /// Store root directory
        root: PathBuf,
        /// Item id (path relative to the root)
        item: String,
        #[arg(long)]
        json: bool,
    },
    /// List items in a folder
    List {
        root: PathBuf,
        folder: Option<String>,
    },
    /// Save the MIME content of an item
    Save {
        root: PathBuf,
        item: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract the attachments of an item
    Attachments {
        root: PathBuf,
        item: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Move an item to another folder
    Move {
        root: PathBuf,
        item: String,
        destination: String,
    },
    /// Delete an item (moved to trash unless --hard)
    Delete {
        root: PathBuf,
        item: String,
        #[arg(long)]
        hard: bool,
    },
    /// Reply to an item with an HTML body
    Reply {
        root: PathBuf,
        item: String,
        #[arg(long)]
        body: String,
        /// Reply to all recipients
        #[arg(long)]
        all: bool,
    },
    /// Write the default configuration file
    InitConfig,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let mut options = AdapterOptions::from_config(&config);
    if let Some(mode) = cli.mode {
        options = options.with_conversation_mode(mode);
    }

    match cli.command {
        Commands::Show { root, item, json } => cmd_show(&root, &item, json, options),
        Commands::List { root, folder } => cmd_list(&root, folder.as_deref()),
        Commands::Save { root, item, output } => {
            cmd_save(&root, &item, output.as_deref(), options)
        }
        Commands::Attachments { root, item, output } => {
            cmd_attachments(&root, &item, &output, options)
        }
        Commands::Move {
            root,
            item,
            destination,
        } => cmd_move(&root, &item, &destination, options),
        Commands::Delete { root, item, hard } => cmd_delete(&root, &item, hard, options),
        Commands::Reply {
            root,
            item,
            body,
            all,
        } => cmd_reply(&root, &item, &body, all, options),
        Commands::InitConfig => cmd_init_config(&config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailnorm.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn open_adapter(root: &Path, options: AdapterOptions) -> anyhow::Result<MessageAdapter<EmlDirStore>> {
    let store = EmlDirStore::open(root)?;
    Ok(MessageAdapter::with_defaults(store, options))
}

fn cmd_show(root: &Path, item: &str, json: bool, options: AdapterOptions) -> anyhow::Result<()> {
    let adapter = open_adapter(root, options)?;
    let msg = adapter.hydrate(&ItemId::from(item))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&msg.summary())?);
    } else {
        print_message(&msg);
    }
    Ok(())
}

fn print_message(msg: &IncomingMessage<'_>) {
    use humansize::{format_size, BINARY};

    let conversation_id = msg
        .conversation_id()
        .unwrap_or_else(|e| format!("<{e}>"));
    let join = |list: &[mailnorm::model::address::EmailAddress]| {
        list.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!();
    println!("  {:<16} {}", "Item", msg.id());
    println!("  {:<16} {}", "Subject", msg.subject());
    println!("  {:<16} {}", "Topic", msg.conversation_topic());
    println!("  {:<16} {}", "Conversation", conversation_id);
    if let Some(index) = msg.conversation_index() {
        println!("  {:<16} {}", "Reply depth", index.reply_depth());
    }
    println!("  {:<16} {}", "From", msg.sender());
    println!("  {:<16} {}", "To", join(msg.to()));
    if !msg.cc().is_empty() {
        println!("  {:<16} {}", "Cc", join(msg.cc()));
    }
    println!("  {:<16} {}", "Sent", msg.sent_on().format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "  {:<16} {}",
        "Received",
        msg.received_on().format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(meeting) = msg.meeting() {
        println!("  {:<16} {}", "Location", meeting.location);
        println!(
            "  {:<16} {} → {}",
            "When",
            meeting.start.format("%Y-%m-%d %H:%M"),
            meeting.end.format("%H:%M")
        );
    }
    println!(
        "  {:<16} {}",
        "Size",
        format_size(msg.mime_content().len() as u64, BINARY)
    );

    if !msg.attachments().is_empty() {
        println!();
        println!("  Attachments:");
        for att in msg.attachments() {
            let kind = if att.is_item() { "item" } else { "file" };
            println!(
                "    [{kind}] {:<40} {:>10}",
                att.name(),
                format_size(att.content().len() as u64, BINARY)
            );
        }
    }

    println!();
    println!("{}", msg.plain_text_body());
}

fn cmd_list(root: &Path, folder: Option<&str>) -> anyhow::Result<()> {
    let store = EmlDirStore::open(root)?;
    let folder = folder.map(FolderId::from);
    let ids = store.list(folder.as_ref())?;

    if ids.is_empty() {
        println!("  No items found.");
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn cmd_save(
    root: &Path,
    item: &str,
    output: Option<&Path>,
    options: AdapterOptions,
) -> anyhow::Result<()> {
    let adapter = open_adapter(root, options)?;
    let msg = adapter.hydrate(&ItemId::from(item))?;
    let path = msg.save_to_file(output)?;
    println!("  Saved to {}", path.display());
    Ok(())
}

fn cmd_attachments(
    root: &Path,
    item: &str,
    output: &Path,
    options: AdapterOptions,
) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let adapter = open_adapter(root, options)?;
    let msg = adapter.hydrate(&ItemId::from(item))?;

    if msg.attachments().is_empty() {
        println!("  No attachments found.");
        return Ok(());
    }

    let mut total = 0u64;
    let saved = msg
        .attachments()
        .iter()
        .map(|att: &Attachment| {
            total += att.content().len() as u64;
            att.save_to(output)
        })
        .collect::<Result<Vec<_>, _>>()?;

    println!(
        "  Extracted {} attachment(s) ({}) to {}",
        saved.len(),
        format_size(total, BINARY),
        output.display()
    );
    Ok(())
}

fn cmd_move(
    root: &Path,
    item: &str,
    destination: &str,
    options: AdapterOptions,
) -> anyhow::Result<()> {
    let adapter = open_adapter(root, options)?;
    let msg = adapter.hydrate(&ItemId::from(item))?;
    msg.move_to(&FolderId::from(destination))?;
    println!("  Moved {item} to {destination}");
    Ok(())
}

fn cmd_delete(root: &Path, item: &str, hard: bool, options: AdapterOptions) -> anyhow::Result<()> {
    let adapter = open_adapter(root, options)?;
    let msg = adapter.hydrate(&ItemId::from(item))?;
    msg.delete(!hard)?;
    if hard {
        println!("  Deleted {item}");
    } else {
        println!("  Moved {item} to trash");
    }
    Ok(())
}

fn cmd_reply(
    root: &Path,
    item: &str,
    body: &str,
    all: bool,
    options: AdapterOptions,
) -> anyhow::Result<()> {
    let adapter = open_adapter(root, options)?;
    let msg = adapter.hydrate(&ItemId::from(item))?;
    msg.reply(body, all)?;
    println!("  Reply written to outbox");
    Ok(())
}

fn cmd_init_config(config: &Config) -> anyhow::Result<()> {
    config::save_config(config)?;
    if let Some(path) = config::config_file_path() {
        println!("  Wrote {}", path.display());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailnorm", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
