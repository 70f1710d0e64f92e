//! clap command definitions.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "meetbot",
    about = "Meeting attendance bot fleet control plane",
    version
)]
pub struct Cli {
    /// Path to a config file (defaults to .meetbot/config.yaml).
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the control-plane server and background workers.
    Serve,

    /// Apply pending database migrations and exit.
    Migrate,

    /// Bot administration.
    Bot {
        #[command(subcommand)]
        command: BotCommand,
    },

    /// Warm-pool slot administration.
    Slot {
        #[command(subcommand)]
        command: SlotCommand,
    },

    /// Tenant administration.
    Tenant {
        #[command(subcommand)]
        command: TenantCommand,
    },
}

#[derive(Subcommand)]
pub enum BotCommand {
    /// List bots, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum SlotCommand {
    /// List warm-pool slots and their dispositions.
    List,
}

#[derive(Subcommand)]
pub enum TenantCommand {
    /// Create a tenant and print an API key for it.
    Create {
        name: String,
        #[arg(long, default_value = "free")]
        plan: String,
        #[arg(long, default_value = "UTC")]
        timezone: String,
        #[arg(long)]
        daily_limit: Option<i64>,
    },
}
