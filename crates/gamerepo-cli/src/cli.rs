use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

pub const GAMEREPO_BEFORE_HELP: &str = concat!(
    "gamerepo ",
    env!("CARGO_PKG_VERSION"),
    " – Local game repository catalog\n\n",
    "  sync             Scan the repository and write the catalog cache.\n",
    "  list             Show the cached catalog without scanning.\n",
    "  reconcile        Scan once and report added/removed packages.\n",
    "  install          Run a package's installer and mark it installed.\n",
    "  watch            Reconcile periodically until interrupted.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "gamerepo",
    author,
    version,
    disable_help_subcommand = true,
    before_help = GAMEREPO_BEFORE_HELP
)]
pub struct GamerepoCli {
    #[arg(
        long,
        value_name = "DIR",
        help = "Repository root (overrides GAMEREPO_ROOT)",
        global = true
    )]
    pub root: Option<PathBuf>,
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(about = "Scan the repository, merge it into the catalog and persist it.")]
    Sync,
    #[command(about = "Show the cached catalog with local state and OS compatibility.")]
    List,
    #[command(about = "Run one reconciliation pass and report added/removed packages.")]
    Reconcile,
    #[command(
        about = "Run a package's installer and mark it installed on success.",
        override_usage = "gamerepo install <ID>"
    )]
    Install(InstallArgs),
    #[command(about = "Reconcile the catalog on every tick until Ctrl-C.")]
    Watch,
}

impl CommandGroupCli {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::List => "list",
            Self::Reconcile => "reconcile",
            Self::Install(_) => "install",
            Self::Watch => "watch",
        }
    }
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    #[arg(value_name = "ID", help = "Package identifier (the descriptor's uuid)")]
    pub id: String,
}
