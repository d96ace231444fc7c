use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use ccrotate::{
    commands, logging,
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "ccrotate")]
#[command(about = "Claude Code account rotator - save, switch and refresh multiple logins")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the currently logged-in account
    Snap {
        /// Overwrite an existing saved account without asking
        #[arg(short, long)]
        force: bool,
    },

    /// List saved accounts
    #[command(alias = "ls")]
    List,

    /// Show the currently active account
    Current,

    /// Switch to a saved account
    Switch {
        /// Email of the account to activate
        email: String,
    },

    /// Switch to the next saved account
    Next,

    /// Remove a saved account
    #[command(alias = "rm")]
    Remove {
        /// Email of the account to remove
        email: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Test every saved account and store refreshed tokens
    Refresh,

    /// Print all saved accounts as a single portable line
    Export,

    /// Replace saved accounts with data from `ccrotate export`
    Import {
        /// The exported text (quotes are optional)
        data: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Run diagnostics on the ccrotate setup
    Doctor,

    /// Generate a shell completion script
    Completions {
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ui = Ui::new(cli.color, cli.no_color);
    logging::init(cli.verbose, ui.color_enabled);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "ccrotate", &mut std::io::stdout());
        return Ok(());
    }

    let paths = Paths::new()?;

    match cli.command {
        Commands::Snap { force } => commands::snap(&paths, &ui, force),
        Commands::List => commands::list(&paths, &ui),
        Commands::Current => commands::current(&paths, &ui),
        Commands::Switch { email } => commands::switch(&paths, &email, &ui),
        Commands::Next => commands::next(&paths, &ui),
        Commands::Remove { email, force } => commands::remove(&paths, &email, &ui, force),
        Commands::Refresh => commands::refresh(&paths, &ui),
        Commands::Export => commands::export(&paths, &ui),
        Commands::Import { data, yes } => commands::import(&paths, &data, &ui, yes),
        Commands::Doctor => commands::doctor(&paths, &ui),
        Commands::Completions { .. } => Ok(()),
    }
}
