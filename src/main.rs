use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vault_import::cli::commands::{self, ImportArgs};
use vault_import::logging;

#[derive(Parser)]
#[command(name = "vault-import", about = "Import password manager exports into a Bitwarden vault")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported import formats
    Formats,

    /// Import an export file
    Import {
        /// Format id (see `vault-import formats`)
        format: String,
        /// Export file to read
        file: PathBuf,
        /// Organization to import into (uses default_organization if omitted)
        #[arg(short, long)]
        organization: Option<String>,
        /// Password of a password-protected export
        #[arg(short, long)]
        password: Option<String>,
        /// Existing folder to nest the import under
        #[arg(long, conflicts_with = "collection")]
        folder: Option<String>,
        /// Existing collection to nest the import under
        #[arg(long)]
        collection: Option<String>,
        /// Parse and validate only, print the result as JSON
        #[arg(long)]
        dry_run: bool,
    },

    /// Normalize a free-text card expiry
    Expiry {
        /// e.g. "05/24", "2024-05", "052024"
        value: String,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print settings (secrets masked)
    Show,
    /// Set one setting
    Set {
        /// api_url, default_organization, restricted_types, access_token,
        /// user_key or organization_key.<id>
        key: String,
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    let result = match &cli.command {
        Commands::Formats => commands::cmd_formats(),
        Commands::Import {
            format,
            file,
            organization,
            password,
            folder,
            collection,
            dry_run,
        } => commands::cmd_import(&ImportArgs {
            format,
            file,
            organization: organization.as_deref(),
            password: password.as_deref(),
            folder: folder.as_deref(),
            collection: collection.as_deref(),
            dry_run: *dry_run,
        }),
        Commands::Expiry { value } => commands::cmd_expiry(value),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::cmd_config_show(),
            ConfigAction::Set { key, value } => commands::cmd_config_set(key, value),
        },
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
