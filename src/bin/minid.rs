//! Minid CLI
//!
//! Register, update and look up minids for files, one at a time or in
//! batches from a remote file manifest.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use minid::{
    format, write_manifest, Algorithm, AuthProvider, BatchOptions, BatchReconciler,
    HttpIdentifierService, IdentifierLookup, IdentifierService, IdentifierUpdate, ManifestReader,
    MinidClient, MinidConfig, MinidError, RegisterOptions, StaticToken,
};
use tracing_subscriber::EnvFilter;

use std::io::{self, BufReader};
use std::path::PathBuf;

/// Value that clears an option on update
const NONE_VALUE: &str = "None";

#[derive(Parser)]
#[command(name = "minid")]
#[command(about = "Mint and manage checksum-verifiable identifiers for files")]
#[command(version)]
struct Cli {
    /// Config file (defaults to minid.toml and the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Identifier service URL
    #[arg(long, global = true, env = "MINID_SERVER")]
    server: Option<String>,

    /// Access token for write operations
    #[arg(long, global = true, env = "MINID_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output as JSON
    #[arg(short, long, global = true)]
    json: bool,

    /// Detailed output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress log output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct NamespaceArgs {
    /// Use the non-permanent test namespace
    #[arg(long, conflicts_with = "no_test")]
    test: bool,

    /// Use the production namespace even if the config defaults to test
    #[arg(long)]
    no_test: bool,
}

impl NamespaceArgs {
    /// An explicit flag wins over the configured default
    fn resolve(&self, default: bool) -> bool {
        if self.no_test {
            false
        } else {
            self.test || default
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Register a Minid for a file
    Register {
        filename: PathBuf,

        /// Title for the Minid (defaults to the filename)
        #[arg(long)]
        title: Option<String>,

        /// Comma separated remote locations where the file can be retrieved
        #[arg(long, value_delimiter = ',')]
        locations: Vec<String>,

        /// Minid this one replaces
        #[arg(long)]
        replaces: Option<String>,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },

    /// Register a batch of Minids from a remote file manifest or stream
    BatchRegister {
        /// Manifest file, or "-" to read from stdin
        filename: String,

        #[command(flatten)]
        namespace: NamespaceArgs,

        /// Keep existing minids in the url field when their checksums match
        #[arg(long)]
        update_if_exists: bool,

        /// Write the updated manifest here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Update an existing Minid
    Update {
        minid: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// Comma separated remote locations; "None" to clear
        #[arg(long, value_delimiter = ',')]
        locations: Option<Vec<String>>,

        /// Minid this one replaces; "None" to clear
        #[arg(long)]
        replaces: Option<String>,

        /// Minid replacing this one; "None" to clear
        #[arg(long)]
        replaced_by: Option<String>,

        /// Set the Minid active
        #[arg(long)]
        set_active: bool,

        /// Set the Minid inactive
        #[arg(long)]
        set_inactive: bool,
    },

    /// Look up a Minid, or check whether a file has been registered
    Check {
        /// A Minid or a path to a file
        entity: String,

        /// Function used to checksum a file
        #[arg(long)]
        function: Option<String>,
    },

    /// Show the client version
    Version,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let json = cli.json;
    if let Err(e) = run(cli) {
        let code = e.downcast_ref::<MinidError>().map_or(1, MinidError::exit_code);
        if json {
            println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(code);
    }
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("minid=debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("minid=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// `None` on the command line clears an optional link
fn optional_link(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| if v == NONE_VALUE { None } else { Some(v) })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Version = cli.command {
        let version = env!("CARGO_PKG_VERSION");
        if cli.json {
            println!("{}", serde_json::json!({ "version": version }));
        } else {
            println!("minid {}", version);
        }
        return Ok(());
    }

    let config = MinidConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let url = cli.server.clone().unwrap_or_else(|| config.service.url.clone());
    let token = StaticToken::from_optional(cli.token.as_deref().or(config.service.token.as_deref()));

    let service = HttpIdentifierService::new(&url, config.timeout(), token.authorizer())?;
    tracing::debug!(%url, logged_in = token.is_some(), "using identifier service");
    let client = MinidClient::new(service, token)
        .with_translator(config.translator()?)
        .with_created_by(config.defaults.created_by.clone());

    match cli.command {
        Commands::Register {
            filename,
            title,
            locations,
            replaces,
            namespace,
        } => {
            let mut options = RegisterOptions::default()
                .locations(locations)
                .test(namespace.resolve(config.defaults.test));
            options.title = title;
            options.replaces = replaces;

            let record = client.register_file(&filename, options)?;
            print_lookup(&client, &IdentifierLookup::from(record), cli.json)
        }

        Commands::BatchRegister {
            filename,
            namespace,
            update_if_exists,
            output,
        } => {
            let options = BatchOptions {
                test: namespace.resolve(config.defaults.test),
                update_if_exists: update_if_exists || config.defaults.update_if_exists,
            };
            let reconciler = BatchReconciler::new(&client, options);

            let report = if filename == "-" {
                let stdin = io::stdin();
                reconciler.run_manifest(ManifestReader::new(BufReader::new(stdin.lock()))?)?
            } else {
                let manifest = ManifestReader::open(&filename)
                    .with_context(|| format!("reading manifest {}", filename))?;
                reconciler.run_manifest(manifest)?
            };

            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    write_manifest(&report.entries, file, true)?;
                    eprintln!(
                        "Wrote {} entries to {} ({} registered, {} updated, {} replaced)",
                        report.entries.len(),
                        path.display(),
                        report.registered,
                        report.updated,
                        report.replaced
                    );
                }
                None => write_manifest(&report.entries, io::stdout().lock(), true)?,
            }
            Ok(())
        }

        Commands::Update {
            minid,
            title,
            locations,
            replaces,
            replaced_by,
            set_active,
            set_inactive,
        } => {
            if set_active && set_inactive {
                return Err(MinidError::Validation(
                    "cannot use both --set-active and --set-inactive".to_string(),
                )
                .into());
            }

            let mut update = IdentifierUpdate {
                replaces: optional_link(replaces),
                replaced_by: optional_link(replaced_by),
                ..IdentifierUpdate::default()
            };
            if let Some(title) = title {
                update = update.title(title);
            }
            if let Some(locations) = locations {
                let cleared = locations.len() == 1 && locations[0] == NONE_VALUE;
                update = update.locations(if cleared { Vec::new() } else { locations });
            }
            if set_active || set_inactive {
                update = update.active(set_active);
            }

            let record = client.update(&minid, update)?;
            print_lookup(&client, &IdentifierLookup::from(record), cli.json)
        }

        Commands::Check { entity, function } => {
            let algorithm = match function {
                Some(name) => name.parse::<Algorithm>()?,
                None => config.defaults.algorithm,
            };
            let lookup = client.check(&entity, algorithm)?;
            if lookup.identifiers.is_empty() && !cli.json {
                tracing::info!("No minids found for file");
                return Ok(());
            }
            print_lookup(&client, &lookup, cli.json)
        }

        Commands::Version => Ok(()),
    }
}

fn print_lookup<S, A>(
    client: &MinidClient<S, A>,
    lookup: &IdentifierLookup,
    json: bool,
) -> anyhow::Result<()>
where
    S: IdentifierService,
    A: AuthProvider,
{
    if json {
        println!("{}", serde_json::to_string_pretty(&lookup.identifiers)?);
    } else {
        println!("{}", format::pretty_records(client.translator(), &lookup.identifiers));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace(args: &[&str]) -> NamespaceArgs {
        let mut argv = vec!["minid", "batch-register", "manifest.json"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::BatchRegister { namespace, .. } => namespace,
            _ => panic!("Expected batch-register"),
        }
    }

    #[test]
    fn test_namespace_flag_overrides_config() {
        assert!(!namespace(&[]).resolve(false));
        assert!(namespace(&[]).resolve(true));
        assert!(namespace(&["--test"]).resolve(false));
        assert!(!namespace(&["--no-test"]).resolve(true));
        assert!(Cli::try_parse_from(["minid", "register", "f", "--test", "--no-test"]).is_err());
    }

    #[test]
    fn test_none_clears_links() {
        assert_eq!(optional_link(Some("None".to_string())), Some(None));
        assert_eq!(
            optional_link(Some("minid:abc".to_string())),
            Some(Some("minid:abc".to_string()))
        );
        assert_eq!(optional_link(None), None);
    }
}
