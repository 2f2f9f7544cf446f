use clap::{Parser, Subcommand};
use pd_offboard::audit;
use pd_offboard::client::RestClient;
use pd_offboard::config::{self, CliConfig};
use pd_offboard::offboard::Offboarding;
use pd_offboard::prompt::{can_prompt_interactively, AutoApprove, DeletionPrompt, TerminalPrompt};
use pd_offboard::report;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pd-offboard",
    version,
    about = "Remove a user from escalation policies, schedules and teams, then delete the account"
)]
struct Cli {
    /// API base URL (overrides config file)
    #[arg(long, env = "PD_OFFBOARD_BASE_URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize CLI config file (~/.config/pd-offboard/config.toml)
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Offboard a user
    Remove {
        /// v2 access token (falls back to config `api.token`)
        #[arg(short = 'a', long, env = "PAGERDUTY_TOKEN")]
        access_token: Option<String>,

        /// Email address of the user to remove
        #[arg(short = 'u', long)]
        user_email: String,

        /// Operator email sent as the From header (falls back to config `api.from`)
        #[arg(long)]
        from: Option<String>,

        /// Ask before deleting escalation policies, schedules and the user
        #[arg(long)]
        prompt_del: bool,

        /// Directory for the per-run audit log (default: ./logs)
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider BEFORE tokio runtime starts
    // (required for rustls 0.23+ - must happen before any TLS operations)
    #[cfg(feature = "rustls")]
    {
        rustls_crate::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load config from file
    let cfg = CliConfig::load();

    // CLI takes precedence over config
    let base_url = cli.base_url.unwrap_or_else(|| cfg.base_url());

    match cli.command {
        Commands::Init { force } => run_init(force),
        Commands::Remove {
            access_token,
            user_email,
            from,
            prompt_del,
            log_dir,
        } => {
            let token = access_token
                .filter(|value| !value.trim().is_empty())
                .or_else(|| cfg.token())
                .ok_or("No access token. Pass --access-token, set PAGERDUTY_TOKEN, or set api.token in the config file")?;
            let from = from.or_else(|| cfg.from_header());
            let prompt_del = prompt_del || cfg.prompts.confirm_deletes;
            let log_dir = log_dir.unwrap_or_else(|| cfg.log_dir());

            run_remove(&base_url, &token, &user_email, from, prompt_del, log_dir).await
        }
    }
}

fn run_init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = CliConfig::config_path() else {
        return Err("Could not determine config directory".into());
    };

    if path.exists() && !force {
        println!("Config file already exists at: {}", path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    // Create directory if needed
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&path, config::sample_config())?;

    println!("Created config file: {}", path.display());
    println!("\nEdit it to set your access token:");
    println!("  $EDITOR {}", path.display());

    Ok(())
}

async fn run_remove(
    base_url: &str,
    token: &str,
    email: &str,
    from: Option<String>,
    prompt_del: bool,
    log_dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    if prompt_del && !can_prompt_interactively() {
        return Err("--prompt-del requires an interactive terminal".into());
    }

    let log_path = audit::init(&log_dir)?;
    println!("Audit log: {}", log_path.display());

    let client = RestClient::with_base_url(token, base_url)?.with_from(from);
    let prompt: Box<dyn DeletionPrompt> = if prompt_del {
        Box::new(TerminalPrompt)
    } else {
        Box::new(AutoApprove)
    };

    match Offboarding::new(&client, prompt.as_ref()).run(email).await {
        Ok(summary) => {
            print!("{}", report::render(&summary));
            Ok(())
        }
        Err(aborted) => {
            if aborted.partial.user_id.is_some() {
                eprintln!("Changes made before the failure:");
                eprint!("{}", report::render(&aborted.partial));
            }
            Err(aborted.source.into())
        }
    }
}
