use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use txtproof::config::VerifyConfig;
use txtproof::{Context, SystemTxtResolver, Token, VerifyError};

/// Prove control of a domain through a DNS TXT record
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (environment variables still override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue a new token and print the TXT record to publish
    Issue {
        /// Domain or URL to verify
        domain: String,

        /// Optional key label prefixed to the record
        #[arg(short, long, default_value = "")]
        key: String,

        /// Token lifetime in hours (defaults to the configured expiration)
        #[arg(long)]
        expires_hours: Option<u64>,

        /// Write the token to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Verify a stored token against live DNS
    Verify {
        /// Token file written by `issue`
        token: PathBuf,

        /// Lookup deadline in seconds (defaults to the configured timeout)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Write `validated` and `updated` back to the token file on success
        #[arg(long)]
        record_success: bool,
    },

    /// Show a stored token
    Show {
        token: PathBuf,

        #[arg(short, long, value_enum, default_value = "human")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => VerifyConfig::from_file(path)?,
        None => VerifyConfig::from_env()?,
    };

    match args.command {
        Command::Issue {
            domain,
            key,
            expires_hours,
            out,
        } => {
            let expiration = match expires_hours {
                Some(hours) => expiration_from_hours(hours)?,
                None => config.default_expiration,
            };
            let token = Token::new(&domain, &key, Some(expiration))?;

            println!("Publish this TXT record on {}:", token.domain());
            println!("{}", token.txt_record());
            println!("Valid until {}", token.validate_by);

            match out {
                Some(path) => {
                    write_token(&path, &token)?;
                    info!("Token written to {}", path.display());
                }
                None => println!("{}", token.to_json()?),
            }
        }
        Command::Verify {
            token: path,
            timeout_secs,
            record_success,
        } => {
            let mut token = read_token(&path)?;
            let resolver =
                SystemTxtResolver::new(&config).map_err(|e| e as Box<dyn std::error::Error>)?;

            let timeout = timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(config.lookup_timeout);
            let root = Context::background();
            let ctx = root.with_timeout(timeout);

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling verification");
                    root.cancel();
                }
            });

            match token.verify(&ctx, &resolver).await {
                Ok(()) => {
                    println!("{} verified", token.domain());
                    if record_success {
                        token.record_success(Utc::now());
                        write_token(&path, &token)?;
                        info!("Recorded successful verification in {}", path.display());
                    }
                }
                Err(VerifyError::TokenNotFound(domain)) => {
                    println!("Expected TXT record on {}:", domain);
                    println!("{}", token.txt_record());
                    return Err(VerifyError::TokenNotFound(domain).into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Show { token, output } => {
            let token = read_token(&token)?;
            match output {
                OutputFormat::Human => {
                    println!("Domain:       {}", token.domain());
                    println!("Record:       {}", token.txt_record());
                    println!("Created:      {}", token.created());
                    println!("Valid until:  {}", token.validate_by);
                    if let Some(validated) = token.validated {
                        println!("Validated:    {}", validated);
                    }
                    if let Some(updated) = token.updated {
                        println!("Updated:      {}", updated);
                    }
                    println!("Expired:      {}", token.is_expired_at(Utc::now()));
                }
                OutputFormat::Json => println!("{}", token.to_json()?),
            }
        }
    }

    Ok(())
}

fn expiration_from_hours(hours: u64) -> Result<Duration, VerifyError> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            VerifyError::InvalidInput(format!("expiration of {} hours is too large", hours))
        })
}

fn read_token(path: &Path) -> Result<Token, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(Token::from_json(&json)?)
}

fn write_token(path: &Path, token: &Token) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, token.to_json()?)?;
    Ok(())
}
