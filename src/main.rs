//! opinion-miner CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use opinion_miner::{
    commands::{
        cmd_add_user, cmd_charts, cmd_export, cmd_extract, cmd_init, cmd_list_users,
        cmd_products, cmd_reviews, cmd_status, print_extract_stats, print_init, print_products,
        print_reviews, print_status, print_users,
    },
    config::Config,
    error::{Error, Result},
    extract::CancelToken,
    progress::LogWriterFactory,
    store::{ReviewDb, ReviewFilter},
};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "opinion-miner")]
#[command(version, about = "Scrape product reviews, chart them and browse them locally", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Scrape every review of a product and store it
    Extract {
        /// Product code on the review site
        code: String,

        /// User the product is added for
        #[arg(short, long, env = "OPINION_MINER_USER")]
        user: String,
    },

    /// List a user's products with review stats
    Products {
        #[arg(short, long, env = "OPINION_MINER_USER")]
        user: String,
    },

    /// Browse and filter the stored reviews of a product
    Reviews {
        /// Product code
        code: String,

        #[arg(short, long, env = "OPINION_MINER_USER")]
        user: String,

        /// Substring of the review id
        #[arg(long)]
        id: Option<String>,

        /// Substring of the pros
        #[arg(long)]
        pros: Option<String>,

        /// Substring of the cons
        #[arg(long)]
        cons: Option<String>,

        /// Only reviews that recommend the product
        #[arg(long)]
        recommended: bool,

        /// Only reviews that advise against the product
        #[arg(long)]
        not_recommended: bool,

        /// Minimum stars (inclusive)
        #[arg(long)]
        stars_min: Option<f64>,

        /// Maximum stars (inclusive)
        #[arg(long)]
        stars_max: Option<f64>,
    },

    /// Export a product's reviews as JSON
    Export {
        /// Product code
        code: String,

        #[arg(short, long, env = "OPINION_MINER_USER")]
        user: String,

        /// Output file (defaults to product_<code>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a product's chart images
    Charts {
        /// Product code
        code: String,

        #[arg(short, long, env = "OPINION_MINER_USER")]
        user: String,

        /// Directory for the PNG files
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a user
    Add { username: String, email: String },

    /// List registered users
    List,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        match &e {
            Error::StorageConflict(_) => error!("Reviews were extracted but not saved: {}", e),
            e if e.is_extraction_failure() => error!("Extraction failed, nothing saved: {}", e),
            e => error!("{}", e),
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_deref().and_then(|p| p.parent()).map(PathBuf::from);
        let config = cmd_init(base_dir, force).await?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "config": config.paths.config_file,
                    "database": config.paths.db_file,
                }))?
            );
        } else {
            print_init(&config);
        }
        return Ok(());
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "opinion-miner", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config).await?;
    let db = ReviewDb::connect(&config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::User { action } => match action {
            UserAction::Add { username, email } => {
                let user = cmd_add_user(&db, &username, &email).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&user)?);
                } else {
                    println!("✓ Registered user '{}'", user.username);
                }
            }
            UserAction::List => {
                let users = cmd_list_users(&db).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&users)?);
                } else {
                    print_users(&users);
                }
            }
        },

        Commands::Extract { code, user } => {
            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling extraction");
                    on_interrupt.cancel();
                }
            });

            let stats = cmd_extract(&config, &db, &user, &code, &cancel).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_extract_stats(&stats);
            }
        }

        Commands::Products { user } => {
            let products = cmd_products(&db, &user).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&products)?);
            } else {
                print_products(&products);
            }
        }

        Commands::Reviews {
            code,
            user,
            id,
            pros,
            cons,
            recommended,
            not_recommended,
            stars_min,
            stars_max,
        } => {
            let filter = ReviewFilter {
                id,
                pros,
                cons,
                only_recommended: recommended,
                only_not_recommended: not_recommended,
                stars_min,
                stars_max,
            };
            let reviews = cmd_reviews(&db, &user, &code, &filter).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reviews)?);
            } else {
                print_reviews(&reviews);
            }
        }

        Commands::Export { code, user, output } => {
            let (path, count) = cmd_export(&db, &user, &code, output).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "path": path, "reviews": count }))?
                );
            } else {
                println!("✓ Exported {} reviews to {}", count, path.display());
            }
        }

        Commands::Charts {
            code,
            user,
            out_dir,
        } => {
            let (stars, recommendations) = cmd_charts(&db, &user, &code, out_dir).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "stars": stars,
                        "recommendations": recommendations,
                    }))?
                );
            } else {
                println!("✓ Wrote {}", stars.display());
                println!("✓ Wrote {}", recommendations.display());
            }
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

async fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config_path = path.unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        return Err(Error::NotInitialized);
    }

    Config::load(&config_path)
}
