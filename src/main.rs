use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use photo_gallery::{
    Config, create_app,
    gallery::{BackstopOutcome, Gallery, GalleryError},
    login::{LoginError, User, UserDatabase},
    startup_checks,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Log level; defaults to the config file's `app.log_level`
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server (default if no command specified)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// Manage users
    #[command(subcommand)]
    User(UserCommands),

    /// Maintain derived images
    #[command(subcommand)]
    Thumbnails(ThumbnailCommands),
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// List all users
    List {
        /// Path to users database file (defaults to `app.user_database`)
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
    /// Add a new user
    Add {
        /// Username (will be converted to lowercase)
        username: String,
        password: String,
        /// Allow the user to upload photos
        #[arg(long)]
        staff: bool,
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
    /// Remove a user
    Remove {
        username: String,
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
    /// Change a user's password
    Passwd {
        username: String,
        password: String,
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ThumbnailCommands {
    /// Generate thumbnails for every photo that lacks one
    Backfill,
}

fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        let config_content = std::fs::read_to_string(config_path)?;
        Ok(toml_edit::de::from_str::<Config>(&config_content)?)
    } else {
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    // Set up logging first; RUST_LOG wins over the configured level
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.app.log_level.clone())
        .to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if !cli.config.exists() {
        info!("Config file not found at {:?}, using defaults", cli.config);
    }

    match cli.command {
        Some(Commands::User(user_cmd)) => handle_user_command(user_cmd, &config).await,
        Some(Commands::Thumbnails(ThumbnailCommands::Backfill)) => backfill_thumbnails(&config).await,
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(config, &cli.config, port, host, quit_after).await,
        None => run_server(config, &cli.config, None, None, None).await,
    }
}

async fn handle_user_command(
    cmd: UserCommands,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let database_path = |database: Option<PathBuf>| {
        database.unwrap_or_else(|| config.app.user_database.clone())
    };

    match cmd {
        UserCommands::List { database } => {
            let db_path = database_path(database);
            if !db_path.exists() {
                println!("No user database found at: {}", db_path.display());
                return Ok(());
            }
            let db = UserDatabase::load_from_file(&db_path).await?;

            if db.users.is_empty() {
                println!("No users in database");
            } else {
                println!("Users in database:");
                for (username, user) in &db.users {
                    let role = if user.is_staff { "staff" } else { "user" };
                    println!("  {} ({})", username, role);
                }
            }
        }
        UserCommands::Add {
            username,
            password,
            staff,
            database,
        } => {
            let db_path = database_path(database);
            if !db_path.exists() {
                println!("Creating new user database at: {}", db_path.display());
            }
            let mut db = UserDatabase::load_or_default(&db_path).await?;

            if db.get_user(&username).is_some() {
                return Err(LoginError::UserExists(username).into());
            }

            db.add_user(&username, User::with_password(&password, staff));
            db.save_to_file(&db_path).await?;
            println!(
                "Added user '{}'{}",
                username.trim().to_lowercase(),
                if staff { " (staff)" } else { "" }
            );
        }
        UserCommands::Remove { username, database } => {
            let db_path = database_path(database);
            let mut db = UserDatabase::load_from_file(&db_path).await?;

            if db.remove_user(&username).is_none() {
                return Err(LoginError::UserNotFound(username).into());
            }
            db.save_to_file(&db_path).await?;
            println!("Removed user '{}'", username);
        }
        UserCommands::Passwd {
            username,
            password,
            database,
        } => {
            let db_path = database_path(database);
            let mut db = UserDatabase::load_from_file(&db_path).await?;

            let Some(user) = db.get_user_mut(&username) else {
                return Err(LoginError::UserNotFound(username).into());
            };
            user.set_password(&password);
            db.save_to_file(&db_path).await?;
            println!("Updated password for user '{}'", username);
        }
    }

    Ok(())
}

async fn backfill_thumbnails(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let gallery = match Gallery::open(config.gallery.clone()).await {
        Ok(gallery) => gallery,
        Err(e @ GalleryError::Locked(_)) => {
            error!("{}; stop the server before running the backfill", e);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    let outcomes = gallery.backfill_missing_thumbnails().await;

    let mut created = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for (id, outcome) in &outcomes {
        match outcome {
            BackstopOutcome::Created(name) => {
                created += 1;
                println!("  #{}: created {}", id, name);
            }
            BackstopOutcome::AlreadyPresent | BackstopOutcome::NotFound => skipped += 1,
            BackstopOutcome::OriginalMissing => {
                failed += 1;
                println!("  #{}: original file missing", id);
            }
            BackstopOutcome::Failed(reason) => {
                failed += 1;
                println!("  #{}: {}", id, reason);
            }
        }
    }

    println!(
        "Checked {} photos: {} thumbnails created, {} skipped, {} failed",
        outcomes.len(),
        created,
        skipped,
        failed
    );
    Ok(())
}

async fn run_server(
    config: Config,
    config_path: &Path,
    port: Option<u16>,
    host: Option<String>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = host.unwrap_or(config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} server", config.app.name);
    info!("Configuration loaded from: {:?}", config_path);
    info!("Template directory: {:?}", config.templates.directory);
    info!("Static files directory: {:?}", config.static_files.directory);
    info!("Media root: {:?}", config.gallery.media_root);
    info!("Photo database: {:?}", config.gallery.database);

    if config.app.session_secret == Config::default().app.session_secret {
        warn!("Using the default session secret; set app.session_secret in production");
    }

    if let Err(errors) = startup_checks::perform_startup_checks(&config).await {
        for e in &errors {
            error!("Startup check failed: {}", e);
        }
        return Err("Critical startup check failed".into());
    }

    let app = create_app(config).await?;

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
