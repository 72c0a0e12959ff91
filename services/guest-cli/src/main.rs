//! guestctl
//!
//! Command-line front end for the guest pass backend:
//! 1. Loads config and the persisted session
//! 2. Builds the authenticated gateway (transparent token refresh)
//! 3. Runs one subcommand and prints the result as JSON

mod config;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser as _;
use guest_auth::TokenStore;
use guest_gateway::{Gateway, SessionEvent, SessionSignal};
use qr_api::{AuthSession, QrClient, QrRequestCreate, qr_file_name};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Manage guest QR-code requests
#[derive(Debug, clap::Parser)]
#[command(name = "guestctl")]
#[command(about = "guestctl submits, reviews and downloads guest QR-code requests")]
struct Cli {
    /// Config file (default: $GUESTCTL_CONFIG or ./guestctl.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Log in and store the session
    ///
    /// The password is read from GUESTCTL_PASSWORD or from --password-file.
    Login {
        username: String,
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Submit a guest QR-code request (manager)
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        surname: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        remark: Option<String>,
    },

    /// List requests
    List {
        /// `my` for managers, `all` or `pending` for superusers
        #[arg(long, value_enum, default_value_t = Scope::My)]
        scope: Scope,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Approve a pending request (superuser)
    Approve { id: String },

    /// Reject a pending request (superuser)
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },

    /// Delete one of your requests (manager)
    Delete { id: String },

    /// Download the QR code PNG of an approved request
    QrCode {
        id: String,
        /// Guest name used for the default file name
        #[arg(long)]
        guest: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Scope {
    My,
    All,
    Pending,
}

/// Everything a command needs, built once per run.
struct App {
    gateway: Arc<Gateway>,
    session: AuthSession,
    client: QrClient,
    signal: SessionSignal,
}

impl App {
    async fn build(config: &Config) -> Result<Self> {
        let store = TokenStore::load(config.storage.token_file.clone())
            .await
            .with_context(|| {
                format!(
                    "failed to open token store {}",
                    config.storage.token_file.display()
                )
            })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        let signal = SessionSignal::new();
        let gateway = Arc::new(Gateway::new(
            http,
            config.api.base_url.clone(),
            Arc::new(store),
            signal.clone(),
        ));
        Ok(Self {
            session: AuthSession::new(gateway.clone()),
            client: QrClient::new(gateway.clone()),
            gateway,
            signal,
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<qr_api::Error>() {
            Some(api) => eprintln!("error: {}", api.user_message()),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}

/// Tracing on stderr, filtered by LOG_LEVEL / RUST_LOG (default `warn`).
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = Config::resolve_path(cli.config.as_deref());
    debug!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(base_url = %config.api.base_url, "configuration loaded");

    let app = App::build(&config).await?;
    let mut session_events = app.signal.subscribe();
    let watcher = app.session.watch_session_end(&app.signal);

    let mut stdout = std::io::stdout().lock();
    let result = execute(&app, cli.command, &mut stdout).await;

    if let Ok(SessionEvent::Ended) = session_events.try_recv() {
        eprintln!("session expired, run `guestctl login` again");
    }
    // Dropping the last signal sender lets the watcher drain and exit
    drop(app);
    if let Err(e) = watcher.await {
        debug!(error = %e, "session watcher did not finish cleanly");
    }
    result
}

async fn execute(app: &App, command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Login {
            username,
            password_file,
        } => {
            let password = config::resolve_password(password_file.as_deref())?;
            let user = app.session.login(&username, &password).await?;
            print_json(out, &user)?;
        }
        Command::Logout => {
            app.session.logout().await?;
            writeln!(out, "logged out")?;
        }
        Command::Whoami => match app.session.current_user().await? {
            Some(user) => print_json(out, &user)?,
            None => anyhow::bail!("not logged in"),
        },
        Command::Create {
            name,
            surname,
            email,
            phone,
            remark,
        } => {
            let created = app
                .client
                .create(&QrRequestCreate {
                    guest_name: name,
                    guest_surname: surname,
                    guest_email: email,
                    guest_phone: phone,
                    remark,
                })
                .await?;
            print_json(out, &created)?;
        }
        Command::List { scope, page } => {
            let listing = match scope {
                Scope::My => app.client.my_requests(page).await?,
                Scope::All => app.client.all_requests(page).await?,
                Scope::Pending => app.client.pending_requests(page).await?,
            };
            print_json(out, &listing)?;
        }
        Command::Approve { id } => print_json(out, &app.client.approve(&id).await?)?,
        Command::Reject { id, reason } => {
            print_json(out, &app.client.reject(&id, &reason).await?)?
        }
        Command::Delete { id } => {
            app.client.delete(&id).await?;
            writeln!(out, "deleted {id}")?;
        }
        Command::QrCode { id, guest, out: path } => {
            let png = app.client.download_qr_code(&id).await?;
            let path = path.unwrap_or_else(|| {
                PathBuf::from(qr_file_name(guest.as_deref().unwrap_or(&id)))
            });
            write_file(&path, &png)?;
            writeln!(out, "{}", path.display())?;
        }
    }
    let logged_in = app.gateway.access_token().await.is_some();
    debug!(logged_in, "command finished");
    Ok(())
}

fn print_json(out: &mut impl Write, value: &impl serde::Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to encode output")?;
    writeln!(out)?;
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
