//! Latchkey: command-line entry point for the account flows.
//!
//! Every invocation connects to SurrealDB, applies pending migrations and
//! runs one command, printing its outcome as JSON on stdout.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use latchkey_auth::{
    AuthConfig, AuthService, LogNotifier, LoginCommand, OtpCommand, RegisterCommand, SecureRandom,
};
use latchkey_core::error::{LatchkeyError, LatchkeyResult};
use latchkey_core::models::refresh_token::Device;
use latchkey_db::{
    DbConfig, DbManager, SurrealChallengeCache, SurrealRefreshTokenRepository,
    SurrealUserRepository,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use surrealdb::engine::any::Any;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type Service = AuthService<
    SurrealUserRepository<Any>,
    SurrealRefreshTokenRepository<Any>,
    SurrealChallengeCache<Any>,
    LogNotifier,
>;

#[derive(Parser, Debug)]
#[command(name = "latchkey")]
#[command(version, about = "Latchkey - account registration, OTP and session service")]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    #[command(flatten)]
    auth: AuthArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct DbArgs {
    /// SurrealDB endpoint (`ws://host:port`, or `mem://` for an embedded store).
    #[arg(long, env = "LATCHKEY_DB_URL", default_value = "ws://127.0.0.1:8000")]
    db_url: String,

    #[arg(long, env = "LATCHKEY_DB_NAMESPACE", default_value = "latchkey")]
    db_namespace: String,

    #[arg(long, env = "LATCHKEY_DB_DATABASE", default_value = "auth")]
    db_database: String,

    #[arg(long, env = "LATCHKEY_DB_USER", default_value = "root")]
    db_user: String,

    #[arg(long, env = "LATCHKEY_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    db_password: String,
}

#[derive(Args, Debug)]
struct AuthArgs {
    /// Base64-encoded HS256 signing secret (at least 32 bytes decoded).
    #[arg(long, env = "LATCHKEY_JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Access token lifetime in seconds.
    #[arg(long, env = "LATCHKEY_ACCESS_TOKEN_TTL", default_value_t = 900)]
    access_token_ttl: u64,

    /// Refresh token lifetime in days.
    #[arg(long, env = "LATCHKEY_REFRESH_TOKEN_DAYS", default_value_t = 7)]
    refresh_token_days: u32,

    /// OTP validity in seconds.
    #[arg(long, env = "LATCHKEY_OTP_TTL", default_value_t = 600)]
    otp_ttl: u64,

    /// Optional pepper mixed into password hashes.
    #[arg(long, env = "LATCHKEY_PEPPER", hide_env_values = true)]
    pepper: Option<String>,

    /// Seed an ACTIVE admin account with this email on startup.
    #[arg(long, env = "LATCHKEY_ADMIN_EMAIL", requires = "admin_password")]
    admin_email: Option<String>,

    #[arg(long, env = "LATCHKEY_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

#[derive(Args, Debug)]
struct DeviceArgs {
    /// Client IP address the session is bound to.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// Client user agent the session is bound to.
    #[arg(long, default_value = "latchkey-cli")]
    user_agent: String,
}

impl DeviceArgs {
    fn device(&self) -> Device {
        Device::new(self.ip.clone(), self.user_agent.clone())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply schema migrations and exit.
    Migrate,
    /// Create a PENDING account and send its OTP.
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "LATCHKEY_PASSWORD", hide_env_values = true)]
        password: String,
        /// `YYYY-MM-DD`.
        #[arg(long)]
        date_of_birth: String,
        #[arg(long)]
        phone_number: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        postal_code: Option<String>,
    },
    /// Confirm an OTP and start a session.
    VerifyOtp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Log in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LATCHKEY_PASSWORD", hide_env_values = true)]
        password: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Exchange a refresh token for a new access token.
    Refresh {
        #[arg(long)]
        token: String,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Revoke a refresh token.
    Logout {
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("latchkey=info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let db = DbManager::connect(&DbConfig {
        url: cli.db.db_url,
        namespace: cli.db.db_namespace,
        database: cli.db.db_database,
        username: cli.db.db_user,
        password: cli.db.db_password,
    })
    .await
    .context("failed to connect to SurrealDB")?;

    let version = db.migrate().await.context("failed to apply migrations")?;
    info!(version, "schema up to date");

    if matches!(cli.command, Command::Migrate) {
        println!("{}", json!({ "schemaVersion": version }));
        return Ok(());
    }

    let client = db.client().clone();
    let cache = SurrealChallengeCache::new(client.clone());
    if let Err(e) = cache.purge_expired().await {
        warn!(error = %e, "failed to purge expired OTP challenges");
    }

    let config = AuthConfig {
        jwt_secret: cli.auth.jwt_secret,
        access_token_lifetime_secs: cli.auth.access_token_ttl,
        refresh_token_lifetime_days: cli.auth.refresh_token_days,
        otp_ttl_secs: cli.auth.otp_ttl,
        pepper: cli.auth.pepper,
    };
    let service: Service = AuthService::new(
        SurrealUserRepository::new(client.clone()),
        SurrealRefreshTokenRepository::new(client),
        cache,
        LogNotifier,
        SecureRandom::from_os_rng(),
        &config,
    )
    .context("invalid authentication configuration")?;

    if let (Some(email), Some(password)) = (cli.auth.admin_email, cli.auth.admin_password) {
        let seeded = service
            .seed_admin(&email, &SecretString::from(password))
            .await
            .context("failed to seed admin account")?;
        if seeded.is_none() {
            info!(email = %email, "admin account already present");
        }
    }

    let outcome = run(&service, cli.command).await;
    service.dispatcher().drain().await;

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            error!(code = e.code(), error = %e, "command failed");
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "error": e.code(),
                    "message": e.to_string(),
                }))?
            );
            std::process::exit(1);
        }
    }
}

async fn run(service: &Service, command: Command) -> LatchkeyResult<Value> {
    let value = match command {
        Command::Migrate => Value::Null,
        Command::Register {
            first_name,
            last_name,
            email,
            password,
            date_of_birth,
            phone_number,
            address,
            city,
            postal_code,
        } => {
            let outcome = service
                .register(RegisterCommand {
                    first_name,
                    last_name,
                    email,
                    password: SecretString::from(password),
                    phone_number,
                    date_of_birth,
                    address,
                    city,
                    postal_code,
                })
                .await?;
            to_json(&outcome)?
        }
        Command::VerifyOtp {
            email,
            code,
            device,
        } => {
            let grant = service
                .verify_otp(&OtpCommand { email, code }, &device.device())
                .await?;
            to_json(&grant)?
        }
        Command::Login {
            email,
            password,
            device,
        } => {
            let command = LoginCommand {
                email,
                password: SecretString::from(password),
            };
            let grant = service.login(&command, &device.device()).await?;
            to_json(&grant)?
        }
        Command::Refresh { token, device } => {
            let grant = service.refresh(&token, &device.device()).await?;
            to_json(&grant)?
        }
        Command::Logout { token } => {
            service.logout(&token).await?;
            json!({ "loggedOut": true })
        }
    };
    Ok(value)
}

fn to_json<T: serde::Serialize>(value: &T) -> LatchkeyResult<Value> {
    serde_json::to_value(value).map_err(|e| LatchkeyError::Internal(e.to_string()))
}
