use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use realm_profile_sync::{
    config::Config,
    declaration::ProfileDeclaration,
    domain::UserProfile,
    keycloak::{user_profile::render_profile, KeycloakClient},
    service::UserProfileService,
    telemetry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "realm-profile-sync", version, about = "Reconcile Keycloak realm user profiles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the realm's current user profile
    Read {
        #[arg(long)]
        realm: String,
    },
    /// Show what apply would change
    Plan {
        #[arg(long)]
        realm: String,
        #[arg(long, default_value = "profile.json")]
        file: PathBuf,
    },
    /// Make the realm's user profile match the declaration
    Apply {
        #[arg(long)]
        realm: String,
        #[arg(long, default_value = "profile.json")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let prometheus = telemetry::init(&config.telemetry)?;

    let client = KeycloakClient::new(config.keycloak.clone())
        .context("Failed to create Keycloak client")?;
    info!(url = %client.url(), "Using Keycloak server");
    let service = UserProfileService::new(Arc::new(client))
        .with_absent_policy(config.reconcile.absent_unmanaged_policy);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    let result = run(cli.command, &service, &cancel).await;

    if let Some(handle) = prometheus {
        eprint!("{}", handle.render());
    }
    result
}

async fn run(command: Command, service: &UserProfileService, cancel: &CancellationToken) -> Result<()> {
    match command {
        Command::Read { realm } => match service.read(&realm, cancel).await? {
            Some(profile) => print_profile(service, &profile, cancel).await,
            None => {
                info!(%realm, "No user profile for realm");
                Ok(())
            }
        },
        Command::Plan { realm, file } => {
            let declared = load_declaration(&file, &realm)?;
            let drift = service.plan(&realm, &declared, cancel).await?;
            if drift.is_empty() {
                println!("No changes. Realm '{}' is up to date.", realm);
            }
            for d in drift {
                println!("~ {}", d);
            }
            Ok(())
        }
        Command::Apply { realm, file } => {
            let declared = load_declaration(&file, &realm)?;
            let effective = service
                .apply(&realm, &declared, cancel)
                .await
                .with_context(|| format!("Failed to apply user profile to realm '{}'", realm))?;
            print_profile(service, &effective, cancel).await
        }
    }
}

fn load_declaration(file: &Path, realm: &str) -> Result<UserProfile> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let declaration: ProfileDeclaration = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    Ok(declaration.into_profile(realm)?)
}

async fn print_profile(
    service: &UserProfileService,
    profile: &UserProfile,
    cancel: &CancellationToken,
) -> Result<()> {
    let caps = service.capabilities(cancel).await?;
    let document = render_profile(profile, &caps)?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
