use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use admin_console::authz::{ConditionContext, PermissionResolver, Target};
use admin_console::config::ConsoleConfig;
use admin_console::crud::{crud_config, Entity, RestService, SearchQuery};
use admin_console::models::{IdentityDocument, PolicySnapshot, Position, Repository, Role};
use admin_console::session::SessionConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "admin console operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a permission against a policy snapshot
    Check {
        #[arg(long)]
        policy: PathBuf,
        #[arg(long, default_value = "")]
        permission: String,
        #[arg(long, requires = "action")]
        resource: Option<String>,
        #[arg(long, requires = "resource")]
        action: Option<String>,
        /// JSON object with the attributes conditions are evaluated against
        #[arg(long)]
        context: Option<String>,
    },
    /// Show the roles and resolved permissions of the snapshot's user
    Resolve {
        #[arg(long)]
        policy: PathBuf,
    },
    /// Encrypt a URL path segment
    EncodePath { segment: String },
    /// Decrypt a URL path segment
    DecodePath { token: String },
    /// Decode a session token into the user it carries
    Whoami { token: String },
    /// List one page of a master-data collection
    List {
        entity: EntityKind,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
        #[arg(long, env = "API_TOKEN")]
        token: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EntityKind {
    IdentityDocuments,
    Positions,
    Repositories,
    Roles,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Check {
            policy,
            permission,
            resource,
            action,
            context,
        } => {
            let resolver = PermissionResolver::from_snapshot(PolicySnapshot::load(&policy)?);
            let context = context
                .map(|raw| serde_json::from_str::<ConditionContext>(&raw))
                .transpose()
                .context("--context must be a JSON object")?;
            let target = resource
                .as_deref()
                .zip(action.as_deref())
                .map(|(resource, action)| Target::new(resource, action));

            let allowed = resolver.check_permission(&permission, target, context.as_ref(), |id| {
                eprintln!("denied: {id}");
            });
            println!("{}", if allowed { "allowed" } else { "denied" });
        }
        Commands::Resolve { policy } => {
            let resolver = PermissionResolver::from_snapshot(PolicySnapshot::load(&policy)?);
            let mut permissions: Vec<_> = resolver.resolved_permissions().iter().collect();
            permissions.sort();
            let roles: Vec<_> = resolver.user_roles().iter().map(|r| r.id.as_str()).collect();
            println!("roles: {}", roles.join(", "));
            for permission in permissions {
                println!("{permission}");
            }
        }
        Commands::EncodePath { segment } => {
            println!("{}", ConsoleConfig::from_env()?.obfuscator()?.encrypt(&segment)?);
        }
        Commands::DecodePath { token } => {
            println!("{}", ConsoleConfig::from_env()?.obfuscator()?.decrypt(&token)?);
        }
        Commands::Whoami { token } => {
            let session = SessionConfig::from_env()?.authenticate(&token)?;
            println!("{}", serde_json::to_string_pretty(&session.user())?);
        }
        Commands::List {
            entity,
            page,
            size,
            token,
        } => {
            let config = ConsoleConfig::from_env()?;
            let query = SearchQuery::default().page(page, size);
            match entity {
                EntityKind::IdentityDocuments => list::<IdentityDocument>(&config, token, query).await?,
                EntityKind::Positions => list::<Position>(&config, token, query).await?,
                EntityKind::Repositories => list::<Repository>(&config, token, query).await?,
                EntityKind::Roles => list::<Role>(&config, token, query).await?,
            }
        }
    }

    Ok(())
}

async fn list<T: Entity>(
    config: &ConsoleConfig,
    token: Option<String>,
    query: SearchQuery,
) -> anyhow::Result<()> {
    let mut service = RestService::<T>::new(&config.api_base_url)?;
    if let Some(token) = token {
        service = service.with_bearer(token);
    }

    let controller = crud_config::<T, _>(T::NAME, service, config.default_preset)
        .with_retry(config.retry)
        .build();
    let page = controller
        .list(query)
        .await
        .with_context(|| format!("failed to list {}", T::PATH))?;

    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
