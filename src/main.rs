use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use erp_access::authz::{GuardState, RouteGuard, RoutePermissionMap};
use erp_access::matrix::{MatrixEditor, ToggleOutcome};
use erp_access::menu::Sidebar;
use erp_access::models::PermissionCode;
use erp_access::navigator::RecordingNavigator;
use erp_access::services::{AuthService, PermissionCache, PermissionService, PermissionSource, RoleService};
use erp_access::session::{FileSessionStore, SessionStore};
use erp_access::{ApiClient, ClientConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "ERP access-control client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session locally
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List the permission codes held by the session
    Permissions,
    /// Run the route guard for a path
    Check {
        path: String,
        /// Required codes; defaults to the route table entry for `path`
        #[arg(long = "require")]
        required: Vec<String>,
    },
    /// Print the sidebar visible to the session
    Menu {
        /// Current path, used to mark the active entry
        #[arg(long)]
        path: Option<String>,
    },
    /// Print the role x permission matrix
    Matrix,
    /// Grant or revoke one permission for a role
    Toggle {
        /// Role name or id
        role: String,
        code: String,
    },
}

struct App {
    session: Arc<dyn SessionStore>,
    navigator: Arc<RecordingNavigator>,
    client: Arc<ApiClient>,
    permissions: Arc<PermissionCache<PermissionService>>,
}

impl App {
    fn build(config: &ClientConfig) -> anyhow::Result<Self> {
        let session: Arc<dyn SessionStore> = Arc::new(
            FileSessionStore::open(&config.session_file)
                .with_context(|| format!("failed to open session file {}", config.session_file.display()))?,
        );
        let navigator = Arc::new(RecordingNavigator::new());
        let client = Arc::new(ApiClient::new(config, session.clone(), navigator.clone())?);
        let permissions = Arc::new(PermissionCache::new(
            PermissionService::new(client.clone()),
            session.clone(),
        ));

        Ok(Self {
            session,
            navigator,
            client,
            permissions,
        })
    }

    fn auth(&self) -> AuthService {
        AuthService::new(self.client.clone()).with_cache(self.permissions.clone())
    }

    fn report_navigation(&self) {
        if let Some(location) = self.navigator.last() {
            println!("-> {location}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    let ctx = App::build(&config)?;

    let result = run(cli.command, &ctx).await;
    ctx.report_navigation();
    result
}

async fn run(command: Commands, ctx: &App) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => {
            let user = ctx.auth().login(&email, &password).await?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Commands::Logout => {
            ctx.auth().logout().await?;
            println!("Logged out");
        }
        Commands::Whoami => match ctx.auth().current_user() {
            Some(user) => {
                println!("{} <{}>", user.name, user.email);
                if !user.roles.is_empty() {
                    println!("roles: {}", user.roles.join(", "));
                }
            }
            None => println!("not logged in"),
        },
        Commands::Permissions => {
            let codes = ctx.permissions.my_permission_codes().await?;
            for code in codes {
                println!("{code}");
            }
        }
        Commands::Check { path, required } => {
            let routes = RoutePermissionMap::erp_default();
            let required = if required.is_empty() {
                match routes.required_for(&path) {
                    Some(codes) => codes.to_vec(),
                    None => {
                        println!("{path}: unprotected");
                        return Ok(());
                    }
                }
            } else {
                required
            };

            let guard = RouteGuard::new(ctx.permissions.clone(), ctx.session.clone(), ctx.navigator.clone())
                .with_routes(routes);
            match guard.check(&path, &required).await {
                GuardState::Authorized => println!("{path}: authorized"),
                GuardState::Redirecting { to } => println!("{path}: redirecting to {to}"),
                GuardState::Checking => println!("{path}: undecided"),
            }
        }
        Commands::Menu { path } => {
            let source: Arc<dyn PermissionSource> = ctx.permissions.clone();
            let mut sidebar = Sidebar::default();
            sidebar.load(&source).await;

            let active = path.as_deref().and_then(|p| sidebar.active(p)).map(|e| e.href.clone());
            for entry in sidebar.visible() {
                let marker = if active.as_deref() == Some(entry.href.as_str()) { "*" } else { " " };
                println!("{marker} {:<24} {}", entry.label, entry.href);
                for child in &entry.children {
                    println!("    - {:<20} {}", child.label, child.href);
                }
            }
        }
        Commands::Matrix => {
            let editor = matrix_editor(ctx);
            editor.load().await?;
            print_matrix(&editor);
        }
        Commands::Toggle { role, code } => {
            let code = PermissionCode::parse(&code)?;
            let editor = matrix_editor(ctx);
            editor.load().await?;

            let role_id = editor
                .roles()
                .into_iter()
                .find(|r| r.name == role || Uuid::parse_str(&role).map(|id| id == r.id).unwrap_or(false))
                .map(|r| r.id)
                .with_context(|| format!("unknown role {role}"))?;

            match editor.toggle(role_id, code.as_str()).await {
                ToggleOutcome::Saved => println!("{}: {}", code, describe(editor.is_granted(role_id, code.as_str()))),
                ToggleOutcome::SavedNotReloaded => println!("{code}: saved (reload failed)"),
                ToggleOutcome::Immutable => println!("{role} cannot be edited"),
                ToggleOutcome::Busy => println!("another update is in progress"),
                ToggleOutcome::UnknownRole => anyhow::bail!("unknown role {role}"),
                ToggleOutcome::UnknownPermission => anyhow::bail!("unknown permission {code}"),
                ToggleOutcome::Failed => {
                    anyhow::bail!(editor.error().unwrap_or_else(|| "update failed".to_string()))
                }
            }
        }
    }

    Ok(())
}

fn matrix_editor(ctx: &App) -> MatrixEditor {
    MatrixEditor::new(Arc::new(RoleService::new(ctx.client.clone()))).with_cache(ctx.permissions.clone())
}

fn describe(granted: bool) -> &'static str {
    if granted {
        "granted"
    } else {
        "revoked"
    }
}

fn print_matrix(editor: &MatrixEditor) {
    let roles = editor.roles();
    let header: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
    println!("{:<40} {}", "permission", header.join(" | "));

    for module in editor.groups() {
        println!("[{}]", module.module);
        for resource in module.resources {
            for permission in resource.permissions {
                let cells: Vec<String> = roles
                    .iter()
                    .map(|role| {
                        let mark = if role.grants(&permission.code) { "x" } else { "." };
                        format!("{:^width$}", mark, width = role.name.len())
                    })
                    .collect();
                println!("  {:<38} {}", permission.code, cells.join(" | "));
            }
        }
    }
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
