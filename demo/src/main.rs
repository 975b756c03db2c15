//! Matrix Authorization Demo CLI
//!
//! Loads a scope tree from a TOML configuration and answers questions about
//! it: permission checks, granted sids, monitor status, and export.
//!
//! Usage:
//!   cargo run -p demo -- check --scope item:engineering/build --user alice --permission Job/Build
//!   cargo run -p demo -- check --scope agent:linux-1 --user bob --group admins --permission Agent/Configure
//!   cargo run -p demo -- sids --scope item:finance
//!   cargo run -p demo -- permissions --applicable computer
//!   cargo run -p demo -- monitor
//!   cargo run -p demo -- export --entries

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use matrixauth_contracts::{
    authentication::Authentication,
    entry::ANONYMOUS,
    error::{MatrixAuthError, MatrixAuthResult},
    permission::PermissionScope,
    settings::EngineSettings,
};
use matrixauth_core::traits::AuthorizationContainer;
use matrixauth_format::{ExportStyle, LoadReport, MatrixConfig};
use matrixauth_inheritance::{project::ProjectMatrixStrategy, ScopeRef};
use matrixauth_monitor::{AmbiguityMonitor, DangerousPermissionsMonitor};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Hierarchical permission-matrix authorization demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Matrix authorization demo",
    long_about = "Loads a folder/job/agent scope tree from TOML and evaluates permission\n\
                  checks through the configured inheritance strategies."
)]
struct Cli {
    /// Configuration file to load.
    #[arg(long, global = true, default_value = "demo/config/matrix.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check one permission for a caller on a scope.
    Check {
        /// `global`, `item:<full name>` or `agent:<name>`.
        #[arg(long, default_value = "global")]
        scope: String,
        /// The caller's user name. Omit for an anonymous caller.
        #[arg(long)]
        user: Option<String>,
        /// A group the caller belongs to. Repeatable.
        #[arg(long = "group")]
        groups: Vec<String>,
        /// Permission id or short form (`Job/Build`).
        #[arg(long)]
        permission: String,
    },
    /// List the sids and possible group names granted on a scope's own matrix.
    Sids {
        #[arg(long, default_value = "global")]
        scope: String,
    },
    /// List registered permissions.
    Permissions {
        /// Only permissions that apply to this kind of scope.
        #[arg(long, value_enum)]
        applicable: Option<ScopeKind>,
    },
    /// Report the ambiguity and dangerous-permission monitors.
    Monitor,
    /// Print the loaded configuration back as TOML.
    Export {
        /// Write grants grouped by grantee instead of in string form.
        #[arg(long)]
        entries: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeKind {
    Global,
    Folder,
    Job,
    Run,
    Computer,
}

impl From<ScopeKind> for PermissionScope {
    fn from(kind: ScopeKind) -> Self {
        match kind {
            ScopeKind::Global => PermissionScope::Global,
            ScopeKind::Folder => PermissionScope::ItemGroup,
            ScopeKind::Job => PermissionScope::Item,
            ScopeKind::Run => PermissionScope::Run,
            ScopeKind::Computer => PermissionScope::Computer,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli.config, cli.command) {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Command dispatch ──────────────────────────────────────────────────────────

struct Loaded {
    config: MatrixConfig,
    strategy: ProjectMatrixStrategy,
}

fn load(path: &Path) -> MatrixAuthResult<Loaded> {
    let mut config = MatrixConfig::from_file(path)?;
    config.settings = config.settings.with_env_overrides();
    let (strategy, report) = config.build()?;
    print_report(&report);
    info!(config = %path.display(), "configuration loaded");
    Ok(Loaded { config, strategy })
}

fn run(path: &Path, command: Command) -> MatrixAuthResult<()> {
    let Loaded { config, strategy } = load(path)?;
    match command {
        Command::Check {
            scope,
            user,
            groups,
            permission,
        } => check(&strategy, &scope, user, groups, &permission),
        Command::Sids { scope } => sids(&strategy, &scope),
        Command::Permissions { applicable } => {
            list_permissions(&strategy, applicable);
            Ok(())
        }
        Command::Monitor => {
            monitor(&strategy, &config.settings);
            Ok(())
        }
        Command::Export { entries } => {
            let style = if entries {
                ExportStyle::Entries
            } else {
                ExportStyle::Permissions
            };
            print!("{}", MatrixConfig::export(&strategy, &config.settings, style).to_toml_string()?);
            Ok(())
        }
    }
}

fn check(
    strategy: &ProjectMatrixStrategy,
    scope: &str,
    user: Option<String>,
    groups: Vec<String>,
    permission: &str,
) -> MatrixAuthResult<()> {
    let scope: ScopeRef = scope.parse()?;
    let permission = strategy.context().registry().permission(permission)?;
    let caller = Authentication::new(user.unwrap_or_else(|| ANONYMOUS.to_string()), groups);

    let granted = strategy.has_permission(&scope, &caller, &permission)?;
    println!(
        "{} {} {} on {}",
        caller.name(),
        if granted { "HAS" } else { "does NOT have" },
        permission.short_form(),
        scope
    );
    Ok(())
}

fn sids(strategy: &ProjectMatrixStrategy, scope: &str) -> MatrixAuthResult<()> {
    let scope: ScopeRef = scope.parse()?;
    let matrix = match &scope {
        ScopeRef::Global => Some(strategy.global().matrix()),
        ScopeRef::Item(name) => strategy
            .item(name)
            .ok_or_else(|| MatrixAuthError::UnknownScope {
                kind: "item".to_string(),
                name: name.clone(),
            })?
            .container()
            .map(|c| c.matrix()),
        ScopeRef::Agent(name) => strategy.agent_property(name)?.map(|p| p.matrix()),
    };

    let Some(matrix) = matrix else {
        println!("{} has no matrix of its own; it resolves to its parent", scope);
        return Ok(());
    };
    println!("Granted sids on {}:", scope);
    for sid in matrix.all_granted_sids() {
        println!("  {}", sid);
    }
    println!("Possible groups:");
    for group in matrix.groups() {
        println!("  {}", group);
    }
    Ok(())
}

fn list_permissions(strategy: &ProjectMatrixStrategy, applicable: Option<ScopeKind>) {
    let registry = strategy.context().registry();
    let permissions: Vec<_> = match applicable {
        Some(kind) => registry.applicable(kind.into()).collect(),
        None => registry.all().collect(),
    };
    for p in permissions {
        let mut flags = Vec::new();
        if !p.is_enabled() {
            flags.push("disabled");
        }
        if p.is_dangerous() {
            flags.push("dangerous");
        }
        let implied_by = p.implied_by().map(|q| q.short_form()).unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<28} implied by {:<22} {}",
            p.short_form(),
            implied_by,
            flags.join(",")
        );
    }
}

fn monitor(strategy: &ProjectMatrixStrategy, settings: &EngineSettings) {
    let ambiguity = AmbiguityMonitor::from_strategy(strategy, settings);
    println!("Ambiguity monitor: {}", status(ambiguity.is_activated()));
    if ambiguity.global_ambiguous() {
        println!("  global configuration has untyped grants");
    }
    for (label, names) in [
        ("folders", ambiguity.ambiguous_folders()),
        ("jobs", ambiguity.ambiguous_jobs()),
        ("agents", ambiguity.ambiguous_agents()),
    ] {
        if !names.is_empty() {
            println!("  {} with untyped grants: {}", label, names.join(", "));
        }
    }

    let dangerous = DangerousPermissionsMonitor::new(strategy.context().registry().clone());
    let global = strategy.global().matrix();
    println!("Dangerous permissions monitor: {}", status(dangerous.is_activated(&global)));
    if dangerous.is_escape_hatch_enabled() {
        println!("  dangerous permissions are enabled process-wide (deprecated)");
    }
    let sids = dangerous.sids_with_dangerous_permissions(&global);
    if !sids.is_empty() {
        println!("  granted without Administer: {}", sids.join(", "));
    }
}

fn status(activated: bool) -> &'static str {
    if activated {
        "ACTIVE"
    } else {
        "ok"
    }
}

fn print_report(report: &LoadReport) {
    if report.is_clean() {
        return;
    }
    eprintln!("Loaded {} grants, skipped {} records:", report.loaded, report.skipped());
    for warning in &report.warnings {
        eprintln!("  {}", warning);
    }
}
