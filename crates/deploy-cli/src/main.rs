//! deployflow: ejecuta migraciones de despliegue contra una red con nombre.
//!
//! ```text
//! deployflow migrate   --network <n> [--plan <file>] [--artifacts <dir>] [--from <ordinal>]
//!                      [--force <ordinal>...] [--force-all] [--timeout-secs <n>] [--dry-run]
//! deployflow status    --network <n>
//! deployflow reconcile --network <n> --step <ordinal> (--applied --address <a> --tx <h> | --not-applied | --query)
//! deployflow reset     --network <n> --reason <txt>
//! ```
//!
//! El ledger vive en Postgres si `DATABASE_URL` está definido y, si no, en
//! archivos JSONL bajo `DEPLOYFLOW_LEDGER_DIR` (por defecto
//! `.deployflow/ledger`).

mod setup;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use deploy_adapters::SimulatedTransport;
use deploy_core::{DeployReceipt, InMemoryLedgerStore, MigrationError, MigrationRunner, NetworkContext, Reconciler,
                  Resolution, RunOptions};

use setup::{LedgerBackend, PlanSource};

#[derive(Parser)]
#[command(name = "deployflow")]
#[command(about = "Ordered, idempotent, network-scoped deployment migrations")]
#[command(version)]
struct Cli {
    /// Archivo TOML de redes (default: $DEPLOYFLOW_NETWORKS o deployflow.toml)
    #[arg(long, global = true)]
    networks: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PlanArgs {
    /// Plan TOML (default: migración PumlNFT / PumlNFTMarket)
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Directorio de artifacts compilados (JSON estilo Truffle)
    #[arg(long)]
    artifacts: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ejecuta los steps pendientes del plan
    Migrate {
        #[arg(long)]
        network: String,

        #[command(flatten)]
        source: PlanArgs,

        /// Ignora steps con ordinal menor
        #[arg(long)]
        from: Option<usize>,

        /// Re-ejecuta el step indicado aunque ya esté aplicado (repetible)
        #[arg(long)]
        force: Vec<usize>,

        /// Re-ejecuta todos los steps
        #[arg(long, conflicts_with = "force")]
        force_all: bool,

        /// Límite por step; al expirar el step queda Unknown
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Ejecuta sobre una copia en memoria del ledger sin persistir nada
        #[arg(long)]
        dry_run: bool,
    },

    /// Muestra el ledger de una red
    Status {
        #[arg(long)]
        network: String,
    },

    /// Resuelve un step Pending/Unknown
    Reconcile {
        #[arg(long)]
        network: String,

        #[arg(long)]
        step: usize,

        /// El despliegue sí se aplicó
        #[arg(long, requires_all = ["address", "tx"], conflicts_with_all = ["not_applied", "query"])]
        applied: bool,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        tx: Option<String>,

        /// El despliegue no se aplicó; el step se reintentará
        #[arg(long, conflicts_with = "query")]
        not_applied: bool,

        /// Consulta al transport si el despliegue existe
        #[arg(long)]
        query: bool,

        #[command(flatten)]
        source: PlanArgs,
    },

    /// Olvida el estado aplicado de una red (los eventos se conservan)
    Reset {
        #[arg(long)]
        network: String,

        #[arg(long)]
        reason: String,
    },
}

/// Códigos de salida: 0 ok, 1 error de configuración/validación, 2 run
/// detenido por un step, 3 red bloqueada por otro run.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
                             .init();
    deploy_persistence::init_dotenv();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            match e.downcast_ref::<MigrationError>() {
                Some(MigrationError::NetworkLocked(_)) => ExitCode::from(3),
                _ => ExitCode::from(1),
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let profiles = setup::load_profiles(cli.networks.as_deref())?;
    match cli.command {
        Commands::Migrate { network,
                            source,
                            from,
                            force,
                            force_all,
                            timeout_secs,
                            dry_run, } => {
            let backend = LedgerBackend::from_env()?;
            let PlanSource { plan, registry } = PlanSource::load(source.plan.as_deref(), source.artifacts.as_deref())?;
            let mut options = RunOptions::new();
            if let Some(from) = from {
                options = options.starting_at(from);
            }
            if force_all {
                options = options.force_all();
            } else if !force.is_empty() {
                options = options.forcing(force);
            }
            if let Some(secs) = timeout_secs {
                options = options.with_timeout(Duration::from_secs(secs));
            }

            let runner = MigrationRunner::new(registry);
            let report = if dry_run {
                let current = NetworkContext::resolve(&network,
                                                      &profiles,
                                                      backend.store(),
                                                      Arc::new(SimulatedTransport::named("dry-run")))?;
                let copy = InMemoryLedgerStore::seeded(current.id(), current.ledger().events()?);
                let ctx = NetworkContext::resolve(&network,
                                                  &profiles,
                                                  &copy,
                                                  Arc::new(SimulatedTransport::named("dry-run")))?;
                tracing::info!("dry run on {} ({} ledger event(s) copied)",
                               ctx.id(),
                               ctx.ledger().events()?.len());
                runner.run(&plan, &ctx, &options).await?
            } else {
                let ctx = NetworkContext::resolve(&network, &profiles, backend.store(), Arc::new(SimulatedTransport::new()))?;
                runner.run(&plan, &ctx, &options).await?
            };
            println!("{report}");
            Ok(if report.halted.is_some() {
                   ExitCode::from(2)
               } else {
                   ExitCode::SUCCESS
               })
        }
        Commands::Status { network } => {
            let backend = LedgerBackend::from_env()?;
            let ctx = NetworkContext::resolve(&network, &profiles, backend.store(), Arc::new(SimulatedTransport::new()))?;
            let snapshot = ctx.ledger().snapshot()?;
            println!("{}", setup::render_status(&snapshot));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reconcile { network,
                              step,
                              applied,
                              address,
                              tx,
                              not_applied,
                              query,
                              source, } => {
            let backend = LedgerBackend::from_env()?;
            let ctx = NetworkContext::resolve(&network, &profiles, backend.store(), Arc::new(SimulatedTransport::new()))?;
            let reconciler = Reconciler::new(&ctx);
            let entry = if applied {
                let (Some(address), Some(tx_hash)) = (address, tx) else {
                    bail!("--applied requires --address and --tx");
                };
                reconciler.resolve(step, Resolution::Applied(DeployReceipt { address, tx_hash }))?
            } else if not_applied {
                reconciler.resolve(step, Resolution::NotApplied)?
            } else if query {
                let PlanSource { plan, .. } = PlanSource::load(source.plan.as_deref(), source.artifacts.as_deref())?;
                reconciler.reconcile_with_transport(&plan, step).await?
            } else {
                bail!("one of --applied, --not-applied or --query is required");
            };
            println!("#{} {}: {:?} {}",
                     entry.ordinal,
                     entry.step_id,
                     entry.status,
                     entry.address().unwrap_or("-"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reset { network, reason } => {
            let backend = LedgerBackend::from_env()?;
            let ctx = NetworkContext::resolve(&network, &profiles, backend.store(), Arc::new(SimulatedTransport::new()))?;
            Reconciler::new(&ctx).reset(reason).context("reset failed")?;
            println!("ledger of {} reset", ctx.id());
            Ok(ExitCode::SUCCESS)
        }
    }
}
