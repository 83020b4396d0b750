//! # SMLCTL
//!
//! Command-line front end for the secret manifest loader.
//!
//! ## Usage
//!
//! ```bash
//! # Check a manifest without reading any secret material
//! smlctl validate ~/values-secret.yaml
//!
//! # Compile and print the result
//! smlctl parse ~/values-secret.yaml --backing-store kubernetes --output yaml
//!
//! # Compile and write everything into the vault pod
//! smlctl load ~/values-secret.yaml --namespace vault --pod vault-0
//!
//! # Show what would be written without touching vault
//! smlctl load ~/values-secret.yaml --dry-run
//!
//! # Inject a previously saved `parse --output json` result
//! smlctl inject parsed.json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secret_manifest_loader::backend::{BackendClient, InMemoryBackend, VaultExecBackend};
use secret_manifest_loader::compiler::{CompiledManifest, SecretCompiler};
use secret_manifest_loader::config::LoaderConfig;
use secret_manifest_loader::injector::Injector;
use secret_manifest_loader::logging::init_logging;
use secret_manifest_loader::manifest::{load_manifest_file, BackingStore, RawManifest};
use secret_manifest_loader::resolver::TerminalPrompter;
use secret_manifest_loader::validation::validate_manifest;
use std::path::{Path, PathBuf};
use tracing::info;

/// Secret manifest loader CLI
#[derive(Parser)]
#[command(name = "smlctl")]
#[command(
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), ", built ", env!("BUILD_DATETIME"), ")"),
    about = "Compile values-secret manifests and inject them into vault",
    long_about = None,
    after_help = "\
Environment:
  VAULT_NAMESPACE, VAULT_POD, EXEC_BINARY      vault pod location (vault, vault-0, oc)
  COMMAND_ATTEMPTS, COMMAND_RETRY_SLEEP_SECS   retry budget for vault commands (3, 3)
  SECRETS_BACKING_STORE                        backing store expected by the caller
  LOG_LEVEL, LOG_FORMAT, LOG_ENABLE_COLOR      logging (INFO, text, false)

Examples:
  smlctl validate ~/values-secret.yaml
  smlctl parse ~/values-secret.yaml --output yaml
  smlctl load ~/values-secret.yaml --backing-store vault --dry-run
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a manifest without reading or prompting for secret values
    Validate {
        /// Path to the values-secret manifest
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Backing store expected by the caller
        #[arg(long, value_parser = parse_backing_store)]
        backing_store: Option<BackingStore>,
    },
    /// Compile a manifest and print the result
    Parse {
        /// Path to the values-secret manifest
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Backing store expected by the caller
        #[arg(long, value_parser = parse_backing_store)]
        backing_store: Option<BackingStore>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,
    },
    /// Compile a manifest and inject it into vault
    Load {
        /// Path to the values-secret manifest
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Backing store expected by the caller
        #[arg(long, value_parser = parse_backing_store)]
        backing_store: Option<BackingStore>,

        #[command(flatten)]
        target: VaultTarget,
    },
    /// Inject the JSON output of a previous `parse`
    Inject {
        /// Path to the parsed secrets (JSON)
        #[arg(value_name = "PARSED_JSON")]
        file: PathBuf,

        #[command(flatten)]
        target: VaultTarget,
    },
}

/// Where injected secrets go
#[derive(clap::Args)]
struct VaultTarget {
    /// Namespace of the vault pod
    #[arg(short, long)]
    namespace: Option<String>,

    /// Vault pod name
    #[arg(long)]
    pod: Option<String>,

    /// CLI used to exec into the pod (oc, kubectl)
    #[arg(long)]
    exec_binary: Option<String>,

    /// Record the writes in memory and print them instead of running them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

fn parse_backing_store(value: &str) -> Result<BackingStore, String> {
    value
        .parse()
        .map_err(|other| format!("unsupported backing store '{other}' (vault, kubernetes, none)"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = LoaderConfig::from_env().context("Invalid environment configuration")?;
    init_logging(&config);

    match cli.command {
        Commands::Validate {
            file,
            backing_store,
        } => {
            let raw = read_manifest(&file).await?;
            let spec = validate_manifest(&raw, backing_store.or(config.backing_store))
                .with_context(|| format!("Invalid manifest {}", file.display()))?;
            println!("✔ {} secrets valid", spec.secrets.len());
            Ok(())
        }
        Commands::Parse {
            file,
            backing_store,
            output,
        } => {
            let raw = read_manifest(&file).await?;
            let compiled = compile(&raw, backing_store.or(config.backing_store))?;
            print_compiled(&compiled, output)
        }
        Commands::Load {
            file,
            backing_store,
            target,
        } => {
            let raw = read_manifest(&file).await?;
            let compiled = compile(&raw, backing_store.or(config.backing_store))?;
            target.apply(&mut config);
            let count = inject(&config, target.dry_run, &compiled).await?;
            println!("{count} secrets injected");
            Ok(())
        }
        Commands::Inject { file, target } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let compiled: CompiledManifest = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            target.apply(&mut config);
            let count = inject(&config, target.dry_run, &compiled).await?;
            println!("{count} secrets injected");
            Ok(())
        }
    }
}

impl VaultTarget {
    fn apply(&self, config: &mut LoaderConfig) {
        if let Some(namespace) = &self.namespace {
            config.vault_namespace.clone_from(namespace);
        }
        if let Some(pod) = &self.pod {
            config.vault_pod.clone_from(pod);
        }
        if let Some(exec_binary) = &self.exec_binary {
            config.exec_binary.clone_from(exec_binary);
        }
    }
}

async fn read_manifest(path: &Path) -> Result<RawManifest> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        bail!("Values secrets file does not exist: {}", path.display());
    }
    load_manifest_file(path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))
}

fn compile(raw: &RawManifest, backing_store: Option<BackingStore>) -> Result<CompiledManifest> {
    let mut prompter = TerminalPrompter;
    SecretCompiler::new(&mut prompter)
        .with_backing_store(backing_store)
        .compile(raw)
        .context("Failed to compile secrets")
}

fn print_compiled(compiled: &CompiledManifest, output: OutputFormat) -> Result<()> {
    let rendered = match output {
        OutputFormat::Json => serde_json::to_string_pretty(compiled)?,
        OutputFormat::Yaml => serde_yaml::to_string(compiled)?,
    };
    println!("{rendered}");
    Ok(())
}

async fn inject(config: &LoaderConfig, dry_run: bool, compiled: &CompiledManifest) -> Result<usize> {
    if dry_run {
        let backend = InMemoryBackend::new();
        let count = run_injector(&backend, compiled).await?;
        for op in backend.ops().await {
            println!("{op}");
        }
        return Ok(count);
    }

    let backend = VaultExecBackend::from_config(config)?;
    info!(
        namespace = %config.vault_namespace,
        pod = %config.vault_pod,
        "Injecting secrets into vault"
    );
    run_injector(&backend, compiled).await
}

async fn run_injector(backend: &dyn BackendClient, compiled: &CompiledManifest) -> Result<usize> {
    Injector::new(backend)
        .inject_compiled(compiled)
        .await
        .context("Failed to inject secrets")
}
