use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

use crate::actions::{Collaborators, InMemoryStore, TokioProcessRunner};
use crate::config::Config;
use crate::editor_lib::editor_functions;
use crate::executor::compile;
use crate::host::{HostValue, Runtime, RuntimeBuilder, StdDisplay};
use crate::modules::{call_all, run_lifecycle_hook, HookName, ModuleAggregate, ModuleLoader, ModuleSource};

#[derive(Parser)]
#[command(name = "edscript")]
#[command(about = "edscript - Editor extension script runtime", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one script and print its result as JSON
    Run {
        /// Script file
        file: PathBuf,

        /// Call this key of the object the script returns
        #[arg(long)]
        call: Option<String>,

        /// Arguments for --call (JSON array)
        #[arg(long, default_value = "[]")]
        args: String,

        /// Run in a suspending context, allowing editor.transact and editor.execute
        #[arg(long)]
        suspending: bool,
    },

    /// Load every module under the script roots and list their hooks
    Load {
        /// Script roots (default: scripts.roots from config)
        roots: Vec<PathBuf>,
    },

    /// Load modules and run a hook
    Hook {
        /// Hook name, e.g. get_commands or on_build_started
        name: String,

        /// Script roots (default: scripts.roots from config)
        roots: Vec<PathBuf>,

        /// Hook arguments (JSON array)
        #[arg(long, default_value = "[]")]
        args: String,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let roots = match &cli.command {
        Commands::Load { roots } | Commands::Hook { roots, .. } => roots.clone(),
        _ => Vec::new(),
    };
    let config = Config::builder()
        .config_path(cli.config.clone())
        .roots(roots)
        .build()
        .context("Failed to load configuration")?;
    init_tracing(&config.logging.filter);

    match cli.command {
        Commands::Run {
            file,
            call,
            args,
            suspending,
        } => {
            let args = parse_args(&args)?;
            let value = run_script(&file, call.as_deref(), args, suspending).await?;
            print_json(&value)?;
        }

        Commands::Load { .. } => {
            let (aggregate, _) = load_modules(&config)?;
            println!("Loaded {} module(s):", aggregate.modules().len());
            for path in aggregate.modules() {
                let hooks: Vec<_> = HookName::ALL
                    .iter()
                    .filter(|hook| aggregate.hooks(**hook).iter().any(|e| &e.path == path))
                    .map(HookName::as_str)
                    .collect();
                println!("  {} [{}]", path, hooks.join(", "));
            }
            if let Some(lifecycle) = aggregate.lifecycle_hooks() {
                let names: Vec<_> = lifecycle.keys().map(HookName::as_str).collect();
                println!("Lifecycle hooks: {}", names.join(", "));
            }
        }

        Commands::Hook { name, args, .. } => {
            let hook: HookName = name
                .parse()
                .map_err(|()| anyhow!("Unknown hook '{}'", name))?;
            let args = parse_args(&args)?;
            let (aggregate, collaborators) = load_modules(&config)?;

            if hook.is_lifecycle() {
                if aggregate.lifecycle_hook(hook).is_none() {
                    bail!("{} does not define '{}'", config.scripts.hooks_path, hook);
                }
                // Failures were already shown by the display output
                run_lifecycle_hook(&aggregate, hook, args, &collaborators)
                    .await
                    .map_err(|_| anyhow!("Hook '{}' failed", hook))?;
                println!("✓ {} completed", hook);
            } else {
                for (path, value) in call_all(&aggregate, hook, args, None) {
                    println!("{}:", path);
                    print_json(&value)?;
                }
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Install the stderr subscriber; `RUST_LOG` overrides the configured filter
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_args(json: &str) -> Result<Vec<HostValue>> {
    let value: JsonValue = serde_json::from_str(json).context("--args must be valid JSON")?;
    match HostValue::from_json(&value) {
        HostValue::List(items) => Ok(items),
        _ => bail!("--args must be a JSON array"),
    }
}

fn print_json(value: &HostValue) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&value.to_json()).context("Failed to render result")?;
    println!("{}", rendered);
    Ok(())
}

/// Runtime wired to an in-memory editor state and real processes
fn editor_builder() -> (RuntimeBuilder, Collaborators) {
    let store = Arc::new(InMemoryStore::new());
    let collaborators = Collaborators::new(
        store.clone(),
        Arc::new(TokioProcessRunner::new()),
        tokio::runtime::Handle::current(),
    );
    let builder = Runtime::builder()
        .display(Arc::new(StdDisplay))
        .evaluation_source(store)
        .functions(editor_functions(&collaborators));
    (builder, collaborators)
}

async fn run_script(
    file: &Path,
    call: Option<&str>,
    args: Vec<HostValue>,
    suspending: bool,
) -> Result<HostValue> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read script {}", file.display()))?;
    let prototype = compile(&file.display().to_string(), &source)?;
    let (builder, _collaborators) = editor_builder();
    let runtime = builder.build()?;
    let main = runtime.bind(&prototype)?;

    let (function, args) = match call {
        None => (main, args),
        Some(key) => {
            let table = runtime.invoke_immediate(&main, vec![], None)?;
            match table.get(key) {
                Some(HostValue::Function(f)) => (f.clone(), args),
                Some(other) => bail!("'{}' is a {}, not a function", key, other.type_name()),
                None => bail!("script result has no '{}'", key),
            }
        }
    };

    let value = if suspending {
        runtime.invoke_suspending(&function, args).await?
    } else {
        runtime.invoke_immediate(&function, args, None)?
    };
    Ok(value)
}

fn load_modules(config: &Config) -> Result<(ModuleAggregate, Collaborators)> {
    let mut sources: Vec<ModuleSource> = Vec::new();
    for root in &config.scripts.roots {
        sources.extend(ModuleSource::discover(root, &config.scripts.extension)?);
    }
    let (builder, collaborators) = editor_builder();
    let loader = ModuleLoader::new().with_hooks_path(config.scripts.hooks_path.clone());
    let aggregate = loader.reload(&builder, &sources, None)?;
    Ok((aggregate, collaborators))
}
