//! Protoflow CLI: run protocol extraction phases.
//!
//! Usage:
//!   protoflow run <document> [--phases a,b | --all] [--parallel] [--replay-dir dir | --command prog]
//!   protoflow phases [--config file]
//!   protoflow plan <phase>... [--config file]

use clap::{Args, Parser, Subcommand};
use protoflow::{
    builtin, ArtifactSink, CommandClient, ExtractionClient, JsonFileSink, NullSink,
    PhaseOrchestrator, PipelineConfig, ReplayClient, RunOutcome, RunRequest, SharedContext,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "protoflow",
    version,
    about = "Dependency-aware protocol extraction pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a protocol document
    Run(RunArgs),
    /// List registered phases with their dependencies and owned fields
    Phases {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Show the resolved phases and waves for a request without running it
    Plan {
        /// Phases to request
        #[arg(required = true)]
        phases: Vec<String>,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[derive(Args)]
struct PipelineArgs {
    /// Pipeline configuration (YAML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory of recorded outcomes, one `<phase>.json` per phase
    #[arg(long, conflicts_with = "command")]
    replay_dir: Option<PathBuf>,
    /// Program invoked once per phase, request on stdin, outcome on stdout
    #[arg(long)]
    command: Option<String>,
    /// Extra arguments for --command, placed before the phase name
    #[arg(long = "command-arg", requires = "command")]
    command_args: Vec<String>,
    /// Per-call timeout for --command
    #[arg(long, requires = "command")]
    timeout_secs: Option<u64>,
}

#[derive(Args)]
struct RunArgs {
    /// Protocol document to extract
    document: PathBuf,
    /// Model or config identifier passed to every phase
    #[arg(long, default_value = "default")]
    model: String,
    /// Comma-separated phases to run
    #[arg(long, value_delimiter = ',', conflicts_with = "all")]
    phases: Vec<String>,
    /// Run every registered phase
    #[arg(long)]
    all: bool,
    /// Run waves concurrently
    #[arg(long)]
    parallel: bool,
    /// Bound on concurrently running phases (defaults to the config's max_workers)
    #[arg(long)]
    max_workers: Option<usize>,
    /// Where phase artifacts and the assembled record are written
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Precomputed upstream artifact for phases that need one
    #[arg(long)]
    upstream: Option<PathBuf>,
    /// Resume from a previously saved context
    #[arg(long)]
    context_in: Option<PathBuf>,
    /// Save the final context
    #[arg(long)]
    context_out: Option<PathBuf>,
    #[command(flatten)]
    pipeline: PipelineArgs,
}

impl PipelineArgs {
    fn load_config(&self) -> Result<PipelineConfig, String> {
        PipelineConfig::load_or_builtin(self.config.as_deref())
            .map_err(|e| format!("Failed to load pipeline config: {}", e))
    }

    fn client(&self) -> Arc<dyn ExtractionClient> {
        match &self.command {
            Some(program) => {
                let mut client = CommandClient::new(program.clone()).with_args(self.command_args.clone());
                if let Some(secs) = self.timeout_secs {
                    client = client.with_timeout(Duration::from_secs(secs));
                }
                Arc::new(client)
            }
            None => {
                let dir = self.replay_dir.clone().unwrap_or_else(|| PathBuf::from("replay"));
                Arc::new(ReplayClient::new(dir))
            }
        }
    }

    fn orchestrator(&self) -> Result<(PhaseOrchestrator, PipelineConfig), String> {
        let config = self.load_config()?;
        let registry = builtin::registry(self.client());
        let orchestrator = PhaseOrchestrator::new(registry, &config).map_err(|e| e.to_string())?;
        Ok((orchestrator, config))
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("protoflow=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_context(path: &Path) -> Result<SharedContext, String> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read context {}: {}", path.display(), e))?;
    SharedContext::from_json(&json).map_err(|e| format!("Invalid context {}: {}", path.display(), e))
}

fn write_file(path: &Path, contents: &str) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    std::fs::write(path, contents).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

fn print_outcome(outcome: &RunOutcome) {
    println!("Run {} ({})", outcome.run_id, outcome.mode);
    for (index, wave) in outcome.waves.iter().enumerate() {
        println!("  wave {}: {}", index + 1, wave.join(", "));
    }
    for line in outcome.summary().lines() {
        println!("  {}", line);
    }
    for (name, count) in outcome.context.summary() {
        if count > 0 {
            println!("  context.{}: {}", name, count);
        }
    }
}

fn cmd_run(args: RunArgs) -> i32 {
    let (orchestrator, config) = match args.pipeline.orchestrator() {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let context = match args.context_in.as_deref().map(read_context).transpose() {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let output_dir = args.output_dir.clone().or_else(|| config.output_dir.clone());
    let sink: Arc<dyn ArtifactSink> = match &output_dir {
        Some(dir) => Arc::new(JsonFileSink::new(dir.clone())),
        None => Arc::new(NullSink),
    };
    let orchestrator = orchestrator.with_sink(sink);

    let phases: Vec<String> = if args.all {
        orchestrator.registry().names().into_iter().map(str::to_string).collect()
    } else {
        args.phases.clone()
    };
    if phases.is_empty() {
        eprintln!("Error: no phases requested (use --phases or --all)");
        return 1;
    }

    let mut request = RunRequest::new(&args.document, args.model.clone()).with_phases(phases);
    if let Some(upstream) = &args.upstream {
        request = request.with_upstream_artifact(upstream.clone());
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    let max_workers = args.max_workers.unwrap_or(config.max_workers);
    let outcome = rt.block_on(async {
        if args.parallel {
            orchestrator.run_parallel(&request, context, max_workers).await
        } else {
            orchestrator.run(&request, context).await
        }
    });
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    print_outcome(&outcome);

    if let Some(dir) = &output_dir {
        let record = orchestrator.assemble(&outcome);
        let written = record
            .to_json()
            .map_err(|e| format!("Failed to encode record: {}", e))
            .and_then(|json| write_file(&dir.join("protocol.json"), &json));
        if let Err(e) = written {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    if let Some(path) = &args.context_out {
        let written = outcome
            .context
            .to_json()
            .map_err(|e| format!("Failed to encode context: {}", e))
            .and_then(|json| write_file(path, &json));
        if let Err(e) = written {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    0
}

fn cmd_phases(pipeline: &PipelineArgs) -> i32 {
    let (orchestrator, _) = match pipeline.orchestrator() {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    for phase in orchestrator.registry().phases() {
        let config = phase.config();
        let deps: Vec<&str> = orchestrator.dependencies().deps_of(phase.name()).collect();
        let owned: Vec<&str> = orchestrator
            .ownership()
            .fields_for(phase.name())
            .map(|fields| fields.iter().map(|f| f.as_str()).collect())
            .unwrap_or_default();

        let mut flags = Vec::new();
        if config.optional {
            flags.push("optional");
        }
        if config.requires_upstream_artifact {
            flags.push("needs upstream");
        }
        if !phase.is_available() {
            flags.push("unavailable");
        }

        println!("{:>3}  {:<14} {}", config.order, config.name, config.display_name);
        if !flags.is_empty() {
            println!("       flags:      {}", flags.join(", "));
        }
        println!("       depends on: {}", if deps.is_empty() { "-".to_string() } else { deps.join(", ") });
        println!("       owns:       {}", if owned.is_empty() { "-".to_string() } else { owned.join(", ") });
    }
    0
}

fn cmd_plan(phases: Vec<String>, pipeline: &PipelineArgs) -> i32 {
    let (orchestrator, _) = match pipeline.orchestrator() {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let request = RunRequest::new("-", "-").with_phases(phases);
    match orchestrator.plan(&request) {
        Ok(plan) => {
            println!("Resolved: {}", plan.resolved.join(", "));
            for (index, wave) in plan.waves.iter().enumerate() {
                println!("  wave {}: {}", index + 1, wave.join(", "));
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Phases { pipeline } => cmd_phases(&pipeline),
        Commands::Plan { phases, pipeline } => cmd_plan(phases, &pipeline),
    };
    std::process::exit(code);
}
