mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_MANIFEST_ERROR, EXIT_RESOLUTION_ERROR};
use envlock_core::{install_signal_handler, LockConfig};
use envlock_schema::MergePolicy;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "envlock",
    version,
    about = "Lock conda environments and pip requirements to platform-independent pins"
)]
struct Cli {
    /// Package manager backend: conda, mamba or mock.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Package manager binary to run instead of the backend's default.
    #[arg(long, global = true)]
    executable: Option<String>,

    /// Configuration file (defaults to $ENVLOCK_CONFIG, then ~/.config/envlock/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Lock a conda environment manifest and print it to stdout.
    Env {
        /// Manifest file; reads stdin when omitted or '-'.
        #[arg(default_value = "-")]
        manifest: PathBuf,
        /// Target platform to probe (repeatable, replaces the configured list).
        #[arg(long = "platform")]
        platforms: Vec<String>,
        /// Channel to probe when the manifest declares none (repeatable).
        #[arg(long = "channel")]
        channels: Vec<String>,
        /// Which side wins when a package is both declared and resolved.
        #[arg(long)]
        policy: Option<MergePolicy>,
    },
    /// Pin a pip requirements file and print the pinned list to stdout.
    Requirements {
        /// Requirements file; reads stdin when omitted or '-'.
        #[arg(default_value = "-")]
        requirements: PathBuf,
        /// Python version to resolve against.
        #[arg(long)]
        python: Option<String>,
        /// pip version to resolve with.
        #[arg(long)]
        pip: Option<String>,
    },
    /// Check that the configured package manager is usable.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ENVLOCK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let config = match load_config(
        cli.config.as_deref(),
        cli.backend.as_deref(),
        cli.executable.as_deref(),
    ) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    tracing::debug!(
        "backend {} ({}), policy {}",
        config.backend,
        config.executable(),
        config.policy
    );

    let needs_backend = matches!(
        cli.command,
        Commands::Env { .. } | Commands::Requirements { .. }
    );
    if needs_backend && std::env::var("ENVLOCK_SKIP_PREREQS").as_deref() != Ok("1") {
        let missing = envlock_runtime::check_backend_prereqs(&config.backend, config.executable());
        if !missing.is_empty() {
            eprintln!("error: {}", envlock_runtime::format_missing(&missing));
            return ExitCode::from(EXIT_FAILURE);
        }
    }

    let result = match cli.command {
        Commands::Env {
            manifest,
            platforms,
            channels,
            policy,
        } => commands::env::run(
            config,
            &manifest,
            commands::env::Overrides {
                platforms,
                channels,
                policy,
            },
        ),
        Commands::Requirements {
            requirements,
            python,
            pip,
        } => commands::requirements::run(
            config,
            &requirements,
            python.as_deref(),
            pip.as_deref(),
        ),
        Commands::Doctor => commands::doctor::run(&config),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn load_config(
    path: Option<&Path>,
    backend: Option<&str>,
    executable: Option<&str>,
) -> Result<LockConfig, String> {
    let mut config = match path {
        Some(path) => LockConfig::load(path),
        None => LockConfig::load_default(),
    }
    .map_err(|e| e.to_string())?;
    if let Some(backend) = backend {
        backend.clone_into(&mut config.backend);
    }
    if let Some(executable) = executable {
        config.executable = Some(executable.to_owned());
    }
    Ok(config)
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("manifest error:")
        || msg.starts_with("failed to parse manifest")
        || msg.starts_with("failed to read manifest")
    {
        EXIT_MANIFEST_ERROR
    } else if msg.starts_with("resolution error:") {
        EXIT_RESOLUTION_ERROR
    } else {
        EXIT_FAILURE
    }
}
