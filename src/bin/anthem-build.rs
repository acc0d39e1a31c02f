// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use anthem_build::{
    config::{BuildContext, BuildDefinition, BuildMode},
    dispatch::{DispatchError, Dispatcher, FailurePolicy},
    fetch::{fetch, Git2Source},
    path::{default_config_file, find_config_file, DEFINITION_FILE},
    probe::{ArtifactProbe, FsProbe},
    product::{catalog, Registry},
    shell::{Shell, SystemShell},
};

use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use std::{fs::write, path::PathBuf, process::exit};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "anthem-build [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub config: ConfigOptions,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Init(opts) => run_init(opts),
            Command::Fetch(opts) => run_fetch(opts, self.config),
            Command::Build(opts) => run_build(opts, self.config),
            Command::List => run_list(self.config),
            Command::Clean(opts) => run_clean(opts, self.config),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Write default build definition into current directory.
    #[command(override_usage = "anthem-build init [options]")]
    Init(InitOptions),

    /// Clone missing third-party sources.
    #[command(override_usage = "anthem-build fetch [options]")]
    Fetch(FetchOptions),

    /// Build every product whose artifact is missing.
    #[command(override_usage = "anthem-build build [options]")]
    Build(BuildOptions),

    /// Show which products are wanted and already built.
    #[command(override_usage = "anthem-build list [options]")]
    List,

    /// Remove build trees of products.
    #[command(override_usage = "anthem-build clean [options] [<product>]...")]
    Clean(CleanOptions),
}

#[derive(Args, Clone, Debug)]
struct ConfigOptions {
    /// Path to build definition to use.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Overwrite existing build definition.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FetchOptions {
    /// Only fetch sources of these products.
    #[arg(long, value_name = "product")]
    pub only: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BuildOptions {
    /// Only build these products.
    #[arg(long, value_name = "product")]
    pub only: Vec<String>,

    /// Attempt every product even after a failure.
    #[arg(short, long)]
    pub keep_going: bool,

    /// Clone missing sources before building.
    #[arg(short, long)]
    pub fetch: bool,

    /// Build test suites.
    #[arg(short, long)]
    pub test: bool,

    /// Build benchmark suites.
    #[arg(short, long)]
    pub benchmarks: bool,

    /// Build mode to use instead of the configured one.
    #[arg(short, long, value_enum, value_name = "mode")]
    pub mode: Option<BuildMode>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CleanOptions {
    /// Products to clean, every product if none given.
    #[arg(value_name = "product")]
    pub products: Vec<String>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_definition(opts: &ConfigOptions) -> Result<BuildDefinition> {
    let path = match &opts.config {
        Some(path) => Some(path.clone()),
        None => find_config_file(),
    };

    match path {
        Some(path) => {
            info!("load build definition {:?}", path.display());
            Ok(BuildDefinition::load(path)?)
        }
        None => {
            info!("no build definition found, using defaults");
            Ok(BuildDefinition::default())
        }
    }
}

fn select(registry: Registry, only: &[String]) -> Result<Registry> {
    if only.is_empty() {
        return Ok(registry);
    }

    Ok(registry.select(only)?)
}

fn run_init(opts: InitOptions) -> Result<()> {
    let path = PathBuf::from(DEFINITION_FILE);
    if path.exists() && !opts.force {
        bail!("{DEFINITION_FILE} already exists, use --force to overwrite it");
    }

    write(&path, BuildDefinition::default().to_string())?;
    info!("wrote {DEFINITION_FILE}");
    if let Ok(user) = default_config_file() {
        info!("user-wide definitions are read from {:?}", user.display());
    }

    Ok(())
}

fn run_fetch(opts: FetchOptions, config: ConfigOptions) -> Result<()> {
    let ctx = BuildContext::try_new(&load_definition(&config)?)?;
    let registry = select(catalog::standard(), &opts.only)?;
    let fetched = fetch(&registry, &ctx, &Git2Source::new())?;
    info!("fetched {} product(s)", fetched.len());

    Ok(())
}

fn run_build(opts: BuildOptions, config: ConfigOptions) -> Result<()> {
    let mut definition = load_definition(&config)?;
    definition.build.test |= opts.test;
    definition.build.benchmarks |= opts.benchmarks;
    if let Some(mode) = opts.mode {
        definition.build.mode = mode;
    }

    let ctx = BuildContext::try_new(&definition)?;
    let registry = select(catalog::standard(), &opts.only)?;
    if opts.fetch {
        fetch(&registry, &ctx, &Git2Source::new())?;
    }

    let policy = if opts.keep_going {
        FailurePolicy::KeepGoing
    } else {
        FailurePolicy::FailFast
    };

    match Dispatcher::new().with_policy(policy).run(&registry, &ctx) {
        Ok(report) => {
            print!("{report}");
            Ok(())
        }
        Err(DispatchError::Incomplete { report, failures }) => {
            print!("{report}");
            let count = failures.len();
            for failure in failures {
                error!("{:?}", anyhow!(failure));
            }
            Err(anyhow!("{count} product(s) failed to build"))
        }
        Err(error) => Err(error.into()),
    }
}

fn run_list(config: ConfigOptions) -> Result<()> {
    let ctx = BuildContext::try_new(&load_definition(&config)?)?;
    let probe = FsProbe::new();
    let registry = catalog::standard();
    let width = registry.iter().map(|product| product.name().len()).max().unwrap_or(0);

    for product in registry.iter() {
        let wanted = if product.should_build(&ctx) {
            "wanted"
        } else {
            "unwanted"
        };
        let built = if probe.exists(&product.artifact_path(&ctx))? {
            "built"
        } else {
            "missing"
        };
        println!("{:<width$}  {wanted:<8}  {built}", product.name());
    }

    Ok(())
}

fn run_clean(opts: CleanOptions, config: ConfigOptions) -> Result<()> {
    let ctx = BuildContext::try_new(&load_definition(&config)?)?;
    let registry = select(catalog::standard(), &opts.products)?;
    let shell = SystemShell::new();
    let workspace = ctx.workspace();

    for name in registry.names() {
        let dir = workspace.build_dir(name);
        if dir.exists() {
            info!("remove {:?}", dir.display());
            shell.rmtree(&dir)?;
        }
    }

    let marker = workspace.include_marker();
    if marker.exists() {
        shell.remove(&marker)?;
    } else {
        debug!("include directory was not marked as populated");
    }

    Ok(())
}
