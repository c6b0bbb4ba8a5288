//! notpecl - download, build and install PHP extensions from PECL.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use console::style;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use np_core::Stability;
use np_io::api::DEFAULT_BASE_URL;
use np_io::{InstallOptions, Installer, PackageSpec, PeclClient, default_parallelism};

mod commands;
mod display;

#[derive(Parser)]
#[command(name = "notpecl")]
#[command(about = "Download, build and install PHP extensions from PECL")]
#[command(version)]
struct Cli {
    /// Log every step (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base URL of the registry REST API
    #[arg(long, global = true, env = "NOTPECL_REGISTRY", default_value = DEFAULT_BASE_URL)]
    registry: String,

    /// Number of packages processed at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FetchArgs {
    /// Lowest stability tier to consider (stable, beta, alpha, devel, snapshot)
    #[arg(long, default_value = "stable")]
    minimum_stability: Stability,

    /// Where release archives are unpacked
    #[arg(long, env = "NOTPECL_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and unpack extensions without building them
    Download {
        /// Extensions as name[:constraint], e.g. redis:^5.1
        #[arg(required = true)]
        packages: Vec<PackageSpec>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Download, build and install extensions
    Install {
        /// Extensions as name[:constraint], e.g. redis:^5.1
        #[arg(required = true)]
        packages: Vec<PackageSpec>,

        #[command(flatten)]
        fetch: FetchArgs,

        /// Staging root for `make install` (INSTALL_ROOT)
        #[arg(long, env = "NOTPECL_INSTALL_DIR")]
        install_dir: Option<PathBuf>,

        /// Keep the unpacked sources and build tree
        #[arg(long)]
        no_cleanup: bool,

        /// Parallel make jobs per extension
        #[arg(short = 'j', long)]
        jobs: Option<usize>,

        /// Extra configure argument, e.g. --enable-redis-igbinary (repeatable)
        #[arg(long = "configure-arg", value_name = "ARG", allow_hyphen_values = true)]
        configure_args: Vec<String>,
    },

    /// Build and install an already unpacked extension
    Build {
        /// Source directory containing config.m4
        #[arg(default_value = ".")]
        source: PathBuf,

        /// Path to package.xml (default: the source directory, then its parent)
        #[arg(long)]
        xml: Option<PathBuf>,

        /// Staging root for `make install` (INSTALL_ROOT)
        #[arg(long, env = "NOTPECL_INSTALL_DIR")]
        install_dir: Option<PathBuf>,

        /// Run `make clean` after installing
        #[arg(long)]
        cleanup: bool,

        /// Parallel make jobs
        #[arg(short = 'j', long)]
        jobs: Option<usize>,

        /// Arguments passed to ./configure
        #[arg(last = true)]
        configure_args: Vec<String>,
    },

    /// Show a package description and its releases
    Info {
        /// Extension name
        package: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn install_options(fetch: FetchArgs, concurrency: Option<usize>) -> InstallOptions {
    let download_dir = fetch
        .download_dir
        .unwrap_or_else(commands::default_download_dir);

    let mut options = InstallOptions::new(download_dir);
    options.minimum_stability = fetch.minimum_stability;
    if let Some(concurrency) = concurrency {
        options.concurrency = concurrency.max(1);
    }
    options
}

async fn run(cli: Cli) -> Result<(), np_core::Error> {
    let client = Arc::new(PeclClient::with_base_url(cli.registry));
    debug!(registry = client.base_url(), "using registry");

    match cli.command {
        Commands::Download { packages, fetch } => {
            let options = install_options(fetch, cli.concurrency);
            let installer = Installer::new(client, commands::builder());
            commands::download::run(&installer, &packages, &options).await
        }

        Commands::Install {
            packages,
            fetch,
            install_dir,
            no_cleanup,
            jobs,
            configure_args,
        } => {
            let mut options = install_options(fetch, cli.concurrency);
            options.install_dir = install_dir;
            options.cleanup = !no_cleanup;
            options.configure_args = configure_args;
            options.parallel = jobs.unwrap_or_else(default_parallelism).max(1);

            let installer = Installer::new(client, commands::builder());
            commands::install::run(&installer, &packages, &options).await
        }

        Commands::Build {
            source,
            xml,
            install_dir,
            cleanup,
            jobs,
            configure_args,
        } => {
            let request = commands::build::request(
                source,
                xml,
                install_dir,
                cleanup,
                jobs.unwrap_or_else(default_parallelism).max(1),
                configure_args,
            )?;
            commands::build::run(&commands::builder(), request).await
        }

        Commands::Info { package } => commands::info::run(client.as_ref(), &package).await,
    }
}
