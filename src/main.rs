// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snapkit::{
    DEFAULT_CONFIG_PATH, Dirs, Engine, EngineConfig, InstallFlags, LogInteracter, internal_unpack,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "snapkit")]
#[command(author, version, about = "Install and activate click application packages", long_about = None)]
struct Cli {
    /// Root filesystem to operate on
    #[arg(long, global = true, default_value = "/")]
    root: PathBuf,

    /// Configuration file (default: <root>/etc/snapkit/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package archive and make it the active version
    Install {
        /// Path to the package archive
        archive: PathBuf,
        /// Origin the package was obtained from
        #[arg(long, default_value = "sideload")]
        origin: String,
        /// Skip signature verification
        #[arg(long)]
        allow_unauthenticated: bool,
        /// Permit OEM packages
        #[arg(long)]
        allow_oem: bool,
        /// Do not run hook commands or start services
        #[arg(long)]
        inhibit_hooks: bool,
        /// Accept license agreements without asking
        #[arg(long)]
        accept_license: bool,
    },
    /// Remove an installed version
    Remove {
        /// Package name, optionally with its origin (foo.canonical)
        name: String,
        version: String,
    },
    /// Make an installed version the active one
    Activate {
        name: String,
        version: String,
        #[arg(long)]
        inhibit_hooks: bool,
    },
    /// Deactivate a version, which must be the active one
    Deactivate {
        name: String,
        version: String,
        #[arg(long)]
        inhibit_hooks: bool,
    },
    /// Run every system hook command once
    RunHooks,
    /// Unpack an archive with dropped privileges (used by the engine itself)
    #[command(hide = true)]
    InternalUnpack {
        archive: PathBuf,
        dest: PathBuf,
        root: PathBuf,
        /// User to extract as, taken from the calling engine's configuration
        #[arg(long)]
        user: String,
    },
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => cli.root.join(DEFAULT_CONFIG_PATH.trim_start_matches('/')),
    };
    EngineConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // the helper runs with the caller's settings, not its own config
    if let Commands::InternalUnpack {
        archive,
        dest,
        root,
        user,
    } = &cli.command
    {
        internal_unpack(archive, dest, root, user)?;
        return Ok(());
    }

    let config = load_config(&cli)?;
    let engine = Engine::new(Dirs::new(&cli.root), config);
    let inter = LogInteracter::new();

    match cli.command {
        Commands::Install {
            archive,
            origin,
            allow_unauthenticated,
            allow_oem,
            inhibit_hooks,
            accept_license,
        } => {
            let mut flags = InstallFlags::empty();
            flags.set(InstallFlags::ALLOW_UNAUTHENTICATED, allow_unauthenticated);
            flags.set(InstallFlags::ALLOW_OEM, allow_oem);
            flags.set(InstallFlags::INHIBIT_HOOKS, inhibit_hooks);

            let inter = inter.accept_licenses(accept_license);
            let name = engine.install_click(&archive, flags, &inter, &origin)?;
            println!("Installed {}", name);
        }
        Commands::Remove { name, version } => {
            let dir = engine.find_version_dir(&name, &version)?;
            engine.remove_click(&dir, &inter)?;
            println!("Removed {} {}", name, version);
        }
        Commands::Activate {
            name,
            version,
            inhibit_hooks,
        } => {
            let dir = engine.find_version_dir(&name, &version)?;
            engine.set_active(&dir, inhibit_hooks, &inter)?;
            println!("Activated {} {}", name, version);
        }
        Commands::Deactivate {
            name,
            version,
            inhibit_hooks,
        } => {
            let dir = engine.find_version_dir(&name, &version)?;
            engine.unset_active(&dir, inhibit_hooks, &inter)?;
            println!("Deactivated {} {}", name, version);
        }
        Commands::RunHooks => {
            engine.run_hooks()?;
            info!("Ran system hooks");
        }
        Commands::InternalUnpack { .. } => {}
    }

    Ok(())
}
