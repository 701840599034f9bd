use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};

use binject::auxcfg::VfsMode;
use binject::collab::{request_cancel, ProcessCollaborator};
use binject::ops::{self, InjectOptions};
use binject::resource::ResourceKind;

#[derive(Parser)]
#[command(
    name = "binject",
    version,
    disable_version_flag = true,
    about = "Embed and extract resources in Mach-O, ELF, and PE executables"
)]
struct Cli {
    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inject a SEA blob (and optionally a VFS blob) into an executable
    #[command(group(ArgGroup::new("vfs_mode").args(["vfs_in_memory", "vfs_on_disk", "vfs_compat"])))]
    Inject {
        #[arg(short = 'e', long = "executable")]
        executable: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// SEA blob path, or a SEA JSON config to generate one from
        #[arg(long)]
        sea: Option<PathBuf>,
        /// Prebuilt VFS blob path (requires --sea)
        #[arg(long)]
        vfs: Option<PathBuf>,
        /// Mount the VFS in memory (default)
        #[arg(long)]
        vfs_in_memory: bool,
        /// Extract the VFS to disk at first run
        #[arg(long)]
        vfs_on_disk: bool,
        /// Compatibility mount mode
        #[arg(long)]
        vfs_compat: bool,
        /// Inject into a compressed stub directly instead of its inner executable
        #[arg(long)]
        skip_repack: bool,
    },
    /// List injected resources
    List {
        input: PathBuf,
    },
    /// Extract one resource payload to a file
    #[command(group(ArgGroup::new("kind").required(true).args(["sea", "vfs"])))]
    Extract {
        #[arg(short = 'e', long = "executable")]
        executable: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        sea: bool,
        #[arg(long)]
        vfs: bool,
    },
    /// Check one resource's integrity without writing anything
    #[command(group(ArgGroup::new("kind").required(true).args(["sea", "vfs"])))]
    Verify {
        #[arg(short = 'e', long = "executable")]
        executable: PathBuf,
        #[arg(long)]
        sea: bool,
        #[arg(long)]
        vfs: bool,
    },
}

fn main() -> ExitCode {
    init_logging();
    install_signal_handlers();

    let result = match Cli::parse().command {
        Commands::Inject {
            executable,
            output,
            sea,
            vfs,
            vfs_in_memory,
            vfs_on_disk,
            vfs_compat,
            skip_repack,
        } => {
            let vfs_mode = if vfs_on_disk {
                Some(VfsMode::OnDisk)
            } else if vfs_compat {
                Some(VfsMode::Compat)
            } else if vfs_in_memory {
                Some(VfsMode::InMemory)
            } else {
                None
            };
            let opts = InjectOptions {
                sea,
                vfs,
                vfs_mode,
                skip_repack,
            };
            let collab = collaborators_from_env();
            ops::inject(&executable, &output, &opts, &collab).map(|()| {
                println!("Injected → {}", output.display());
            })
        }

        Commands::List { input } => ops::list(&input).map(|summaries| {
            if summaries.is_empty() {
                println!("No injected resources.");
                return;
            }
            println!(
                "{:<16} {:<32} {:>12} {:>12}  CRC32",
                "Kind", "Container", "Offset", "Size"
            );
            for s in &summaries {
                println!(
                    "{:<16} {:<32} {:>12} {:>12}  {}",
                    s.kind.to_string(),
                    s.container_name,
                    s.file_offset,
                    s.payload_len,
                    hex::encode(s.checksum.to_be_bytes()),
                );
            }
        }),

        Commands::Extract {
            executable,
            output,
            sea,
            vfs: _,
        } => {
            let kind = if sea { ResourceKind::Sea } else { ResourceKind::Vfs };
            ops::extract(&executable, kind, &output).map(|n| {
                println!("Extracted {n} bytes → {}", output.display());
            })
        }

        Commands::Verify {
            executable,
            sea,
            vfs: _,
        } => {
            let kind = if sea { ResourceKind::Sea } else { ResourceKind::Vfs };
            ops::verify(&executable, kind).map(|payload| {
                println!("{kind} ok ({} bytes)", payload.len());
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("binject: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Collaborator tool paths.  Environment reads happen here, once — the
/// core takes the resolved paths as explicit parameters.
fn collaborators_from_env() -> ProcessCollaborator {
    let from = |var: &str, default: &str| {
        std::env::var_os(var)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(default))
    };
    ProcessCollaborator {
        signer: from("BINJECT_CODESIGN", "codesign"),
        compressor: from("SMOL_COMPRESS_BIN", "smol-compress"),
        decompressor: from("SMOL_DECOMPRESS_BIN", "smol-decompress"),
        runtime: from("BINJECT_NODE", "node"),
    }
}

/// Trace logging to stderr when `NODE_DEBUG_NATIVE` selects `smol_sea`.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let enabled = std::env::var("NODE_DEBUG_NATIVE")
        .map(|v| v.split(',').any(|s| s.trim() == "smol_sea"))
        .unwrap_or(false);
    let filter = if enabled {
        EnvFilter::new("binject=trace")
    } else {
        EnvFilter::new("binject=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// SIGINT/SIGTERM set the crate-wide cancellation flag; the pipeline
/// checks it at every suspension point, kills any in-flight collaborator,
/// and unwinds with the partial output deleted.
fn install_signal_handlers() {
    extern "C" fn on_signal(_sig: libc::c_int) {
        request_cancel();
    }
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}
