//! Build automation tasks for the dbconn workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for dbconn")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format check, clippy, unit and integration tests
    Ci,
    /// Check formatting
    Fmt,
    /// Lint every crate with all features
    Clippy,
    /// Run the test suite (mock driver, paused time)
    Test,
    /// Run the ignored PostgreSQL tests against a container (requires Docker)
    Live,
    /// Build docs, failing on missing or broken docs
    Doc,
    /// Run a fuzz target (requires cargo-fuzz and nightly)
    Fuzz {
        /// Target name under fuzz/fuzz_targets
        #[arg(default_value = "data_source")]
        target: String,
        /// Seconds to run for
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            fmt(&sh)?;
            clippy(&sh)?;
            test(&sh)?;
            println!("ci: ok");
        }
        Command::Fmt => fmt(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test => test(&sh)?,
        Command::Live => {
            cmd!(sh, "cargo test -p dbconn-testing --features postgres -- --ignored").run()?;
        }
        Command::Doc => {
            let _flags = sh.push_env("RUSTDOCFLAGS", "-D warnings");
            cmd!(sh, "cargo doc --workspace --all-features --no-deps").run()?;
        }
        Command::Fuzz { target, seconds } => {
            let max_time = format!("-max_total_time={seconds}");
            let _dir = sh.push_dir("fuzz");
            cmd!(sh, "cargo +nightly fuzz run {target} -- {max_time}").run()?;
        }
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let manifest = String::from_utf8(output.stdout).context("invalid UTF-8 in cargo output")?;
    PathBuf::from(manifest.trim())
        .parent()
        .map(PathBuf::from)
        .context("manifest path has no parent")
}

fn fmt(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo clippy --workspace --all-features --all-targets -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell) -> Result<()> {
    // Live tests are #[ignore]d and skipped here.
    cmd!(sh, "cargo test --workspace --all-features").run()?;
    Ok(())
}
