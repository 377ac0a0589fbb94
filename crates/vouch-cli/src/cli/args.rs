use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vouch",
    version,
    about = "Verify that a downloaded installer is Authenticode-signed by the expected publisher"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download an installer, verify its signature, and delete it
    Verify(VerifyArgs),
    /// Verify a local file without downloading
    Check(PathArgs),
    /// Print the decoded signature record of a local file
    Inspect(PathArgs),
    Version,
}

/// Flags shared by every subcommand. Applied on top of config file and env.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (YAML)
    #[arg(long, global = true, env = "VOUCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Expected subject commonName (CN)
    #[arg(long, global = true)]
    pub expected_common_name: Option<String>,

    /// Expected subject organizationName (O)
    #[arg(long, global = true)]
    pub expected_organization: Option<String>,

    /// Expected subject stateOrProvinceName (ST)
    #[arg(long, global = true)]
    pub expected_state: Option<String>,

    /// Expected subject countryName (C)
    #[arg(long, global = true)]
    pub expected_country: Option<String>,

    /// PowerShell executable (default: pwsh)
    #[arg(long, global = true)]
    pub inspector: Option<String>,

    /// Inspector deadline in seconds (0 = none)
    #[arg(long, global = true)]
    pub inspector_timeout: Option<u64>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Installer URL (default: `url` from config or VOUCH_URL)
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// File to inspect
    pub path: PathBuf,
}
