use anyhow::Context;
use serde::Serialize;
use tracing::debug;

use vouch_core::{ProgramOutput, VouchConfig, VouchResult};

use super::args::{Cli, Command, GlobalArgs};
use crate::exit_codes::{self, SUCCESS};

pub mod check;
pub mod inspect;
pub mod verify;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let code = match cli.cmd {
        Command::Verify(args) => verify::run(args, &cli.global).await?,
        Command::Check(args) => check::run(args, &cli.global).await?,
        Command::Inspect(args) => inspect::run(args, &cli.global).await?,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            SUCCESS
        }
    };
    debug!(exit_code = code, reason = exit_codes::reason(code), "done");
    Ok(code)
}

/// Defaults, then config file, then env, then flags.
pub(crate) fn load_config(global: &GlobalArgs) -> VouchResult<VouchConfig> {
    let mut config = VouchConfig::load(global.config.as_deref())?;

    let mut publisher = config.publisher.clone();
    if let Some(v) = &global.expected_common_name {
        publisher.common_name.clone_from(v);
    }
    if let Some(v) = &global.expected_organization {
        publisher.organization.clone_from(v);
    }
    if let Some(v) = &global.expected_state {
        publisher.state.clone_from(v);
    }
    if let Some(v) = &global.expected_country {
        publisher.country.clone_from(v);
    }
    config = config.with_publisher(publisher);

    if let Some(program) = &global.inspector {
        config = config.with_inspector_program(program.clone());
    }
    if let Some(secs) = global.inspector_timeout {
        config = config.with_inspector_timeout(secs);
    }
    Ok(config)
}

/// Print one JSON document on stdout.
pub(crate) fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

pub(crate) fn emit_output(output: &ProgramOutput) -> anyhow::Result<i32> {
    emit(output)?;
    Ok(output.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "publisher:\n  common_name: From File\n  organization: File Org\n  state: Oregon\n  country: US\ninspector:\n  program: /opt/pwsh\n  timeout_secs: 30"
        )
        .unwrap();

        let global = GlobalArgs {
            config: Some(file.path().to_path_buf()),
            expected_common_name: Some("From Flag".to_string()),
            inspector_timeout: Some(0),
            ..GlobalArgs::default()
        };
        let config = load_config(&global).unwrap();
        assert_eq!(config.publisher.common_name, "From Flag");
        assert_eq!(config.publisher.organization, "File Org");
        assert_eq!(config.publisher.state, "Oregon");
        assert_eq!(config.inspector.program, "/opt/pwsh");
        assert_eq!(config.inspector.timeout_secs, 0);
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let global = GlobalArgs {
            config: Some("/nonexistent/vouch.yaml".into()),
            ..GlobalArgs::default()
        };
        let err = load_config(&global).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
    }
}
