//! `vouch verify` - download, verify, and delete an installer.

use tracing::info;

use vouch_core::{InstallerVerifier, ProgramOutput, VouchError};

use super::{emit_output, load_config};
use crate::cli::args::{GlobalArgs, VerifyArgs};

pub async fn run(args: VerifyArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let mut config = match load_config(global) {
        Ok(config) => config,
        Err(e) => return emit_output(&ProgramOutput::from_error(&e)),
    };
    if let Some(url) = args.url {
        config = config.with_url(url);
    }

    let Some(url) = config.url.clone() else {
        let err = VouchError::Config {
            message: "no installer URL: pass --url, set VOUCH_URL, or set `url` in the config file"
                .to_string(),
        };
        return emit_output(&ProgramOutput::from_error(&err));
    };

    let verifier = match InstallerVerifier::from_config(&config) {
        Ok(verifier) => verifier,
        Err(e) => return emit_output(&ProgramOutput::from_error(&e)),
    };
    info!(url = %url, publisher = %verifier.policy().common_name, "verifying installer");

    let report = verifier.verify_url(&url).await;
    emit_output(&ProgramOutput::from_report(&report))
}
