//! `vouch check` - verify a local file. The file is left in place.

use vouch_core::{InstallerVerifier, ProgramOutput};

use super::{emit_output, load_config};
use crate::cli::args::{GlobalArgs, PathArgs};

pub async fn run(args: PathArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let verifier = match load_config(global).and_then(|c| InstallerVerifier::from_config(&c)) {
        Ok(verifier) => verifier,
        Err(e) => return emit_output(&ProgramOutput::from_error(&e)),
    };

    let outcome = verifier.verify_path(&args.path).await;
    emit_output(&ProgramOutput::from_outcome(&outcome))
}
