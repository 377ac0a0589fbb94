//! `vouch inspect` - print the decoded signature record without judging it.

use vouch_core::{PowerShellInspector, ProgramOutput, SignatureInspector};

use super::{emit, emit_output, load_config};
use crate::cli::args::{GlobalArgs, PathArgs};
use crate::exit_codes::SUCCESS;

pub async fn run(args: PathArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let config = match load_config(global) {
        Ok(config) => config,
        Err(e) => return emit_output(&ProgramOutput::from_error(&e)),
    };

    let inspector = PowerShellInspector::new(config.inspector);
    match inspector.inspect(&args.path).await {
        Ok(record) => {
            emit(&record)?;
            Ok(SUCCESS)
        }
        Err(e) => emit_output(&ProgramOutput::from_error(&e)),
    }
}
