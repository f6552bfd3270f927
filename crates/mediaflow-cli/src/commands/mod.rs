//! Subcommands and the helpers they share.

pub mod generate;
pub mod simulate;

use std::process::ExitCode;

use anyhow::Result;
use mediaflow_core::domain::GenerationResult;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A token that fires on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling generation");
            trigger.cancel();
        }
    });
    cancel
}

/// Print the result as JSON; a failed generation exits non-zero.
pub fn emit(result: &GenerationResult) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
