//! Shutdown signal handling

use std::future::Future;
use tracing::warn;

/// Wait for the shutdown signal and return the reason to log.
///
/// A signal listener that fails still ends in a shutdown, so the caller
/// always stops and awaits its tasks.
pub async fn wait_for_signal<F>(signal: F) -> &'static str
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => "SIGINT received",
        Err(e) => {
            warn!(error = %e, "Failed to listen for ctrl-c, shutting down");
            "signal listener failed"
        }
    }
}
