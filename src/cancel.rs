// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owns the run-wide cancellation token and turns interrupt signals into it
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to hand to the pool; clones observe the same state
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request cancellation. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            info!("Cancellation requested");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a listener that cancels on SIGINT or SIGTERM (Ctrl+C elsewhere).
    ///
    /// The listener ends on its own once the token is cancelled by any
    /// other means.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                received = wait_for_signal() => {
                    if received {
                        controller.cancel();
                    }
                }
                _ = controller.token.cancelled() => {
                    debug!("Signal listener stopped");
                }
            }
        })
    }
}

/// Wait for a termination signal, returning false if none can be observed
#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{SignalKind, signal};

    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
            true
        }
        (Err(e), _) => {
            warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            match signal(SignalKind::interrupt()) {
                Ok(mut sigint) => {
                    sigint.recv().await;
                    info!("Received SIGINT");
                    true
                }
                Err(_) => ctrl_c_fallback().await,
            }
        }
        (_, Err(e)) => {
            warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM");
                    true
                }
                Err(_) => ctrl_c_fallback().await,
            }
        }
    }
}

#[cfg(unix)]
async fn ctrl_c_fallback() -> bool {
    error!("Could not register any signal handlers, using ctrl_c fallback");
    tokio::signal::ctrl_c().await.is_ok()
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            false
        }
    }
}
