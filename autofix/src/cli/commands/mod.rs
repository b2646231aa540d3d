pub mod actions;
pub mod check;
pub mod classify;
pub mod fix;
pub mod init;
pub mod run;

use autofix_core::CancellationToken;
use tracing::info;

/// Token that fires on Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    token
}
