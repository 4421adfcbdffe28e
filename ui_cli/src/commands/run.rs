//! Run command - start a browser container and hold it until shutdown.

use anyhow::Context;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use browser_runner::{RunOptions, Runner};
use browser_shared_types::new_guid;
use user_config::Settings;

use crate::commands::{open_store, runner_config};
use crate::output;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Chrome version; selects the image tag (e.g. 90.0)
    #[arg(short = 'c', long)]
    pub chrome_version: String,

    /// Container identity. Defaults to a fresh UUID
    #[arg(short, long, conflicts_with = "profile")]
    pub guid: Option<String>,

    /// Run the browser for a stored profile, using its GUID
    #[arg(short, long)]
    pub profile: Option<String>,
}

/// Cancel `lifetime` on SIGINT or SIGTERM.
fn spawn_signal_handler(lifetime: CancellationToken) {
    let on_interrupt = lifetime.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(signal = "SIGINT", "signal received, exiting...");
            on_interrupt.cancel();
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sig) = signal(SignalKind::terminate()) {
            sig.recv().await;
            warn!(signal = "SIGTERM", "signal received, exiting...");
            lifetime.cancel();
        }
    });
}

/// Execute the run command.
pub async fn execute(args: RunArgs, settings: &Settings) -> anyhow::Result<()> {
    let lifetime = CancellationToken::new();
    spawn_signal_handler(lifetime.clone());

    let runner = Runner::connect(lifetime.clone(), runner_config(&settings.engine))
        .await
        .context("failed to create docker client")?;

    let store = open_store(&settings.storage).await?;
    store
        .load()
        .await
        .context("failed to init profile storage")?;

    let guid = match (args.profile, args.guid) {
        (Some(id), _) => {
            let profile = store
                .get(&id)
                .await
                .with_context(|| format!("cannot run profile {}", id))?;
            info!("Using profile {} ({})", profile.guid, profile.name);
            profile.guid
        }
        (None, Some(guid)) => guid,
        (None, None) => new_guid(),
    };

    let options = RunOptions::new(args.chrome_version, guid);
    output::info(&format!(
        "Starting Chrome {} as {}...",
        options.chrome_version, options.guid
    ));

    let outcome = runner.run_browser(&options).await;
    match &outcome {
        Ok(id) => {
            output::success(&format!("Container {} running for {}", id, options.guid));
            info!("waiting for signal");
            lifetime.cancelled().await;
        }
        Err(e) => error!("failed to run browser: {}", e),
    }

    // A failed run may still have left a created container registered.
    if let Err(e) = runner.close().await {
        let e = anyhow::Error::from(e);
        error!("failed to stop containers: {:#}", e);
        output::error(&format!("Cleanup incomplete: {:#}", e));
    }

    outcome.map(|_| ()).context("failed to run browser")
}
