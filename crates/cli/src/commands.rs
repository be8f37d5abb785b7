//! Subcommand dispatch: build core configs from flags and hand off.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use patrol::config::{CadenceConfig, DEFAULT_QUEUE_URL, RunConfig};
use patrol::{QueueBlob, QueueClient, SiteProfile, cadence, load_accounts, runner};

use crate::cli::{Commands, QueueAction, RunArgs};

pub async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => run(args).await,
        Commands::Schedule {
            run,
            hour,
            minute,
            timezone,
            rest_hours,
            safety_mins,
            event_log,
        } => {
            schedule(
                run, hour, minute, timezone, rest_hours, safety_mins, event_log,
            )
            .await
        }
        Commands::Queue { queue_url, action } => queue(queue_url, action).await,
    }
}

fn build_run_config(args: &RunArgs) -> RunConfig {
    let mut config = RunConfig::default();
    if let Some(url) = &args.queue_url {
        config.queue_url = url.clone();
    }
    if let Some(root) = &args.site_root {
        config.site = SiteProfile::new(root.clone());
    }
    if let Some(mins) = args.window_mins {
        config.run_window = Duration::from_secs(mins * 60);
    }
    if args.headful {
        config.headless = false;
    }
    config
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    // No account source at all is a startup error, before any browser work.
    let accounts = load_accounts(args.accounts.as_deref())?;
    let config = build_run_config(&args);
    runner::run_all(&accounts, &config).await?;
    Ok(())
}

async fn schedule(
    run: RunArgs,
    hour: u32,
    minute: u32,
    timezone: String,
    rest_hours: u64,
    safety_mins: u64,
    event_log: Option<PathBuf>,
) -> anyhow::Result<()> {
    let tz: chrono_tz::Tz = timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("unknown time zone {timezone:?}"))?;

    let config = CadenceConfig {
        launch_hour: hour,
        launch_minute: minute,
        timezone: tz,
        rest_interval: Duration::from_secs(rest_hours * 60 * 60),
        safety_timeout: Duration::from_secs(safety_mins * 60),
        event_log: event_log.or(CadenceConfig::default().event_log),
    };
    cadence::run_forever(&config, &forwarded_args(&run)).await?;
    Ok(())
}

/// Re-encodes the run flags for the subordinate `patrol run` invocation.
fn forwarded_args(run: &RunArgs) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(path) = &run.accounts {
        args.push("--accounts".to_string());
        args.push(path.display().to_string());
    }
    if let Some(url) = &run.queue_url {
        args.push("--queue-url".to_string());
        args.push(url.clone());
    }
    if let Some(root) = &run.site_root {
        args.push("--site-root".to_string());
        args.push(root.clone());
    }
    if let Some(mins) = run.window_mins {
        args.push("--window-mins".to_string());
        args.push(mins.to_string());
    }
    if run.headful {
        args.push("--headful".to_string());
    }
    args
}

async fn queue(queue_url: Option<String>, action: QueueAction) -> anyhow::Result<()> {
    let endpoint = queue_url.unwrap_or_else(|| DEFAULT_QUEUE_URL.to_string());
    let client = QueueClient::new(&endpoint)?;

    match action {
        QueueAction::Show => {
            let blob = client.fetch().await?;
            if blob.is_empty() {
                println!("(queue empty)");
            } else {
                for address in blob.addresses() {
                    println!("{address}");
                }
            }
        }
        QueueAction::Set { addresses } => {
            let blob = QueueBlob::from_addresses(addresses);
            client.replace(&blob).await?;
            println!("queue replaced: {} address(es)", blob.len());
        }
        QueueAction::Push { addresses } => {
            let mut blob = client.fetch().await?;
            let added = addresses.len();
            for address in addresses {
                blob.push(address);
            }
            client.replace(&blob).await?;
            println!("queue now holds {} address(es) (+{added})", blob.len());
        }
        QueueAction::Clear => {
            client.replace(&QueueBlob::default()).await?;
            println!("queue cleared");
        }
    }
    Ok(())
}
