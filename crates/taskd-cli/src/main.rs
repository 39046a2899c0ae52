mod cli;
mod handlers;
mod logging;

use anyhow::{Context, Result, bail};
use taskd_core::app::{SchedulerBuilder, SchedulerConfig};
use taskd_core::domain::{Entry, TaskId};
use taskd_core::scheduler::Scheduler;
use tracing::{info, warn};

use crate::handlers::{FailHandler, SleepHandler};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("taskd error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    let config = match &args.config {
        Some(path) => SchedulerConfig::from_path(path)?,
        None => SchedulerConfig::default(),
    };

    let raw = std::fs::read_to_string(&args.tasks)
        .with_context(|| format!("reading {}", args.tasks.display()))?;
    let entries: Vec<Entry> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing task entries from {}", args.tasks.display()))?;

    let scheduler = SchedulerBuilder::new()
        .config(config)
        .register("sleep", SleepHandler)?
        .register("fail", FailHandler)?
        .default_handler(SleepHandler)
        .build()?;

    let ids = scheduler
        .submit_batch(entries)
        .await
        .context("submitting tasks")?;
    info!(count = ids.len(), "tasks submitted");

    // (A) 全タスクの終了か Ctrl-C を待つ
    tokio::select! {
        result = wait_all(&scheduler, &ids) => {
            if let Err(err) = result {
                warn!(%err, "stopped waiting for tasks");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl-C")?;
            warn!("interrupted; stopping running tasks");
        }
    }

    // (B) 停止して最終状態を出力
    scheduler.shutdown_and_join().await;
    let counts = scheduler.counts().await;
    info!(?counts, "scheduler finished");

    let records = scheduler.list().await?;
    println!("{}", serde_json::to_string_pretty(&records)?);

    if scheduler.is_halted().await {
        bail!("scheduler halted before every task finished");
    }
    Ok(())
}

async fn wait_all(scheduler: &Scheduler, ids: &[TaskId]) -> Result<()> {
    for id in ids {
        let record = scheduler.wait_for_completion(id).await?;
        info!(task_id = %id, state = %record.state(), "task done");
    }
    Ok(())
}
