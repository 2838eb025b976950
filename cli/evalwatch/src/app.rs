//! One watch run: converge, report, verdict.

use std::sync::Arc;

use anyhow::{Context, Result};
use evalwatch_reconcile::{ConvergenceEngine, Outcome, PollPolicy, ReportBuilder};
use tokio::sync::mpsc;
use tracing::info;

use crate::client::{ConsulClient, NomadClient};
use crate::config::Config;
use crate::output;

/// Watch the evaluation named in `config` and print the report.
///
/// Returns whether the evaluation converged; task failures and timeouts are
/// `Ok(false)`, not errors.
pub async fn run(config: &Config) -> Result<bool> {
    let nomad = Arc::new(NomadClient::new(&config.nomad)?);
    let consul = Arc::new(ConsulClient::new(&config.consul)?);

    info!(
        evaluation_id = %config.id,
        nomad_addr = %config.nomad.addr,
        consul_addr = %config.consul.addr,
        timeout_ms = config.timeout.as_millis() as u64,
        "Configuration loaded"
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            output::print_progress(&progress);
        }
    });

    let engine = ConvergenceEngine::new(nomad.clone(), consul.clone())
        .with_policy(PollPolicy::with_interval(config.poll_interval))
        .with_progress(tx);
    let convergence = engine.converge(&config.id, config.timeout).await;

    // Closes the progress channel so the printer drains and exits.
    drop(engine);
    printer.await.context("Progress printer failed")?;

    let convergence =
        convergence.with_context(|| format!("Failed to watch evaluation {}", config.id))?;

    if let Outcome::TimedOut { pending } = &convergence.outcome {
        output::print_timed_out(pending);
    }

    let report = ReportBuilder::new(nomad, consul)
        .build(&convergence.snapshot)
        .await
        .context("Failed to build report")?;

    output::print_report(&report);
    output::print_outcome(&convergence, config.timeout);

    Ok(convergence.outcome.is_success())
}
