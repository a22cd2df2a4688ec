use std::time::Instant;

use chrono::Local;
use tokio_util::sync::CancellationToken;

use harness::report::{latency_csv, subscriber_csv, subscriber_text, write_report};
use harness::{LatencySampler, LogPaths, SubscriberIteration};
use transport_zmq::ZmqTransport;

use super::until_ctrl_c;
use crate::config::Effective;
use crate::error::LvcBenchError;

pub async fn run(eff: Effective) -> Result<(), LvcBenchError> {
    let started = Local::now();
    let clock_start = Instant::now();
    tracing::info!(
        mode = %eff.mode,
        backend = %eff.backend,
        sets = eff.run.iteration_entity_sets,
        timeout_ms = eff.run.timeout_ms,
        "subscriber starting"
    );

    let token = CancellationToken::new();
    let worker_token = token.clone();
    let run_cfg = eff.run.clone();
    let (mode, backend, linger) = (eff.mode, eff.backend.clone(), eff.linger);

    let handle = tokio::task::spawn_blocking(move || -> Result<Vec<SubscriberIteration>, LvcBenchError> {
        let transport = ZmqTransport::new(linger);
        let mut socket = transport.connect_subscriber(&backend, mode.subscription_prefix())?;
        let mut sampler = LatencySampler::new(run_cfg, mode);
        sampler.listen(&mut socket, &worker_token)?;
        Ok(sampler.into_results())
    });
    let results = until_ctrl_c(handle, token).await?;

    if eff.print {
        print!("{}", subscriber_text(&results));
    } else {
        let paths = LogPaths::new(&eff.log_dir, started.naive_local());
        write_report(&paths.subscriber(eff.mode), &subscriber_csv(&results))?;
        write_report(&paths.latency(eff.mode), &latency_csv(&results))?;
    }

    tracing::info!(
        iterations = results.len(),
        total_s = format_args!("{:.1}", clock_start.elapsed().as_secs_f64()),
        "subscriber finished"
    );
    Ok(())
}
