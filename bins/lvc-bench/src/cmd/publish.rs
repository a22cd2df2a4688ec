use std::time::Instant;

use chrono::Local;
use tokio_util::sync::CancellationToken;

use harness::report::{publisher_csv, publisher_text, write_report};
use harness::{LogPaths, MonotonicClock, PacedPublisher, PublisherIteration};
use transport_zmq::ZmqTransport;

use super::until_ctrl_c;
use crate::config::Effective;
use crate::error::LvcBenchError;

pub async fn run(eff: Effective) -> Result<(), LvcBenchError> {
    let started = Local::now();
    let clock_start = Instant::now();
    tracing::info!(
        mode = %eff.mode,
        frontend = %eff.frontend,
        frequency = eff.run.frequency,
        step = eff.run.frequency_step,
        sets = eff.run.iteration_entity_sets,
        entities = eff.run.entities_in_set,
        size = %eff.run.entity_size,
        "publisher starting"
    );

    let token = CancellationToken::new();
    let worker_token = token.clone();
    let run_cfg = eff.run.clone();
    let (mode, frontend, linger) = (eff.mode, eff.frontend.clone(), eff.linger);

    let handle = tokio::task::spawn_blocking(move || -> Result<Vec<PublisherIteration>, LvcBenchError> {
        let transport = ZmqTransport::new(linger);
        let mut socket = transport.connect_publisher(&frontend)?;
        let clock = MonotonicClock::new(run_cfg.wait);
        let mut publisher = PacedPublisher::new(run_cfg, mode);
        publisher.run(&mut socket, &clock, &worker_token)?;
        Ok(publisher.into_results())
    });
    let results = until_ctrl_c(handle, token).await?;

    if eff.print {
        print!("{}", publisher_text(&results));
    } else {
        let path = LogPaths::new(&eff.log_dir, started.naive_local()).publisher(eff.mode);
        write_report(&path, &publisher_csv(&results))?;
    }

    tracing::info!(
        iterations = results.len(),
        total_s = format_args!("{:.1}", clock_start.elapsed().as_secs_f64()),
        "publisher finished"
    );
    Ok(())
}
