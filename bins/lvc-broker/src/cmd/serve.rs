use tokio_util::sync::CancellationToken;

use lvc_engine::{Broker, BrokerStats};
use transport_zmq::ZmqTransport;

use crate::config::{Effective, ServeArgs};
use crate::error::LvcBrokerError;

pub async fn run(args: ServeArgs) -> Result<(), LvcBrokerError> {
    tracing::info!("lvc-broker starting");

    let eff = Effective::new(&args)?;
    tracing::info!(
        frontend = %eff.frontend,
        backend = %eff.backend,
        poll_ms = eff.options.poll_interval.as_millis() as u64,
        drain = ?eff.options.drain,
        "loaded config"
    );

    let token = CancellationToken::new();
    let loop_token = token.clone();

    // zmq-сокеты блокирующие: broker живёт в своём потоке и сам
    // закрывает сокеты и контекст на выходе
    let mut handle = tokio::task::spawn_blocking(move || -> Result<BrokerStats, LvcBrokerError> {
        let transport = ZmqTransport::new(eff.linger);
        let sockets = transport.bind_broker(&eff.frontend, &eff.backend)?;
        let broker = Broker::new(sockets, eff.options);
        Ok(broker.run(&loop_token)?)
    });

    let stats = tokio::select! {
        // loop завершился сам: ошибка bind или закрытый контекст
        res = &mut handle => res??,
        sig = tokio::signal::ctrl_c() => {
            sig?;
            tracing::info!("shutting down...");
            token.cancel();
            handle.await??
        }
    };

    tracing::info!(
        published = stats.published,
        forwarded = stats.forwarded,
        replayed = stats.replayed,
        "shutdown complete"
    );
    Ok(())
}
