use std::time::Duration;

use bench_api::{
    BenchError, BrokerSockets, Message, PublishSocket, Readiness, SubscribeSocket,
};

// ═══════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════

/// ETERM: контекст закрыт, всё остальное: обычная транспортная ошибка.
fn map_err(stage: &str, e: zmq::Error) -> BenchError {
    match e {
        zmq::Error::ETERM => BenchError::closed(format!("{stage}: {e}")),
        _ => BenchError::transport(format!("{stage}: {e}")),
    }
}

fn timeout_ms(timeout: Duration) -> i64 {
    i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX)
}

// ═══════════════════════════════════════════════════════════════
//  ZmqTransport: фабрика сокетов поверх одного контекста
// ═══════════════════════════════════════════════════════════════

/// Общий ZMQ-контекст процесса. Сокеты держат ссылку на контекст,
/// поэтому он терминируется только после закрытия последнего сокета.
pub struct ZmqTransport {
    ctx: zmq::Context,
    linger: Duration,
}

impl ZmqTransport {
    /// `linger`: сколько закрываемый сокет досылает очередь.
    pub fn new(linger: Duration) -> Self {
        Self { ctx: zmq::Context::new(), linger }
    }

    fn socket(&self, kind: zmq::SocketType, stage: &str) -> Result<zmq::Socket, BenchError> {
        let socket = self.ctx.socket(kind).map_err(|e| map_err(stage, e))?;
        let linger = i32::try_from(self.linger.as_millis()).unwrap_or(i32::MAX);
        socket.set_linger(linger).map_err(|e| map_err(stage, e))?;
        Ok(socket)
    }

    /// Сокеты broker'а: SUB (frontend, подписан на всё) и XPUB (backend).
    ///
    /// XPUB в verbose-режиме: каждая подписка доходит до broker'а, даже
    /// повторная на тот же prefix, и вызывает replay.
    pub fn bind_broker(&self, frontend: &str, backend: &str) -> Result<ZmqBrokerSockets, BenchError> {
        let front = self.socket(zmq::SUB, "frontend")?;
        front.bind(frontend).map_err(|e| map_err("frontend bind", e))?;
        front.set_subscribe(b"").map_err(|e| map_err("frontend subscribe", e))?;

        let back = self.socket(zmq::XPUB, "backend")?;
        back.set_xpub_verbose(true).map_err(|e| map_err("backend verbose", e))?;
        back.bind(backend).map_err(|e| map_err("backend bind", e))?;

        tracing::info!(frontend, backend, "zmq broker sockets bound");
        Ok(ZmqBrokerSockets { frontend: front, backend: back })
    }

    pub fn connect_publisher(&self, addr: &str) -> Result<ZmqPublisher, BenchError> {
        let socket = self.socket(zmq::PUB, "publisher")?;
        socket.connect(addr).map_err(|e| map_err("publisher connect", e))?;
        tracing::info!(addr, "zmq publisher connected");
        Ok(ZmqPublisher { socket })
    }

    pub fn connect_subscriber(&self, addr: &str, prefix: &[u8]) -> Result<ZmqSubscriber, BenchError> {
        let socket = self.socket(zmq::SUB, "subscriber")?;
        socket.connect(addr).map_err(|e| map_err("subscriber connect", e))?;
        socket.set_subscribe(prefix).map_err(|e| map_err("subscriber subscribe", e))?;
        tracing::info!(addr, prefix = %String::from_utf8_lossy(prefix), "zmq subscriber connected");
        Ok(ZmqSubscriber { socket })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Broker sockets
// ═══════════════════════════════════════════════════════════════

pub struct ZmqBrokerSockets {
    frontend: zmq::Socket,
    backend: zmq::Socket,
}

impl BrokerSockets for ZmqBrokerSockets {
    fn poll(&mut self, timeout: Duration) -> Result<Readiness, BenchError> {
        let mut items = [
            self.frontend.as_poll_item(zmq::POLLIN),
            self.backend.as_poll_item(zmq::POLLIN),
        ];
        match zmq::poll(&mut items, timeout_ms(timeout)) {
            Ok(_) => Ok(Readiness {
                frontend: items[0].is_readable(),
                backend: items[1].is_readable(),
            }),
            // Ctrl+C прерывает poll: это просто пустой проход
            Err(zmq::Error::EINTR) => Ok(Readiness::default()),
            Err(e) => Err(map_err("poll", e)),
        }
    }

    fn recv_publish(&mut self) -> Result<Option<Message>, BenchError> {
        match self.frontend.recv_multipart(zmq::DONTWAIT) {
            Ok(frames) => Message::from_frames(frames).map(Some),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(map_err("frontend recv", e)),
        }
    }

    fn recv_subscription(&mut self) -> Result<Option<Vec<u8>>, BenchError> {
        match self.backend.recv_bytes(zmq::DONTWAIT) {
            Ok(frame) => Ok(Some(frame)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(map_err("backend recv", e)),
        }
    }

    fn forward(&mut self, topic: &[u8], payload: &[u8]) -> Result<(), BenchError> {
        self.backend
            .send_multipart([topic, payload], 0)
            .map_err(|e| map_err("backend send", e))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Publisher / Subscriber
// ═══════════════════════════════════════════════════════════════

pub struct ZmqPublisher {
    socket: zmq::Socket,
}

impl PublishSocket for ZmqPublisher {
    fn send(&mut self, topic: &[u8], payload: &[u8]) -> Result<(), BenchError> {
        self.socket
            .send_multipart([topic, payload], 0)
            .map_err(|e| map_err("publish", e))
    }
}

pub struct ZmqSubscriber {
    socket: zmq::Socket,
}

impl SubscribeSocket for ZmqSubscriber {
    fn try_recv(&mut self) -> Result<Option<Message>, BenchError> {
        match self.socket.recv_multipart(zmq::DONTWAIT) {
            Ok(frames) => Message::from_frames(frames).map(Some),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(map_err("subscriber recv", e)),
        }
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, BenchError> {
        match self.socket.poll(zmq::POLLIN, timeout_ms(timeout)) {
            Ok(n) => Ok(n > 0),
            Err(zmq::Error::EINTR) => Ok(false),
            Err(e) => Err(map_err("subscriber poll", e)),
        }
    }
}
