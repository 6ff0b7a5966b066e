use std::{collections::VecDeque, io, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc::Sender,
    time::{sleep, timeout_at, Instant},
};
use tracing::{debug, trace};

use crate::{codec, collector::Event, error::ConnectionError};

const READ_BUFFER_SIZE: usize = 16 * 1024;
const RECONNECT_BACKOFF: Duration = Duration::from_millis(50);

/// Opens the byte stream a worker sends its requests over.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self) -> io::Result<Self::Stream>;
}

pub struct TcpConnector {
    addr: SocketAddr,
}

impl TcpConnector {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

pub(crate) struct ConnectionSettings {
    pub id: u64,
    pub request: Bytes,
    pub pipelining: usize,
    pub expects_body: bool,
    pub deadline: Instant,
}

enum Flow {
    /// The server asked to close, open a fresh connection.
    Reconnect,
    /// Nobody is listening for events anymore.
    Stop,
}

/// Drives one connection slot until the deadline.
///
/// Fails only when the very first connect attempt fails or is still pending
/// at the deadline; later connect and I/O failures are reported as error
/// events and the slot reconnects.
pub(crate) async fn connection_task(
    connector: impl Connector,
    settings: ConnectionSettings,
    events: Sender<Event>,
) -> io::Result<()> {
    let deadline = settings.deadline;
    let mut stream = match timeout_at(deadline, connector.connect()).await {
        Ok(stream) => stream?,
        Err(_elapsed) => {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connect did not complete before the end of the run",
            ))
        }
    };
    debug!(connection = settings.id, "connected");

    loop {
        match timeout_at(deadline, drive(&mut stream, &settings, &events)).await {
            Err(_elapsed) => return Ok(()),
            Ok(Ok(Flow::Stop)) => return Ok(()),
            Ok(Ok(Flow::Reconnect)) => {
                debug!(connection = settings.id, "server closed connection");
            }
            Ok(Err(e)) => {
                debug!(connection = settings.id, error = %e, "connection failed");
                if events.send(Event::Error).await.is_err() {
                    return Ok(());
                }
            }
        }

        stream = loop {
            if Instant::now() >= deadline {
                return Ok(());
            }
            match timeout_at(deadline, connector.connect()).await {
                Err(_elapsed) => return Ok(()),
                Ok(Ok(stream)) => break stream,
                Ok(Err(e)) => {
                    debug!(connection = settings.id, error = %e, "reconnect failed");
                    if events.send(Event::Error).await.is_err() {
                        return Ok(());
                    }
                    sleep(RECONNECT_BACKOFF).await;
                }
            }
        };
        debug!(connection = settings.id, "reconnected");
    }
}

/// Keeps `pipelining` requests in flight on one stream, writing a new request
/// for every response that comes back.
async fn drive<S>(
    stream: &mut S,
    settings: &ConnectionSettings,
    events: &Sender<Event>,
) -> Result<Flow, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut in_flight = VecDeque::with_capacity(settings.pipelining);

    let batch = settings.request.repeat(settings.pipelining);
    stream.write_all(&batch).await?;
    let sent = Instant::now();
    in_flight.extend(std::iter::repeat(sent).take(settings.pipelining));
    trace!(connection = settings.id, requests = settings.pipelining, "pipeline filled");

    loop {
        while let Some(frame) = codec::parse_response(&buf, settings.expects_body, false)? {
            let sent = in_flight
                .pop_front()
                .ok_or(ConnectionError::Unsolicited)?;
            buf.advance(frame.len);
            let event = Event::Response {
                status: frame.status,
                bytes: frame.len,
                latency: sent.elapsed(),
            };
            if events.send(event).await.is_err() {
                return Ok(Flow::Stop);
            }
            if frame.close {
                return Ok(Flow::Reconnect);
            }
            stream.write_all(&settings.request).await?;
            in_flight.push_back(Instant::now());
        }

        if stream.read_buf(&mut buf).await? == 0 {
            if let Some(frame) = codec::parse_response(&buf, settings.expects_body, true)? {
                if let Some(sent) = in_flight.pop_front() {
                    let event = Event::Response {
                        status: frame.status,
                        bytes: frame.len,
                        latency: sent.elapsed(),
                    };
                    if events.send(event).await.is_err() {
                        return Ok(Flow::Stop);
                    }
                }
            }
            return match in_flight.len() {
                0 => Ok(Flow::Reconnect),
                pending => Err(ConnectionError::Closed(pending)),
            };
        }
    }
}
