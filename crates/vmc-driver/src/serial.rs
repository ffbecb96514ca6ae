//! Serial-port and TCP-bridge transports.
//!
//! Both run the same I/O task: one `select!` loop that forwards received
//! bytes to the [`ReplySink`] and drains queued frames to the device.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info, warn};

use crate::transport::{ReplySink, Transport, TransportError};

/// Default controller baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Running I/O task for an open stream.
struct StreamIo {
    frames: mpsc::UnboundedSender<Vec<u8>>,
    alive: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl StreamIo {
    fn spawn<S>(stream: S, sink: ReplySink, port: String) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (frames, rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run_stream(stream, sink, rx, alive.clone(), port));
        StreamIo { frames, alive, task }
    }

    fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.frames
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn shutdown(self) {
        self.alive.store(false, Ordering::Release);
        self.task.abort();
    }
}

async fn run_stream<S>(
    stream: S,
    sink: ReplySink,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    alive: Arc<AtomicBool>,
    port: String,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut read_buf = [0u8; 256];

    let reason = loop {
        tokio::select! {
            result = reader.read(&mut read_buf) => {
                match result {
                    Ok(0) => {
                        info!(port = %port, "link closed by peer");
                        break "link closed by peer".to_string();
                    }
                    Ok(n) => sink.deliver(&read_buf[..n]),
                    Err(e) => {
                        warn!(port = %port, error = %e, "read failed");
                        break format!("read failed: {e}");
                    }
                }
            }

            frame = frames.recv() => {
                let Some(frame) = frame else { return };
                if let Err(e) = writer.write_all(&frame).await {
                    warn!(port = %port, error = %e, "write failed");
                    break format!("write failed: {e}");
                }
                if let Err(e) = writer.flush().await {
                    warn!(port = %port, error = %e, "flush failed");
                    break format!("flush failed: {e}");
                }
            }
        }
    };

    alive.store(false, Ordering::Release);
    sink.fail(&reason);
}

/// UART link: 8 data bits, no parity, 1 stop bit, no flow control.
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    io: Option<StreamIo>,
}

impl SerialTransport {
    /// Transport for the given device at the given baud rate.
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        SerialTransport {
            path: path.into(),
            baud_rate,
            io: None,
        }
    }

    /// Device path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, sink: ReplySink) -> Result<(), TransportError> {
        if self.is_open() {
            return Ok(());
        }

        let stream = tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()?;

        info!(port = %self.path, baud = self.baud_rate, "serial port opened");
        self.io = Some(StreamIo::spawn(stream, sink, self.path.clone()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(io) = self.io.take() {
            io.shutdown();
            info!(port = %self.path, "serial port closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.io.as_ref().is_some_and(StreamIo::is_alive)
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match &self.io {
            Some(io) => io.write(frame),
            None => Err(TransportError::Closed),
        }
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}

/// Link to a board behind a TCP serial bridge.
pub struct TcpTransport {
    address: String,
    io: Option<StreamIo>,
}

impl TcpTransport {
    /// Transport for the given `host:port`.
    pub fn new(address: impl Into<String>) -> Self {
        TcpTransport {
            address: address.into(),
            io: None,
        }
    }

    fn resolve(&self) -> Result<SocketAddr, TransportError> {
        self.address.to_socket_addrs()?.next().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} did not resolve", self.address),
            ))
        })
    }
}

impl Transport for TcpTransport {
    fn open(&mut self, sink: ReplySink) -> Result<(), TransportError> {
        if self.is_open() {
            return Ok(());
        }

        let addr = self.resolve()?;
        let std_stream = std::net::TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        std_stream.set_nodelay(true)?;
        std_stream.set_nonblocking(true)?;
        let stream = tokio::net::TcpStream::from_std(std_stream)?;

        debug!(address = %addr, "tcp bridge connected");
        self.io = Some(StreamIo::spawn(stream, sink, self.address.clone()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(io) = self.io.take() {
            io.shutdown();
            info!(address = %self.address, "tcp bridge closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.io.as_ref().is_some_and(StreamIo::is_alive)
    }

    fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match &self.io {
            Some(io) => io.write(frame),
            None => Err(TransportError::Closed),
        }
    }

    fn describe(&self) -> String {
        self.address.clone()
    }
}
