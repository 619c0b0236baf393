use std::io;
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::auth::CredentialService;
use crate::buffer::ByteBuffer;
use crate::http::parser::RequestParser;
use crate::http::response::HttpResponse;
use crate::http::writer::ResponseWriter;

/// Below this many pending bytes a level-triggered connection stops writing
/// and waits for the next writability notification.
const WRITE_RETRY_THRESHOLD: usize = 10240;

/// Everything a connection needs from the server, passed in explicitly.
#[derive(Clone)]
pub struct ConnectionContext {
    pub doc_root: PathBuf,
    pub users: Arc<CredentialService>,
    /// Live connections across the server.
    pub user_count: Arc<AtomicUsize>,
}

impl ConnectionContext {
    pub fn new(doc_root: impl Into<PathBuf>, users: Arc<CredentialService>) -> Self {
        Self {
            doc_root: doc_root.into(),
            users,
            user_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Reading,
    Processing,
    Writing,
    Closed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes taken in by this call (0 on a spurious wakeup).
    Ready(usize),
    /// The peer closed its side.
    PeerClosed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The whole response is on the wire.
    Done,
    /// Bytes remain; wait for writability.
    Pending,
}

/// One client socket with its buffers and protocol state.
///
/// ```text
/// Idle ─► Reading ─► Processing ─► Writing ─┬─► Idle    (keep-alive)
///                                           └─► Closed
/// ```
pub struct Connection {
    token: u64,
    fd: RawFd,
    peer: SocketAddr,
    stream: Option<TcpStream>,
    read_buf: ByteBuffer,
    write_buf: ByteBuffer,
    parser: RequestParser,
    response: HttpResponse,
    writer: ResponseWriter,
    state: ConnectionState,
    edge_triggered: bool,
    ctx: ConnectionContext,
}

impl Connection {
    /// Wraps an accepted, non-blocking socket.
    pub fn new(
        token: u64,
        stream: TcpStream,
        peer: SocketAddr,
        edge_triggered: bool,
        ctx: ConnectionContext,
    ) -> Self {
        let users = ctx.user_count.fetch_add(1, Ordering::SeqCst) + 1;
        let fd = stream.as_raw_fd();
        tracing::info!(fd, peer = %peer, users, "Client connected");

        Self {
            token,
            fd,
            peer,
            stream: Some(stream),
            read_buf: ByteBuffer::new(),
            write_buf: ByteBuffer::new(),
            parser: RequestParser::new(),
            response: HttpResponse::new(),
            writer: ResponseWriter::new(),
            state: ConnectionState::Idle,
            edge_triggered,
            ctx,
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    pub fn is_keep_alive(&self) -> bool {
        self.response.keep_alive()
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn to_write_bytes(&self) -> usize {
        self.writer
            .to_write_bytes(&self.write_buf, self.response.file())
    }

    /// Pulls bytes off the socket into the read buffer.
    ///
    /// Edge-triggered connections drain the socket until it would block;
    /// level-triggered ones read once per notification.
    pub fn read(&mut self) -> io::Result<ReadOutcome> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(ReadOutcome::PeerClosed);
        };
        self.state = ConnectionState::Reading;

        let mut total = 0;
        loop {
            match self.read_buf.read_from(stream) {
                Ok(0) => return Ok(ReadOutcome::PeerClosed),
                Ok(n) => {
                    total += n;
                    if !self.edge_triggered {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(ReadOutcome::Ready(total))
    }

    /// Parses buffered input and, once a request is complete, builds its
    /// response. Returns `false` when more input is needed.
    pub fn process(&mut self) -> bool {
        if self.read_buf.readable() == 0 {
            self.state = ConnectionState::Idle;
            return false;
        }
        self.state = ConnectionState::Processing;

        match self.parser.parse(&mut self.read_buf, &self.ctx.users) {
            Ok(true) => {
                let request = self.parser.take_request();
                self.response.init(
                    &self.ctx.doc_root,
                    &request.path,
                    request.is_keep_alive(),
                    200,
                );
            }
            Ok(false) => {
                self.state = ConnectionState::Reading;
                return false;
            }
            Err(e) => {
                tracing::warn!(fd = self.fd, peer = %self.peer, error = %e, "Bad request");
                self.parser.init();
                self.read_buf.retrieve_all();
                self.response.init(&self.ctx.doc_root, "", false, 400);
            }
        }

        self.write_buf.retrieve_all();
        self.response.make_response(&mut self.write_buf);
        self.writer.reset();
        self.state = ConnectionState::Writing;

        tracing::debug!(
            fd = self.fd,
            code = self.response.code(),
            path = %self.response.path(),
            file_len = self.response.file_len(),
            to_write = self.to_write_bytes(),
            "Response ready"
        );
        true
    }

    /// Sends the pending response with gather writes.
    pub fn write(&mut self) -> io::Result<WriteOutcome> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };

        loop {
            if self.writer.to_write_bytes(&self.write_buf, self.response.file()) == 0 {
                break;
            }
            match self
                .writer
                .write_to(stream, &mut self.write_buf, self.response.file())
            {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(WriteOutcome::Pending);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let remaining = self
                .writer
                .to_write_bytes(&self.write_buf, self.response.file());
            if !self.edge_triggered && remaining > 0 && remaining <= WRITE_RETRY_THRESHOLD {
                return Ok(WriteOutcome::Pending);
            }
        }

        self.write_buf.retrieve_all();
        self.response.unmap_file();
        self.state = ConnectionState::Idle;
        Ok(WriteOutcome::Done)
    }

    /// Releases the mapping and the socket. Safe to call more than once.
    pub fn close(&mut self) {
        self.response.unmap_file();
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.stream = None;

        let users = self.ctx.user_count.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::info!(fd = self.fd, peer = %self.peer, users, "Client quit");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
