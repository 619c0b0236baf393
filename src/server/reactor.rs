//! The event loop.
//!
//! One thread waits on epoll and owns the connection table and the timer
//! heap; socket I/O and protocol work run on the worker pool. Workers re-arm
//! their connection's registration themselves and hand close requests back
//! through a queue plus an eventfd wakeup, so the table and the heap are only
//! ever touched here.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialService;
use crate::config::{Config, Trigger};
use crate::http::connection::{Connection, ConnectionContext, ReadOutcome, WriteOutcome};
use crate::pool::WorkerPool;
use crate::server::epoll::{Epoller, Events, Interest, Waker};
use crate::server::listener;
use crate::timer::TimerHeap;

const LISTENER: u64 = 0;
const WAKER: u64 = 1;
const FIRST_CONN: u64 = 2;

/// State shared with worker tasks.
struct TaskEnv {
    epoller: Arc<Epoller>,
    waker: Arc<Waker>,
    closing: Arc<Mutex<Vec<u64>>>,
    conn_interest: Interest,
}

impl TaskEnv {
    fn request_close(&self, token: u64) {
        self.closing.lock().push(token);
        if let Err(e) = self.waker.wake() {
            error!(error = %e, "Failed to wake reactor");
        }
    }

    fn rearm(&self, conn: &Connection, interest: Interest) {
        if let Err(e) = self
            .epoller
            .modify(conn.fd(), conn.token(), interest | self.conn_interest)
        {
            warn!(fd = conn.fd(), error = %e, "Re-arm failed");
            self.request_close(conn.token());
        }
    }
}

/// Stops a running [`Reactor`] from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            error!(error = %e, "Failed to wake reactor for shutdown");
        }
    }
}

pub struct Reactor {
    listener: TcpListener,
    local_addr: SocketAddr,
    epoller: Arc<Epoller>,
    waker: Arc<Waker>,
    events: Events,
    timer: TimerHeap<u64>,
    pool: WorkerPool,
    conns: HashMap<u64, Arc<Mutex<Connection>>>,
    ctx: ConnectionContext,
    env: Arc<TaskEnv>,
    shutdown: Arc<AtomicBool>,
    next_token: u64,
    listen_edge: bool,
    conn_edge: bool,
    timeout: Option<Duration>,
    max_connections: usize,
}

impl Reactor {
    /// Sets up the listener, epoll instance and worker pool. Nothing is
    /// served until [`run`](Self::run).
    pub fn bind(cfg: &Config, users: Arc<CredentialService>) -> anyhow::Result<Self> {
        let server = &cfg.server;
        let listener = listener::bind(server)?;
        let local_addr = listener.local_addr()?;

        let epoller = Arc::new(Epoller::new().context("creating epoll instance")?);
        let waker = Arc::new(Waker::new().context("creating eventfd")?);

        let listen_edge = server.listen_trigger == Trigger::Edge;
        let conn_edge = server.conn_trigger == Trigger::Edge;

        let mut listen_interest = Interest::RDHUP | Interest::READABLE;
        let mut conn_interest = Interest::ONESHOT | Interest::RDHUP;
        if listen_edge {
            listen_interest |= Interest::EDGE;
        }
        if conn_edge {
            conn_interest |= Interest::EDGE;
        }

        epoller
            .register(listener.as_raw_fd(), LISTENER, listen_interest)
            .context("registering listener")?;
        epoller
            .register(waker.as_raw_fd(), WAKER, Interest::READABLE)
            .context("registering waker")?;

        if !server.doc_root.is_dir() {
            warn!(doc_root = %server.doc_root.display(), "Document root is not a directory");
        }

        let pool = WorkerPool::new(cfg.worker.threads.max(1), cfg.worker.queue_capacity.max(1))
            .context("spawning worker pool")?;

        let max_connections = clamp_to_fd_limit(server.max_connections)?;
        let timeout = (server.timeout_ms > 0).then(|| Duration::from_millis(server.timeout_ms));

        info!(
            addr = %local_addr,
            trigger_mode = server.trigger_mode(),
            timeout_ms = server.timeout_ms,
            linger = server.linger,
            doc_root = %server.doc_root.display(),
            threads = cfg.worker.threads,
            max_connections,
            "Server init"
        );

        Ok(Self {
            listener,
            local_addr,
            env: Arc::new(TaskEnv {
                epoller: epoller.clone(),
                waker: waker.clone(),
                closing: Arc::new(Mutex::new(Vec::new())),
                conn_interest,
            }),
            epoller,
            waker,
            events: Events::with_capacity(server.max_events),
            timer: TimerHeap::new(),
            pool,
            conns: HashMap::new(),
            ctx: ConnectionContext::new(server.doc_root.clone(), users),
            shutdown: Arc::new(AtomicBool::new(false)),
            next_token: FIRST_CONN,
            listen_edge,
            conn_edge,
            timeout,
            max_connections,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: self.shutdown.clone(),
            waker: self.waker.clone(),
        }
    }

    /// Live connections.
    pub fn user_count(&self) -> usize {
        self.ctx.user_count.load(Ordering::SeqCst)
    }

    /// Runs until a [`ShutdownHandle`] fires, then closes every connection
    /// and joins the workers.
    pub fn run(&mut self) -> anyhow::Result<()> {
        info!(addr = %self.local_addr, "Server start");

        while !self.shutdown.load(Ordering::Acquire) {
            let timeout_ms = match self.timeout {
                Some(_) => self.timer.next_tick(),
                None => -1,
            };
            let ready = self
                .epoller
                .wait(&mut self.events, timeout_ms)
                .context("waiting for events")?;

            for i in 0..ready {
                let token = self.events.token(i);
                let flags = self.events.flags(i);

                match token {
                    LISTENER => self.deal_listen(),
                    WAKER => self.waker.drain(),
                    _ if flags.intersects(Interest::RDHUP | Interest::HUP | Interest::ERROR) => {
                        self.close_conn(token)
                    }
                    _ if flags.contains(Interest::READABLE) => self.deal_read(token),
                    _ if flags.contains(Interest::WRITABLE) => self.deal_write(token),
                    _ => error!(token, flags = flags.bits(), "Unexpected event"),
                }
            }

            self.apply_closes();
            self.timer.tick();
            self.apply_closes();
        }

        self.stop();
        Ok(())
    }

    fn stop(&mut self) {
        info!(connections = self.conns.len(), "Server stopping");
        self.pool.shutdown();
        let tokens: Vec<u64> = self.conns.keys().copied().collect();
        for token in tokens {
            self.close_conn(token);
        }
        self.timer.clear();
    }

    fn deal_listen(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.user_count() >= self.max_connections {
                        warn!(peer = %peer, "Clients full");
                        listener::send_error(stream, "Server busy!");
                        return;
                    }
                    self.add_client(stream, peer);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    break;
                }
            }
            if !self.listen_edge {
                break;
            }
        }
    }

    fn add_client(&mut self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(peer = %peer, error = %e, "Failed to make client non-blocking");
            return;
        }
        let fd = stream.as_raw_fd();
        let token = self.next_token;
        self.next_token += 1;

        let conn = Connection::new(token, stream, peer, self.conn_edge, self.ctx.clone());

        if let Some(timeout) = self.timeout {
            let closing = self.env.closing.clone();
            let added = self
                .timer
                .add(token, timeout, move || closing.lock().push(token));
            if let Err(e) = added {
                error!(token, error = %e, "Timer add failed");
            }
        }

        let interest = Interest::READABLE | self.env.conn_interest;
        if let Err(e) = self.epoller.register(fd, token, interest) {
            warn!(fd, error = %e, "Register failed");
            self.timer.remove(token);
            return;
        }
        self.conns.insert(token, Arc::new(Mutex::new(conn)));
    }

    fn deal_read(&mut self, token: u64) {
        let Some(conn) = self.conns.get(&token).cloned() else {
            return;
        };
        self.extend_time(token);
        let env = self.env.clone();
        if self.pool.submit(move || on_read(&env, &conn)).is_err() {
            self.close_conn(token);
        }
    }

    fn deal_write(&mut self, token: u64) {
        let Some(conn) = self.conns.get(&token).cloned() else {
            return;
        };
        self.extend_time(token);
        let env = self.env.clone();
        if self.pool.submit(move || on_write(&env, &conn)).is_err() {
            self.close_conn(token);
        }
    }

    fn extend_time(&mut self, token: u64) {
        if let Some(timeout) = self.timeout {
            if let Err(e) = self.timer.adjust(token, timeout) {
                debug!(token, error = %e, "No timer to extend");
            }
        }
    }

    fn apply_closes(&mut self) {
        let tokens = std::mem::take(&mut *self.env.closing.lock());
        for token in tokens {
            self.close_conn(token);
        }
    }

    fn close_conn(&mut self, token: u64) {
        let Some(conn) = self.conns.remove(&token) else {
            return;
        };
        self.timer.remove(token);

        let mut conn = conn.lock();
        if !conn.is_closed() {
            if let Err(e) = self.epoller.unregister(conn.fd()) {
                debug!(fd = conn.fd(), error = %e, "Unregister failed");
            }
            conn.close();
        }
    }
}

fn on_read(env: &TaskEnv, conn: &Mutex<Connection>) {
    let mut conn = conn.lock();
    if conn.is_closed() {
        return;
    }

    match conn.read() {
        Ok(ReadOutcome::Ready(_)) => on_process(env, &mut conn),
        Ok(ReadOutcome::PeerClosed) => env.request_close(conn.token()),
        Err(e) => {
            debug!(fd = conn.fd(), error = %e, "Read failed");
            env.request_close(conn.token());
        }
    }
}

fn on_process(env: &TaskEnv, conn: &mut Connection) {
    if conn.process() {
        env.rearm(conn, Interest::WRITABLE);
    } else {
        env.rearm(conn, Interest::READABLE);
    }
}

fn on_write(env: &TaskEnv, conn: &Mutex<Connection>) {
    let mut conn = conn.lock();
    if conn.is_closed() {
        return;
    }

    match conn.write() {
        Ok(WriteOutcome::Done) if conn.is_keep_alive() => on_process(env, &mut conn),
        Ok(WriteOutcome::Done) => env.request_close(conn.token()),
        Ok(WriteOutcome::Pending) => env.rearm(&conn, Interest::WRITABLE),
        Err(e) => {
            debug!(fd = conn.fd(), error = %e, "Write failed");
            env.request_close(conn.token());
        }
    }
}

/// Caps `wanted` to what the process descriptor limit can actually hold.
fn clamp_to_fd_limit(wanted: usize) -> anyhow::Result<usize> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) } != 0 {
        return Err(std::io::Error::last_os_error()).context("reading RLIMIT_NOFILE");
    }

    // listener, epoll, eventfd, stdio and log files
    let usable = (limit.rlim_cur as usize).saturating_sub(16);
    if usable == 0 {
        anyhow::bail!("file descriptor limit {} is too low", limit.rlim_cur);
    }
    if wanted > usable {
        warn!(wanted, usable, "Capping max connections to the descriptor limit");
        return Ok(usable);
    }
    Ok(wanted)
}
