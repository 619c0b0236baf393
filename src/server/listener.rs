use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::Context;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::info;

use crate::config::ServerConfig;

const BACKLOG: i32 = 1024;

/// Binds the non-blocking listening socket described by `cfg`.
pub fn bind(cfg: &ServerConfig) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = cfg
        .listen_addr
        .to_socket_addrs()
        .with_context(|| format!("resolving {}", cfg.listen_addr))?
        .next()
        .with_context(|| format!("no address for {}", cfg.listen_addr))?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .context("creating listen socket")?;

    if cfg.linger {
        // close waits up to 1s for unsent data
        socket
            .set_linger(Some(Duration::from_secs(1)))
            .context("setting SO_LINGER")?;
    }
    socket
        .set_reuse_address(true)
        .context("setting SO_REUSEADDR")?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("binding {addr}"))?;
    socket.listen(BACKLOG).context("listening")?;
    socket.set_nonblocking(true).context("setting O_NONBLOCK")?;

    let listener: TcpListener = socket.into();
    info!("Listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Tells a client we cannot take it and hangs up.
pub fn send_error(mut stream: TcpStream, info: &str) {
    if let Err(e) = stream.write_all(info.as_bytes()) {
        tracing::warn!(error = %e, "Failed to send error to client");
    }
}
