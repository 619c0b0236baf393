//! HTTP/1.1 over non-blocking sockets.
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: one client socket, its buffers and the read/process/write cycle
//! - **`parser`**: resumable request parser fed from a [`ByteBuffer`](crate::buffer::ByteBuffer)
//! - **`request`**: the parsed request and its header helpers
//! - **`response`**: status line, headers and the memory-mapped file body
//! - **`writer`**: gather writes of header bytes plus file bytes
//! - **`mime`**: content type lookup by file suffix
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← socket readable, bytes land in the read buffer
//!        └──────┬──────┘
//!               │ request line + headers (+ body) complete
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← resolve file, build headers, map body
//!        └──────┬───────────┘
//!               │ response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← gather write until nothing is left
//!        └──────┬───────────┘
//!               │ response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! A connection is never handled by two workers at once: its epoll
//! registration is one-shot and only re-armed once the current step is done.

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
