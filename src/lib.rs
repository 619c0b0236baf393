//! staticd - event-driven static file server
//!
//! A single reactor thread waits on epoll and hands socket work to a fixed
//! pool of worker threads. Static files are served from a memory mapping
//! with gather writes; idle connections are evicted by a timer heap.

pub mod auth;
pub mod buffer;
pub mod config;
pub mod http;
pub mod logging;
pub mod pool;
pub mod server;
pub mod timer;
