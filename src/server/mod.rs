//! Socket plumbing: the epoll wrapper, the listening socket and the reactor
//! that drives every connection.

pub mod epoll;
pub mod listener;
pub mod reactor;

pub use reactor::{Reactor, ShutdownHandle};
