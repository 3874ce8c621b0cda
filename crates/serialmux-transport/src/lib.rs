//! Byte stream contract consumed by the serialmux protocol engine.
//!
//! The engine never blocks: every transport reports how many bytes can be
//! read right now, reads at most that many, and writes whatever the link
//! accepts without waiting. Anything that can satisfy [`Stream`] can carry a
//! multiplexed session:
//! - [`MemoryStream`] for tests and in-process peers
//! - [`TcpStream`] for simulators and serial-to-TCP bridges
//!
//! This is the lowest layer of serialmux. Everything else builds on top of
//! the [`Stream`] trait provided here.

pub mod error;
pub mod memory;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryStream;
pub use tcp::{TcpListener, TcpStream};
pub use traits::Stream;
