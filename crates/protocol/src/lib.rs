//! Wire types for the You.i Engine command socket.
//!
//! This crate contains the data that crosses process boundaries:
//!
//! - **Capabilities**: the desired-capabilities document a session is created from
//! - **Commands**: the JSON `action` envelope written to the socket and its reply
//! - **Framing**: newline-terminated requests and `youiend`-terminated responses
//!
//! Types here carry no I/O. The socket itself lives in `youi-runtime`.

pub mod capabilities;
pub mod command;
pub mod framing;

pub use capabilities::*;
pub use command::*;
pub use framing::*;
