//! Client library for dwm's IPC socket
//!
//! This crate speaks the dwm-ipc patch's protocol: framed JSON messages over
//! a Unix socket. It can query monitors, tags, layouts and clients, run dwm
//! commands, and subscribe to events.
//!
//! ```ignore
//! use dwmipc::{get_socket_path, Connection};
//!
//! let mut con = Connection::connect(get_socket_path()?)?;
//! for tag in con.get_tags()? {
//!     println!("{} {}", tag.bit_mask, tag.name);
//! }
//! con.run_command("view", &[serde_json::json!(2)])?;
//! ```

mod connection;
mod error;
mod event;
mod header;
mod packet;
mod transport;
pub mod types;

pub use connection::{
    get_socket_path, Connection, ConnectionConfig, ConnectionState, EventHandler,
    DEFAULT_MAX_PAYLOAD_LEN, DEFAULT_MAX_PENDING_EVENTS, DEFAULT_SOCKET_PATH, DWM_SOCKET_ENV,
};
pub use error::{HeaderError, IpcError, ReplyError, Result};
pub use event::{Event, EventPayload};
pub use header::{Header, MessageType, HEADER_SIZE, MAGIC};
pub use packet::{GetClientArgs, Packet, RunCommandArgs, SubscribeAction, SubscribeArgs};
pub use transport::Transport;
