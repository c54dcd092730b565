//! Application layer use cases for the client.
//!
//! # What lives here?
//!
//! - **`protocol`** – The [`CubeProtocol`](protocol::CubeProtocol) capability
//!   trait shared by both device families, and the factory that picks an
//!   adapter for a detected model.
//!
//! - **`qiyi`** / **`moyu32`** – The two adapters.  Each owns its cipher
//!   state, builds its handshake, dispatches inbound opcodes, and keeps the
//!   per-connection reconciliation state.  They are synchronous and do no
//!   I/O: outbound frames are returned to the caller, which writes them.
//!
//! - **`move_sink`** – Where reconciled moves go.

pub mod move_sink;
pub mod moyu32;
pub mod protocol;
pub mod qiyi;
