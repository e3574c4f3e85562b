//! Armory Netcode - client prediction and authority validation
//!
//! This crate puts `armory-core`'s state machine on both ends of a
//! connection:
//!
//! - **Prediction**: the client applies a reload locally, keeps the prior
//!   state, and rolls back on rejection or timeout
//! - **Authority**: the owning peer re-validates every request against its
//!   own state, including which magazines exist, and answers `Confirmed` or
//!   `Rejected`
//! - **Protocol**: requests, replies and snapshots, encoded with bincode
//! - **Transport**: a reliable connection trait and an in-process channel
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐   Request(id)    ┌──────────────────────────┐
//! │ PredictionCoordinator    │ ───────────────▶ │ AuthorityGateway         │
//! │  MagazineStateMachine    │                  │  MagazineStateMachine    │
//! │  QuickSlots              │ ◀─────────────── │  QuickSlots              │
//! │  PredictionRecord (1)    │  Reply / Snapshot│  Inventory               │
//! └──────────────────────────┘                  └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let (client_end, server_end) = LocalChannel::pair();
//!
//! let prediction = client.predict_start_reload(request, now)?;
//! client.send(&client_end, &prediction.envelope)?;
//!
//! authority.serve(&server_end, now)?;
//! for outcome in client.poll(&client_end)? {
//!     // Confirmed, RolledBack, ...
//! }
//! ```

mod authority;
mod error;
mod prediction;
mod protocol;
mod stowage;
mod transport;

pub use authority::AuthorityGateway;
pub use error::{Error, Result};
pub use prediction::{Prediction, PredictionCoordinator, PredictionRecord, ReplyOutcome};
pub use protocol::{Packet, PredictionKey, Reply, Request, RequestEnvelope, RequestId};
pub use stowage::SlotEntry;
pub use transport::{recv_packet, send_packet, ChannelError, Connection, LocalChannel};
