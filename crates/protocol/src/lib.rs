//! plauder-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert den Umschlag (`Packet`), alle Nutzlast-Typen,
//! die Fehlercodes der Fachlogik und den Frame-Codec fuer TCP.
//!
//! ## Frame-Format
//!
//! ```text
//! [u32 BE Laenge][Protobuf Packet { 1: id, 2: kind, 3: data }]
//! ```

pub mod errcode;
pub mod error;
pub mod packet;
pub mod wire;

pub use errcode::ErrorCode;
pub use error::{CodecError, CodecResult};
pub use packet::{Packet, PacketKind, PushKind};
pub use wire::FrameCodec;
