//! plauder-client – Client-Bibliothek
//!
//! ```text
//! Oberflaeche ──► ClientSitzung ──► Poster ──► Anfrage-Queue (1024)
//!                                                   │
//! ReconnectManager ── pro Verbindung ──► Multiplexer ──► FramedWrite
//!                                  └──► receiver   ◄── FramedRead
//!                                          │
//!                                          └──► LocalStore (Posteingang, Push)
//! ```

pub mod config;
pub mod error;
pub mod multiplexer;
pub mod poster;
pub mod receiver;
pub mod reconnect;
pub mod session;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use multiplexer::{Anfrage, MultiplexStatus, Multiplexer, Response};
pub use poster::Poster;
pub use receiver::ClientEreignis;
pub use reconnect::{ReconnectManager, VerbindungsStatus};
pub use session::{passhash, Anmeldedaten, BenutzerEintrag, ClientSitzung};
