//! plauder-signaling – TCP-Verbindungsdienst
//!
//! Nimmt Client-Verbindungen an, dekodiert Frames, ruft die Fachlogik je
//! Paketart auf, verteilt Praesenz-Hinweise und stellt gespeicherte
//! Direktnachrichten zu.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung Empfangs- und Sende-Task)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- auth_handler  (SIGNUP, SIGNIN, TOKEN)
//!     +-- user_handler  (USERS)
//!     +-- chat_handler  (MSG)
//!
//! PushBus          – ONLINE/OFFLINE an alle angemeldeten Sitzungen
//! PresenceManager  – offene Verbindungen (Limit, Metriken)
//! delivery         – Abholung der Nachrichten-Warteschlange
//! ```

pub mod connection;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod push;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use connection::ClientConnection;
pub use dispatcher::{DispatcherContext, MessageDispatcher, SitzungsZustand};
pub use error::{SignalingError, SignalingResult};
pub use presence::PresenceManager;
pub use push::{PushBus, PUSH_QUEUE_KAPAZITAET};
pub use server_state::{ServerRepository, SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
