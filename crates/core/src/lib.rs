//! plauder-core – Gemeinsame Typen und ID-Generatoren
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Plauder-Crates gemeinsam genutzt werden.

pub mod snowflake;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use snowflake::SnowflakeGenerator;
pub use types::{AccountId, SessionId, SessionIdGenerator};
