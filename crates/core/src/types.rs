//! Gemeinsame Identifikationstypen fuer Plauder
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Konto- und Sitzungs-IDs zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Konto-ID (fortlaufend vergeben von der Datenbank)
///
/// `0` steht fuer "nicht angemeldet".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AccountId(pub u64);

impl AccountId {
    /// Sentinel fuer anonyme Verbindungen
    pub const ANONYM: AccountId = AccountId(0);

    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }

    /// True fuer den Sentinel-Wert `0`
    pub fn ist_anonym(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for AccountId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "account:{}", self.0)
    }
}

/// Prozessweit eindeutige ID einer Server-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Vergibt fortlaufende Sitzungs-IDs ab 1
#[derive(Debug, Default)]
pub struct SessionIdGenerator {
    naechste: AtomicU64,
}

impl SessionIdGenerator {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn naechste(&self) -> SessionId {
        SessionId(self.naechste.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_anonym() {
        assert!(AccountId::ANONYM.ist_anonym());
        assert!(AccountId::default().ist_anonym());
        assert!(!AccountId(7).ist_anonym());
        assert_eq!(AccountId(7).to_string(), "account:7");
    }

    #[test]
    fn session_ids_fortlaufend() {
        let gen = SessionIdGenerator::neu();
        assert_eq!(gen.naechste(), SessionId(1));
        assert_eq!(gen.naechste(), SessionId(2));
        assert_eq!(gen.naechste(), SessionId(3));
    }
}
