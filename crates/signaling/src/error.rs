//! Fehlertypen fuer den Verbindungsdienst

use plauder_db::DbError;
use plauder_protocol::CodecError;
use thiserror::Error;

/// Fehlertyp fuer den Verbindungsdienst
///
/// Fachliche Fehler erreichen den Client als `code` in der Antwort und
/// tauchen hier nicht auf. Jede Variante beendet die Verbindung.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Frame nicht lesbar oder nicht schreibbar
    #[error("Codec-Fehler: {0}")]
    Codec(#[from] CodecError),

    /// Unerwartete Paketart oder unlesbare Pflicht-Nutzlast
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    #[error("Datenbankfehler: {0}")]
    Datenbank(#[from] DbError),
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer den Verbindungsdienst
pub type SignalingResult<T> = Result<T, SignalingError>;
