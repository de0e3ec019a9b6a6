//! Fehlertypen fuer den Auth-Service

use thiserror::Error;

/// Alle moeglichen Fehler im Auth-Service
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Passwort ---
    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    #[error("Gespeicherter Hash nicht dekodierbar: {0}")]
    HashKodierung(String),

    #[error("Passwort-Vergleich fehlgeschlagen: {0}")]
    PasswortVergleich(String),

    #[error("Passwort falsch")]
    FalschesPasswort,

    // --- Konten ---
    #[error("Benutzername bereits vergeben: {0}")]
    KontoExistiert(String),

    #[error("Konto nicht gefunden: {0}")]
    KontoNichtGefunden(String),

    // --- Token ---
    #[error("Token ungueltig")]
    TokenUngueltig,

    #[error("Token abgelaufen")]
    TokenAbgelaufen,

    #[error("Token-Erzeugung fehlgeschlagen: {0}")]
    TokenErzeugung(String),

    #[error("Geheimer Schluessel ungueltig: {0}")]
    SchluesselUngueltig(String),

    // --- Datenbank ---
    #[error("Datenbankfehler: {0}")]
    Datenbank(#[from] plauder_db::DbError),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Alias fuer den Auth-Service
pub type AuthResult<T> = Result<T, AuthError>;
