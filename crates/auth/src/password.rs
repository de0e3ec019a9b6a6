//! Passwort-Hashing mit bcrypt
//!
//! Gehasht wird der vom Client gesendete `passhash` (SHA-256 des
//! Klartexts). Der bcrypt-String wird base64-kodiert in der Spalte
//! `accounts.password_hash` abgelegt.
//!
//! bcrypt ist CPU-intensiv; Aufrufer im async-Kontext verwenden
//! `tokio::task::spawn_blocking`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{AuthError, AuthResult};

/// bcrypt-Kostenfaktor im Betrieb
pub const BCRYPT_COST: u32 = 14;

/// bcrypt mit konfigurierbarem Kostenfaktor
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    kosten: u32,
}

impl PasswordHasher {
    pub fn neu() -> Self {
        Self {
            kosten: BCRYPT_COST,
        }
    }

    /// Eigener Kostenfaktor (bcrypt erlaubt 4..=31)
    pub fn mit_kosten(kosten: u32) -> Self {
        Self { kosten }
    }

    pub fn kosten(&self) -> u32 {
        self.kosten
    }

    /// Hasht `passhash` und liefert den base64-kodierten bcrypt-String
    pub fn hashen(&self, passhash: &[u8]) -> AuthResult<String> {
        let hash = bcrypt::hash(passhash, self.kosten)
            .map_err(|e| AuthError::PasswortHashing(e.to_string()))?;
        Ok(BASE64.encode(hash))
    }

    /// Prueft `passhash` gegen den gespeicherten, base64-kodierten Hash
    ///
    /// `Ok(false)` bei falschem Passwort, `Err` bei beschaedigtem Hash.
    pub fn verifizieren(&self, passhash: &[u8], gespeichert: &str) -> AuthResult<bool> {
        let roh = BASE64
            .decode(gespeichert)
            .map_err(|e| AuthError::HashKodierung(e.to_string()))?;
        let hash =
            String::from_utf8(roh).map_err(|e| AuthError::HashKodierung(e.to_string()))?;

        bcrypt::verify(passhash, &hash).map_err(|e| AuthError::PasswortVergleich(e.to_string()))
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::neu()
    }
}
