//! Auth-Service fuer Plauder
//!
//! Registrierung, Anmeldung per Passwort und Anmeldung per Token. Jeder
//! Erfolg liefert ein frisch ausgestelltes Token (gleitender Ablauf).

use std::sync::Arc;

use plauder_core::AccountId;
use plauder_db::{AccountRecord, AccountRepository, NeuesKonto};

use crate::error::{AuthError, AuthResult};
use crate::password::PasswordHasher;
use crate::token::{jetzt_sek, TokenService};

/// Ergebnis einer erfolgreichen Authentifizierung
#[derive(Debug, Clone)]
pub struct Anmeldung {
    pub konto: AccountRecord,
    pub token: Vec<u8>,
}

/// Zentraler Einstiegspunkt fuer alle Authentifizierungsvorgaenge
pub struct AuthService<R: AccountRepository> {
    konten: Arc<R>,
    tokens: TokenService,
    hasher: PasswordHasher,
}

impl<R: AccountRepository> AuthService<R> {
    pub fn neu(konten: Arc<R>, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self {
            konten,
            tokens,
            hasher,
        }
    }

    /// Legt ein Konto an und stellt das erste Token aus
    pub async fn registrieren(&self, username: &str, passhash: &[u8]) -> AuthResult<Anmeldung> {
        let hasher = self.hasher;
        let passhash = passhash.to_vec();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hashen(&passhash))
            .await
            .map_err(|e| AuthError::intern(format!("Hash-Task abgebrochen: {e}")))??;

        let konto = self
            .konten
            .new_account(NeuesKonto {
                username,
                password_hash: &password_hash,
            })
            .await
            .map_err(|e| {
                if e.ist_eindeutigkeit() {
                    AuthError::KontoExistiert(username.to_string())
                } else {
                    AuthError::Datenbank(e)
                }
            })?;

        tracing::info!(
            account_id = %konto.id,
            username = %konto.username,
            "Neues Konto registriert"
        );

        self.token_fuer(konto)
    }

    /// Prueft Benutzername und `passhash`
    pub async fn anmelden(&self, username: &str, passhash: &[u8]) -> AuthResult<Anmeldung> {
        let konto = self
            .konten
            .get_account_by_username(username)
            .await?
            .ok_or_else(|| AuthError::KontoNichtGefunden(username.to_string()))?;

        let hasher = self.hasher;
        let passhash = passhash.to_vec();
        let gespeichert = konto.password_hash.clone();
        let korrekt =
            tokio::task::spawn_blocking(move || hasher.verifizieren(&passhash, &gespeichert))
                .await
                .map_err(|e| AuthError::intern(format!("Vergleichs-Task abgebrochen: {e}")))??;

        if !korrekt {
            tracing::warn!(username = %username, "Fehlgeschlagene Anmeldung");
            return Err(AuthError::FalschesPasswort);
        }

        self.token_fuer(konto)
    }

    /// Meldet per Token an und stellt ein neues Token aus
    pub async fn token_anmelden(&self, token: &[u8]) -> AuthResult<Anmeldung> {
        let account_id = self.tokens.pruefen(token, jetzt_sek())?;
        let konto = self.konto_laden(account_id).await?;
        self.token_fuer(konto)
    }

    async fn konto_laden(&self, id: AccountId) -> AuthResult<AccountRecord> {
        self.konten
            .get_account_by_id(id)
            .await?
            .ok_or_else(|| AuthError::KontoNichtGefunden(id.to_string()))
    }

    fn token_fuer(&self, konto: AccountRecord) -> AuthResult<Anmeldung> {
        let token = self.tokens.ausstellen(konto.id)?;
        Ok(Anmeldung { konto, token })
    }

    /// Zugriff auf den Token-Service (z.B. fuer Tests)
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}
