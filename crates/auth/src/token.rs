//! Zustandslose Sitzungs-Token
//!
//! ```text
//! token = nonce (12 Bytes) || AES-256-GCM( account_id u64 BE || ausgestellt u64 BE )
//! ```
//!
//! Der Server speichert keine Token. Gueltig ist jedes Token, das sich
//! mit dem geteilten Schluessel oeffnen laesst und nicht aelter als
//! `TOKEN_GUELTIGKEIT_SEK` ist.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use plauder_core::AccountId;
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AuthError, AuthResult};

/// 30 Tage
pub const TOKEN_GUELTIGKEIT_SEK: u64 = 30 * 24 * 60 * 60;

const NONCE_LAENGE: usize = 12;
const KLARTEXT_LAENGE: usize = 16;

/// Inhalt eines geoeffneten Tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInhalt {
    pub account_id: AccountId,
    /// Unix-Sekunden
    pub ausgestellt: u64,
}

/// Stellt Token aus und prueft sie
#[derive(Clone)]
pub struct TokenService {
    cipher: Aes256Gcm,
}

impl TokenService {
    pub fn neu(schluessel: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(schluessel)),
        }
    }

    /// Schluessel aus 64 Hex-Zeichen
    pub fn aus_hex(hex_schluessel: &str) -> AuthResult<Self> {
        let roh = hex::decode(hex_schluessel.trim())
            .map_err(|e| AuthError::SchluesselUngueltig(e.to_string()))?;
        let schluessel: [u8; 32] = roh.try_into().map_err(|roh: Vec<u8>| {
            AuthError::SchluesselUngueltig(format!("32 Bytes erwartet, {} erhalten", roh.len()))
        })?;
        Ok(Self::neu(&schluessel))
    }

    /// Stellt ein Token mit aktuellem Zeitstempel aus
    pub fn ausstellen(&self, account_id: AccountId) -> AuthResult<Vec<u8>> {
        self.ausstellen_zu(account_id, jetzt_sek())
    }

    /// Stellt ein Token mit vorgegebenem Zeitstempel aus
    pub fn ausstellen_zu(&self, account_id: AccountId, ausgestellt: u64) -> AuthResult<Vec<u8>> {
        let mut klartext = [0u8; KLARTEXT_LAENGE];
        klartext[..8].copy_from_slice(&account_id.inner().to_be_bytes());
        klartext[8..].copy_from_slice(&ausgestellt.to_be_bytes());

        let mut nonce = [0u8; NONCE_LAENGE];
        rand::rng().fill_bytes(&mut nonce);

        let chiffrat = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), klartext.as_slice())
            .map_err(|e| AuthError::TokenErzeugung(e.to_string()))?;

        let mut token = Vec::with_capacity(NONCE_LAENGE + chiffrat.len());
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&chiffrat);
        Ok(token)
    }

    /// Oeffnet ein Token ohne Ablaufpruefung
    pub fn oeffnen(&self, token: &[u8]) -> AuthResult<TokenInhalt> {
        if token.len() < NONCE_LAENGE {
            return Err(AuthError::TokenUngueltig);
        }
        let (nonce, chiffrat) = token.split_at(NONCE_LAENGE);

        let klartext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), chiffrat)
            .map_err(|_| AuthError::TokenUngueltig)?;
        if klartext.len() != KLARTEXT_LAENGE {
            return Err(AuthError::TokenUngueltig);
        }

        let mut id = [0u8; 8];
        let mut zeit = [0u8; 8];
        id.copy_from_slice(&klartext[..8]);
        zeit.copy_from_slice(&klartext[8..]);

        Ok(TokenInhalt {
            account_id: AccountId(u64::from_be_bytes(id)),
            ausgestellt: u64::from_be_bytes(zeit),
        })
    }

    /// Oeffnet ein Token und prueft die Gueltigkeit zum Zeitpunkt `jetzt`
    pub fn pruefen(&self, token: &[u8], jetzt: u64) -> AuthResult<AccountId> {
        let inhalt = self.oeffnen(token)?;
        if jetzt.saturating_sub(inhalt.ausgestellt) > TOKEN_GUELTIGKEIT_SEK {
            return Err(AuthError::TokenAbgelaufen);
        }
        Ok(inhalt.account_id)
    }
}

/// Aktuelle Unix-Zeit in Sekunden
pub fn jetzt_sek() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHLUESSEL_HEX: &str =
        "3e367a60ddc0699ea2f486717d5dcd174c4dee0bcf1855065ab74c348e550b78";

    fn service() -> TokenService {
        TokenService::aus_hex(SCHLUESSEL_HEX).expect("Schluessel muss gueltig sein")
    }

    #[test]
    fn ausstellen_und_pruefen() {
        let s = service();
        let token = s.ausstellen(AccountId(42)).unwrap();
        assert_eq!(token.len(), 12 + 16 + 16);
        assert_eq!(s.pruefen(&token, jetzt_sek()).unwrap(), AccountId(42));
    }

    #[test]
    fn jedes_token_ist_anders() {
        let s = service();
        let t1 = s.ausstellen_zu(AccountId(1), 1000).unwrap();
        let t2 = s.ausstellen_zu(AccountId(1), 1000).unwrap();
        assert_ne!(t1, t2, "Zufaellige Nonce muss unterschiedliche Token erzeugen");
        assert_eq!(s.oeffnen(&t1).unwrap(), s.oeffnen(&t2).unwrap());
    }

    #[test]
    fn abgelaufenes_token() {
        let s = service();
        let jetzt = jetzt_sek();
        let alt = s
            .ausstellen_zu(AccountId(7), jetzt - TOKEN_GUELTIGKEIT_SEK - 1)
            .unwrap();
        assert!(matches!(s.pruefen(&alt, jetzt), Err(AuthError::TokenAbgelaufen)));

        let grenzwertig = s
            .ausstellen_zu(AccountId(7), jetzt - TOKEN_GUELTIGKEIT_SEK)
            .unwrap();
        assert_eq!(s.pruefen(&grenzwertig, jetzt).unwrap(), AccountId(7));
    }

    #[test]
    fn manipuliertes_token_ist_ungueltig() {
        let s = service();
        let mut token = s.ausstellen(AccountId(3)).unwrap();
        let letztes = token.len() - 1;
        token[letztes] ^= 0x01;
        assert!(matches!(s.oeffnen(&token), Err(AuthError::TokenUngueltig)));
    }

    #[test]
    fn zu_kurzes_token_ist_ungueltig() {
        let s = service();
        assert!(matches!(s.oeffnen(&[1, 2, 3]), Err(AuthError::TokenUngueltig)));
        assert!(matches!(s.oeffnen(&[]), Err(AuthError::TokenUngueltig)));
    }

    #[test]
    fn fremder_schluessel_ist_ungueltig() {
        let token = service().ausstellen(AccountId(3)).unwrap();
        let fremd = TokenService::neu(&[9u8; 32]);
        assert!(matches!(fremd.oeffnen(&token), Err(AuthError::TokenUngueltig)));
    }

    #[test]
    fn schluessel_validierung() {
        assert!(TokenService::aus_hex("zz").is_err());
        assert!(TokenService::aus_hex("abcd").is_err());
        assert!(TokenService::aus_hex(&"00".repeat(32)).is_ok());
    }
}
