//! Fehlercodes der Fachlogik
//!
//! Werden unveraendert im `code`-Feld der Antworten uebertragen. `0`
//! bedeutet Erfolg, alle Fehler sind negativ ab `-10000`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Unmarshal = -10000,
    BcryptGen = -10001,
    AccountExists = -10002,
    ParseToken = -10003,
    TokenExpired = -10004,
    AccountNotFound = -10005,
    GenToken = -10006,
    Base64Decode = -10007,
    BcryptCompare = -10008,
    Forbidden = -10009,
    GetUsers = -10010,
}

impl ErrorCode {
    /// Alle bekannten Codes in aufsteigender Reihenfolge des Betrags
    pub const ALLE: [ErrorCode; 11] = [
        ErrorCode::Unmarshal,
        ErrorCode::BcryptGen,
        ErrorCode::AccountExists,
        ErrorCode::ParseToken,
        ErrorCode::TokenExpired,
        ErrorCode::AccountNotFound,
        ErrorCode::GenToken,
        ErrorCode::Base64Decode,
        ErrorCode::BcryptCompare,
        ErrorCode::Forbidden,
        ErrorCode::GetUsers,
    ];

    /// Wert fuer das `code`-Feld
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Liest einen Code aus dem `code`-Feld
    ///
    /// `Ok(())` fuer `0`, `Err(Some(..))` fuer bekannte Fehler und
    /// `Err(None)` fuer unbekannte Werte.
    pub fn pruefen(code: i32) -> Result<(), Option<ErrorCode>> {
        if code == 0 {
            return Ok(());
        }
        Err(Self::ALLE.into_iter().find(|c| c.code() == code))
    }

    /// Kurzbeschreibung fuer Logs und die Kommandozeile
    pub fn beschreibung(self) -> &'static str {
        match self {
            ErrorCode::Unmarshal => "Nutzlast nicht lesbar",
            ErrorCode::BcryptGen => "Passwort-Hash konnte nicht erzeugt werden",
            ErrorCode::AccountExists => "Benutzername bereits vergeben",
            ErrorCode::ParseToken => "Token ungueltig",
            ErrorCode::TokenExpired => "Token abgelaufen",
            ErrorCode::AccountNotFound => "Konto nicht gefunden",
            ErrorCode::GenToken => "Token konnte nicht erzeugt werden",
            ErrorCode::Base64Decode => "Gespeicherter Hash beschaedigt",
            ErrorCode::BcryptCompare => "Passwort falsch",
            ErrorCode::Forbidden => "Nicht angemeldet",
            ErrorCode::GetUsers => "Benutzerliste nicht verfuegbar",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.beschreibung(), self.code())
    }
}

impl From<ErrorCode> for i32 {
    fn from(c: ErrorCode) -> Self {
        c.code()
    }
}
