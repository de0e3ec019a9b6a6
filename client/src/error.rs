//! Fehlertypen des Clients

use plauder_db::DbError;
use plauder_protocol::{CodecError, ErrorCode, PacketKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame-Fehler: {0}")]
    Codec(#[from] CodecError),

    #[error("Antwort nicht lesbar: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Lokaler Speicher: {0}")]
    Datenbank(#[from] DbError),

    /// Keine Antwort innerhalb der Frist
    #[error("Zeitueberschreitung bei {}", .0.als_str())]
    Timeout(PacketKind),

    /// Verbindung wurde abgebaut, bevor eine Antwort kam
    #[error("Verbindung zum Server getrennt")]
    Getrennt,

    /// Server meldet einen bekannten Fehlercode
    #[error("Server-Fehler: {0}")]
    Server(ErrorCode),

    #[error("Unbekannter Fehlercode vom Server: {0}")]
    UnbekannterCode(i32),

    #[error("Paketart {} ist hier nicht erlaubt", .0.als_str())]
    UngueltigeArt(PacketKind),

    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    #[error("Server {adresse} nach {versuche} Versuchen nicht erreichbar")]
    VerbindungFehlgeschlagen { adresse: String, versuche: u32 },

    /// Kein gespeichertes Token fuer die automatische Anmeldung
    #[error("Nicht angemeldet")]
    NichtAngemeldet,

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl ClientError {
    /// Wertet das `code`-Feld einer Antwort aus
    pub fn code_pruefen(code: i32) -> ClientResult<()> {
        match ErrorCode::pruefen(code) {
            Ok(()) => Ok(()),
            Err(Some(c)) => Err(ClientError::Server(c)),
            Err(None) => Err(ClientError::UnbekannterCode(code)),
        }
    }

    /// Fehlercode des Servers, falls es einer ist
    pub fn server_code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Server(c) => Some(*c),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
