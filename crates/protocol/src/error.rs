//! Fehlertypen fuer den Frame-Codec
//!
//! Jeder `CodecError` ist ein Protokollfehler im Sinne der Verbindung:
//! wer ihn sieht, baut die Verbindung ab.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    /// IO-Fehler beim Lesen oder Schreiben
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Protobuf-Serialisierung fehlgeschlagen
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Encode(#[from] prost::EncodeError),

    /// Protobuf-Deserialisierung fehlgeschlagen
    #[error("Deserialisierung fehlgeschlagen: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Frame ueberschreitet das konfigurierte Maximum
    #[error("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    FrameTooLarge { laenge: usize, maximum: usize },

    /// Stream endete mitten in einem Frame
    #[error("Stream endete mit {rest} Bytes eines unvollstaendigen Frames")]
    TruncatedStream { rest: usize },
}

/// Result-Typ fuer den Frame-Codec
pub type CodecResult<T> = Result<T, CodecError>;
