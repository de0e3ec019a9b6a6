//! Zustellung gespeicherter Direktnachrichten
//!
//! Nachrichten werden abgeholt, nicht gepusht: der Sende-Task einer
//! angemeldeten Sitzung ruft `zustellen` in jedem Abfrageintervall auf.
//! `pop_messages_for` liest und loescht in einer Transaktion, jede Zeile
//! wird also hoechstens einmal zugestellt.

use futures_util::{Sink, SinkExt};
use plauder_db::{MessageRepository, QueuedMessage};
use plauder_protocol::packet::Msg;
use plauder_protocol::{CodecError, Packet, PacketKind};

use crate::error::SignalingResult;
use crate::server_state::{ServerRepository, SignalingState};

/// Wandelt eine gespeicherte Nachricht in ein MSG-Paket ohne Korrelation
pub fn als_paket(nachricht: QueuedMessage) -> Packet {
    Packet::notify(
        PacketKind::Msg,
        &Msg {
            id: nachricht.id,
            kind: nachricht.kind,
            from: nachricht.from,
            to: nachricht.to,
            data: nachricht.data,
        },
    )
}

/// Holt alle Nachrichten fuer `username` ab und schreibt sie in `ausgang`
///
/// Lesefehler der Datenbank werden geloggt und im naechsten Intervall
/// erneut versucht. Schreibfehler beenden die Verbindung.
pub async fn zustellen<R, S>(
    state: &SignalingState<R>,
    ausgang: &mut S,
    username: &str,
) -> SignalingResult<usize>
where
    R: ServerRepository,
    S: Sink<Packet, Error = CodecError> + Unpin,
{
    let nachrichten = match state.db.pop_messages_for(username).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(username = %username, fehler = %e, "Nachrichten nicht abrufbar");
            return Ok(0);
        }
    };
    if nachrichten.is_empty() {
        return Ok(0);
    }

    let anzahl = nachrichten.len();
    for nachricht in nachrichten {
        ausgang.feed(als_paket(nachricht)).await?;
    }
    ausgang.flush().await?;

    if let Some(m) = &state.metriken {
        m.messages_delivered_total.inc_by(anzahl as u64);
    }
    tracing::debug!(username = %username, anzahl, "Nachrichten zugestellt");
    Ok(anzahl)
}
