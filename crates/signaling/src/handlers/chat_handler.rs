//! Chat-Handler – MSG
//!
//! Direktnachrichten werden nur gespeichert. Die Zustellung uebernimmt der
//! Sende-Task des Empfaengers beim naechsten Abfrageintervall.

use chrono::Utc;
use plauder_db::QueuedMessage;
use plauder_protocol::packet::Msg;
use plauder_protocol::ErrorCode;

use crate::dispatcher::SitzungsZustand;
use crate::error::SignalingResult;
use crate::server_state::{ServerRepository, SignalingState};

/// Speichert eine Direktnachricht
///
/// `Ok(Err(code))` ist ein fachlicher Fehler fuer den Absender,
/// `Err` ein Speicherfehler, der die Verbindung beendet.
pub async fn handle_msg<R: ServerRepository>(
    request: Msg,
    sitzung: &SitzungsZustand,
    state: &SignalingState<R>,
) -> SignalingResult<Result<i64, ErrorCode>> {
    if !sitzung.ist_angemeldet() {
        return Ok(Err(ErrorCode::Forbidden));
    }

    let nachricht = QueuedMessage {
        id: state.nachrichten_ids.erzeugen(),
        kind: request.kind,
        // Absender ist immer die Sitzung, nie das Feld aus der Anfrage
        from: sitzung.username.clone(),
        to: request.to,
        data: request.data,
        created_at: Utc::now(),
    };
    state.db.new_message(&nachricht).await?;

    if let Some(m) = &state.metriken {
        m.messages_queued_total.inc();
    }
    tracing::debug!(
        id = nachricht.id,
        from = %nachricht.from,
        to = %nachricht.to,
        "Nachricht gespeichert"
    );
    Ok(Ok(nachricht.id))
}
