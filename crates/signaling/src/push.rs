//! Push-Bus – Verteilt Praesenz-Hinweise an alle angemeldeten Sitzungen
//!
//! Ein einzelner Actor-Task besitzt die Zuordnung `SessionId -> PushSink`.
//! Alle Aenderungen laufen ueber eine Mailbox, der Actor wartet nie auf
//! eine einzelne Sitzung.
//!
//! ## Rueckstau
//! Jede Sitzung hat eine begrenzte Queue (`PUSH_QUEUE_KAPAZITAET`). Ist sie
//! voll, wird der neue Hinweis fuer diese Sitzung verworfen (drop-newest).
//! Geschlossene Queues werden aus dem Register entfernt.
//!
//! Die Unterdrueckung eigener ONLINE/OFFLINE-Hinweise erfolgt beim
//! Empfaenger (Sende-Task der Verbindung).

use plauder_core::SessionId;
use plauder_protocol::packet::Push;
use prometheus::IntCounter;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

/// Kapazitaet der Push-Queue pro Sitzung
pub const PUSH_QUEUE_KAPAZITAET: usize = 1024;

const MAILBOX_GROESSE: usize = 1024;

/// Sende-Ende der Push-Queue einer Sitzung
pub type PushSink = mpsc::Sender<Push>;

/// Erstellt eine Push-Queue mit Standardkapazitaet
pub fn push_queue() -> (PushSink, mpsc::Receiver<Push>) {
    mpsc::channel(PUSH_QUEUE_KAPAZITAET)
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

enum Befehl {
    Registrieren {
        session_id: SessionId,
        username: String,
        sink: PushSink,
    },
    Abmelden {
        session_id: SessionId,
    },
    Veroeffentlichen(Push),
    Anzahl(oneshot::Sender<usize>),
}

struct Eintrag {
    username: String,
    sink: PushSink,
}

// ---------------------------------------------------------------------------
// PushBus
// ---------------------------------------------------------------------------

/// Handle auf den Push-Actor. Clone ist billig.
#[derive(Clone)]
pub struct PushBus {
    mailbox: mpsc::Sender<Befehl>,
}

impl PushBus {
    /// Startet den Actor-Task
    pub fn starten() -> Self {
        Self::starten_mit(None)
    }

    /// Startet den Actor-Task und zaehlt verworfene Hinweise in `verworfen`
    pub fn starten_mit(verworfen: Option<IntCounter>) -> Self {
        let (mailbox, rx) = mpsc::channel(MAILBOX_GROESSE);
        tokio::spawn(actor(rx, verworfen));
        Self { mailbox }
    }

    pub async fn registrieren(&self, session_id: SessionId, username: &str, sink: PushSink) {
        self.senden(Befehl::Registrieren {
            session_id,
            username: username.to_string(),
            sink,
        })
        .await;
    }

    pub async fn abmelden(&self, session_id: SessionId) {
        self.senden(Befehl::Abmelden { session_id }).await;
    }

    pub async fn veroeffentlichen(&self, push: Push) {
        self.senden(Befehl::Veroeffentlichen(push)).await;
    }

    /// Anzahl registrierter Sitzungen
    pub async fn sitzungen(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.senden(Befehl::Anzahl(tx)).await;
        rx.await.unwrap_or(0)
    }

    async fn senden(&self, befehl: Befehl) {
        if self.mailbox.send(befehl).await.is_err() {
            tracing::warn!("Push-Bus beendet – Befehl verworfen");
        }
    }
}

async fn actor(mut rx: mpsc::Receiver<Befehl>, verworfen: Option<IntCounter>) {
    let mut sitzungen: HashMap<SessionId, Eintrag> = HashMap::new();

    while let Some(befehl) = rx.recv().await {
        match befehl {
            Befehl::Registrieren {
                session_id,
                username,
                sink,
            } => {
                tracing::debug!(session_id = %session_id, username = %username, "Push-Sitzung registriert");
                sitzungen.insert(session_id, Eintrag { username, sink });
            }
            Befehl::Abmelden { session_id } => {
                if sitzungen.remove(&session_id).is_some() {
                    tracing::debug!(session_id = %session_id, "Push-Sitzung abgemeldet");
                }
            }
            Befehl::Veroeffentlichen(push) => {
                sitzungen.retain(|session_id, eintrag| {
                    match eintrag.sink.try_send(push.clone()) {
                        Ok(()) => true,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::warn!(
                                session_id = %session_id,
                                username = %eintrag.username,
                                "Push-Queue voll – Hinweis verworfen"
                            );
                            if let Some(zaehler) = &verworfen {
                                zaehler.inc();
                            }
                            true
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            tracing::debug!(session_id = %session_id, "Push-Queue geschlossen – Sitzung entfernt");
                            false
                        }
                    }
                });
            }
            Befehl::Anzahl(antwort) => {
                let _ = antwort.send(sitzungen.len());
            }
        }
    }

    tracing::debug!("Push-Bus beendet");
}

#[cfg(test)]
mod tests {
    use super::*;
    use plauder_protocol::PushKind;

    #[tokio::test]
    async fn verteilt_an_alle_sitzungen() {
        let bus = PushBus::starten();
        let (tx_a, mut rx_a) = push_queue();
        let (tx_b, mut rx_b) = push_queue();

        bus.registrieren(SessionId(1), "alice", tx_a).await;
        bus.registrieren(SessionId(2), "bob", tx_b).await;
        bus.veroeffentlichen(Push::praesenz(PushKind::Online, "carol")).await;

        assert_eq!(rx_a.recv().await.unwrap().username(), Some("carol"));
        assert_eq!(rx_b.recv().await.unwrap().username(), Some("carol"));
        assert_eq!(bus.sitzungen().await, 2);
    }

    #[tokio::test]
    async fn abgemeldete_sitzung_erhaelt_nichts() {
        let bus = PushBus::starten();
        let (tx, mut rx) = push_queue();

        bus.registrieren(SessionId(1), "alice", tx).await;
        bus.abmelden(SessionId(1)).await;
        bus.veroeffentlichen(Push::praesenz(PushKind::Offline, "bob")).await;

        assert_eq!(bus.sitzungen().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn geschlossene_queue_wird_entfernt() {
        let bus = PushBus::starten();
        let (tx, rx) = push_queue();
        bus.registrieren(SessionId(5), "weg", tx).await;
        drop(rx);

        bus.veroeffentlichen(Push::praesenz(PushKind::Online, "x")).await;
        assert_eq!(bus.sitzungen().await, 0);
    }

    #[tokio::test]
    async fn volle_queue_verwirft_neueste() {
        let zaehler = IntCounter::new("test_verworfen", "Test").unwrap();
        let bus = PushBus::starten_mit(Some(zaehler.clone()));
        let (tx, mut rx) = mpsc::channel(1);
        bus.registrieren(SessionId(1), "langsam", tx).await;

        bus.veroeffentlichen(Push::praesenz(PushKind::Online, "erster")).await;
        bus.veroeffentlichen(Push::praesenz(PushKind::Online, "zweiter")).await;

        // Sitzung bleibt registriert, nur der zweite Hinweis fehlt
        assert_eq!(bus.sitzungen().await, 1);
        assert_eq!(zaehler.get(), 1);
        assert_eq!(rx.recv().await.unwrap().username(), Some("erster"));
        assert!(rx.try_recv().is_err());
    }
}
