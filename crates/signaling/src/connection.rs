//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Pro Verbindung laufen zwei Tasks:
//!
//! ```text
//! Empfangs-Task:  FramedRead -> MessageDispatcher -> Antwort-Queue
//!                        |  besitzt den DispatcherContext (Sitzung)
//!                        v  watch<SitzungsZustand>
//! Sende-Task:     Antwort-Queue + Push-Queue + 100 ms Nachrichtenabfrage
//!                        -> FramedWrite
//! ```
//!
//! Endet einer der beiden Tasks, wird die Verbindung abgebaut. War die
//! Sitzung angemeldet, wird sie vom Push-Bus abgemeldet, das Konto offline
//! gesetzt und OFFLINE veroeffentlicht.

use futures_util::{SinkExt, StreamExt};
use plauder_protocol::packet::Push;
use plauder_protocol::{wire::FrameCodec, Packet, PacketKind};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::delivery;
use crate::dispatcher::{DispatcherContext, MessageDispatcher, SitzungsZustand};
use crate::error::SignalingResult;
use crate::server_state::{ServerRepository, SignalingState};

/// Groesse der Antwort-Queue zwischen Empfangs- und Sende-Task
const ANTWORT_QUEUE_GROESSE: usize = 64;

/// Wartezeit auf den Sende-Task beim Abbau
const ABBAU_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne Verbindung
pub struct ClientConnection<R: ServerRepository> {
    state: Arc<SignalingState<R>>,
    peer_addr: SocketAddr,
}

impl<R: ServerRepository> ClientConnection<R> {
    pub fn neu(state: Arc<SignalingState<R>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht
    pub async fn verarbeiten<S>(self, stream: S, mut shutdown_rx: watch::Receiver<bool>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let state = self.state;
        let peer_addr = self.peer_addr;
        let session_id = state.session_ids.naechste();

        state.presence.verbunden(session_id, peer_addr);
        state.gauges_aktualisieren();
        tracing::info!(peer = %peer_addr, session_id = %session_id, "Neue Verbindung");

        let codec = FrameCodec::with_max_size(state.config.max_frame_groesse);
        let (leser, schreiber) = tokio::io::split(stream);
        let mut eingang = FramedRead::new(leser, codec.clone());
        let ausgang = FramedWrite::new(schreiber, codec);

        let (antwort_tx, antwort_rx) = mpsc::channel::<Packet>(ANTWORT_QUEUE_GROESSE);
        let (push_tx, push_rx) = mpsc::channel::<Push>(state.config.push_queue);
        let (mut ctx, sitzung_rx) = DispatcherContext::neu(session_id, peer_addr, push_tx);

        let mut sende_task = tokio::spawn(sende_schleife(
            Arc::clone(&state),
            ausgang,
            antwort_rx,
            push_rx,
            sitzung_rx,
        ));
        let mut sende_task_beendet = false;

        let dispatcher = MessageDispatcher::neu(Arc::clone(&state));

        loop {
            tokio::select! {
                // Eingehendes Paket vom Client
                frame = eingang.next() => {
                    match frame {
                        Some(Ok(packet)) => match dispatcher.dispatch(packet, &mut ctx).await {
                            Ok(Some(antwort)) => {
                                if antwort_tx.send(antwort).await.is_err() {
                                    tracing::debug!(peer = %peer_addr, "Antwort-Queue geschlossen");
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(peer = %peer_addr, fehler = %e, "Verbindung wird getrennt");
                                if let Some(m) = &state.metriken {
                                    m.protocol_faults_total.inc();
                                }
                                break;
                            }
                        },
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                            if let Some(m) = &state.metriken {
                                m.protocol_faults_total.inc();
                            }
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Sende-Task hat aufgegeben (Schreibfehler)
                ergebnis = &mut sende_task, if !sende_task_beendet => {
                    sende_task_beendet = true;
                    match ergebnis {
                        Ok(Ok(())) => tracing::debug!(peer = %peer_addr, "Sende-Task beendet"),
                        Ok(Err(e)) => tracing::info!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen"),
                        Err(e) => tracing::error!(peer = %peer_addr, fehler = %e, "Sende-Task abgebrochen"),
                    }
                    break;
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende
        dispatcher.abmelden(&mut ctx).await;
        drop(ctx);
        drop(antwort_tx);

        if !sende_task_beendet {
            match tokio::time::timeout(ABBAU_TIMEOUT, &mut sende_task).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::debug!(peer = %peer_addr, "Sende-Task haengt – wird abgebrochen");
                    sende_task.abort();
                }
            }
        }

        state.presence.getrennt(session_id);
        state.gauges_aktualisieren();
        tracing::info!(peer = %peer_addr, session_id = %session_id, "Verbindungs-Task beendet");
    }
}

// ---------------------------------------------------------------------------
// Sende-Task
// ---------------------------------------------------------------------------

/// Schreibt Antworten, Praesenz-Hinweise und abgeholte Nachrichten
///
/// Endet regulaer, wenn die Antwort-Queue geschlossen wird.
async fn sende_schleife<R, W>(
    state: Arc<SignalingState<R>>,
    mut ausgang: FramedWrite<W, FrameCodec>,
    mut antworten: mpsc::Receiver<Packet>,
    mut pushes: mpsc::Receiver<Push>,
    sitzung: watch::Receiver<SitzungsZustand>,
) -> SignalingResult<()>
where
    R: ServerRepository,
    W: AsyncWrite + Send + Unpin,
{
    let mut abfrage = tokio::time::interval(state.config.poll_intervall);
    abfrage.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            antwort = antworten.recv() => {
                match antwort {
                    Some(packet) => ausgang.send(packet).await?,
                    None => break,
                }
            }

            Some(push) = pushes.recv() => {
                if ist_eigener_hinweis(&sitzung.borrow(), &push) {
                    continue;
                }
                ausgang.send(Packet::notify(PacketKind::Push, &push)).await?;
            }

            _ = abfrage.tick() => {
                let username = {
                    let s = sitzung.borrow();
                    s.ist_angemeldet().then(|| s.username.clone())
                };
                if let Some(username) = username {
                    delivery::zustellen(&state, &mut ausgang, &username).await?;
                }
            }
        }
    }

    Ok(())
}

/// Eigene ONLINE/OFFLINE-Hinweise erhaelt eine Sitzung nicht
fn ist_eigener_hinweis(sitzung: &SitzungsZustand, push: &Push) -> bool {
    sitzung.ist_angemeldet() && push.username() == Some(sitzung.username.as_str())
}
