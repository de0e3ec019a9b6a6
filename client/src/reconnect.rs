//! Verbindungsaufbau mit exponentiellem Backoff
//!
//! Zustaende: `Getrennt -> Verbindet -> Verbunden -> Getrennt`, beobachtbar
//! ueber einen `watch`-Kanal. Pro Verbindung laufen ein Empfangs-Task und
//! der Multiplexer. Endet die Empfangsseite, wird neu verbunden. Auf der
//! neuen Verbindung geht das gespeicherte Token als erste Anfrage raus,
//! vor allem, was sich waehrend der Trennung angestaut hat.

use plauder_db::models::schluessel;
use plauder_db::LocalStore;
use plauder_protocol::packet::{Token, TokenRes};
use plauder_protocol::wire::FrameCodec;
use plauder_protocol::{Packet, PacketKind};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::{ClientError, ClientResult};
use crate::multiplexer::{Anfrage, MultiplexStatus, Multiplexer, Response};
use crate::poster;
use crate::receiver::{self, ClientEreignis, EREIGNIS_KAPAZITAET};
use crate::session;

/// Maximale Anzahl Verbindungsversuche
pub const MAX_VERSUCHE: u32 = 15;
/// Frist je Verbindungsversuch
pub const WAEHL_TIMEOUT: Duration = Duration::from_secs(3);
/// Obergrenze der Wartezeit zwischen zwei Versuchen
pub const MAX_WARTEZEIT_MS: u64 = 8000;
/// Obere Grenze (exklusiv) des Zufallsanteils
pub const JITTER_MS: u64 = 1000;

/// Kapazitaet der Queue zwischen Empfangs-Task und Multiplexer
const ANTWORT_QUEUE_GROESSE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsStatus {
    Getrennt,
    Verbindet,
    Verbunden,
}

/// Wartezeit nach dem fehlgeschlagenen Versuch `versuch` (ab 0)
pub fn wartezeit(versuch: u32, jitter_ms: u64) -> Duration {
    let basis = 1u64.checked_shl(versuch).unwrap_or(u64::MAX);
    Duration::from_millis(basis.saturating_add(jitter_ms).min(MAX_WARTEZEIT_MS))
}

// ---------------------------------------------------------------------------
// ReconnectManager
// ---------------------------------------------------------------------------

pub struct ReconnectManager<L: LocalStore + 'static> {
    adresse: String,
    store: Arc<L>,
    max_frame_groesse: usize,
    status: watch::Sender<VerbindungsStatus>,
    ereignisse: broadcast::Sender<ClientEreignis>,
}

impl<L: LocalStore + 'static> ReconnectManager<L> {
    pub fn neu(adresse: impl Into<String>, store: Arc<L>, max_frame_groesse: usize) -> Self {
        let (status, _) = watch::channel(VerbindungsStatus::Getrennt);
        let (ereignisse, _) = broadcast::channel(EREIGNIS_KAPAZITAET);
        Self {
            adresse: adresse.into(),
            store,
            max_frame_groesse,
            status,
            ereignisse,
        }
    }

    pub fn status(&self) -> watch::Receiver<VerbindungsStatus> {
        self.status.subscribe()
    }

    pub fn ereignisse(&self) -> broadcast::Receiver<ClientEreignis> {
        self.ereignisse.subscribe()
    }

    /// Waehlt den Server an, bis es klappt oder die Versuche aufgebraucht
    /// sind
    ///
    /// `Ok(None)` bedeutet: Shutdown waehrend des Verbindens.
    pub async fn verbinden(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ClientResult<Option<TcpStream>> {
        self.status.send_replace(VerbindungsStatus::Verbindet);

        for versuch in 0..MAX_VERSUCHE {
            if *shutdown.borrow() {
                return Ok(None);
            }

            let waehlen = tokio::time::timeout(WAEHL_TIMEOUT, TcpStream::connect(&self.adresse));
            let ergebnis = tokio::select! {
                r = waehlen => r,
                _ = shutdown.changed() => return Ok(None),
            };
            match ergebnis {
                Ok(Ok(stream)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(fehler = %e, "TCP_NODELAY nicht gesetzt");
                    }
                    tracing::info!(adresse = %self.adresse, versuch, "Verbunden");
                    return Ok(Some(stream));
                }
                Ok(Err(e)) => {
                    tracing::debug!(adresse = %self.adresse, versuch, fehler = %e, "Verbindung fehlgeschlagen");
                }
                Err(_) => {
                    tracing::debug!(adresse = %self.adresse, versuch, "Verbindungsversuch abgelaufen");
                }
            }

            let jitter = rand::rng().random_range(0..JITTER_MS);
            let pause = wartezeit(versuch, jitter);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => return Ok(None),
            }
        }

        self.status.send_replace(VerbindungsStatus::Getrennt);
        Err(ClientError::VerbindungFehlgeschlagen {
            adresse: self.adresse.clone(),
            versuche: MAX_VERSUCHE,
        })
    }

    /// Haelt die Verbindung, bis alle `Poster` geschlossen sind oder
    /// `shutdown` gesetzt wird
    pub async fn laufen(
        self,
        mut anfragen: mpsc::Receiver<Anfrage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ClientResult<()> {
        let mut wiederaufbau = false;

        loop {
            let Some(stream) = self.verbinden(&mut shutdown).await? else {
                self.status.send_replace(VerbindungsStatus::Getrennt);
                return Ok(());
            };
            self.status.send_replace(VerbindungsStatus::Verbunden);

            let mut multiplexer = Multiplexer::neu();
            if wiederaufbau {
                if let Some((anfrage, antwort)) = self.token_anfrage().await {
                    multiplexer = multiplexer.mit_erster_anfrage(anfrage);
                    self.token_antwort_abwarten(antwort);
                }
            }

            let codec = FrameCodec::with_max_size(self.max_frame_groesse);
            let (leser, schreiber) = stream.into_split();
            let eingang = FramedRead::new(leser, codec.clone());
            let ausgang = FramedWrite::new(schreiber, codec);

            let (antwort_tx, antwort_rx) = mpsc::channel(ANTWORT_QUEUE_GROESSE);
            let store = Arc::clone(&self.store);
            let ereignisse = self.ereignisse.clone();
            let empfang = tokio::spawn(async move {
                if let Err(e) = receiver::empfangen(eingang, antwort_tx, &*store, &ereignisse).await {
                    tracing::warn!(fehler = %e, "Empfang beendet");
                }
            });

            let status = tokio::select! {
                s = multiplexer.laufen(ausgang, &mut anfragen, antwort_rx) => s,
                _ = shutdown.changed() => MultiplexStatus::LocalShutdown,
            };
            empfang.abort();
            self.status.send_replace(VerbindungsStatus::Getrennt);

            match status {
                MultiplexStatus::LocalShutdown => {
                    tracing::info!("Client beendet");
                    return Ok(());
                }
                MultiplexStatus::PeerClosed | MultiplexStatus::TransportFailed => {
                    tracing::warn!(?status, "Verbindung verloren, baue neu auf");
                    wiederaufbau = true;
                }
            }
        }
    }

    /// TOKEN-Anfrage mit dem gespeicherten Token, falls vorhanden
    async fn token_anfrage(&self) -> Option<(Anfrage, oneshot::Receiver<Response>)> {
        match self.store.get_value(schluessel::TOKEN).await {
            Ok(Some(token)) => Some(Anfrage::synchron(Packet::request(
                PacketKind::Token,
                &Token { token },
            ))),
            Ok(None) => {
                tracing::debug!("Kein gespeichertes Token");
                None
            }
            Err(e) => {
                tracing::warn!(fehler = %e, "Token nicht lesbar");
                None
            }
        }
    }

    fn token_antwort_abwarten(&self, antwort: oneshot::Receiver<Response>) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let ergebnis = async {
                let res: TokenRes = poster::antwort_auswerten(PacketKind::Token, antwort.await)?;
                ClientError::code_pruefen(res.code)?;
                session::token_speichern(&*store, &res).await
            }
            .await;
            match ergebnis {
                Ok(daten) => {
                    tracing::info!(username = %daten.username, "Sitzung nach Wiederaufbau erneuert")
                }
                Err(e) => tracing::warn!(fehler = %e, "Token nach Wiederaufbau abgelehnt"),
            }
        });
    }
}
