//! Anfrage-Multiplexer
//!
//! Ein Task besitzt den Schreib-Halbstrom der Verbindung, den ID-Zaehler
//! und die Tabelle der offenen Anfragen. Synchrone Anfragen werden beim
//! Schreiben unter ihrer ID eingetragen und ueber den passenden `RES`
//! aufgeloest.
//!
//! ```text
//! Poster ──Anfrage──► Multiplexer ──Frame──► Server
//!                        ▲
//! Empfangs-Task ──RES────┘
//! ```
//!
//! - Frist je Anfrage: 5 s, geprueft alle 50 ms
//! - Heartbeat: alle 20 s ein PING ohne Antwortzuordnung
//! - Eine optionale erste Anfrage (TOKEN nach einem Wiederaufbau) geht vor
//!   allem, was in der Queue wartet
//! - Beim Ende werden alle offenen Anfragen mit `Response::Disconnected`
//!   aufgeloest

use futures_util::{Sink, SinkExt};
use plauder_protocol::packet::{Ping, PING_PAYLOAD};
use plauder_protocol::{CodecError, Packet, PacketKind};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

/// Frist fuer synchrone Anfragen
pub const ANTWORT_FRIST: Duration = Duration::from_secs(5);
/// Pruefintervall fuer abgelaufene Anfragen
pub const PRUEF_INTERVALL: Duration = Duration::from_millis(50);
/// Intervall des Heartbeats
pub const HEARTBEAT_INTERVALL: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

/// Ergebnis einer synchronen Anfrage
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Reply(Packet),
    TimedOut,
    Disconnected,
}

/// Grund fuer das Ende eines Multiplexer-Laufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplexStatus {
    /// Alle `Poster` geschlossen
    LocalShutdown,
    /// Empfangsseite beendet (Server weg oder Protokollfehler)
    PeerClosed,
    /// Schreiben fehlgeschlagen
    TransportFailed,
}

/// Eine Anfrage an den Multiplexer
#[derive(Debug)]
pub struct Anfrage {
    pub packet: Packet,
    pub(crate) antwort: Option<oneshot::Sender<Response>>,
}

impl Anfrage {
    /// Anfrage mit Antwort; der Empfaenger liefert genau ein `Response`
    pub fn synchron(packet: Packet) -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                packet,
                antwort: Some(tx),
            },
            rx,
        )
    }

    /// Anfrage ohne Antwort (z.B. MSG)
    pub fn ohne_antwort(packet: Packet) -> Self {
        Self {
            packet,
            antwort: None,
        }
    }

    pub fn ist_synchron(&self) -> bool {
        self.antwort.is_some()
    }
}

struct Offen {
    frist: Instant,
    antwort: oneshot::Sender<Response>,
}

// ---------------------------------------------------------------------------
// Multiplexer
// ---------------------------------------------------------------------------

/// Zustand eines Multiplexer-Laufs (eine Verbindung)
#[derive(Default)]
pub struct Multiplexer {
    naechste_id: u64,
    offen: HashMap<u64, Offen>,
    erste: Option<Anfrage>,
}

impl Multiplexer {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Anfrage, die vor allen Anfragen aus der Queue geschrieben wird
    pub fn mit_erster_anfrage(mut self, anfrage: Anfrage) -> Self {
        self.erste = Some(anfrage);
        self
    }

    fn id_vergeben(&mut self) -> u64 {
        self.naechste_id += 1;
        self.naechste_id
    }

    /// Anzahl offener synchroner Anfragen
    pub fn offene(&self) -> usize {
        self.offen.len()
    }

    /// Laeuft bis eine der Quellen endet
    ///
    /// `anfragen` wird nur geliehen: nicht abgeholte Anfragen bleiben in
    /// der Queue und werden von der naechsten Verbindung geschrieben.
    pub async fn laufen<W>(
        mut self,
        mut ausgang: W,
        anfragen: &mut mpsc::Receiver<Anfrage>,
        mut antworten: mpsc::Receiver<Packet>,
    ) -> MultiplexStatus
    where
        W: Sink<Packet, Error = CodecError> + Unpin,
    {
        let mut pruefung = tokio::time::interval(PRUEF_INTERVALL);
        pruefung.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat =
            tokio::time::interval_at(Instant::now() + HEARTBEAT_INTERVALL, HEARTBEAT_INTERVALL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let status = 'lauf: {
            if let Some(anfrage) = self.erste.take() {
                if let Err(e) = self.schreiben(&mut ausgang, anfrage).await {
                    tracing::warn!(fehler = %e, "Erste Anfrage nicht geschrieben");
                    break 'lauf MultiplexStatus::TransportFailed;
                }
            }

            loop {
                tokio::select! {
                    anfrage = anfragen.recv() => {
                        let Some(anfrage) = anfrage else {
                            tracing::debug!("Anfrage-Queue geschlossen");
                            if let Err(e) = ausgang.close().await {
                                tracing::debug!(fehler = %e, "Schliessen des Ausgangs fehlgeschlagen");
                            }
                            break MultiplexStatus::LocalShutdown;
                        };
                        if let Err(e) = self.schreiben(&mut ausgang, anfrage).await {
                            tracing::warn!(fehler = %e, "Anfrage nicht geschrieben");
                            break MultiplexStatus::TransportFailed;
                        }
                    }

                    antwort = antworten.recv() => {
                        let Some(packet) = antwort else {
                            break MultiplexStatus::PeerClosed;
                        };
                        self.zuordnen(packet);
                    }

                    _ = pruefung.tick() => {
                        self.abgelaufene_aufloesen(Instant::now());
                    }

                    _ = heartbeat.tick() => {
                        let ping = Packet::request(PacketKind::Ping, &Ping { payload: PING_PAYLOAD.into() });
                        if let Err(e) = self.schreiben(&mut ausgang, Anfrage::ohne_antwort(ping)).await {
                            tracing::warn!(fehler = %e, "Heartbeat nicht geschrieben");
                            break MultiplexStatus::TransportFailed;
                        }
                    }
                }
            }
        };

        let offen = self.offen.len();
        for (_, eintrag) in self.offen.drain() {
            let _ = eintrag.antwort.send(Response::Disconnected);
        }
        tracing::debug!(?status, offen, "Multiplexer beendet");
        status
    }

    /// Vergibt die ID, schreibt den Frame und traegt synchrone Anfragen ein
    async fn schreiben<W>(&mut self, ausgang: &mut W, anfrage: Anfrage) -> Result<(), CodecError>
    where
        W: Sink<Packet, Error = CodecError> + Unpin,
    {
        let Anfrage {
            mut packet,
            antwort,
        } = anfrage;
        let id = self.id_vergeben();
        packet.id = id;

        if let Err(e) = ausgang.send(packet).await {
            if let Some(antwort) = antwort {
                let _ = antwort.send(Response::Disconnected);
            }
            return Err(e);
        }

        if let Some(antwort) = antwort {
            self.offen.insert(
                id,
                Offen {
                    frist: Instant::now() + ANTWORT_FRIST,
                    antwort,
                },
            );
        }
        Ok(())
    }

    fn zuordnen(&mut self, packet: Packet) {
        match self.offen.remove(&packet.id) {
            Some(eintrag) => {
                let _ = eintrag.antwort.send(Response::Reply(packet));
            }
            None => tracing::debug!(id = packet.id, "Antwort ohne offene Anfrage verworfen"),
        }
    }

    fn abgelaufene_aufloesen(&mut self, jetzt: Instant) {
        let abgelaufen: Vec<u64> = self
            .offen
            .iter()
            .filter(|(_, e)| jetzt >= e.frist)
            .map(|(id, _)| *id)
            .collect();
        for id in abgelaufen {
            if let Some(eintrag) = self.offen.remove(&id) {
                tracing::debug!(id, "Anfrage abgelaufen");
                let _ = eintrag.antwort.send(Response::TimedOut);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink;
    use plauder_protocol::packet::{Msg, Signout, Token, Users, UsersRes};

    type Ausgang = std::pin::Pin<Box<dyn Sink<Packet, Error = CodecError> + Send>>;

    /// Ausgang, der geschriebene Pakete in einen Kanal legt
    fn test_ausgang() -> (Ausgang, mpsc::UnboundedReceiver<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel::<Packet>();
        let ausgang = Box::pin(sink::unfold(tx, |tx, p: Packet| async move {
            let _ = tx.send(p);
            Ok::<_, CodecError>(tx)
        }));
        (ausgang, rx)
    }

    struct Lauf {
        anfragen: mpsc::Sender<Anfrage>,
        antworten: mpsc::Sender<Packet>,
        geschrieben: mpsc::UnboundedReceiver<Packet>,
        task: tokio::task::JoinHandle<MultiplexStatus>,
    }

    fn starten() -> Lauf {
        let (anfragen, mut anfragen_rx) = mpsc::channel::<Anfrage>(16);
        let (antworten, antworten_rx) = mpsc::channel::<Packet>(16);
        let (ausgang, geschrieben) = test_ausgang();
        let task = tokio::spawn(async move {
            Multiplexer::neu()
                .laufen(ausgang, &mut anfragen_rx, antworten_rx)
                .await
        });
        Lauf {
            anfragen,
            antworten,
            geschrieben,
            task,
        }
    }

    #[tokio::test]
    async fn gleichzeitige_anfragen_werden_einzeln_aufgeloest() {
        let mut lauf = starten();

        let mut empfaenger = Vec::new();
        for i in 0..3u8 {
            let (anfrage, rx) = Anfrage::synchron(Packet {
                id: 0,
                kind: PacketKind::Users as i32,
                data: vec![i],
            });
            lauf.anfragen.send(anfrage).await.unwrap();
            empfaenger.push(rx);
        }

        // IDs steigen ab 1
        let mut ids = Vec::new();
        for _ in 0..3 {
            let p = lauf.geschrieben.recv().await.unwrap();
            ids.push(p.id);
            // Antworten in umgekehrter Reihenfolge zurueck
            lauf.antworten
                .send(Packet {
                    id: p.id,
                    kind: PacketKind::Res as i32,
                    data: p.data,
                })
                .await
                .unwrap();
        }
        assert_eq!(ids, [1, 2, 3]);

        for (i, rx) in empfaenger.into_iter().enumerate() {
            match rx.await.unwrap() {
                Response::Reply(p) => assert_eq!(p.data, vec![i as u8]),
                andere => panic!("Unerwartet: {andere:?}"),
            }
        }

        drop(lauf.anfragen);
        assert_eq!(lauf.task.await.unwrap(), MultiplexStatus::LocalShutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn ohne_antwort_laeuft_die_frist_ab() {
        let mut lauf = starten();

        let (anfrage, rx) = Anfrage::synchron(Packet::request(PacketKind::Users, &Users {}));
        lauf.anfragen.send(anfrage).await.unwrap();
        let geschrieben = lauf.geschrieben.recv().await.unwrap();

        let start = Instant::now();
        assert_eq!(rx.await.unwrap(), Response::TimedOut);
        let gewartet = start.elapsed();
        assert!(gewartet >= ANTWORT_FRIST);
        assert!(gewartet < ANTWORT_FRIST + Duration::from_millis(100));

        // Spaete Antwort wird still verworfen
        lauf.antworten
            .send(Packet::reply(geschrieben.id, &Users {}))
            .await
            .unwrap();

        drop(lauf.anfragen);
        assert_eq!(lauf.task.await.unwrap(), MultiplexStatus::LocalShutdown);
    }

    #[tokio::test]
    async fn geschlossene_empfangsseite_loest_offene_auf() {
        let mut lauf = starten();

        let (anfrage, rx) = Anfrage::synchron(Packet::request(PacketKind::Signout, &Signout {}));
        lauf.anfragen.send(anfrage).await.unwrap();
        lauf.geschrieben.recv().await.unwrap();

        drop(lauf.antworten);
        assert_eq!(rx.await.unwrap(), Response::Disconnected);
        assert_eq!(lauf.task.await.unwrap(), MultiplexStatus::PeerClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_schreibt_ping() {
        let mut lauf = starten();

        tokio::time::sleep(HEARTBEAT_INTERVALL + Duration::from_millis(10)).await;
        let p = lauf.geschrieben.recv().await.unwrap();
        assert_eq!(p.art().unwrap(), PacketKind::Ping);
        assert_eq!(p.id, 1);
        let ping: Ping = p.nutzlast().unwrap();
        assert_eq!(ping.payload, PING_PAYLOAD);

        drop(lauf.anfragen);
        assert_eq!(lauf.task.await.unwrap(), MultiplexStatus::LocalShutdown);
    }

    #[tokio::test]
    async fn erste_anfrage_geht_vor_der_queue() {
        let (anfragen, mut anfragen_rx) = mpsc::channel::<Anfrage>(4);
        let (antworten, antworten_rx) = mpsc::channel::<Packet>(4);
        let (ausgang, mut geschrieben) = test_ausgang();

        // Waehrend der Trennung eingereiht
        anfragen
            .send(Anfrage::ohne_antwort(Packet::request(PacketKind::Msg, &Msg::default())))
            .await
            .unwrap();

        let (token, token_rx) =
            Anfrage::synchron(Packet::request(PacketKind::Token, &Token { token: vec![1, 2] }));
        let task = tokio::spawn(async move {
            Multiplexer::neu()
                .mit_erster_anfrage(token)
                .laufen(ausgang, &mut anfragen_rx, antworten_rx)
                .await
        });

        let erstes = geschrieben.recv().await.unwrap();
        assert_eq!(erstes.art().unwrap(), PacketKind::Token);
        assert_eq!(erstes.id, 1);
        let zweites = geschrieben.recv().await.unwrap();
        assert_eq!(zweites.art().unwrap(), PacketKind::Msg);
        assert_eq!(zweites.id, 2);

        antworten
            .send(Packet::reply(erstes.id, &UsersRes::default()))
            .await
            .unwrap();
        assert!(matches!(token_rx.await.unwrap(), Response::Reply(_)));

        drop(anfragen);
        assert_eq!(task.await.unwrap(), MultiplexStatus::LocalShutdown);
    }

    #[tokio::test]
    async fn offene_tabelle_ist_nach_aufloesung_leer() {
        let (mut ausgang, _geschrieben) = test_ausgang();
        let mut multiplexer = Multiplexer::neu();

        let mut empfaenger = Vec::new();
        for _ in 0..4 {
            let (anfrage, rx) = Anfrage::synchron(Packet::request(PacketKind::Users, &Users {}));
            multiplexer.schreiben(&mut ausgang, anfrage).await.unwrap();
            empfaenger.push(rx);
        }
        multiplexer
            .schreiben(
                &mut ausgang,
                Anfrage::ohne_antwort(Packet::request(PacketKind::Msg, &Msg::default())),
            )
            .await
            .unwrap();
        assert_eq!(multiplexer.offene(), 4);

        // Zwei Antworten, der Rest laeuft ab
        multiplexer.zuordnen(Packet::reply(2, &UsersRes::default()));
        multiplexer.zuordnen(Packet::reply(4, &UsersRes::default()));
        assert_eq!(multiplexer.offene(), 2);
        multiplexer.abgelaufene_aufloesen(Instant::now() + ANTWORT_FRIST);
        assert_eq!(multiplexer.offene(), 0);

        let ergebnisse: Vec<Response> = futures_util::future::join_all(empfaenger)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(ergebnisse[0], Response::TimedOut);
        assert!(matches!(ergebnisse[1], Response::Reply(_)));
        assert_eq!(ergebnisse[2], Response::TimedOut);
        assert!(matches!(ergebnisse[3], Response::Reply(_)));
    }

    #[tokio::test]
    async fn schreibfehler_beendet_den_lauf() {
        let (anfragen, mut anfragen_rx) = mpsc::channel::<Anfrage>(4);
        let (_antworten, antworten_rx) = mpsc::channel::<Packet>(4);
        let ausgang = Box::pin(sink::unfold((), |_, _p: Packet| async move {
            Err::<(), _>(CodecError::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )))
        }));
        let task = tokio::spawn(async move {
            Multiplexer::neu()
                .laufen(ausgang, &mut anfragen_rx, antworten_rx)
                .await
        });

        let (anfrage, rx) = Anfrage::synchron(Packet::request(PacketKind::Users, &Users {}));
        anfragen.send(anfrage).await.unwrap();
        assert_eq!(rx.await.unwrap(), Response::Disconnected);
        assert_eq!(task.await.unwrap(), MultiplexStatus::TransportFailed);
    }
}
