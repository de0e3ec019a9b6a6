//! Empfangs-Task des Clients
//!
//! Liest Frames vom Server und verteilt sie:
//!
//! | Art  | Ziel                                   |
//! |------|----------------------------------------|
//! | RES  | Multiplexer (Antwortzuordnung)         |
//! | PONG | ignoriert                              |
//! | PUSH | lokaler Speicher + `ClientEreignis`    |
//! | MSG  | lokaler Posteingang + `ClientEreignis` |
//! | ERR  | Log + `ClientEreignis::ServerFehler`   |
//!
//! Ein Lesefehler beendet den Task. Damit schliesst sich die Antwortquelle
//! des Multiplexers und die Verbindung wird neu aufgebaut.

use futures_util::{Stream, StreamExt};
use plauder_db::{LocalMessage, LocalStore};
use plauder_protocol::packet::{ErrRes, Msg, Pong, Push};
use plauder_protocol::{CodecError, Packet, PacketKind, PushKind};
use tokio::sync::{broadcast, mpsc};

use crate::error::{ClientError, ClientResult};

/// Kapazitaet des Ereignis-Kanals fuer die Oberflaeche
pub const EREIGNIS_KAPAZITAET: usize = 256;

/// Ereignisse fuer die Oberflaeche
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEreignis {
    /// Neue Nachricht im lokalen Posteingang
    Nachricht { von: String },
    /// Praesenz-Hinweis eines anderen Benutzers
    Praesenz { username: String, online: bool },
    /// Der Server meldet einen Fehler ohne Antwortzuordnung
    ServerFehler { code: i32 },
}

impl ClientEreignis {
    /// Fehler des Servers als `ClientError`
    pub fn als_fehler(&self) -> Option<ClientError> {
        match self {
            ClientEreignis::ServerFehler { code } => ClientError::code_pruefen(*code).err(),
            _ => None,
        }
    }
}

/// Liest bis zum Ende des Streams oder bis zum ersten Fehler
pub async fn empfangen<S, L>(
    mut eingang: S,
    antworten: mpsc::Sender<Packet>,
    store: &L,
    ereignisse: &broadcast::Sender<ClientEreignis>,
) -> ClientResult<()>
where
    S: Stream<Item = Result<Packet, CodecError>> + Unpin,
    L: LocalStore + ?Sized,
{
    while let Some(frame) = eingang.next().await {
        let packet = frame?;
        paket_verarbeiten(packet, &antworten, store, ereignisse).await?;
    }
    tracing::debug!("Server hat die Verbindung geschlossen");
    Ok(())
}

async fn paket_verarbeiten<L>(
    packet: Packet,
    antworten: &mpsc::Sender<Packet>,
    store: &L,
    ereignisse: &broadcast::Sender<ClientEreignis>,
) -> ClientResult<()>
where
    L: LocalStore + ?Sized,
{
    let art = packet
        .art()
        .map_err(|e| ClientError::Protokoll(format!("unbekannte Paketart {}", e.0)))?;

    match art {
        PacketKind::Res => {
            antworten
                .send(packet)
                .await
                .map_err(|_| ClientError::Getrennt)?;
        }

        PacketKind::Pong => {
            let pong: Pong = packet.nutzlast()?;
            tracing::trace!(payload = %pong.payload, "PONG");
        }

        PacketKind::Push => {
            let push: Push = packet.nutzlast()?;
            if let Err(e) = store.new_push(push.kind, &push.data).await {
                tracing::warn!(fehler = %e, "Push-Hinweis nicht gespeichert");
            }
            if let Some(username) = push.username() {
                let _ = ereignisse.send(ClientEreignis::Praesenz {
                    username: username.to_string(),
                    online: push.kind() == PushKind::Online,
                });
            }
        }

        PacketKind::Msg => {
            let msg: Msg = packet.nutzlast()?;
            let von = msg.from.clone();
            let lokal = LocalMessage {
                id: msg.id,
                kind: msg.kind,
                from: msg.from,
                to: msg.to,
                data: msg.data,
                read: false,
            };
            if let Err(e) = store.new_message(&lokal).await {
                tracing::warn!(fehler = %e, id = lokal.id, "Nachricht nicht gespeichert");
            }
            let _ = ereignisse.send(ClientEreignis::Nachricht { von });
        }

        PacketKind::Err => {
            let err: ErrRes = packet.nutzlast()?;
            tracing::warn!(code = err.code, "Fehler vom Server");
            let _ = ereignisse.send(ClientEreignis::ServerFehler { code: err.code });
        }

        andere => {
            tracing::debug!(art = andere.als_str(), "Unerwartetes Paket ignoriert");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plauder_db::ClientDb;
    use plauder_protocol::packet::{TokenRes, PONG_PAYLOAD};

    fn stream_aus(
        pakete: Vec<Result<Packet, CodecError>>,
    ) -> impl Stream<Item = Result<Packet, CodecError>> + Unpin {
        futures_util::stream::iter(pakete)
    }

    #[tokio::test]
    async fn pakete_werden_verteilt() {
        let store = ClientDb::in_memory().await.unwrap();
        let (antwort_tx, mut antwort_rx) = mpsc::channel(8);
        let (ereignis_tx, mut ereignis_rx) = broadcast::channel(8);

        let pakete = vec![
            Ok(Packet::notify(PacketKind::Pong, &Pong { payload: PONG_PAYLOAD.into() })),
            Ok(Packet::reply(4, &TokenRes::fehler(-10005))),
            Ok(Packet::notify(PacketKind::Push, &Push::praesenz(PushKind::Online, "bob"))),
            Ok(Packet::notify(
                PacketKind::Msg,
                &Msg {
                    id: 77,
                    kind: 0,
                    from: "bob".into(),
                    to: "alice".into(),
                    data: b"hallo".to_vec(),
                },
            )),
            Ok(Packet::notify(PacketKind::Err, &ErrRes { code: -10009 })),
        ];
        empfangen(stream_aus(pakete), antwort_tx, &store, &ereignis_tx)
            .await
            .unwrap();

        assert_eq!(antwort_rx.recv().await.unwrap().id, 4);
        assert_eq!(
            ereignis_rx.recv().await.unwrap(),
            ClientEreignis::Praesenz {
                username: "bob".into(),
                online: true
            }
        );
        assert_eq!(
            ereignis_rx.recv().await.unwrap(),
            ClientEreignis::Nachricht { von: "bob".into() }
        );
        let fehler = ereignis_rx.recv().await.unwrap();
        assert_eq!(
            fehler.als_fehler().and_then(|f| f.server_code()),
            Some(plauder_protocol::ErrorCode::Forbidden)
        );

        assert_eq!(store.unread_message_count().await.unwrap(), [("bob".to_string(), 1)]);
        let praesenz = store.pop_online_push_notifications().await.unwrap();
        assert_eq!(praesenz.len(), 1);
        assert!(praesenz[0].online);
    }

    #[tokio::test]
    async fn lesefehler_beendet_den_empfang() {
        let store = ClientDb::in_memory().await.unwrap();
        let (antwort_tx, _antwort_rx) = mpsc::channel(8);
        let (ereignis_tx, _) = broadcast::channel(8);

        let pakete = vec![
            Err(CodecError::TruncatedStream { rest: 3 }),
            Ok(Packet::reply(1, &TokenRes::default())),
        ];
        let ergebnis = empfangen(stream_aus(pakete), antwort_tx, &store, &ereignis_tx).await;
        assert!(matches!(ergebnis, Err(ClientError::Codec(_))));
    }

    #[tokio::test]
    async fn unbekannte_art_ist_protokollfehler() {
        let store = ClientDb::in_memory().await.unwrap();
        let (antwort_tx, _antwort_rx) = mpsc::channel(8);
        let (ereignis_tx, _) = broadcast::channel(8);

        let pakete = vec![Ok(Packet {
            id: 0,
            kind: 42,
            data: Vec::new(),
        })];
        let ergebnis = empfangen(stream_aus(pakete), antwort_tx, &store, &ereignis_tx).await;
        assert!(matches!(ergebnis, Err(ClientError::Protokoll(_))));
    }
}
