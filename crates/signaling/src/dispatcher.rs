//! Message-Dispatcher – Routet Pakete an die Handler
//!
//! Ein einziges `match` auf `PacketKind`. Fachliche Fehler werden zur
//! kodierten Antwort, nur Protokoll- und Speicherfehler beenden die
//! Verbindung.
//!
//! | Art | Verhalten |
//! |---|---|
//! | PING | PONG ohne Korrelation |
//! | PONG | ignoriert |
//! | SIGNUP, SIGNIN, TOKEN | `TokenRes`; bei Erfolg Sitzung setzen, ONLINE |
//! | SIGNOUT | Sitzung leeren, OFFLINE, `SignoutRes` |
//! | USERS | `UsersRes` |
//! | MSG | speichern; Fehler als `ErrRes` ohne Korrelation |
//! | ERR, PUSH, RES, unbekannt | Protokollfehler |
//!
//! ## Sitzungszustand
//! Den Zustand `{account_id, username}` besitzt allein der Empfangs-Task
//! ueber den `DispatcherContext`. Jede Aenderung wird per `watch` an den
//! Sende-Task veroeffentlicht, der nur Schnappschuesse liest.

use plauder_core::{AccountId, SessionId};
use plauder_db::{AccountRecord, AccountRepository};
use plauder_protocol::packet::{
    ErrRes, Msg, Ping, Pong, Push, Signin, Signout, SignoutRes, Signup, Token, TokenRes, Users,
    UsersRes, PONG_PAYLOAD,
};
use plauder_protocol::{ErrorCode, Packet, PacketKind, PushKind};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{SignalingError, SignalingResult};
use crate::handlers::{auth_handler, chat_handler, user_handler};
use crate::push::PushSink;
use crate::server_state::{ServerRepository, SignalingState};

// ---------------------------------------------------------------------------
// Sitzungszustand
// ---------------------------------------------------------------------------

/// Authentifizierungszustand einer Verbindung
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitzungsZustand {
    /// `AccountId::ANONYM` solange nicht angemeldet
    pub account_id: AccountId,
    pub username: String,
}

impl SitzungsZustand {
    pub fn ist_angemeldet(&self) -> bool {
        !self.account_id.ist_anonym()
    }
}

/// Dispatcher-Kontext – gehoert dem Empfangs-Task einer Verbindung
pub struct DispatcherContext {
    pub session_id: SessionId,
    pub peer_addr: SocketAddr,
    sitzung: watch::Sender<SitzungsZustand>,
    push_sink: PushSink,
}

impl DispatcherContext {
    /// Erstellt den Kontext und den Lese-Kanal fuer den Sende-Task
    pub fn neu(
        session_id: SessionId,
        peer_addr: SocketAddr,
        push_sink: PushSink,
    ) -> (Self, watch::Receiver<SitzungsZustand>) {
        let (sitzung, rx) = watch::channel(SitzungsZustand::default());
        (
            Self {
                session_id,
                peer_addr,
                sitzung,
                push_sink,
            },
            rx,
        )
    }

    /// Schnappschuss des aktuellen Zustands
    pub fn sitzung(&self) -> SitzungsZustand {
        self.sitzung.borrow().clone()
    }

    pub fn ist_angemeldet(&self) -> bool {
        self.sitzung.borrow().ist_angemeldet()
    }
}

// ---------------------------------------------------------------------------
// MessageDispatcher
// ---------------------------------------------------------------------------

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher<R: ServerRepository> {
    state: Arc<SignalingState<R>>,
}

impl<R: ServerRepository> MessageDispatcher<R> {
    pub fn neu(state: Arc<SignalingState<R>>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein eingehendes Paket
    ///
    /// `Ok(None)` wenn keine Antwort gesendet wird, `Err` beendet die
    /// Verbindung.
    pub async fn dispatch(
        &self,
        packet: Packet,
        ctx: &mut DispatcherContext,
    ) -> SignalingResult<Option<Packet>> {
        let art = packet.art().map_err(|e| {
            SignalingError::protokoll(format!("Unbekannte Paketart {}", e.0))
        })?;
        let id = packet.id;

        if let Some(m) = &self.state.metriken {
            m.frames_received_total
                .with_label_values(&[art.als_str()])
                .inc();
        }
        tracing::trace!(session_id = %ctx.session_id, id, art = ?art, "Paket empfangen");

        match art {
            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            PacketKind::Ping => {
                packet
                    .nutzlast::<Ping>()
                    .map_err(|e| SignalingError::protokoll(format!("PING unlesbar: {e}")))?;
                Ok(Some(Packet::notify(
                    PacketKind::Pong,
                    &Pong {
                        payload: PONG_PAYLOAD.to_string(),
                    },
                )))
            }

            PacketKind::Pong => Ok(None),

            // -------------------------------------------------------------------
            // Authentifizierung
            // -------------------------------------------------------------------
            PacketKind::Signup => {
                let ergebnis = match packet.nutzlast::<Signup>() {
                    Ok(req) => auth_handler::handle_signup(req, &self.state).await,
                    Err(_) => Err(ErrorCode::Unmarshal),
                };
                Ok(Some(self.auth_abschliessen(id, ergebnis, ctx).await))
            }

            PacketKind::Signin => {
                let ergebnis = match packet.nutzlast::<Signin>() {
                    Ok(req) => auth_handler::handle_signin(req, &self.state).await,
                    Err(_) => Err(ErrorCode::Unmarshal),
                };
                Ok(Some(self.auth_abschliessen(id, ergebnis, ctx).await))
            }

            PacketKind::Token => {
                let ergebnis = match packet.nutzlast::<Token>() {
                    Ok(req) => auth_handler::handle_token(req, &self.state).await,
                    Err(_) => Err(ErrorCode::Unmarshal),
                };
                Ok(Some(self.auth_abschliessen(id, ergebnis, ctx).await))
            }

            PacketKind::Signout => {
                if packet.nutzlast::<Signout>().is_err() {
                    return Ok(Some(Packet::reply(
                        id,
                        &SignoutRes {
                            code: ErrorCode::Unmarshal.code(),
                        },
                    )));
                }
                self.abmelden(ctx).await;
                Ok(Some(Packet::reply(id, &SignoutRes { code: 0 })))
            }

            // -------------------------------------------------------------------
            // Benutzerliste und Nachrichten
            // -------------------------------------------------------------------
            PacketKind::Users => {
                let antwort = match packet.nutzlast::<Users>() {
                    Ok(_) => user_handler::handle_users(&ctx.sitzung(), &self.state).await,
                    Err(_) => UsersRes::fehler(ErrorCode::Unmarshal),
                };
                Ok(Some(Packet::reply(id, &antwort)))
            }

            PacketKind::Msg => {
                let ergebnis = match packet.nutzlast::<Msg>() {
                    Ok(req) => chat_handler::handle_msg(req, &ctx.sitzung(), &self.state).await?,
                    Err(_) => Err(ErrorCode::Unmarshal),
                };
                Ok(ergebnis.err().map(|code| {
                    Packet::notify(PacketKind::Err, &ErrRes { code: code.code() })
                }))
            }

            // -------------------------------------------------------------------
            // Nur Server -> Client
            // -------------------------------------------------------------------
            PacketKind::Err | PacketKind::Push | PacketKind::Res => Err(
                SignalingError::protokoll(format!("Paketart {art:?} vom Client nicht erlaubt")),
            ),
        }
    }

    /// Baut die `TokenRes` und setzt bei Erfolg die Sitzung
    async fn auth_abschliessen(
        &self,
        id: u64,
        ergebnis: Result<plauder_auth::Anmeldung, ErrorCode>,
        ctx: &mut DispatcherContext,
    ) -> Packet {
        let antwort: TokenRes = auth_handler::token_antwort(&ergebnis);
        if let Ok(anmeldung) = ergebnis {
            self.anmelden(ctx, &anmeldung.konto).await;
        }
        Packet::reply(id, &antwort)
    }

    /// Setzt die Sitzung, markiert das Konto online und meldet ONLINE
    async fn anmelden(&self, ctx: &mut DispatcherContext, konto: &AccountRecord) {
        let vorher = ctx.sitzung();
        if vorher.ist_angemeldet() && vorher.account_id != konto.id {
            self.abmelden(ctx).await;
        }

        ctx.sitzung.send_replace(SitzungsZustand {
            account_id: konto.id,
            username: konto.username.clone(),
        });

        if let Err(e) = self.state.db.update_online(konto.id, true).await {
            tracing::warn!(account_id = %konto.id, fehler = %e, "Online-Status nicht gespeichert");
        }
        self.state
            .presence
            .angemeldet(ctx.session_id, konto.id, &konto.username);
        self.state
            .push
            .registrieren(ctx.session_id, &konto.username, ctx.push_sink.clone())
            .await;
        self.state
            .push
            .veroeffentlichen(Push::praesenz(PushKind::Online, &konto.username))
            .await;
        self.state.gauges_aktualisieren();

        tracing::info!(
            session_id = %ctx.session_id,
            peer = %ctx.peer_addr,
            username = %konto.username,
            "Sitzung angemeldet"
        );
    }

    /// Leert die Sitzung; OFFLINE nur wenn keine weitere Sitzung des
    /// Kontos mehr angemeldet ist
    ///
    /// Ohne angemeldete Sitzung passiert nichts.
    pub async fn abmelden(&self, ctx: &mut DispatcherContext) {
        let vorher = ctx.sitzung.send_replace(SitzungsZustand::default());
        if !vorher.ist_angemeldet() {
            return;
        }

        self.state.push.abmelden(ctx.session_id).await;
        self.state.presence.abgemeldet(ctx.session_id);
        self.state.gauges_aktualisieren();

        if self.state.presence.ist_online(&vorher.username) {
            tracing::debug!(username = %vorher.username, "Weitere Sitzung aktiv – kein OFFLINE");
            return;
        }

        if let Err(e) = self.state.db.update_online(vorher.account_id, false).await {
            tracing::warn!(account_id = %vorher.account_id, fehler = %e, "Offline-Status nicht gespeichert");
        }
        self.state
            .push
            .veroeffentlichen(Push::praesenz(PushKind::Offline, &vorher.username))
            .await;

        tracing::info!(
            session_id = %ctx.session_id,
            username = %vorher.username,
            "Sitzung abgemeldet"
        );
    }
}
