//! Poster – Schnittstelle der Oberflaeche zum Multiplexer
//!
//! Ein `Poster` ist ein billig klonbarer Griff auf die Anfrage-Queue.
//! Sind alle Griffe geschlossen, endet der Multiplexer mit
//! `MultiplexStatus::LocalShutdown`.

use plauder_protocol::packet::{
    Auth, Msg, MsgKind, Signin, Signout, SignoutRes, Signup, Token, TokenRes, User, Users,
    UsersRes,
};
use plauder_protocol::{Packet, PacketKind};
use prost::Message;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ClientError, ClientResult};
use crate::multiplexer::{Anfrage, Response};

/// Kapazitaet der Anfrage-Queue; Anfragen waehrend einer Trennung bleiben
/// hier liegen
pub const ANFRAGE_QUEUE_KAPAZITAET: usize = 1024;

#[derive(Clone)]
pub struct Poster {
    anfragen: mpsc::Sender<Anfrage>,
}

impl Poster {
    /// Erstellt einen Poster und die zugehoerige Anfrage-Queue
    pub fn neu() -> (Self, mpsc::Receiver<Anfrage>) {
        let (tx, rx) = mpsc::channel(ANFRAGE_QUEUE_KAPAZITAET);
        (Self { anfragen: tx }, rx)
    }

    /// Schliesst diesen Griff
    pub fn close(self) {}

    /// Synchrone Anfrage: wartet auf die zugeordnete Antwort
    pub async fn handle<Req, Res>(&self, kind: PacketKind, req: &Req) -> ClientResult<Res>
    where
        Req: Message,
        Res: Message + Default,
    {
        if !kind.ist_sync() {
            return Err(ClientError::UngueltigeArt(kind));
        }

        let (anfrage, antwort) = Anfrage::synchron(Packet::request(kind, req));
        self.anfragen
            .send(anfrage)
            .await
            .map_err(|_| ClientError::Getrennt)?;

        antwort_auswerten(kind, antwort.await)
    }

    /// Anfrage ohne Antwort
    pub async fn send<Req: Message>(&self, kind: PacketKind, req: &Req) -> ClientResult<()> {
        if kind != PacketKind::Msg {
            return Err(ClientError::UngueltigeArt(kind));
        }
        self.anfragen
            .send(Anfrage::ohne_antwort(Packet::request(kind, req)))
            .await
            .map_err(|_| ClientError::Getrennt)
    }

    // -----------------------------------------------------------------------
    // Typisierte Anfragen
    // -----------------------------------------------------------------------

    pub async fn signup(&self, username: &str, passhash: Vec<u8>) -> ClientResult<TokenRes> {
        let req = Signup {
            auth: Some(Auth {
                username: username.into(),
                passhash,
            }),
        };
        let res: TokenRes = self.handle(PacketKind::Signup, &req).await?;
        ClientError::code_pruefen(res.code)?;
        Ok(res)
    }

    pub async fn signin(&self, username: &str, passhash: Vec<u8>) -> ClientResult<TokenRes> {
        let req = Signin {
            auth: Some(Auth {
                username: username.into(),
                passhash,
            }),
        };
        let res: TokenRes = self.handle(PacketKind::Signin, &req).await?;
        ClientError::code_pruefen(res.code)?;
        Ok(res)
    }

    /// Meldet sich mit einem gespeicherten Token an; liefert ein neues Token
    pub async fn validate_token(&self, token: Vec<u8>) -> ClientResult<TokenRes> {
        let res: TokenRes = self.handle(PacketKind::Token, &Token { token }).await?;
        ClientError::code_pruefen(res.code)?;
        Ok(res)
    }

    pub async fn users(&self) -> ClientResult<Vec<User>> {
        let res: UsersRes = self.handle(PacketKind::Users, &Users {}).await?;
        ClientError::code_pruefen(res.code)?;
        Ok(res.users)
    }

    pub async fn signout(&self) -> ClientResult<()> {
        let res: SignoutRes = self.handle(PacketKind::Signout, &Signout {}).await?;
        ClientError::code_pruefen(res.code)
    }

    /// Textnachricht an `to`; `from` setzt der Server ohnehin selbst
    pub async fn send_text(&self, from: &str, to: &str, text: &str) -> ClientResult<()> {
        let msg = Msg {
            id: 0,
            kind: MsgKind::Text as i32,
            from: from.into(),
            to: to.into(),
            data: text.as_bytes().to_vec(),
        };
        self.send(PacketKind::Msg, &msg).await
    }
}

/// Dekodiert die Antwort einer synchronen Anfrage der Art `kind`
pub(crate) fn antwort_auswerten<Res: Message + Default>(
    kind: PacketKind,
    antwort: Result<Response, oneshot::error::RecvError>,
) -> ClientResult<Res> {
    match antwort {
        Ok(Response::Reply(packet)) => Ok(packet.nutzlast()?),
        Ok(Response::TimedOut) => Err(ClientError::Timeout(kind)),
        Ok(Response::Disconnected) | Err(_) => Err(ClientError::Getrennt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falsche_arten_werden_abgelehnt() {
        let (poster, _rx) = Poster::neu();
        let r: ClientResult<UsersRes> = poster.handle(PacketKind::Msg, &Users {}).await;
        assert!(matches!(r, Err(ClientError::UngueltigeArt(PacketKind::Msg))));
        assert!(matches!(
            poster.send(PacketKind::Users, &Users {}).await,
            Err(ClientError::UngueltigeArt(PacketKind::Users))
        ));
    }

    #[tokio::test]
    async fn geschlossene_queue_meldet_getrennt() {
        let (poster, rx) = Poster::neu();
        drop(rx);
        assert!(matches!(poster.users().await, Err(ClientError::Getrennt)));
    }

    #[tokio::test]
    async fn antwort_wird_dekodiert() {
        let (poster, mut rx) = Poster::neu();
        let ergebnis = tokio::spawn(async move { poster.users().await });

        let anfrage = rx.recv().await.unwrap();
        assert!(anfrage.ist_synchron());
        assert_eq!(anfrage.packet.art().unwrap(), PacketKind::Users);
        anfrage_beantworten(
            anfrage,
            Packet::reply(
                1,
                &UsersRes {
                    code: 0,
                    users: vec![User {
                        username: "bob".into(),
                        online: true,
                    }],
                },
            ),
        );

        let users = ergebnis.await.unwrap().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "bob");
    }

    #[tokio::test]
    async fn fehlercode_wird_zu_server_fehler() {
        let (poster, mut rx) = Poster::neu();
        let ergebnis = tokio::spawn(async move { poster.users().await });
        let anfrage = rx.recv().await.unwrap();
        anfrage_beantworten(anfrage, Packet::reply(1, &UsersRes::fehler(-10009)));
        let fehler = ergebnis.await.unwrap().unwrap_err();
        assert_eq!(
            fehler.server_code(),
            Some(plauder_protocol::ErrorCode::Forbidden)
        );
    }

    fn anfrage_beantworten(anfrage: Anfrage, antwort: Packet) {
        anfrage
            .antwort
            .expect("synchrone Anfrage")
            .send(Response::Reply(antwort))
            .unwrap();
    }
}
