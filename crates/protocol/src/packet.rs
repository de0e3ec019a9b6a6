//! Umschlag und Nutzlast-Typen
//!
//! Alle Typen sind Protobuf-Nachrichten (`prost`). Feldnummern sind Teil
//! des Wire-Formats und duerfen nicht geaendert werden.

use prost::Message;

// ---------------------------------------------------------------------------
// Umschlag
// ---------------------------------------------------------------------------

/// Diskriminator fuer Nutzlast-Typ und Routing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum PacketKind {
    Ping = 0,
    Pong = 1,
    Signup = 2,
    Signin = 3,
    Token = 4,
    Users = 5,
    Msg = 6,
    Err = 7,
    Signout = 8,
    Push = 9,
    Res = 10,
}

impl PacketKind {
    /// Name wie im Protokoll, z.B. fuer Metrik-Labels
    pub fn als_str(self) -> &'static str {
        match self {
            PacketKind::Ping => "PING",
            PacketKind::Pong => "PONG",
            PacketKind::Signup => "SIGNUP",
            PacketKind::Signin => "SIGNIN",
            PacketKind::Token => "TOKEN",
            PacketKind::Users => "USERS",
            PacketKind::Msg => "MSG",
            PacketKind::Err => "ERR",
            PacketKind::Signout => "SIGNOUT",
            PacketKind::Push => "PUSH",
            PacketKind::Res => "RES",
        }
    }

    /// Arten, auf die der Server mit einem korrelierten `Res` antwortet
    pub fn ist_sync(self) -> bool {
        matches!(
            self,
            PacketKind::Signup
                | PacketKind::Signin
                | PacketKind::Token
                | PacketKind::Users
                | PacketKind::Signout
        )
    }
}

/// Ein gerahmtes Paket: `id + kind + payload`
///
/// `id = 0` kennzeichnet Pakete ohne Korrelation (fire-and-forget).
#[derive(Clone, PartialEq, Message)]
pub struct Packet {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(enumeration = "PacketKind", tag = "2")]
    pub kind: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
}

impl Packet {
    /// Anfrage ohne ID; die ID vergibt der Multiplexer beim Schreiben
    pub fn request<M: Message>(kind: PacketKind, nutzlast: &M) -> Self {
        Self {
            id: 0,
            kind: kind as i32,
            data: nutzlast.encode_to_vec(),
        }
    }

    /// Korrelierte Antwort auf die Anfrage `id`
    pub fn reply<M: Message>(id: u64, nutzlast: &M) -> Self {
        Self {
            id,
            kind: PacketKind::Res as i32,
            data: nutzlast.encode_to_vec(),
        }
    }

    /// Server-initiiertes Paket ohne Korrelation
    pub fn notify<M: Message>(kind: PacketKind, nutzlast: &M) -> Self {
        Self::request(kind, nutzlast)
    }

    /// Liefert die Paketart oder den unbekannten Rohwert
    pub fn art(&self) -> Result<PacketKind, prost::UnknownEnumValue> {
        PacketKind::try_from(self.kind)
    }

    /// Dekodiert die Nutzlast als `M`
    pub fn nutzlast<M: Message + Default>(&self) -> Result<M, prost::DecodeError> {
        M::decode(self.data.as_slice())
    }
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Nutzlast der Heartbeat-Anfrage des Clients
pub const PING_PAYLOAD: &str = "Wer da?";
/// Nutzlast der Server-Antwort
pub const PONG_PAYLOAD: &str = "Gut Freund";

#[derive(Clone, PartialEq, Message)]
pub struct Ping {
    #[prost(string, tag = "1")]
    pub payload: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Pong {
    #[prost(string, tag = "1")]
    pub payload: String,
}

// ---------------------------------------------------------------------------
// Authentifizierung
// ---------------------------------------------------------------------------

/// Zugangsdaten; `passhash` ist SHA-256 des Klartext-Passworts
#[derive(Clone, PartialEq, Message)]
pub struct Auth {
    #[prost(string, tag = "1")]
    pub username: String,
    #[prost(bytes = "vec", tag = "2")]
    pub passhash: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Signup {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<Auth>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Signin {
    #[prost(message, optional, tag = "1")]
    pub auth: Option<Auth>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Token {
    #[prost(bytes = "vec", tag = "1")]
    pub token: Vec<u8>,
}

/// Antwort auf SIGNUP, SIGNIN und TOKEN
#[derive(Clone, PartialEq, Message)]
pub struct TokenRes {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(uint64, tag = "2")]
    pub id: u64,
    #[prost(string, tag = "3")]
    pub username: String,
    #[prost(bytes = "vec", tag = "4")]
    pub token: Vec<u8>,
}

impl TokenRes {
    pub fn fehler(code: impl Into<i32>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Signout {}

#[derive(Clone, PartialEq, Message)]
pub struct SignoutRes {
    #[prost(int32, tag = "1")]
    pub code: i32,
}

// ---------------------------------------------------------------------------
// Benutzerliste
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct Users {}

#[derive(Clone, PartialEq, Message)]
pub struct User {
    #[prost(string, tag = "1")]
    pub username: String,
    #[prost(bool, tag = "2")]
    pub online: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct UsersRes {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(message, repeated, tag = "2")]
    pub users: Vec<User>,
}

impl UsersRes {
    pub fn fehler(code: impl Into<i32>) -> Self {
        Self {
            code: code.into(),
            users: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Nachrichten, Fehler, Push
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MsgKind {
    Text = 0,
}

/// Direktnachricht; `id` wird vom Server vergeben
#[derive(Clone, PartialEq, Message)]
pub struct Msg {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(enumeration = "MsgKind", tag = "2")]
    pub kind: i32,
    #[prost(string, tag = "3")]
    pub from: String,
    #[prost(string, tag = "4")]
    pub to: String,
    #[prost(bytes = "vec", tag = "5")]
    pub data: Vec<u8>,
}

/// Fehlermeldung ohne Korrelation (z.B. fuer MSG)
#[derive(Clone, PartialEq, Message)]
pub struct ErrRes {
    #[prost(int32, tag = "1")]
    pub code: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum PushKind {
    Online = 0,
    Offline = 1,
}

/// Praesenz-Hinweis; `data` enthaelt den Benutzernamen (UTF-8)
#[derive(Clone, PartialEq, Message)]
pub struct Push {
    #[prost(enumeration = "PushKind", tag = "1")]
    pub kind: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

impl Push {
    pub fn praesenz(kind: PushKind, username: &str) -> Self {
        Self {
            kind: kind as i32,
            data: username.as_bytes().to_vec(),
        }
    }

    /// Benutzername aus `data`, falls gueltiges UTF-8
    pub fn username(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_setzt_res_und_id() {
        let p = Packet::reply(17, &SignoutRes { code: 0 });
        assert_eq!(p.id, 17);
        assert_eq!(p.art(), Ok(PacketKind::Res));
    }

    #[test]
    fn notify_hat_sentinel_id() {
        let p = Packet::notify(PacketKind::Push, &Push::praesenz(PushKind::Online, "alice"));
        assert_eq!(p.id, 0);
        let push: Push = p.nutzlast().unwrap();
        assert_eq!(push.username(), Some("alice"));
        assert_eq!(push.kind(), PushKind::Online);
    }

    #[test]
    fn unbekannte_art_wird_gemeldet() {
        let p = Packet {
            id: 1,
            kind: 99,
            data: Vec::new(),
        };
        assert!(p.art().is_err());
    }

    #[test]
    fn sync_arten() {
        assert!(PacketKind::Signup.ist_sync());
        assert!(PacketKind::Users.ist_sync());
        assert!(!PacketKind::Msg.ist_sync());
        assert!(!PacketKind::Ping.ist_sync());
    }

    #[test]
    fn defekte_nutzlast_liefert_decode_fehler() {
        let p = Packet {
            id: 3,
            kind: PacketKind::Signin as i32,
            data: vec![0x0a, 0xff, 0x01],
        };
        assert!(p.nutzlast::<Signin>().is_err());
    }
}
