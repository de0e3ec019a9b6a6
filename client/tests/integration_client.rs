//! Integrationstests: Client-Bibliothek gegen einen echten Server
//!
//! Der Server laeuft im selben Prozess auf Port 0 mit In-Memory-Datenbank
//! und niedrigem bcrypt-Kostenfaktor.

use plauder_auth::{AuthService, PasswordHasher, TokenService};
use plauder_client::{
    ClientEreignis, ClientError, ClientSitzung, Poster, ReconnectManager, VerbindungsStatus,
};
use plauder_db::{ClientDb, SqliteDb};
use plauder_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use plauder_protocol::ErrorCode;
use plauder_signaling::{SignalingConfig, SignalingServer, SignalingState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};

const WARTEZEIT: Duration = Duration::from_secs(5);
/// Reicht fuer mehrere Backoff-Runden
const WIEDERAUFBAU_FRIST: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

struct TestServer {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

async fn server_starten(db: Arc<SqliteDb>, addr: Option<SocketAddr>) -> TestServer {
    let auth = Arc::new(AuthService::neu(
        Arc::clone(&db),
        TokenService::neu(&[9u8; 32]),
        PasswordHasher::mit_kosten(4),
    ));
    let state = SignalingState::neu(SignalingConfig::default(), auth, db, None);

    let listener = TcpListener::bind(addr.unwrap_or_else(|| "127.0.0.1:0".parse().unwrap()))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(SignalingServer::neu(state, addr).mit_listener(listener, shutdown_rx));

    TestServer { addr, shutdown }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

struct TestClient {
    sitzung: ClientSitzung<ClientDb>,
    ereignisse: broadcast::Receiver<ClientEreignis>,
    status: watch::Receiver<VerbindungsStatus>,
    _shutdown: watch::Sender<bool>,
}

async fn client_starten(addr: SocketAddr, store: Arc<ClientDb>) -> TestClient {
    let (poster, anfragen) = Poster::neu();
    let manager = ReconnectManager::neu(addr.to_string(), Arc::clone(&store), DEFAULT_MAX_FRAME_SIZE);
    let ereignisse = manager.ereignisse();
    let status = manager.status();
    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(manager.laufen(anfragen, shutdown_rx));

    TestClient {
        sitzung: ClientSitzung::neu(poster, store),
        ereignisse,
        status,
        _shutdown: shutdown,
    }
}

async fn neuer_client(addr: SocketAddr) -> TestClient {
    client_starten(addr, Arc::new(ClientDb::in_memory().await.unwrap())).await
}

impl TestClient {
    /// Wartet auf das erste Ereignis, das `passt`
    async fn ereignis_erwarten(&mut self, passt: impl Fn(&ClientEreignis) -> bool) -> ClientEreignis {
        self.ereignis_erwarten_binnen(WARTEZEIT, passt).await
    }

    async fn ereignis_erwarten_binnen(
        &mut self,
        frist: Duration,
        passt: impl Fn(&ClientEreignis) -> bool,
    ) -> ClientEreignis {
        tokio::time::timeout(frist, async {
            loop {
                let e = self.ereignisse.recv().await.unwrap();
                if passt(&e) {
                    return e;
                }
            }
        })
        .await
        .expect("Ereignis nicht eingetroffen")
    }

    async fn status_erwarten(&mut self, erwartet: VerbindungsStatus) {
        tokio::time::timeout(WIEDERAUFBAU_FRIST, self.status.wait_for(|s| *s == erwartet))
            .await
            .expect("Status nicht erreicht")
            .unwrap();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nachricht_landet_im_posteingang() {
    let server = server_starten(Arc::new(SqliteDb::in_memory().await.unwrap()), None).await;
    let alice = neuer_client(server.addr).await;
    let mut bob = neuer_client(server.addr).await;

    let a = alice.sitzung.registrieren("alice", "geheim").await.unwrap();
    let b = bob.sitzung.registrieren("bob", "geheim").await.unwrap();
    assert_eq!(a.username, "alice");
    assert_ne!(a.id, b.id);

    let liste = alice.sitzung.benutzer().await.unwrap();
    assert_eq!(liste.len(), 1);
    assert_eq!(liste[0].username, "bob");
    assert!(liste[0].online);

    alice.sitzung.nachricht_senden("bob", "hallo bob").await.unwrap();
    bob.ereignis_erwarten(|e| matches!(e, ClientEreignis::Nachricht { von } if von == "alice"))
        .await;

    assert_eq!(
        bob.sitzung.ungelesen().await.unwrap(),
        [("alice".to_string(), 1)]
    );
    let nachrichten = bob.sitzung.posteingang("alice").await.unwrap();
    assert_eq!(nachrichten.len(), 1);
    assert_eq!(nachrichten[0].data, b"hallo bob");
    assert!(bob.sitzung.posteingang("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn praesenz_wird_gemeldet() {
    let server = server_starten(Arc::new(SqliteDb::in_memory().await.unwrap()), None).await;
    let mut alice = neuer_client(server.addr).await;
    alice.sitzung.registrieren("alice", "pw").await.unwrap();

    let bob = neuer_client(server.addr).await;
    bob.sitzung.registrieren("bob", "pw").await.unwrap();
    alice
        .ereignis_erwarten(|e| {
            *e == ClientEreignis::Praesenz {
                username: "bob".into(),
                online: true,
            }
        })
        .await;

    bob.sitzung.abmelden().await.unwrap();
    alice
        .ereignis_erwarten(|e| {
            *e == ClientEreignis::Praesenz {
                username: "bob".into(),
                online: false,
            }
        })
        .await;
}

#[tokio::test]
async fn falsches_passwort_liefert_fehlercode() {
    let server = server_starten(Arc::new(SqliteDb::in_memory().await.unwrap()), None).await;
    let client = neuer_client(server.addr).await;
    client.sitzung.registrieren("carol", "richtig").await.unwrap();

    let fehler = client.sitzung.anmelden("carol", "falsch").await.unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::BcryptCompare));

    let fehler = client.sitzung.registrieren("carol", "egal").await.unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::AccountExists));
}

#[tokio::test]
async fn automatische_anmeldung_und_abmeldung() {
    let server = server_starten(Arc::new(SqliteDb::in_memory().await.unwrap()), None).await;
    let store = Arc::new(ClientDb::in_memory().await.unwrap());

    let erster = client_starten(server.addr, Arc::clone(&store)).await;
    assert_eq!(erster.sitzung.auto_login().await.unwrap(), None);
    let daten = erster.sitzung.registrieren("dora", "pw").await.unwrap();
    drop(erster);

    // Neuer Prozess, gleicher lokaler Speicher
    let zweiter = client_starten(server.addr, Arc::clone(&store)).await;
    assert_eq!(zweiter.sitzung.auto_login().await.unwrap(), Some(daten));
    assert!(zweiter.sitzung.benutzer().await.is_ok());

    zweiter.sitzung.abmelden().await.unwrap();
    assert_eq!(zweiter.sitzung.eigener_username().await.unwrap(), None);
    assert_eq!(zweiter.sitzung.auto_login().await.unwrap(), None);
    assert!(matches!(
        zweiter.sitzung.benutzer().await.unwrap_err().server_code(),
        Some(ErrorCode::Forbidden)
    ));
}

#[tokio::test]
async fn wiederaufbau_erneuert_die_sitzung() {
    let db = Arc::new(SqliteDb::in_memory().await.unwrap());
    let server = server_starten(Arc::clone(&db), None).await;
    let addr = server.addr;

    let mut client = neuer_client(addr).await;
    client.sitzung.registrieren("erik", "pw").await.unwrap();
    client.status_erwarten(VerbindungsStatus::Verbunden).await;

    // Server stoppen: alle Verbindungen werden getrennt
    server.shutdown.send(true).unwrap();
    client.status_erwarten(VerbindungsStatus::Verbindet).await;

    let _neu = server_starten(Arc::clone(&db), Some(addr)).await;
    client.status_erwarten(VerbindungsStatus::Verbunden).await;

    // Die Token-Pruefung nach dem Wiederaufbau meldet die Sitzung wieder an
    let ergebnis = tokio::time::timeout(WARTEZEIT, async {
        loop {
            match client.sitzung.benutzer().await {
                Ok(liste) => return liste,
                Err(ClientError::Server(ErrorCode::Forbidden)) | Err(ClientError::Getrennt) => {
                    tokio::time::sleep(Duration::from_millis(20)).await
                }
                Err(e) => panic!("Unerwarteter Fehler: {e}"),
            }
        }
    })
    .await
    .expect("Sitzung nicht erneuert");
    assert!(ergebnis.is_empty());
}

#[tokio::test]
async fn nachricht_aus_der_trennung_wird_nach_wiederaufbau_zugestellt() {
    let db = Arc::new(SqliteDb::in_memory().await.unwrap());
    let server = server_starten(Arc::clone(&db), None).await;
    let addr = server.addr;

    let mut alice = neuer_client(addr).await;
    alice.sitzung.registrieren("alice", "pw").await.unwrap();
    alice.status_erwarten(VerbindungsStatus::Verbunden).await;

    server.shutdown.send(true).unwrap();
    alice.status_erwarten(VerbindungsStatus::Verbindet).await;

    // Landet in der Anfrage-Queue, solange keine Verbindung besteht
    alice
        .sitzung
        .nachricht_senden("bob", "waehrend der Trennung")
        .await
        .unwrap();

    let _neu = server_starten(Arc::clone(&db), Some(addr)).await;
    let mut bob = neuer_client(addr).await;
    bob.sitzung.registrieren("bob", "pw").await.unwrap();

    bob.ereignis_erwarten_binnen(WIEDERAUFBAU_FRIST, |e| {
        matches!(e, ClientEreignis::Nachricht { von } if von == "alice")
    })
    .await;
    let nachrichten = bob.sitzung.posteingang("alice").await.unwrap();
    assert_eq!(nachrichten.len(), 1);
    assert_eq!(nachrichten[0].data, b"waehrend der Trennung");

    // Die Nachricht wurde nicht als anonyme Anfrage abgelehnt
    while let Ok(ereignis) = alice.ereignisse.try_recv() {
        assert!(
            !matches!(ereignis, ClientEreignis::ServerFehler { .. }),
            "Unerwarteter Serverfehler: {ereignis:?}"
        );
    }
}
