//! Plauder – Kommandozeilen-Client
//!
//! Zeilenorientiert: `/signup <name> <passwort>`, `/signin <name> <passwort>`,
//! `/users`, `/msg <name> <text>`, `/inbox <name>`, `/signout`, `/quit`.

use anyhow::Result;
use plauder_client::{ClientConfig, ClientEreignis, ClientSitzung, Poster, ReconnectManager};
use plauder_db::ClientDb;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

const HILFE: &str = "\
Befehle:
  /signup <name> <passwort>
  /signin <name> <passwort>
  /users
  /msg <name> <text>
  /inbox <name>
  /signout
  /quit";

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var_os("PLAUDER_CLIENT_CONFIG").map(PathBuf::from);
    let config = ClientConfig::laden(config_pfad.as_deref())?;

    plauder_observability::logging_initialisieren_stderr(&config.logging.level);

    let verzeichnis = config.arbeitsverzeichnis();
    std::fs::create_dir_all(&verzeichnis)?;
    let store = Arc::new(ClientDb::oeffnen(&config.db_pfad()).await?);

    let (poster, anfragen) = Poster::neu();
    let manager = ReconnectManager::neu(
        config.verbindung.server_adresse.clone(),
        Arc::clone(&store),
        config.verbindung.max_frame_groesse,
    );
    let mut ereignisse = manager.ereignisse();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let verbindung = tokio::spawn(manager.laufen(anfragen, shutdown_rx));

    tokio::spawn(async move {
        while let Ok(ereignis) = ereignisse.recv().await {
            match ereignis {
                ClientEreignis::Nachricht { von } => println!("* Neue Nachricht von {von}"),
                ClientEreignis::Praesenz { username, online } => {
                    println!("* {username} ist {}", if online { "online" } else { "offline" })
                }
                fehler @ ClientEreignis::ServerFehler { .. } => {
                    if let Some(e) = fehler.als_fehler() {
                        println!("! {e}");
                    }
                }
            }
        }
    });

    let sitzung = ClientSitzung::neu(poster, store);
    match sitzung.auto_login().await {
        Ok(Some(daten)) => println!("Angemeldet als {}", daten.username),
        Ok(None) => println!("Nicht angemeldet. /help fuer Befehle"),
        Err(e) => println!("! Automatische Anmeldung fehlgeschlagen: {e}"),
    }

    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
    while let Some(zeile) = zeilen.next_line().await? {
        if !befehl_ausfuehren(&sitzung, zeile.trim()).await {
            break;
        }
    }

    // Letzter Poster geht mit der Sitzung, danach endet der Multiplexer
    drop(sitzung);
    let _ = shutdown_tx.send(true);
    match verbindung.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => eprintln!("! {e}"),
        Err(e) => eprintln!("! Verbindungs-Task abgebrochen: {e}"),
    }
    Ok(())
}

/// Fuehrt eine Eingabezeile aus; `false` beendet den Client
async fn befehl_ausfuehren(sitzung: &ClientSitzung<ClientDb>, zeile: &str) -> bool {
    let mut teile = zeile.splitn(3, ' ');
    let befehl = teile.next().unwrap_or_default();
    let erstes = teile.next().unwrap_or_default();
    let rest = teile.next().unwrap_or_default();

    let ergebnis = match befehl {
        "" => Ok(()),
        "/quit" => return false,
        "/help" => {
            println!("{HILFE}");
            Ok(())
        }
        "/signup" => sitzung
            .registrieren(erstes, rest)
            .await
            .map(|d| println!("Registriert als {} (id {})", d.username, d.id)),
        "/signin" => sitzung
            .anmelden(erstes, rest)
            .await
            .map(|d| println!("Angemeldet als {} (id {})", d.username, d.id)),
        "/users" => sitzung.benutzer().await.map(|liste| {
            for (i, b) in liste.iter().enumerate() {
                let online = if b.online { " (online)" } else { "" };
                let neu = if b.ungelesen > 0 {
                    format!(" [{}+]", b.ungelesen)
                } else {
                    String::new()
                };
                println!("{}. {}{online}{neu}", i + 1, b.username);
            }
        }),
        "/msg" => sitzung.nachricht_senden(erstes, rest).await,
        "/inbox" => sitzung.posteingang(erstes).await.map(|nachrichten| {
            for n in nachrichten {
                println!("{}: {}", n.from, String::from_utf8_lossy(&n.data));
            }
        }),
        "/signout" => sitzung.abmelden().await.map(|()| println!("Abgemeldet")),
        _ => {
            println!("{HILFE}");
            Ok(())
        }
    };

    if let Err(e) = ergebnis {
        println!("! {e}");
    }
    true
}
