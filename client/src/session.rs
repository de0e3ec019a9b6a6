//! Client-Sitzung: Anmeldung, Benutzerliste, Nachrichten, lokaler Speicher

use plauder_core::AccountId;
use plauder_db::models::schluessel;
use plauder_db::{LocalMessage, LocalStore};
use plauder_protocol::packet::TokenRes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ClientError, ClientResult};
use crate::poster::Poster;

/// SHA-256 des Klartext-Passworts; nur dieser Wert verlaesst den Client
pub fn passhash(passwort: &str) -> Vec<u8> {
    Sha256::digest(passwort.as_bytes()).to_vec()
}

/// Angemeldetes Konto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anmeldedaten {
    pub id: AccountId,
    pub username: String,
}

/// Eintrag der Benutzerliste mit lokalem Zustand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenutzerEintrag {
    pub username: String,
    pub online: bool,
    pub ungelesen: u32,
}

/// Speichert Konto und Token aus einer erfolgreichen Antwort
pub(crate) async fn token_speichern<L>(store: &L, res: &TokenRes) -> ClientResult<Anmeldedaten>
where
    L: LocalStore + ?Sized,
{
    let id = AccountId(res.id);
    store.store_token(id, &res.username, &res.token).await?;
    Ok(Anmeldedaten {
        id,
        username: res.username.clone(),
    })
}

/// Meldet sich mit dem gespeicherten Token an und speichert das neue
///
/// `Ok(None)`, wenn kein Token gespeichert ist.
pub async fn token_erneuern<L>(poster: &Poster, store: &L) -> ClientResult<Option<Anmeldedaten>>
where
    L: LocalStore + ?Sized,
{
    let Some(token) = store.get_value(schluessel::TOKEN).await? else {
        return Ok(None);
    };
    let res = poster.validate_token(token).await?;
    Ok(Some(token_speichern(store, &res).await?))
}

// ---------------------------------------------------------------------------
// ClientSitzung
// ---------------------------------------------------------------------------

pub struct ClientSitzung<L: LocalStore> {
    poster: Poster,
    store: Arc<L>,
}

impl<L: LocalStore> ClientSitzung<L> {
    pub fn neu(poster: Poster, store: Arc<L>) -> Self {
        Self { poster, store }
    }

    pub fn poster(&self) -> &Poster {
        &self.poster
    }

    pub async fn registrieren(&self, username: &str, passwort: &str) -> ClientResult<Anmeldedaten> {
        let res = self.poster.signup(username, passhash(passwort)).await?;
        let daten = token_speichern(&*self.store, &res).await?;
        tracing::info!(username = %daten.username, id = daten.id.inner(), "Registriert");
        Ok(daten)
    }

    pub async fn anmelden(&self, username: &str, passwort: &str) -> ClientResult<Anmeldedaten> {
        let res = self.poster.signin(username, passhash(passwort)).await?;
        let daten = token_speichern(&*self.store, &res).await?;
        tracing::info!(username = %daten.username, id = daten.id.inner(), "Angemeldet");
        Ok(daten)
    }

    /// Automatische Anmeldung beim Start mit dem gespeicherten Token
    ///
    /// Ein abgelehntes Token ergibt `Ok(None)`; der Benutzer muss sich dann
    /// neu anmelden.
    pub async fn auto_login(&self) -> ClientResult<Option<Anmeldedaten>> {
        match token_erneuern(&self.poster, &*self.store).await {
            Ok(daten) => Ok(daten),
            Err(e) if e.server_code().is_some() => {
                tracing::info!(fehler = %e, "Gespeichertes Token abgelehnt");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Gespeicherter Benutzername, falls angemeldet
    pub async fn eigener_username(&self) -> ClientResult<Option<String>> {
        Ok(self
            .store
            .get_value(schluessel::USERNAME)
            .await?
            .and_then(|v| String::from_utf8(v).ok()))
    }

    /// Alle anderen Benutzer mit Online-Status und Anzahl ungelesener
    /// Nachrichten
    pub async fn benutzer(&self) -> ClientResult<Vec<BenutzerEintrag>> {
        let users = self.poster.users().await?;
        let ungelesen: HashMap<String, u32> =
            self.store.unread_message_count().await?.into_iter().collect();

        // Hinweise seit der letzten Abfrage verwerfen, die Liste ist aktueller
        self.store.pop_online_push_notifications().await?;

        Ok(users
            .into_iter()
            .map(|u| BenutzerEintrag {
                ungelesen: ungelesen.get(&u.username).copied().unwrap_or(0),
                username: u.username,
                online: u.online,
            })
            .collect())
    }

    /// Wendet gesammelte Praesenz-Hinweise auf eine Benutzerliste an
    pub async fn praesenz_aktualisieren(&self, liste: &mut [BenutzerEintrag]) -> ClientResult<()> {
        let hinweise = self.store.pop_online_push_notifications().await?;
        let ungelesen: HashMap<String, u32> =
            self.store.unread_message_count().await?.into_iter().collect();
        for eintrag in liste.iter_mut() {
            if let Some(h) = hinweise.iter().find(|h| h.username == eintrag.username) {
                eintrag.online = h.online;
            }
            eintrag.ungelesen = ungelesen.get(&eintrag.username).copied().unwrap_or(0);
        }
        Ok(())
    }

    pub async fn nachricht_senden(&self, an: &str, text: &str) -> ClientResult<()> {
        let von = self
            .eigener_username()
            .await?
            .ok_or(ClientError::NichtAngemeldet)?;
        self.poster.send_text(&von, an, text).await
    }

    /// Liest die Nachrichten von `von` und entfernt sie aus dem Posteingang
    pub async fn posteingang(&self, von: &str) -> ClientResult<Vec<LocalMessage>> {
        Ok(self.store.pop_messages_from(von).await?)
    }

    /// Ungelesene Nachrichten je Absender
    pub async fn ungelesen(&self) -> ClientResult<Vec<(String, u32)>> {
        Ok(self.store.unread_message_count().await?)
    }

    /// Meldet ab und loescht Zugangsdaten, Posteingang und Hinweise
    pub async fn abmelden(&self) -> ClientResult<()> {
        self.poster.signout().await?;
        self.store.drop_privacy_data().await?;
        tracing::info!("Abgemeldet");
        Ok(())
    }
}
