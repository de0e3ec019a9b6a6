//! Auth-Handler – SIGNUP, SIGNIN, TOKEN
//!
//! Alle drei liefern bei Erfolg eine `Anmeldung` mit frisch ausgestelltem
//! Token. Fehler werden auf den Fehlercode der `TokenRes` abgebildet.

use plauder_auth::{Anmeldung, AuthError};
use plauder_protocol::packet::{Auth, Signin, Signup, Token, TokenRes};
use plauder_protocol::ErrorCode;

use crate::server_state::{ServerRepository, SignalingState};

/// Bildet einen Auth-Fehler auf den Fehlercode ab
///
/// `standard` gilt fuer Fehler ohne eigenen Code (Datenbank, intern).
pub fn fehlercode(fehler: &AuthError, standard: ErrorCode) -> ErrorCode {
    match fehler {
        AuthError::PasswortHashing(_) => ErrorCode::BcryptGen,
        AuthError::HashKodierung(_) => ErrorCode::Base64Decode,
        AuthError::PasswortVergleich(_) | AuthError::FalschesPasswort => ErrorCode::BcryptCompare,
        AuthError::KontoExistiert(_) => ErrorCode::AccountExists,
        AuthError::KontoNichtGefunden(_) => ErrorCode::AccountNotFound,
        AuthError::TokenUngueltig => ErrorCode::ParseToken,
        AuthError::TokenAbgelaufen => ErrorCode::TokenExpired,
        AuthError::TokenErzeugung(_) => ErrorCode::GenToken,
        AuthError::SchluesselUngueltig(_) | AuthError::Datenbank(_) | AuthError::Intern(_) => {
            standard
        }
    }
}

/// Baut die `TokenRes` fuer ein Auth-Ergebnis
pub fn token_antwort(ergebnis: &Result<Anmeldung, ErrorCode>) -> TokenRes {
    match ergebnis {
        Ok(anmeldung) => TokenRes {
            code: 0,
            id: anmeldung.konto.id.inner(),
            username: anmeldung.konto.username.clone(),
            token: anmeldung.token.clone(),
        },
        Err(code) => TokenRes::fehler(*code),
    }
}

fn zugangsdaten(auth: Option<Auth>) -> Result<Auth, ErrorCode> {
    auth.ok_or(ErrorCode::Unmarshal)
}

/// Registriert ein neues Konto
pub async fn handle_signup<R: ServerRepository>(
    request: Signup,
    state: &SignalingState<R>,
) -> Result<Anmeldung, ErrorCode> {
    let auth = zugangsdaten(request.auth)?;
    state
        .auth_service
        .registrieren(&auth.username, &auth.passhash)
        .await
        .map_err(|e| {
            tracing::info!(username = %auth.username, fehler = %e, "Registrierung abgelehnt");
            fehlercode(&e, ErrorCode::AccountExists)
        })
}

/// Anmeldung mit Benutzername und `passhash`
pub async fn handle_signin<R: ServerRepository>(
    request: Signin,
    state: &SignalingState<R>,
) -> Result<Anmeldung, ErrorCode> {
    let auth = zugangsdaten(request.auth)?;
    state
        .auth_service
        .anmelden(&auth.username, &auth.passhash)
        .await
        .map_err(|e| {
            tracing::info!(username = %auth.username, fehler = %e, "Anmeldung abgelehnt");
            fehlercode(&e, ErrorCode::AccountNotFound)
        })
}

/// Anmeldung mit einem zuvor ausgestellten Token
pub async fn handle_token<R: ServerRepository>(
    request: Token,
    state: &SignalingState<R>,
) -> Result<Anmeldung, ErrorCode> {
    state
        .auth_service
        .token_anmelden(&request.token)
        .await
        .map_err(|e| {
            tracing::debug!(fehler = %e, "Token abgelehnt");
            fehlercode(&e, ErrorCode::AccountNotFound)
        })
}
