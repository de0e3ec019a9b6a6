//! User-Handler – USERS

use plauder_protocol::packet::{User, UsersRes};
use plauder_protocol::ErrorCode;

use crate::dispatcher::SitzungsZustand;
use crate::server_state::{ServerRepository, SignalingState};

/// Liefert alle Konten ausser dem eigenen
pub async fn handle_users<R: ServerRepository>(
    sitzung: &SitzungsZustand,
    state: &SignalingState<R>,
) -> UsersRes {
    if !sitzung.ist_angemeldet() {
        return UsersRes::fehler(ErrorCode::Forbidden);
    }

    match state.db.get_users(&sitzung.username).await {
        Ok(eintraege) => UsersRes {
            code: 0,
            users: eintraege
                .into_iter()
                .map(|e| User {
                    username: e.username,
                    online: e.online,
                })
                .collect(),
        },
        Err(e) => {
            tracing::warn!(username = %sitzung.username, fehler = %e, "Benutzerliste nicht lesbar");
            UsersRes::fehler(ErrorCode::GetUsers)
        }
    }
}
