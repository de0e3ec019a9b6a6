//! plauder-auth – Authentifizierung
//!
//! - Passwoerter: bcrypt (Kosten 14), base64-kodiert gespeichert
//! - Sitzungs-Token: AES-256-GCM ueber `{account_id, ausgestellt}`,
//!   zustandslos und 30 Tage gueltig
//! - `AuthService`: Registrierung, Anmeldung und Token-Anmeldung gegen
//!   ein `AccountRepository`

pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use password::{PasswordHasher, BCRYPT_COST};
pub use service::{Anmeldung, AuthService};
pub use token::{TokenInhalt, TokenService, TOKEN_GUELTIGKEIT_SEK};
