//! Encrypted session cookie codec.
//!
//! The session lives entirely client-side in one encrypted cookie (grounded
//! on the original cookie session store). The cookie payload is the
//! serialized [`Session`]; a missing or undecodable cookie simply starts a
//! fresh unauthenticated session.

use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use graftgate_core::Session;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "graftgate_session";

/// Load the session from the cookie jar, or start a fresh one.
pub fn load(jar: &PrivateCookieJar) -> Session {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| serde_json::from_str(cookie.value()).ok())
        .unwrap_or_default()
}

/// Write the session back into the jar.
pub fn store(
    jar: PrivateCookieJar,
    session: &Session,
    max_age: std::time::Duration,
) -> PrivateCookieJar {
    // Serialization of a plain struct cannot fail; an empty payload would
    // only drop the session, which the loader tolerates.
    let payload = serde_json::to_string(session).unwrap_or_default();
    let cookie = Cookie::build((SESSION_COOKIE, payload))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::try_from(max_age).unwrap_or(time::Duration::MAX))
        .build();
    jar.add(cookie)
}
