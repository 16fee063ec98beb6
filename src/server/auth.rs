//! Hand-rolled HMAC-signed staff cookie sessions (spec §4.11). Not a
//! session-store crate: the cookie itself carries `{session_id}.
//! {expires_at_ms}.{hex(hmac)}` and is verified by recomputing the HMAC
//! over the first two fields with a server-held secret.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::server::http::AppState;

const STAFF_COOKIE_NAME: &str = "kiosk_staff_session";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffSession {
    pub session_id: String,
    pub expires_at_ms: i64,
}

fn hmac_hex(secret: &[u8], message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Mints a new signed cookie value valid for `ttl_ms` from `now_ms`.
pub fn issue_cookie(secret: &[u8], now_ms: i64, ttl_ms: i64) -> (StaffSession, String) {
    let session_id = Uuid::new_v4().to_string();
    let expires_at_ms = now_ms + ttl_ms;
    let message = format!("{session_id}.{expires_at_ms}");
    let signature = hmac_hex(secret, &message);
    let cookie_value = format!("{message}.{signature}");
    (StaffSession { session_id, expires_at_ms }, cookie_value)
}

/// Verifies a cookie value, returning `None` if malformed, mis-signed, or
/// expired as of `now_ms`.
pub fn verify_cookie(secret: &[u8], cookie_value: &str, now_ms: i64) -> Option<StaffSession> {
    let mut parts = cookie_value.splitn(3, '.');
    let session_id = parts.next()?;
    let expires_at_raw = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let expires_at_ms: i64 = expires_at_raw.parse().ok()?;

    let message = format!("{session_id}.{expires_at_raw}");
    let expected = hmac_hex(secret, &message);
    if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        return None;
    }
    if now_ms >= expires_at_ms {
        return None;
    }
    Some(StaffSession { session_id: session_id.to_string(), expires_at_ms })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn cookie_header(cookie_value: &str, max_age_secs: i64) -> String {
    format!("{STAFF_COOKIE_NAME}={cookie_value}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_secs}")
}

fn extract_cookie_value(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|kv| {
        let (name, value) = kv.trim().split_once('=')?;
        (name == STAFF_COOKIE_NAME).then(|| value.to_string())
    })
}

/// An axum extractor: routes that take `StaffAuth` as an argument are
/// rejected with 401 unless a valid, unexpired session cookie is present.
pub struct StaffAuth(pub StaffSession);

impl FromRequestParts<AppState> for StaffAuth {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let cookie_value = extract_cookie_value(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        let session = verify_cookie(state.staff_cookie_secret.as_bytes(), &cookie_value, now_ms).ok_or(StatusCode::UNAUTHORIZED)?;
        Ok(StaffAuth(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_cookie_verifies_before_expiry() {
        let secret = b"test-secret";
        let (session, cookie) = issue_cookie(secret, 0, 180_000);
        let verified = verify_cookie(secret, &cookie, 1_000).unwrap();
        assert_eq!(verified.session_id, session.session_id);
    }

    #[test]
    fn expired_cookie_fails_verification() {
        let secret = b"test-secret";
        let (_, cookie) = issue_cookie(secret, 0, 1_000);
        assert!(verify_cookie(secret, &cookie, 1_000).is_none());
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let secret = b"test-secret";
        let (_, cookie) = issue_cookie(secret, 0, 180_000);
        let mut tampered = cookie.clone();
        tampered.push('0');
        assert!(verify_cookie(secret, &tampered, 1_000).is_none());
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let (_, cookie) = issue_cookie(b"secret-a", 0, 180_000);
        assert!(verify_cookie(b"secret-b", &cookie, 1_000).is_none());
    }
}
