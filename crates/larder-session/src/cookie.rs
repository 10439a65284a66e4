//! Helpers for carrying session tokens in cookies.
//!
//! The HTTP layer is expected to set [`session_cookie`] after login or
//! registration, read the token back with [`token_from_cookie_header`], and
//! clear it with [`expired_session_cookie`] on logout. The redirect target
//! after login travels through the login form as [`encode_target`] output.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

/// Name of the cookie holding the session token.
pub const SESSION_COOKIE: &str = "id";

/// Attributes shared by every session cookie.
const COOKIE_ATTRIBUTES: &str = "Path=/; HttpOnly; Secure; SameSite=Strict";

/// `Set-Cookie` value carrying `token`.
pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; {COOKIE_ATTRIBUTES}")
}

/// `Set-Cookie` value deleting the session cookie.
pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; {COOKIE_ATTRIBUTES}; Max-Age=0")
}

/// Extract the session token from a `Cookie` request header.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Encode a redirect target for a form field or query parameter.
pub fn encode_target(target: &str) -> String {
    URL_SAFE.encode(target)
}

/// Decode a target produced by [`encode_target`].
///
/// Anything that does not decode to a same-origin absolute path yields `/`,
/// so the value cannot be abused as an open redirect.
pub fn decode_target(encoded: &str) -> String {
    URL_SAFE
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|target| is_local_path(target))
        .unwrap_or_else(|| "/".to_string())
}

fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}
