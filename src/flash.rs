//! One-shot messages carried across a redirect in a signed cookie.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use cookie::{Cookie, CookieJar, Key, SameSite};
use serde::{Deserialize, Serialize};
use tracing::warn;

const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Warning,
    Error,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Warning,
            message: message.into(),
        }
    }
}

/// `303 See Other` to `to`, leaving `flash` for the next page load.
pub fn redirect_with_flash(key: &Key, to: &str, flash: &Flash) -> Response {
    let mut response = Redirect::to(to).into_response();

    let value = match serde_json::to_string(flash) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "Failed to serialize flash message");
            return response;
        }
    };

    let mut jar = CookieJar::new();
    jar.signed_mut(key).add(
        Cookie::build((FLASH_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    );
    append_delta(&jar, response.headers_mut());
    response
}

/// Read the pending flash, if any, and the `Set-Cookie` value that clears it.
///
/// Tampered or unreadable cookies are dropped silently.
pub fn take_flash(key: &Key, headers: &HeaderMap) -> (Option<Flash>, Option<HeaderValue>) {
    let mut jar = CookieJar::new();
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse_encoded(raw.to_owned()).flatten() {
            jar.add_original(cookie);
        }
    }

    if jar.get(FLASH_COOKIE).is_none() {
        return (None, None);
    }

    let flash = jar
        .signed(key)
        .get(FLASH_COOKIE)
        .and_then(|cookie| serde_json::from_str::<Flash>(cookie.value()).ok());

    jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
    let mut clear = HeaderMap::new();
    append_delta(&jar, &mut clear);

    (flash, clear.remove(SET_COOKIE))
}

fn append_delta(jar: &CookieJar, headers: &mut HeaderMap) {
    for cookie in jar.delta() {
        match HeaderValue::from_str(&cookie.encoded().to_string()) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "Dropping unencodable cookie"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_header_from(response: &Response) -> HeaderMap {
        let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&pair).unwrap());
        headers
    }

    #[test]
    fn flash_survives_the_redirect() {
        let key = Key::generate();
        let flash = Flash::error("You have already registered.");

        let response = redirect_with_flash(&key, "/", &flash);
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get("location").unwrap(), "/");

        let (read, clear) = take_flash(&key, &cookie_header_from(&response));
        assert_eq!(read, Some(flash));
        let clear = clear.unwrap();
        assert!(clear.to_str().unwrap().starts_with("flash=;"));
    }

    #[test]
    fn no_cookie_means_no_flash() {
        let (flash, clear) = take_flash(&Key::generate(), &HeaderMap::new());
        assert!(flash.is_none());
        assert!(clear.is_none());
    }

    #[test]
    fn cookie_signed_with_another_key_is_ignored_but_cleared() {
        let response = redirect_with_flash(&Key::generate(), "/", &Flash::warning("hi"));

        let (flash, clear) = take_flash(&Key::generate(), &cookie_header_from(&response));
        assert!(flash.is_none());
        assert!(clear.is_some());
    }
}
