//! Session cookie middleware.
//!
//! Reads the session id from the request cookie (issuing a fresh one when
//! absent or malformed), exposes it to handlers as an extension and sets the
//! cookie on the response when it was newly issued.

use crate::session::SessionId;
use axum::extract::Request;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "zone_averages_session";

/// Extract the session id from `Cookie` headers.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

fn set_cookie_value(id: SessionId) -> HeaderValue {
    let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub async fn session_cookie(mut request: Request, next: Next) -> Response {
    let (id, issued) = match session_from_headers(request.headers()) {
        Some(id) => (id, false),
        None => (Uuid::new_v4(), true),
    };

    request.extensions_mut().insert(id);
    let mut response = next.run(request).await;

    if issued {
        response
            .headers_mut()
            .append(SET_COOKIE, set_cookie_value(id));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_headers() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}")).unwrap(),
        );

        assert_eq!(session_from_headers(&headers), Some(id));
    }

    #[test]
    fn test_malformed_cookie_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}=not-a-uuid")).unwrap(),
        );

        assert_eq!(session_from_headers(&headers), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_set_cookie_value() {
        let id = Uuid::new_v4();
        let value = set_cookie_value(id);
        let text = value.to_str().unwrap();

        assert!(text.starts_with(&format!("{SESSION_COOKIE}={id}")));
        assert!(text.contains("HttpOnly"));
    }
}
