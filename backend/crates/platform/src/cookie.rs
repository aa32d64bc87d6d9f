//! Cookie Management Infrastructure
//!
//! `Set-Cookie` building and `Cookie` header parsing shared by the session and
//! CSRF cookies.

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};

/// SameSite policy for cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Cookie configuration
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
        }
    }
}

impl CookieConfig {
    /// Build a `Set-Cookie` value; `expires_at` adds matching `Expires` and
    /// `Max-Age` attributes, otherwise the cookie lives for the browser session.
    pub fn build_set_cookie(&self, value: &str, expires_at: Option<DateTime<Utc>>) -> String {
        let mut cookie = format!("{}={}", self.name, value);
        self.push_attributes(&mut cookie);

        if let Some(expires_at) = expires_at {
            let max_age = (expires_at - Utc::now()).num_seconds().max(0);
            cookie.push_str(&format!("; Expires={}", http_date(expires_at)));
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }

        cookie
    }

    /// Build a `Set-Cookie` value that makes the browser drop the cookie
    pub fn build_delete_cookie(&self) -> String {
        let mut cookie = format!("{}=", self.name);
        self.push_attributes(&mut cookie);
        cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0");
        cookie
    }

    fn push_attributes(&self, cookie: &mut String) {
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(&format!("; SameSite={}", self.same_site.as_str()));
        cookie.push_str(&format!("; Path={}", self.path));
    }
}

/// IMF-fixdate as required by RFC 6265
fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Extract a cookie value from headers
///
/// Every `Cookie` header is inspected; the first pair with a matching name wins.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;

            if key == name {
                Some(value.to_string())
            } else {
                None
            }
        })
}

/// Append a `Set-Cookie` header; values that are not valid header text are dropped
pub fn append_set_cookie(headers: &mut HeaderMap, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(_) => tracing::warn!("Dropping Set-Cookie value with invalid characters"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn config() -> CookieConfig {
        CookieConfig {
            name: "test".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            path: "/api".to_string(),
        }
    }

    #[test]
    fn test_cookie_config_build() {
        let cookie = config().build_set_cookie("value123", None);
        assert!(cookie.starts_with("test=value123"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/api"));
        assert!(!cookie.contains("Expires"));
    }

    #[test]
    fn test_cookie_with_expiry() {
        let expires = Utc::now() + Duration::hours(12);
        let cookie = config().build_set_cookie("v", Some(expires));
        assert!(cookie.contains(&format!("Expires={}", http_date(expires))));
        assert!(cookie.contains("Max-Age=43"));
    }

    #[test]
    fn test_http_date_format() {
        let at = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        assert_eq!(http_date(at), "Wed, 21 Oct 2015 07:28:00 GMT");
    }

    #[test]
    fn test_insecure_cookie_has_no_secure_flag() {
        let config = CookieConfig {
            secure: false,
            ..config()
        };
        assert!(!config.build_set_cookie("v", None).contains("Secure"));
    }

    #[test]
    fn test_delete_cookie() {
        let cookie = config().build_delete_cookie();
        assert!(cookie.starts_with("test=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("Path=/api"));
    }

    #[test]
    fn test_extract_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; session=abc123; other=xyz"),
        );

        assert_eq!(
            extract_cookie(&headers, "session"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_cookie(&headers, "foo"), Some("bar".to_string()));
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_extract_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));
        assert_eq!(extract_cookie(&headers, "b"), Some("2".to_string()));
    }

    #[test]
    fn test_append_set_cookie() {
        let mut headers = HeaderMap::new();
        append_set_cookie(&mut headers, "a=1".to_string());
        append_set_cookie(&mut headers, "b=2".to_string());
        append_set_cookie(&mut headers, "bad=\n".to_string());
        assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 2);
    }
}
