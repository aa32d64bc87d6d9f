//! CSRF Middleware
//!
//! Every request is issued a fresh token: it is stored in the request
//! extensions (see [`CsrfToken`]) and set as a cookie on the response.
//! Requests with a method outside `ignored_methods` must echo the value of the
//! token from the cookie they arrived with, either in the configured header or
//! in a form field (urlencoded or multipart). The body is buffered to read the
//! field and handed on untouched.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Form;
use axum::body::{self, Body, Bytes};
use axum::extract::{FromRequest, FromRequestParts, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::cookie::{append_set_cookie, extract_cookie};
use platform::csrf::{CsrfConfig, CsrfError, CsrfToken as IssuedToken};

use crate::error::AuthError;

/// Largest body buffered while looking for the form field
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct CsrfState {
    config: Arc<CsrfConfig>,
    max_body_bytes: usize,
}

impl CsrfState {
    pub fn new(config: CsrfConfig) -> Self {
        Self {
            config: Arc::new(config),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }
}

/// Issue a token for this request and validate the one it carries
pub async fn csrf_protect(State(state): State<CsrfState>, req: Request, next: Next) -> Response {
    let fresh = IssuedToken::generate(&state.config);
    let set_cookie = fresh.to_set_cookie(&state.config);

    let mut req = if state.config.is_ignored(req.method()) {
        req
    } else {
        match verify_request(&state, req).await {
            Ok(req) => req,
            Err(e) => {
                let mut response = AuthError::from(e).into_response();
                append_set_cookie(response.headers_mut(), set_cookie);
                return response;
            }
        }
    };

    req.extensions_mut().insert(CsrfToken(fresh));

    let mut response = next.run(req).await;
    append_set_cookie(response.headers_mut(), set_cookie);
    response
}

async fn verify_request(state: &CsrfState, req: Request) -> Result<Request, CsrfError> {
    let config = &state.config;

    let cookie = extract_cookie(req.headers(), &config.effective_cookie_name())
        .ok_or(CsrfError::MissingCookie)?;
    let expected = IssuedToken::from_cookie_value(config, &cookie)?;

    let from_header = req
        .headers()
        .get(config.header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    // An empty header counts as absent so forms can still submit the field.
    let (req, submitted) = match from_header {
        Some(value) => (req, Some(value)),
        None => submitted_field(state, req).await?,
    };

    let submitted = submitted
        .filter(|s| !s.is_empty())
        .ok_or(CsrfError::MissingToken)?;

    expected.verify_submitted(&submitted)?;

    Ok(req)
}

// ============================================================================
// Form fields
// ============================================================================

enum FormKind {
    UrlEncoded,
    Multipart,
}

fn form_kind(req: &Request) -> Option<FormKind> {
    let content_type = req.headers().get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim();

    if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        Some(FormKind::UrlEncoded)
    } else if mime.eq_ignore_ascii_case("multipart/form-data") {
        Some(FormKind::Multipart)
    } else {
        None
    }
}

/// Read the token field from a form body, then put the body back
async fn submitted_field(
    state: &CsrfState,
    req: Request,
) -> Result<(Request, Option<String>), CsrfError> {
    let Some(kind) = form_kind(&req) else {
        return Ok((req, None));
    };

    let (parts, body) = req.into_parts();
    let bytes = body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Could not buffer form body for CSRF check");
            CsrfError::MissingToken
        })?;

    let form_req = form_request(&parts, bytes.clone());
    let field_name = state.config.field_name.as_str();

    let submitted = match kind {
        FormKind::UrlEncoded => Form::<HashMap<String, String>>::from_request(form_req, &())
            .await
            .ok()
            .and_then(|Form(mut fields)| fields.remove(field_name)),
        FormKind::Multipart => multipart_field(form_req, field_name).await,
    };

    Ok((Request::from_parts(parts, Body::from(bytes)), submitted))
}

fn form_request(parts: &Parts, bytes: Bytes) -> Request {
    let mut copy = Request::new(Body::from(bytes));
    *copy.method_mut() = parts.method.clone();
    *copy.uri_mut() = parts.uri.clone();
    *copy.headers_mut() = parts.headers.clone();
    copy
}

async fn multipart_field(req: Request, field_name: &str) -> Option<String> {
    let mut multipart = Multipart::from_request(req, &()).await.ok()?;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some(field_name) {
            return field.text().await.ok();
        }
    }

    None
}

// ============================================================================
// Extractor
// ============================================================================

/// Token issued for the current request; render its value into forms or
/// hand it to script clients
#[derive(Debug, Clone)]
pub struct CsrfToken(pub IssuedToken);

impl CsrfToken {
    pub fn value(&self) -> &str {
        self.0.value()
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .ok_or_else(|| AuthError::Internal("CSRF middleware is not installed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{Method, Request, StatusCode, header};
    use axum::middleware::from_fn_with_state;
    use axum::routing::post;
    use tower::ServiceExt;

    fn csrf_config() -> CsrfConfig {
        CsrfConfig::new(b"test-secret-test-secret-test-sec".to_vec())
    }

    async fn echo(token: CsrfToken, body: String) -> String {
        format!("{}:{body}", token.value())
    }

    fn app(config: CsrfConfig) -> Router {
        Router::new()
            .route("/", post(echo).get(|token: CsrfToken| async move { token.value().to_string() }))
            .layer(from_fn_with_state(CsrfState::new(config), csrf_protect))
    }

    /// A valid token and its cookie header value
    fn issued(config: &CsrfConfig) -> (IssuedToken, String) {
        let token = IssuedToken::generate(config);
        let cookie = format!("{}={}", config.effective_cookie_name(), token.to_cookie_value());
        (token, cookie)
    }

    async fn body_string(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_safe_method_is_issued_token() {
        let config = csrf_config();
        let response = app(config.clone())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("__Secure-csrf_token="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Secure"));
        assert_eq!(body_string(response).await.len(), 64);
    }

    #[tokio::test]
    async fn test_post_without_cookie_is_forbidden() {
        let response = app(csrf_config())
            .oneshot(
                Request::post("/")
                    .header("X-CSRF-Token", "abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().contains_key(header::SET_COOKIE));
    }

    #[tokio::test]
    async fn test_header_token_accepted() {
        let config = csrf_config();
        let (token, cookie) = issued(&config);

        let response = app(config)
            .oneshot(
                Request::post("/")
                    .header(header::COOKIE, cookie)
                    .header("X-CSRF-Token", token.value())
                    .body(Body::from("payload"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        let (fresh, echoed) = body.split_once(':').unwrap();
        assert_ne!(fresh, token.value());
        assert_eq!(echoed, "payload");
    }

    #[tokio::test]
    async fn test_wrong_header_token_rejected() {
        let config = csrf_config();
        let (_, cookie) = issued(&config);
        let (other, _) = issued(&config);

        let response = app(config)
            .oneshot(
                Request::post("/")
                    .header(header::COOKIE, cookie)
                    .header("X-CSRF-Token", other.value())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cookie_signed_with_other_secret_rejected() {
        let config = csrf_config();
        let foreign = CsrfConfig::new(b"another-secret-another-secret-00".to_vec());
        let (token, cookie) = issued(&foreign);

        let response = app(config)
            .oneshot(
                Request::post("/")
                    .header(header::COOKIE, cookie)
                    .header("X-CSRF-Token", token.value())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_urlencoded_field_accepted_and_body_restored() {
        let config = csrf_config();
        let (token, cookie) = issued(&config);
        let form = format!("name=alice&csrf_token={}", token.value());

        let response = app(config)
            .oneshot(
                Request::post("/")
                    .header(header::COOKIE, cookie)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.ends_with(&format!(":{form}")));
    }

    #[tokio::test]
    async fn test_empty_header_falls_back_to_form_field() {
        let config = csrf_config();
        let (token, cookie) = issued(&config);
        let form = format!("csrf_token={}", token.value());

        let response = app(config)
            .oneshot(
                Request::post("/")
                    .header(header::COOKIE, cookie)
                    .header("X-CSRF-Token", "")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_multipart_field_accepted() {
        let config = csrf_config();
        let (token, cookie) = issued(&config);
        let boundary = "XBOUNDARYX";
        let form = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"csrf_token\"\r\n\r\n{}\r\n--{boundary}--\r\n",
            token.value()
        );

        let response = app(config)
            .oneshot(
                Request::post("/")
                    .header(header::COOKIE, cookie)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_submitted_token_rejected() {
        let config = csrf_config();
        let (_, cookie) = issued(&config);

        let response = app(config)
            .oneshot(
                Request::post("/")
                    .header(header::COOKIE, cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_string(response).await;
        assert!(body.contains("invalid CSRF token"));
    }

    #[tokio::test]
    async fn test_ignored_methods_configurable() {
        let mut config = csrf_config();
        config.ignored_methods.push(Method::POST);

        let response = app(config)
            .oneshot(Request::post("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
