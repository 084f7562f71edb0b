//! Session-cookie authentication for the upload and browse routes.

use crate::config::AuthConfig;
use crate::server::{pages, AppContext};
use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SESSION_COOKIE_NAME: &str = "rawdrop_session";

type HmacSha256 = Hmac<Sha256>;

/// Login form payload
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Session data carried in the signed cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub username: String,
    pub expires_at: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl SessionData {
    pub fn new(username: &str, timeout_minutes: u64) -> Self {
        Self {
            username: username.to_string(),
            expires_at: now_secs().saturating_add(timeout_minutes.saturating_mul(60)),
        }
    }

    pub fn is_valid(&self) -> bool {
        now_secs() < self.expires_at
    }

    /// Encode as `base64(json).hex(hmac_sha256(secret, base64(json)))`.
    pub fn sign(&self, secret: &str) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = mac(secret, &payload)
            .map(|m| hex::encode(m.finalize().into_bytes()))
            .unwrap_or_default();
        format!("{payload}.{signature}")
    }

    /// Decode a signed token, returning it only if the signature matches
    /// and the session has not expired.
    pub fn verify(token: &str, secret: &str) -> Option<Self> {
        let (payload, signature) = token.split_once('.')?;
        let signature = hex::decode(signature).ok()?;
        mac(secret, payload)?.verify_slice(&signature).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let session: Self = serde_json::from_slice(&json).ok()?;
        session.is_valid().then_some(session)
    }
}

fn mac(secret: &str, payload: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    Some(mac)
}

/// Whether a request carrying `session_cookie` may pass the gate.
pub fn check_auth(auth_config: &AuthConfig, session_cookie: Option<&str>) -> bool {
    if !auth_config.enabled {
        return true;
    }

    match (session_cookie, auth_config.session_secret.as_deref()) {
        (Some(token), Some(secret)) => SessionData::verify(token, secret).is_some(),
        _ => false,
    }
}

/// Gate for the protected routes.
///
/// Browsers navigating to a page are sent to the login form; everything else
/// gets a bare 401.
pub async fn require_session(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Response {
    let session_cookie = jar.get(SESSION_COOKIE_NAME).map(|c| c.value());

    if check_auth(&ctx.config.auth, session_cookie) {
        return next.run(request).await;
    }

    if request.method() == Method::GET && !request.uri().path().starts_with("/api/") {
        Redirect::to("/login").into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "Authentication required").into_response()
    }
}

pub async fn login_page() -> Html<&'static str> {
    Html(pages::LOGIN_PAGE)
}

/// Login handler
pub async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Form(payload): Form<LoginRequest>,
) -> Result<(CookieJar, Redirect), (StatusCode, &'static str)> {
    let auth_config = &ctx.config.auth;

    // Check if auth is configured
    let (expected_username, password_hash, secret) = match (
        &auth_config.username,
        &auth_config.password_hash,
        &auth_config.session_secret,
    ) {
        (Some(u), Some(h), Some(s)) => (u, h, s),
        _ => {
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication not configured",
            ))
        }
    };

    let password_ok = payload.username == *expected_username
        && bcrypt::verify(&payload.password, password_hash).unwrap_or(false);

    if !password_ok {
        tracing::warn!(username = %payload.username, "Rejected login attempt");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    let session = SessionData::new(&payload.username, auth_config.session_timeout_minutes);
    let cookie = Cookie::build((SESSION_COOKIE_NAME, session.sign(secret)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(
            i64::try_from(auth_config.session_timeout_minutes)
                .unwrap_or(i64::MAX)
                .min(i64::MAX / 60),
        ))
        .build();

    tracing::info!(username = %payload.username, "User logged in");
    Ok((jar.add(cookie), Redirect::to("/upload")))
}

/// Logout handler
pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    let cookie = Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();

    (jar.remove(cookie), Redirect::to("/login"))
}

/// Generate a bcrypt password hash
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

/// Generate a random session signing secret
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}
