use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::dto::{
    AuthResponse, GoogleCallbackQuery, LoginRequest, MessageResponse, PublicUser, RefreshRequest,
    RegisterRequest, VerifyEmailQuery,
};
use super::extractors::AuthUser;
use super::{google, service};

const REFRESH_COOKIE: &str = "refresh_token";
const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// The refresh token only ever travels on /auth routes, as an HTTP-only
/// cookie the frontend cannot read.
fn refresh_cookie(token: String, ttl_minutes: i64) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path("/auth")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(ttl_minutes))
        .build()
}

fn expired_refresh_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .path("/auth")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// CSRF state for the Google flow, scoped to the OAuth routes and gone after
/// ten minutes. Lax is enough: the callback arrives as a top-level navigation.
fn oauth_state_cookie(state: String) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, state))
        .path("/auth/google")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(10))
        .build()
}

fn expired_oauth_state_cookie() -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, ""))
        .path("/auth/google")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// The state Google echoes back has to match the one we planted at the start
/// of the flow. A missing cookie fails the same way as a mismatch.
fn validate_oauth_state(expected: Option<&str>, presented: &str) -> ApiResult<()> {
    match expected {
        Some(expected) if !presented.is_empty() && expected == presented => Ok(()),
        _ => Err(ApiError::Forbidden("OAuth state mismatch".into())),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    payload.email = payload.email.trim().to_lowercase();
    payload.name = payload.name.trim().to_string();

    if !service::is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.name.is_empty() {
        return Err(ApiError::Validation("Name must not be empty".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    service::register(&state, &payload.name, &payload.email, &payload.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Registration successful. Please verify your email.".into(),
        }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    payload.email = payload.email.trim().to_lowercase();

    if !service::is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let session = service::login(&state, &payload.email, &payload.password).await?;

    let jar = jar.add(refresh_cookie(
        session.refresh_token,
        state.config.jwt.refresh_ttl_minutes,
    ));
    Ok((
        jar,
        Json(AuthResponse {
            access_token: session.access_token,
            user: session.user,
        }),
    ))
}

/// Accepts the refresh token from the cookie first, then a JSON body for
/// non-browser clients.
#[instrument(skip(state, jar, body))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.map(|Json(b)| b.refresh_token))
        .ok_or_else(|| ApiError::Forbidden("Access denied".into()))?;

    let session = service::refresh(&state, &presented).await?;

    let jar = jar.add(refresh_cookie(
        session.refresh_token,
        state.config.jwt.refresh_ttl_minutes,
    ));
    Ok((
        jar,
        Json(AuthResponse {
            access_token: session.access_token,
            user: session.user,
        }),
    ))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    service::logout(&state, user_id).await?;
    let jar = jar.add(expired_refresh_cookie());
    Ok((
        jar,
        Json(MessageResponse {
            message: "Logged out successfully".into(),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = service::get_me(&state, user_id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, query))]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> ApiResult<Json<MessageResponse>> {
    service::verify_email(&state, &query.token).await?;
    Ok(Json(MessageResponse {
        message: "Email verified successfully. Please login".into(),
    }))
}

#[instrument(skip(state, jar))]
pub async fn google_start(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Redirect)> {
    let (url, csrf_state) = google::authorize_url(&state.config.google)?;
    let jar = jar.add(oauth_state_cookie(csrf_state));
    Ok((jar, Redirect::temporary(&url)))
}

/// Final leg of the OAuth dance: trade the code for a profile, log the user
/// in, and bounce back to the frontend with the access token as a query
/// parameter. The refresh token rides the usual cookie.
#[instrument(skip(state, jar, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<GoogleCallbackQuery>,
) -> ApiResult<(CookieJar, Redirect)> {
    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    validate_oauth_state(expected.as_deref(), &query.state)?;

    let google_user = google::exchange_code(&state.config.google, &query.code).await?;
    let session = service::google_login(&state, google_user).await?;

    let jar = jar.add(expired_oauth_state_cookie());
    let jar = jar.add(refresh_cookie(
        session.refresh_token,
        state.config.jwt.refresh_ttl_minutes,
    ));
    let target = format!(
        "{}/oauth/callback?token={}",
        state.config.frontend_url, session.access_token
    );
    Ok((jar, Redirect::temporary(&target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_is_scoped_and_http_only() {
        let cookie = refresh_cookie("tok".into(), 60);
        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.path(), Some("/auth"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::minutes(60)));
    }

    #[test]
    fn expired_cookie_clears_value() {
        let cookie = expired_refresh_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }

    #[test]
    fn oauth_state_cookie_is_scoped_and_short_lived() {
        let cookie = oauth_state_cookie("abc123".into());
        assert_eq!(cookie.name(), "oauth_state");
        assert_eq!(cookie.path(), Some("/auth/google"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::minutes(10)));
    }

    #[test]
    fn oauth_state_must_match_the_planted_value() {
        assert!(validate_oauth_state(Some("abc"), "abc").is_ok());
        assert!(validate_oauth_state(Some("abc"), "xyz").is_err());
        assert!(validate_oauth_state(None, "abc").is_err());
        // A dropped cookie and an empty echo must not pass as equal.
        assert!(validate_oauth_state(Some(""), "").is_err());
    }
}
