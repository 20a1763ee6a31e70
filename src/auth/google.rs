use oauth2::basic::*;
use oauth2::*;
use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::error::{ApiError, ApiResult};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Identity handed back by Google after the callback.
#[derive(Debug, Clone)]
pub struct GoogleUser {
    pub email: String,
    pub name: String,
    pub google_id: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

fn oauth_client(
    cfg: &GoogleConfig,
) -> ApiResult<
    Client<
        StandardErrorResponse<BasicErrorResponseType>,
        StandardTokenResponse<EmptyExtraTokenFields, BasicTokenType>,
        StandardTokenIntrospectionResponse<EmptyExtraTokenFields, BasicTokenType>,
        StandardRevocableToken,
        StandardErrorResponse<RevocationErrorResponseType>,
        EndpointSet,
        EndpointNotSet,
        EndpointNotSet,
        EndpointNotSet,
        EndpointSet,
    >,
> {
    let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
        .map_err(|e| ApiError::OAuth(format!("invalid auth url: {}", e)))?;
    let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
        .map_err(|e| ApiError::OAuth(format!("invalid token url: {}", e)))?;
    let redirect_url = RedirectUrl::new(cfg.redirect_url.clone())
        .map_err(|e| ApiError::OAuth(format!("invalid redirect url: {}", e)))?;

    Ok(BasicClient::new(ClientId::new(cfg.client_id.clone()))
        .set_client_secret(ClientSecret::new(cfg.client_secret.clone()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url))
}

/// Where to send the browser to start the Google login flow, plus the CSRF
/// state baked into that URL. The caller must stash the state and compare it
/// against what the callback presents.
pub fn authorize_url(cfg: &GoogleConfig) -> ApiResult<(String, String)> {
    let client = oauth_client(cfg)?;
    let (url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .url();
    Ok((url.to_string(), csrf_token.secret().to_string()))
}

/// Exchange the callback code for Google's view of the user. A profile
/// without an email is fatal; there is nothing to key the account on.
pub async fn exchange_code(cfg: &GoogleConfig, code: &str) -> ApiResult<GoogleUser> {
    let client = oauth_client(cfg)?;

    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ApiError::OAuth(format!("failed to build http client: {}", e)))?;

    let token = client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .request_async(&http_client)
        .await
        .map_err(|e| ApiError::OAuth(format!("failed to exchange code: {}", e)))?;

    let response = http_client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token.access_token().secret())
        .send()
        .await
        .map_err(|e| ApiError::OAuth(format!("failed to fetch user info: {}", e)))?;

    if !response.status().is_success() {
        return Err(ApiError::OAuth(format!(
            "userinfo request returned {}",
            response.status()
        )));
    }

    let info: GoogleUserInfo = response
        .json()
        .await
        .map_err(|e| ApiError::OAuth(format!("failed to parse user info: {}", e)))?;

    let email = info
        .email
        .ok_or_else(|| ApiError::OAuth("Google account has no email".to_string()))?;

    Ok(GoogleUser {
        name: info.name.unwrap_or_else(|| email.clone()),
        email,
        google_id: info.id,
    })
}
