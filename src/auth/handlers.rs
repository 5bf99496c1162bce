use askama::Template;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::auth::{password, session};
use crate::db;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub logged_in: bool,
    pub username: String,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub logged_in: bool,
    pub email: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

// -- Form types --

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginQuery {
    pub email: Option<String>,
    pub notice: Option<String>,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn login_redirect(token: &str, state: &AppState) -> Response {
    (
        [(
            header::SET_COOKIE,
            session_cookie(
                &state.config.auth.cookie_name,
                token,
                state.config.auth.session_hours,
            ),
        )],
        Redirect::to("/"),
    )
        .into_response()
}

// -- Handlers --

/// GET /register
pub async fn register_page(maybe_user: MaybeUser) -> Html<RegisterTemplate> {
    Html(RegisterTemplate {
        logged_in: maybe_user.0.is_some(),
        username: String::new(),
        email: String::new(),
        error: None,
    })
}

/// POST /register — create the account and log it in right away.
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let email = form.email.trim().to_ascii_lowercase();

    if username.is_empty() || email.is_empty() || form.password.is_empty() {
        return Ok(Html(RegisterTemplate {
            logged_in: false,
            username,
            email,
            error: Some("All fields are required.".to_string()),
        })
        .into_response());
    }

    let password_hash = password::hash_password(&form.password)?;
    let user_id = uuid::Uuid::now_v7().to_string();

    let inserted = {
        let conn = state.db.get()?;
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, username, email, password_hash],
        )
    };

    if let Err(err) = inserted {
        // Unique email taken: send them to login with the address pre-filled
        return match db::conflict_on_unique(err, "duplicate email") {
            crate::error::AppError::Conflict(_) => Ok(Redirect::to(&format!(
                "/login?notice=exists&email={}",
                urlencode(&email)
            ))
            .into_response()),
            other => Err(other),
        };
    }

    let token = session::create_session(
        &state.db,
        &user_id,
        state.config.auth.admin_policy,
        state.config.auth.session_hours,
    )?;
    tracing::info!("Registered new user {}", username);

    Ok(login_redirect(&token, &state))
}

/// GET /login
pub async fn login_page(
    maybe_user: MaybeUser,
    Query(query): Query<LoginQuery>,
) -> Html<LoginTemplate> {
    let notice = match query.notice.as_deref() {
        Some("exists") => Some("This user already exists. Please login instead.".to_string()),
        _ => None,
    };
    Html(LoginTemplate {
        logged_in: maybe_user.0.is_some(),
        email: query.email.unwrap_or_default(),
        error: None,
        notice,
    })
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let email = form.email.trim().to_ascii_lowercase();

    let found: Option<(String, String)> = {
        let conn = state.db.get()?;
        conn.query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
    };

    // Same rejection for unknown email and wrong password
    let Some((user_id, password_hash)) = found else {
        return Ok(invalid_credentials(email));
    };
    if !password::verify_password(&form.password, &password_hash) {
        return Ok(invalid_credentials(email));
    }

    let token = session::create_session(
        &state.db,
        &user_id,
        state.config.auth.admin_policy,
        state.config.auth.session_hours,
    )?;

    Ok(login_redirect(&token, &state))
}

fn invalid_credentials(email: String) -> Response {
    Html(LoginTemplate {
        logged_in: false,
        email,
        error: Some("Invalid email or password.".to_string()),
        notice: None,
    })
    .into_response()
}

/// GET /logout — tear down the server-side session so the old token can
/// never re-resolve, then clear the cookie.
pub async fn logout(
    State(state): State<AppState>,
    _user: CurrentUser,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();

    if let Some(token) =
        crate::extractors::extract_session_token(&parts, &state.config.auth.cookie_name)
    {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
        Redirect::to("/"),
    )
        .into_response())
}

/// Percent-encode the few characters that matter in a query value.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'@' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_sets_http_only_and_max_age() {
        let cookie = session_cookie("blobby_session", "tok", 2);
        assert!(cookie.starts_with("blobby_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=7200"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie("blobby_session");
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn urlencode_keeps_email_readable() {
        assert_eq!(urlencode("a@x.com"), "a@x.com");
        assert_eq!(urlencode("a b+c"), "a%20b%2Bc");
    }
}
