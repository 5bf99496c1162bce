use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::home::{Html, PostSummary};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/account.html")]
pub struct AccountTemplate {
    pub logged_in: bool,
    pub username: String,
    pub email: String,
    pub posts: Vec<PostSummary>,
}

#[derive(Template)]
#[template(path = "pages/edit_account.html")]
pub struct EditAccountTemplate {
    pub logged_in: bool,
    pub username: String,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct EditAccountForm {
    pub username: String,
    pub email: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account", get(account))
        .route("/edit-account", get(edit_account_page).post(edit_account))
}

/// GET /account — profile plus the user's own posts, newest first.
pub async fn account(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = {
        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.subtitle, u.username, p.date \
             FROM posts p JOIN users u ON u.id = p.user_id \
             WHERE p.user_id = ?1 ORDER BY p.created_at DESC, p.id DESC",
        )?;
        let rows = stmt
            .query_map(params![user.id], |row| {
                Ok(PostSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    subtitle: row.get(2)?,
                    author: row.get(3)?,
                    date: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    Ok(Html(AccountTemplate {
        logged_in: true,
        username: user.username,
        email: user.email,
        posts,
    })
    .into_response())
}

/// GET /edit-account
pub async fn edit_account_page(user: CurrentUser) -> Html<EditAccountTemplate> {
    Html(EditAccountTemplate {
        logged_in: true,
        username: user.username,
        email: user.email,
        error: None,
    })
}

/// POST /edit-account — the new email must not belong to another account.
pub async fn edit_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<EditAccountForm>,
) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let email = form.email.trim().to_ascii_lowercase();

    let form_error = |error: String| {
        Html(EditAccountTemplate {
            logged_in: true,
            username: username.clone(),
            email: email.clone(),
            error: Some(error),
        })
        .into_response()
    };

    if username.is_empty() || email.is_empty() {
        return Ok(form_error("All fields are required.".to_string()));
    }

    let conn = state.db.get()?;
    let taken: Option<String> = conn
        .query_row(
            "SELECT id FROM users WHERE email = ?1 AND id != ?2",
            params![email, user.id],
            |row| row.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Ok(form_error(
            "This email is already in use by another account.".to_string(),
        ));
    }

    conn.execute(
        "UPDATE users SET username = ?1, email = ?2 WHERE id = ?3",
        params![username, email, user.id],
    )?;

    Ok(Redirect::to("/account").into_response())
}
