use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::auth::{require_admin, require_owner_or_admin};
use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

pub struct CommentView {
    pub author: String,
    pub avatar_url: String,
    pub body: String,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub logged_in: bool,
    pub can_modify: bool,
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub img_url: String,
    pub author: String,
    pub date: String,
    pub comments: Vec<CommentView>,
}

#[derive(Template)]
#[template(path = "pages/make_post.html")]
pub struct MakePostTemplate {
    pub logged_in: bool,
    pub is_edit: bool,
    pub action: String,
    pub title: String,
    pub subtitle: String,
    pub img_url: String,
    pub body: String,
    pub error: Option<String>,
}

// -- Form types --

#[derive(Deserialize)]
pub struct PostForm {
    pub title: String,
    pub subtitle: String,
    pub img_url: String,
    pub body: String,
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub comment_text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}", get(show_post).post(add_comment))
        .route("/new-post", get(new_post_page).post(new_post))
        .route("/edit-post/{id}", get(edit_post_page).post(edit_post))
        .route("/delete/{id}", get(delete_post))
}

// -- Helpers --

fn load_post(state: &AppState, id: &str) -> AppResult<Post> {
    let conn = state.db.get()?;
    conn.query_row(
        "SELECT id, user_id, title, subtitle, body, img_url, date, created_at \
         FROM posts WHERE id = ?1",
        params![id],
        |row| {
            Ok(Post {
                id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
                subtitle: row.get(3)?,
                body: row.get(4)?,
                img_url: row.get(5)?,
                date: row.get(6)?,
                created_at: row.get(7)?,
            })
        },
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Gravatar URL for a comment author (retro default, G rated).
fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_ascii_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?d=retro&s=100&r=g",
        hex::encode(digest)
    )
}

fn display_date() -> String {
    chrono::Utc::now().format("%B %d, %Y").to_string()
}

/// Form validation shared by create and edit. Returns the first problem.
fn validate_post_form(form: &PostForm) -> Option<String> {
    if form.title.trim().is_empty()
        || form.subtitle.trim().is_empty()
        || form.img_url.trim().is_empty()
        || form.body.trim().is_empty()
    {
        return Some("All fields are required.".to_string());
    }
    match url::Url::parse(form.img_url.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => None,
        _ => Some("Image URL must be a valid http(s) URL.".to_string()),
    }
}

fn make_post_form(
    logged_in: bool,
    is_edit: bool,
    action: String,
    form: &PostForm,
    error: Option<String>,
) -> Response {
    Html(MakePostTemplate {
        logged_in,
        is_edit,
        action,
        title: form.title.clone(),
        subtitle: form.subtitle.clone(),
        img_url: form.img_url.clone(),
        body: form.body.clone(),
        error,
    })
    .into_response()
}

// -- Handlers --

/// GET /post/{id} — post with its comments; public.
pub async fn show_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    maybe_user: MaybeUser,
) -> AppResult<Response> {
    let post = load_post(&state, &id)?;

    let conn = state.db.get()?;
    let author: String = conn.query_row(
        "SELECT username FROM users WHERE id = ?1",
        params![post.user_id],
        |row| row.get(0),
    )?;

    let comments = {
        let mut stmt = conn.prepare(
            "SELECT u.username, u.email, c.body FROM comments c \
             JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = ?1 ORDER BY c.created_at, c.id",
        )?;
        let rows = stmt
            .query_map(params![id], |row| {
                let email: String = row.get(1)?;
                Ok(CommentView {
                    author: row.get(0)?,
                    avatar_url: gravatar_url(&email),
                    body: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let can_modify = maybe_user
        .0
        .as_ref()
        .is_some_and(|u| u.is_admin || u.id == post.user_id);

    Ok(Html(PostTemplate {
        logged_in: maybe_user.0.is_some(),
        can_modify,
        id: post.id,
        title: post.title,
        subtitle: post.subtitle,
        body: post.body,
        img_url: post.img_url,
        author,
        date: post.date,
        comments,
    })
    .into_response())
}

/// POST /post/{id} — add a comment. Anonymous visitors are sent to login.
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    // 404 before write so comments can't attach to deleted posts
    let post = load_post(&state, &id)?;

    let body = state.sanitizer.clean(form.comment_text.trim());
    if body.is_empty() {
        return Ok(Redirect::to(&format!("/post/{}", post.id)).into_response());
    }

    let comment_id = uuid::Uuid::now_v7().to_string();
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, body) VALUES (?1, ?2, ?3, ?4)",
        params![comment_id, post.id, user.id, body],
    )?;

    Ok(Redirect::to(&format!("/post/{}", post.id)).into_response())
}

/// Authoring is open to every logged-in user unless the site is configured
/// admin-only.
fn check_may_author(state: &AppState, user: &CurrentUser) -> AppResult<()> {
    if state.config.auth.admin_only_posting {
        require_admin(user)?;
    }
    Ok(())
}

/// GET /new-post
pub async fn new_post_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Response> {
    check_may_author(&state, &user)?;
    Ok(make_post_form(
        true,
        false,
        "/new-post".to_string(),
        &PostForm {
            title: String::new(),
            subtitle: String::new(),
            img_url: String::new(),
            body: String::new(),
        },
        None,
    ))
}

/// POST /new-post
pub async fn new_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    check_may_author(&state, &user)?;
    if let Some(error) = validate_post_form(&form) {
        return Ok(make_post_form(
            true,
            false,
            "/new-post".to_string(),
            &form,
            Some(error),
        ));
    }

    let body = state.sanitizer.clean(&form.body);
    let post_id = uuid::Uuid::now_v7().to_string();

    let inserted = {
        let conn = state.db.get()?;
        conn.execute(
            "INSERT INTO posts (id, user_id, title, subtitle, body, img_url, date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                post_id,
                user.id,
                form.title.trim(),
                form.subtitle.trim(),
                body,
                form.img_url.trim(),
                display_date()
            ],
        )
    };

    if let Err(err) = inserted {
        return match crate::db::conflict_on_unique(err, "duplicate title") {
            AppError::Conflict(_) => Ok(make_post_form(
                true,
                false,
                "/new-post".to_string(),
                &form,
                Some("A post with this title already exists.".to_string()),
            )),
            other => Err(other),
        };
    }

    Ok(Redirect::to(&format!("/post/{}", post_id)).into_response())
}

/// GET /edit-post/{id} — owner or admin.
pub async fn edit_post_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
) -> AppResult<Response> {
    let post = load_post(&state, &id)?;
    require_owner_or_admin(&user, &post.user_id)?;

    Ok(make_post_form(
        true,
        true,
        format!("/edit-post/{}", post.id),
        &PostForm {
            title: post.title,
            subtitle: post.subtitle,
            img_url: post.img_url,
            body: post.body,
        },
        None,
    ))
}

/// POST /edit-post/{id} — owner or admin; authorization runs before the write.
pub async fn edit_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let post = load_post(&state, &id)?;
    require_owner_or_admin(&user, &post.user_id)?;

    let action = format!("/edit-post/{}", post.id);
    if let Some(error) = validate_post_form(&form) {
        return Ok(make_post_form(true, true, action, &form, Some(error)));
    }

    let body = state.sanitizer.clean(&form.body);
    let updated = {
        let conn = state.db.get()?;
        conn.execute(
            "UPDATE posts SET title = ?1, subtitle = ?2, body = ?3, img_url = ?4 WHERE id = ?5",
            params![
                form.title.trim(),
                form.subtitle.trim(),
                body,
                form.img_url.trim(),
                post.id
            ],
        )
    };

    if let Err(err) = updated {
        return match crate::db::conflict_on_unique(err, "duplicate title") {
            AppError::Conflict(_) => Ok(make_post_form(
                true,
                true,
                action,
                &form,
                Some("A post with this title already exists.".to_string()),
            )),
            other => Err(other),
        };
    }

    Ok(Redirect::to(&format!("/post/{}", post.id)).into_response())
}

/// GET /delete/{id} — owner or admin; comments go with the post.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
) -> AppResult<Response> {
    let post = load_post(&state, &id)?;
    require_owner_or_admin(&user, &post.user_id)?;

    let conn = state.db.get()?;
    conn.execute("DELETE FROM posts WHERE id = ?1", params![post.id])?;

    Ok(Redirect::to("/").into_response())
}
