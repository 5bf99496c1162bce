use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::state::AppState;

/// One row in a post listing.
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: String,
}

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub logged_in: bool,
    pub posts: Vec<PostSummary>,
}

#[derive(Template)]
#[template(path = "pages/all_posts.html")]
pub struct AllPostsTemplate {
    pub logged_in: bool,
    pub posts: Vec<PostSummary>,
}

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub logged_in: bool,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

fn list_posts(state: &AppState, limit: Option<u32>) -> AppResult<Vec<PostSummary>> {
    let conn = state.db.get()?;
    let sql = match limit {
        Some(n) => format!(
            "SELECT p.id, p.title, p.subtitle, u.username, p.date \
             FROM posts p JOIN users u ON u.id = p.user_id \
             ORDER BY p.created_at DESC, p.id DESC LIMIT {}",
            n
        ),
        None => "SELECT p.id, p.title, p.subtitle, u.username, p.date \
                 FROM posts p JOIN users u ON u.id = p.user_id \
                 ORDER BY p.created_at DESC, p.id DESC"
            .to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map([], |row| {
            Ok(PostSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                subtitle: row.get(2)?,
                author: row.get(3)?,
                date: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// GET / — the newest 10 posts
pub async fn index(State(state): State<AppState>, maybe_user: MaybeUser) -> AppResult<Response> {
    let posts = list_posts(&state, Some(10))?;
    Ok(Html(IndexTemplate {
        logged_in: maybe_user.0.is_some(),
        posts,
    })
    .into_response())
}

/// GET /all_posts — every post
pub async fn all_posts(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
) -> AppResult<Response> {
    let posts = list_posts(&state, None)?;
    Ok(Html(AllPostsTemplate {
        logged_in: maybe_user.0.is_some(),
        posts,
    })
    .into_response())
}

/// GET /about
pub async fn about(maybe_user: MaybeUser) -> Html<AboutTemplate> {
    Html(AboutTemplate {
        logged_in: maybe_user.0.is_some(),
    })
}
