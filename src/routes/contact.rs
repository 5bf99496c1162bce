use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::mail::OutgoingMail;
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/contact.html")]
pub struct ContactTemplate {
    pub logged_in: bool,
    pub name: String,
    pub email: String,
    pub msg_sent: bool,
    pub send_failed: bool,
}

#[derive(Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/contact", get(contact_page).post(contact))
}

/// GET /contact — pre-filled for logged-in users.
pub async fn contact_page(maybe_user: MaybeUser) -> Html<ContactTemplate> {
    let (name, email) = match &maybe_user.0 {
        Some(user) => (user.username.clone(), user.email.clone()),
        None => (String::new(), String::new()),
    };
    Html(ContactTemplate {
        logged_in: maybe_user.0.is_some(),
        name,
        email,
        msg_sent: false,
        send_failed: false,
    })
}

/// POST /contact — forwards the message to the site owner. A failed send is
/// a page flag, not an error page; nothing is stored either way.
pub async fn contact(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Form(form): Form<ContactForm>,
) -> AppResult<Response> {
    let mail = OutgoingMail {
        from: format!("Blobby <{}>", state.config.mail.sender),
        to: state.config.mail.receiver.clone(),
        subject: format!("{} has sent a message!", form.name),
        html: format!(
            "Name: {}<br />E-mail: {}<br />Message: {}",
            escape(&form.name),
            escape(&form.email),
            escape(&form.message)
        ),
    };

    let sent = state.mailer.send(mail).await;
    if let Err(e) = &sent {
        tracing::warn!("Contact mail not sent: {}", e);
    }

    Ok(Html(ContactTemplate {
        logged_in: maybe_user.0.is_some(),
        name: form.name,
        email: form.email,
        msg_sent: sent.is_ok(),
        send_failed: sent.is_err(),
    })
    .into_response())
}

/// The contact mail body is HTML; visitor input is escaped, not sanitized,
/// since no markup is expected here.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
