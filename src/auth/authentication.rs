use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket_dyn_templates::{Template, context};
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::db::{get_session_by_token, get_user};

use super::User;

pub const SESSION_COOKIE: &str = "session_token";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let token = request
            .cookies()
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string());

        let Some(token) = token else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let session = match get_session_by_token(db, &token).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = ?err, "Invalid session token");
                return Outcome::Forward(Status::Unauthorized);
            }
        };

        if !session.is_valid() {
            tracing::warn!(user_id = session.user_id, "Session token expired");
            return Outcome::Forward(Status::Unauthorized);
        }

        match get_user(db, session.user_id).await {
            Ok(user) => {
                tracing::debug!(username = %user.username, role = %user.role.as_str(), "User authenticated via session token");
                Outcome::Success(user)
            }
            Err(err) => {
                tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Redirect {
    tracing::warn!("Unauthorized access attempt");
    Redirect::to(uri!("/auth/login"))
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    let error_json = json!({
        "error": "Unauthorized",
        "message": "Authentication required"
    });

    Custom(Status::Unauthorized, Json(error_json))
}

#[catch(403)]
pub fn forbidden(req: &Request) -> Custom<Template> {
    tracing::warn!(uri = %req.uri(), "Forbidden access attempt");
    Custom(
        Status::Forbidden,
        Template::render(
            "errors/forbidden",
            context! {
                title: "Not allowed",
                path: req.uri().path().to_string(),
            },
        ),
    )
}

#[catch(404)]
pub fn not_found(req: &Request) -> Custom<Template> {
    Custom(
        Status::NotFound,
        Template::render(
            "errors/not_found",
            context! {
                title: "Not found",
                path: req.uri().path().to_string(),
            },
        ),
    )
}
