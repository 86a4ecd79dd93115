use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::Request;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::db::{find_author, get_questions_for_subject, get_subject, get_subject_overviews};
use crate::error::AppError;
use crate::models::{Question, Subject, SubjectOverview};

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub admin: bool,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            admin: user.is_admin(),
            username: user.username,
            role: user.role.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SubjectQuestionsResponse {
    pub subject: Subject,
    pub author: Option<String>,
    pub questions: Vec<Question>,
}

#[get("/health")]
pub fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[get("/me")]
pub fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[get("/subjects")]
pub async fn api_get_subjects(
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SubjectOverview>>, AppError> {
    Ok(Json(get_subject_overviews(db).await?))
}

#[get("/subjects/<id>/questions")]
pub async fn api_get_subject_questions(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SubjectQuestionsResponse>, AppError> {
    let subject = get_subject(db, id).await?;
    let questions = get_questions_for_subject(db, id).await?;
    let author = find_author(db, id).await?.map(|user| user.username);

    Ok(Json(SubjectQuestionsResponse {
        subject,
        author,
        questions,
    }))
}

#[catch(404)]
pub fn not_found_api(req: &Request) -> Custom<Json<Value>> {
    Custom(
        Status::NotFound,
        Json(json!({
            "error": "Not Found",
            "message": format!("No resource at {}", req.uri().path()),
        })),
    )
}
