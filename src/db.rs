use crate::{
    auth::{DbUser, DbUserSession, Role, User, UserSession},
    error::AppError,
};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::models::{
    DbQuestion, DbSubject, DbSubjectOverview, Question, QuestionInput, Subject, SubjectOverview,
};

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

// Users

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>("SELECT id, username, role FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::not_found("User", id)),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row =
        sqlx::query_as::<_, DbUser>("SELECT id, username, role FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(username, role = %role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    role: Role,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let hashed_password = bcrypt::hash(password, HASH_COST)?;

    let res = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hashed_password)
        .bind(role.as_str())
        .execute(pool)
        .await;

    match res {
        Ok(res) => Ok(res.last_insert_rowid()),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(
            AppError::Validation(format!("Username '{}' already exists", username)),
        ),
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    #[derive(sqlx::FromRow)]
    struct Credentials {
        id: i64,
        password: String,
    }

    let row = sqlx::query_as::<_, Credentials>("SELECT id, password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    let Some(credentials) = row else {
        return Ok(None);
    };

    match bcrypt::verify(password, &credentials.password) {
        Ok(true) => Ok(Some(get_user(pool, credentials.id).await?)),
        _ => Ok(None),
    }
}

#[instrument]
pub async fn update_user_role(pool: &Pool<Sqlite>, user_id: i64, role: Role) -> Result<(), AppError> {
    info!("Updating user role");
    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Creates the configured admin account, or promotes it if it already exists.
#[instrument(skip_all, fields(username))]
pub async fn ensure_admin(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<i64, AppError> {
    match find_user_by_username(pool, username).await? {
        Some(user) if user.is_admin() => Ok(user.id),
        Some(user) => {
            info!("Promoting existing user to admin");
            update_user_role(pool, user.id, Role::Admin).await?;
            Ok(user.id)
        }
        None => {
            info!("Creating admin user");
            create_user(pool, username, password, Role::Admin).await
        }
    }
}

// Sessions

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// Subjects

#[instrument]
pub async fn create_subject(
    pool: &Pool<Sqlite>,
    name: &str,
    owner_id: i64,
) -> Result<i64, AppError> {
    info!("Creating subject");
    let mut tx = pool.begin().await?;

    let res = sqlx::query("INSERT INTO subjects (name) VALUES (?)")
        .bind(name)
        .execute(&mut *tx)
        .await?;
    let subject_id = res.last_insert_rowid();

    sqlx::query("INSERT INTO subject_owners (subject_id, user_id) VALUES (?, ?)")
        .bind(subject_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(subject_id)
}

#[instrument]
pub async fn add_subject_owner(
    pool: &Pool<Sqlite>,
    subject_id: i64,
    user_id: i64,
) -> Result<(), AppError> {
    info!("Adding subject owner");
    sqlx::query("INSERT OR IGNORE INTO subject_owners (subject_id, user_id) VALUES (?, ?)")
        .bind(subject_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn get_subject(pool: &Pool<Sqlite>, id: i64) -> Result<Subject, AppError> {
    info!("Getting subject");
    let row = sqlx::query_as::<_, DbSubject>("SELECT id, name, created_at FROM subjects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(subject) => Ok(Subject::from(subject)),
        _ => Err(AppError::not_found("Subject", id)),
    }
}

#[instrument]
pub async fn get_subject_overviews(pool: &Pool<Sqlite>) -> Result<Vec<SubjectOverview>, AppError> {
    info!("Getting subject overviews");
    let rows = sqlx::query_as::<_, DbSubjectOverview>(
        "SELECT s.id, s.name,
            (SELECT u.username FROM subject_owners so
             JOIN users u ON u.id = so.user_id
             WHERE so.subject_id = s.id
             ORDER BY so.added_at, so.rowid LIMIT 1) AS author,
            (SELECT COUNT(*) FROM questions q WHERE q.subject_id = s.id) AS question_count
         FROM subjects s
         ORDER BY s.name COLLATE NOCASE, s.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SubjectOverview::from).collect())
}

#[instrument]
pub async fn rename_subject(pool: &Pool<Sqlite>, id: i64, name: &str) -> Result<(), AppError> {
    info!("Renaming subject");
    let res = sqlx::query("UPDATE subjects SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Subject", id));
    }

    Ok(())
}

/// Removes the subject together with its questions and ownership rows.
#[instrument]
pub async fn delete_subject(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting subject");
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM questions WHERE subject_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM subject_owners WHERE subject_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let res = sqlx::query("DELETE FROM subjects WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if res.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(AppError::not_found("Subject", id));
    }

    tx.commit().await?;
    Ok(())
}

#[instrument]
pub async fn is_subject_owner(
    pool: &Pool<Sqlite>,
    user_id: i64,
    subject_id: i64,
) -> Result<bool, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM subject_owners WHERE user_id = ? AND subject_id = ?",
    )
    .bind(user_id)
    .bind(subject_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

#[instrument]
pub async fn get_subject_owners(pool: &Pool<Sqlite>, subject_id: i64) -> Result<Vec<User>, AppError> {
    info!("Getting subject owners");
    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT u.id, u.username, u.role FROM users u
         JOIN subject_owners so ON so.user_id = u.id
         WHERE so.subject_id = ?
         ORDER BY so.added_at, so.rowid",
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

/// The first user recorded as owner of the subject.
#[instrument]
pub async fn find_author(pool: &Pool<Sqlite>, subject_id: i64) -> Result<Option<User>, AppError> {
    info!("Finding subject author");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT u.id, u.username, u.role FROM users u
         JOIN subject_owners so ON so.user_id = u.id
         WHERE so.subject_id = ?
         ORDER BY so.added_at, so.rowid
         LIMIT 1",
    )
    .bind(subject_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

// Questions

#[instrument]
pub async fn get_questions_for_subject(
    pool: &Pool<Sqlite>,
    subject_id: i64,
) -> Result<Vec<Question>, AppError> {
    info!("Getting questions for subject");
    let rows = sqlx::query_as::<_, DbQuestion>(
        "SELECT id, name, answer, mastery, subject_id, created_at, updated_at
         FROM questions
         WHERE subject_id = ?
         ORDER BY id",
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Question::from).collect())
}

#[instrument]
pub async fn get_question(pool: &Pool<Sqlite>, id: i64) -> Result<Question, AppError> {
    info!("Getting question");
    let row = sqlx::query_as::<_, DbQuestion>(
        "SELECT id, name, answer, mastery, subject_id, created_at, updated_at
         FROM questions
         WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(question) => Ok(Question::from(question)),
        _ => Err(AppError::not_found("Question", id)),
    }
}

/// Like [`get_question`] but also requires the question to belong to `subject_id`.
#[instrument]
pub async fn get_subject_question(
    pool: &Pool<Sqlite>,
    subject_id: i64,
    question_id: i64,
) -> Result<Question, AppError> {
    let question = get_question(pool, question_id).await?;

    if question.subject_id != subject_id {
        return Err(AppError::NotFound(format!(
            "Question {} does not belong to subject {}",
            question_id, subject_id
        )));
    }

    Ok(question)
}

#[instrument]
pub async fn create_question(
    pool: &Pool<Sqlite>,
    subject_id: i64,
    input: &QuestionInput,
) -> Result<i64, AppError> {
    info!("Creating question");
    let res = sqlx::query(
        "INSERT INTO questions (name, answer, mastery, subject_id)
         VALUES (?, ?, ?, ?)",
    )
    .bind(&input.name)
    .bind(&input.answer)
    .bind(input.mastery)
    .bind(subject_id)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn update_question(
    pool: &Pool<Sqlite>,
    id: i64,
    input: &QuestionInput,
) -> Result<(), AppError> {
    info!("Updating question");
    let now = Utc::now().naive_utc();
    let res = sqlx::query(
        "UPDATE questions
         SET name = ?, answer = ?, mastery = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&input.name)
    .bind(&input.answer)
    .bind(input.mastery)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Question", id));
    }

    Ok(())
}

#[instrument]
pub async fn delete_question(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting question");
    let res = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Question", id));
    }

    Ok(())
}
