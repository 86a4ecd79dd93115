use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

fn to_utc(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSubject {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbSubject> for Subject {
    fn from(subject: DbSubject) -> Self {
        Self {
            id: subject.id.unwrap_or_default(),
            name: subject.name.unwrap_or_default(),
            created_at: to_utc(subject.created_at),
        }
    }
}

/// A subject joined with the username of its first owner.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubjectOverview {
    pub id: i64,
    pub name: String,
    pub author: Option<String>,
    pub question_count: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSubjectOverview {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub author: Option<String>,
    pub question_count: Option<i64>,
}

impl From<DbSubjectOverview> for SubjectOverview {
    fn from(row: DbSubjectOverview) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            author: row.author,
            question_count: row.question_count.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Question {
    pub id: i64,
    pub name: String,
    pub answer: String,
    pub mastery: i64,
    pub subject_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbQuestion {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub answer: Option<String>,
    pub mastery: Option<i64>,
    pub subject_id: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbQuestion> for Question {
    fn from(db: DbQuestion) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            answer: db.answer.unwrap_or_default(),
            mastery: db.mastery.unwrap_or_default(),
            subject_id: db.subject_id.unwrap_or_default(),
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

/// Validated field values for inserting or updating a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionInput {
    pub name: String,
    pub answer: String,
    pub mastery: i64,
}
