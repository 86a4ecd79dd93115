use crate::auth::Role;
use crate::db::{add_subject_owner, create_question, create_subject, create_user, get_question};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::init_rocket;
use crate::models::{Question, QuestionInput};
use rocket::http::{ContentType, Cookie, Status};
use rocket::local::asynchronous::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();
pub static STANDARD_PASSWORD: &str = "password123";

#[derive(Default)]
pub struct TestDbBuilder {
    users: Vec<TestUser>,
    subjects: Vec<TestSubject>,
    questions: Vec<TestQuestion>,
}

pub struct TestUser {
    pub username: String,
    pub role: Role,
    pub password: String,
}

pub struct TestSubject {
    pub name: String,
    pub owners: Vec<String>,
}

pub struct TestQuestion {
    pub subject_name: String,
    pub name: String,
    pub answer: String,
    pub mastery: i64,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(mut self, username: &str) -> Self {
        self.users.push(TestUser {
            username: username.to_string(),
            role: Role::Member,
            password: STANDARD_PASSWORD.to_string(),
        });
        self
    }

    pub fn admin(mut self, username: &str) -> Self {
        self.users.push(TestUser {
            username: username.to_string(),
            role: Role::Admin,
            password: STANDARD_PASSWORD.to_string(),
        });
        self
    }

    /// The first owner becomes the subject's author. No owners leaves it orphaned.
    pub fn subject(mut self, name: &str, owners: &[&str]) -> Self {
        self.subjects.push(TestSubject {
            name: name.to_string(),
            owners: owners.iter().map(|o| o.to_string()).collect(),
        });
        self
    }

    pub fn question(mut self, subject_name: &str, name: &str, answer: &str, mastery: i64) -> Self {
        self.questions.push(TestQuestion {
            subject_name: subject_name.to_string(),
            name: name.to_string(),
            answer: answer.to_string(),
            mastery,
        });
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .parse_filters("info")
                .is_test(true)
                .try_init();
        });

        // One connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let mut user_id_map: HashMap<String, i64> = HashMap::new();
        let mut subject_id_map: HashMap<String, i64> = HashMap::new();
        let mut question_id_map: HashMap<String, i64> = HashMap::new();

        for user in &self.users {
            let user_id = create_user(&pool, &user.username, &user.password, user.role).await?;
            user_id_map.insert(user.username.clone(), user_id);
        }

        for subject in &self.subjects {
            let owner_ids: Vec<i64> = subject
                .owners
                .iter()
                .filter_map(|owner| user_id_map.get(owner).copied())
                .collect();

            let subject_id = match owner_ids.split_first() {
                Some((author, others)) => {
                    let id = create_subject(&pool, &subject.name, *author).await?;
                    for owner in others {
                        add_subject_owner(&pool, id, *owner).await?;
                    }
                    id
                }
                None => sqlx::query("INSERT INTO subjects (name) VALUES (?)")
                    .bind(&subject.name)
                    .execute(&pool)
                    .await?
                    .last_insert_rowid(),
            };

            subject_id_map.insert(subject.name.clone(), subject_id);
        }

        for question in &self.questions {
            let Some(subject_id) = subject_id_map.get(&question.subject_name).copied() else {
                return Err(AppError::NotFound(format!(
                    "Test subject {} was never declared",
                    question.subject_name
                )));
            };

            let input = QuestionInput {
                name: question.name.clone(),
                answer: question.answer.clone(),
                mastery: question.mastery,
            };
            let question_id = create_question(&pool, subject_id, &input).await?;
            question_id_map.insert(question.name.clone(), question_id);
        }

        Ok(TestDb {
            pool,
            user_id_map,
            subject_id_map,
            question_id_map,
        })
    }
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub user_id_map: HashMap<String, i64>,
    pub subject_id_map: HashMap<String, i64>,
    pub question_id_map: HashMap<String, i64>,
}

impl TestDb {
    pub fn user_id(&self, username: &str) -> Option<i64> {
        self.user_id_map.get(username).copied()
    }

    pub fn subject_id(&self, name: &str) -> i64 {
        self.subject_id_map[name]
    }

    pub fn question_id(&self, name: &str) -> i64 {
        self.question_id_map[name]
    }

    pub async fn question(&self, name: &str) -> Result<Question, AppError> {
        get_question(&self.pool, self.question_id(name)).await
    }

    pub async fn question_count(&self, subject_name: &str) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE subject_id = ?")
            .bind(self.subject_id(subject_name))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count questions")
    }

    pub async fn total_question_count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count questions")
    }
}

/// alice owns Biology, bob owns Chemistry, root is an admin.
pub async fn create_standard_test_db() -> TestDb {
    TestDbBuilder::new()
        .member("alice")
        .member("bob")
        .admin("root")
        .subject("Biology", &["alice"])
        .subject("Chemistry", &["bob"])
        .question("Biology", "What is a cell", "Basic unit of life", 2)
        .question("Biology", "What is mitosis", "Cell division", 1)
        .question("Chemistry", "What is water", "H2O", 4)
        .build()
        .await
        .expect("Failed to build standard test database")
}

pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
    let rocket = init_rocket(test_db.pool.clone(), AppConfig::default()).await;
    let client = Client::untracked(rocket)
        .await
        .expect("Failed to build rocket client");
    (client, test_db)
}

pub async fn login_test_user(client: &Client, username: &str, password: &str) -> Vec<Cookie<'static>> {
    let response = client
        .post("/auth/login")
        .header(ContentType::Form)
        .body(form_body(&[("username", username), ("password", password)]))
        .dispatch()
        .await;

    assert_eq!(
        response.status(),
        Status::SeeOther,
        "Login for {} did not redirect",
        username
    );

    response.cookies().iter().cloned().collect()
}

/// `application/x-www-form-urlencoded` body from field pairs.
pub fn form_body(fields: &[(&str, &str)]) -> String {
    fn encode(value: &str) -> String {
        let mut out = String::new();
        for byte in value.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte as char)
                }
                b' ' => out.push('+'),
                _ => out.push_str(&format!("%{:02X}", byte)),
            }
        }
        out
    }

    fields
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn location(response: &rocket::local::asynchronous::LocalResponse<'_>) -> Option<String> {
    response.headers().get_one("Location").map(str::to_string)
}
