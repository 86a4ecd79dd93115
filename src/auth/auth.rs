use chrono::{Duration, Utc};
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::State;
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::db::{authenticate_user, create_user, create_user_session, invalidate_session};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::forms::{LoginForm, RegisterForm, check};
use crate::validation::FormErrors;

use super::{Role, SESSION_COOKIE, User, UserSession};

#[derive(Responder)]
pub enum AuthOutcome {
    Redirect(Redirect),
    Rejected(Custom<Template>),
}

async fn start_session(
    db: &Pool<Sqlite>,
    config: &AppConfig,
    cookies: &CookieJar<'_>,
    user: &User,
) -> Result<(), AppError> {
    let token = UserSession::generate_token();
    let expires_at = Utc::now() + Duration::hours(config.session_hours);

    create_user_session(db, user.id, &token, expires_at.naive_utc()).await?;

    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::hours(config.session_hours)),
    );

    Ok(())
}

fn login_page(status: Status, username: &str, error: Option<&str>) -> Custom<Template> {
    Custom(
        status,
        Template::render(
            "auth/login",
            context! {
                title: "Log in",
                username: username,
                error: error,
            },
        ),
    )
}

fn register_page(status: Status, username: &str, errors: &FormErrors) -> Custom<Template> {
    Custom(
        status,
        Template::render(
            "auth/register",
            context! {
                title: "Register",
                username: username,
                errors: errors,
            },
        ),
    )
}

#[get("/login?<error>")]
pub fn login(user: Option<User>, error: Option<String>) -> Result<Template, Redirect> {
    if user.is_some() {
        return Err(Redirect::to("/"));
    }

    Ok(login_page(Status::Ok, "", error.as_deref()).1)
}

#[post("/login", data = "<form>")]
pub async fn process_login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<AuthOutcome, AppError> {
    let username = form.username.trim();
    info!(username = %username, "Login attempt");

    match authenticate_user(db, username, &form.password).await? {
        Some(user) => {
            start_session(db, config, cookies, &user).await?;
            info!(username = %user.username, "Authentication successful");
            Ok(AuthOutcome::Redirect(Redirect::to("/")))
        }
        None => {
            warn!(username = %username, "Authentication failed");
            Ok(AuthOutcome::Rejected(login_page(
                Status::Unauthorized,
                username,
                Some("Invalid username or password"),
            )))
        }
    }
}

#[get("/logout")]
pub async fn logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Result<Redirect, AppError> {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        invalidate_session(db, cookie.value()).await?;
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));
    Ok(Redirect::to("/"))
}

#[get("/register")]
pub fn register(user: Option<User>) -> Result<Template, Redirect> {
    if user.is_some() {
        return Err(Redirect::to("/"));
    }

    Ok(register_page(Status::Ok, "", &FormErrors::default()).1)
}

#[post("/register", data = "<form>")]
pub async fn process_register(
    form: Form<RegisterForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<AuthOutcome, AppError> {
    let mut form = form.into_inner();
    form.username = form.username.trim().to_string();

    let form = match check(form) {
        Ok(form) => form,
        Err((form, errors)) => {
            return Ok(AuthOutcome::Rejected(register_page(
                Status::UnprocessableEntity,
                &form.username,
                &errors,
            )));
        }
    };

    let user_id = match create_user(db, &form.username, &form.password, Role::Member).await {
        Ok(id) => id,
        Err(AppError::Validation(msg)) => {
            return Ok(AuthOutcome::Rejected(register_page(
                Status::UnprocessableEntity,
                &form.username,
                &FormErrors::with_error("username", &msg),
            )));
        }
        Err(err) => return Err(err),
    };

    let user = User {
        id: user_id,
        username: form.username,
        role: Role::Member,
    };
    start_session(db, config, cookies, &user).await?;
    info!(username = %user.username, "Registered new user");

    Ok(AuthOutcome::Redirect(Redirect::to("/")))
}
