use rocket::State;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::auth::{QuestionAction, User, authorize_question, is_creator};
use crate::db::{
    create_question, delete_question, find_author, get_questions_for_subject, get_subject,
    get_subject_question, update_question,
};
use crate::error::AppError;
use crate::forms::{MASTERY_MAX, MASTERY_MIN, QuestionForm, check};
use crate::models::{Question, Subject};
use crate::validation::FormErrors;

use super::FormOutcome;

fn new_question_page(subject: &Subject, form: &QuestionForm, errors: &FormErrors) -> Template {
    Template::render(
        "questions/new",
        context! {
            title: format!("New question - {}", subject.name),
            subject: subject,
            form: form,
            errors: errors,
            mastery_min: MASTERY_MIN,
            mastery_max: MASTERY_MAX,
        },
    )
}

fn question_page(
    subject: &Subject,
    question: &Question,
    form: &QuestionForm,
    errors: &FormErrors,
) -> Template {
    Template::render(
        "questions/question",
        context! {
            title: format!("Edit question - {}", subject.name),
            subject: subject,
            question: question,
            form: form,
            errors: errors,
            mastery_min: MASTERY_MIN,
            mastery_max: MASTERY_MAX,
        },
    )
}

#[get("/<subject_id>")]
pub async fn questions_index(
    subject_id: i64,
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let subject = get_subject(db, subject_id).await?;
    let questions = get_questions_for_subject(db, subject_id).await?;
    let author = find_author(db, subject_id).await?;

    let admin = user.as_ref().is_some_and(User::is_admin);
    let creator = match &user {
        Some(user) => is_creator(db, user, subject_id).await?,
        None => false,
    };

    Ok(Template::render(
        "questions/list",
        context! {
            title: subject.name.clone(),
            subject: subject,
            questions: questions,
            author: author,
            admin: admin,
            creator: creator,
            current_user: user,
        },
    ))
}

#[get("/<subject_id>/new/")]
pub async fn questions_form(
    subject_id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let subject = get_subject(db, subject_id).await?;

    Ok(new_question_page(
        &subject,
        &QuestionForm::default(),
        &FormErrors::default(),
    ))
}

#[get("/<subject_id>/<question_id>/", rank = 2)]
pub async fn questions_question(
    subject_id: i64,
    question_id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let subject = get_subject(db, subject_id).await?;
    let question = get_subject_question(db, subject_id, question_id).await?;

    Ok(question_page(
        &subject,
        &question,
        &QuestionForm::from(&question),
        &FormErrors::default(),
    ))
}

#[post("/<subject_id>/<question_id>/edit/", data = "<form>", rank = 2)]
pub async fn questions_edit(
    subject_id: i64,
    question_id: i64,
    user: User,
    form: Form<QuestionForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, AppError> {
    authorize_question(db, &user, subject_id, QuestionAction::Edit).await?;

    let subject = get_subject(db, subject_id).await?;
    let question = get_subject_question(db, subject_id, question_id).await?;

    let form = match check(form.into_inner().normalized()) {
        Ok(form) => form,
        Err((form, errors)) => {
            return Ok(FormOutcome::Invalid(question_page(
                &subject, &question, &form, &errors,
            )));
        }
    };

    update_question(db, question.id, &form.to_input()?).await?;
    info!(username = %user.username, subject_id, question_id, "Question updated");

    Ok(FormOutcome::Redirect(Redirect::to(uri!(questions_index(
        subject_id
    )))))
}

#[post("/<subject_id>/<question_id>/delete/", rank = 2)]
pub async fn questions_delete(
    subject_id: i64,
    question_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, AppError> {
    authorize_question(db, &user, subject_id, QuestionAction::Delete).await?;

    let question = get_subject_question(db, subject_id, question_id).await?;
    delete_question(db, question.id).await?;
    info!(username = %user.username, subject_id, question_id, "Question deleted");

    Ok(Redirect::to(uri!(questions_index(subject_id))))
}

#[post("/<subject_id>/", data = "<form>")]
pub async fn questions_create(
    subject_id: i64,
    user: User,
    form: Form<QuestionForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, AppError> {
    authorize_question(db, &user, subject_id, QuestionAction::Create).await?;

    let subject = get_subject(db, subject_id).await?;

    let form = match check(form.into_inner().normalized()) {
        Ok(form) => form,
        Err((form, errors)) => {
            return Ok(FormOutcome::Invalid(new_question_page(
                &subject, &form, &errors,
            )));
        }
    };

    let question_id = create_question(db, subject.id, &form.to_input()?).await?;
    info!(username = %user.username, subject_id, question_id, "Question created");

    Ok(FormOutcome::Redirect(Redirect::to(uri!(questions_index(
        subject_id
    )))))
}
