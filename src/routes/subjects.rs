use rocket::State;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::auth::{Permission, SubjectAction, User, authorize_subject};
use crate::db::{
    add_subject_owner, create_subject, delete_subject, find_user_by_username, get_subject,
    get_subject_overviews, get_subject_owners, rename_subject,
};
use crate::error::AppError;
use crate::forms::{OwnerForm, SubjectForm, check};
use crate::models::Subject;
use crate::validation::FormErrors;

use super::FormOutcome;

fn new_subject_page(form: &SubjectForm, errors: &FormErrors) -> Template {
    Template::render(
        "subjects/new",
        context! {
            title: "New subject",
            form: form,
            errors: errors,
        },
    )
}

async fn edit_subject_page(
    db: &Pool<Sqlite>,
    subject: &Subject,
    form: &SubjectForm,
    errors: &FormErrors,
) -> Result<Template, AppError> {
    let owners = get_subject_owners(db, subject.id).await?;

    Ok(Template::render(
        "subjects/edit",
        context! {
            title: format!("Edit subject - {}", subject.name),
            subject: subject,
            owners: owners,
            form: form,
            errors: errors,
        },
    ))
}

#[get("/")]
pub async fn subjects_index(
    user: Option<User>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let subjects = get_subject_overviews(db).await?;

    Ok(Template::render(
        "subjects/list",
        context! {
            title: "Subjects",
            subjects: subjects,
            current_user: user,
        },
    ))
}

#[get("/subjects/new")]
pub fn subjects_form(_user: User) -> Template {
    new_subject_page(&SubjectForm::default(), &FormErrors::default())
}

#[post("/subjects", data = "<form>")]
pub async fn subjects_create(
    user: User,
    form: Form<SubjectForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, AppError> {
    user.require_permission(Permission::CreateSubjects)
        .map_err(|_| AppError::Authorization(format!("{} may not create subjects", user.username)))?;

    let form = match check(form.into_inner().normalized()) {
        Ok(form) => form,
        Err((form, errors)) => return Ok(FormOutcome::Invalid(new_subject_page(&form, &errors))),
    };

    let subject_id = create_subject(db, &form.name, user.id).await?;
    info!(username = %user.username, subject_id, "Subject created");

    Ok(FormOutcome::Redirect(Redirect::to(uri!(
        crate::routes::questions::questions_index(subject_id)
    ))))
}

#[get("/subjects/<id>/edit")]
pub async fn subjects_edit_form(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    authorize_subject(db, &user, id, SubjectAction::Rename).await?;
    let subject = get_subject(db, id).await?;

    let form = SubjectForm {
        name: subject.name.clone(),
    };
    edit_subject_page(db, &subject, &form, &FormErrors::default()).await
}

#[post("/subjects/<id>/edit", data = "<form>")]
pub async fn subjects_edit(
    id: i64,
    user: User,
    form: Form<SubjectForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, AppError> {
    authorize_subject(db, &user, id, SubjectAction::Rename).await?;
    let subject = get_subject(db, id).await?;

    let form = match check(form.into_inner().normalized()) {
        Ok(form) => form,
        Err((form, errors)) => {
            let page = edit_subject_page(db, &subject, &form, &errors).await?;
            return Ok(FormOutcome::Invalid(page));
        }
    };

    rename_subject(db, id, &form.name).await?;
    info!(username = %user.username, subject_id = id, "Subject renamed");

    Ok(FormOutcome::Redirect(Redirect::to(uri!(
        crate::routes::questions::questions_index(id)
    ))))
}

#[post("/subjects/<id>/owners", data = "<form>")]
pub async fn subjects_add_owner(
    id: i64,
    user: User,
    form: Form<OwnerForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, AppError> {
    authorize_subject(db, &user, id, SubjectAction::Share).await?;
    let subject = get_subject(db, id).await?;
    let rename_form = SubjectForm {
        name: subject.name.clone(),
    };

    let form = match check(form.into_inner()) {
        Ok(form) => form,
        Err((_, errors)) => {
            let page = edit_subject_page(db, &subject, &rename_form, &errors).await?;
            return Ok(FormOutcome::Invalid(page));
        }
    };

    let Some(owner) = find_user_by_username(db, form.username.trim()).await? else {
        let errors = FormErrors::with_error("username", "No user with that username");
        let page = edit_subject_page(db, &subject, &rename_form, &errors).await?;
        return Ok(FormOutcome::Invalid(page));
    };

    add_subject_owner(db, id, owner.id).await?;
    info!(username = %user.username, subject_id = id, owner = %owner.username, "Subject owner added");

    Ok(FormOutcome::Redirect(Redirect::to(uri!(subjects_edit_form(id)))))
}

#[post("/subjects/<id>/delete")]
pub async fn subjects_delete(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, AppError> {
    authorize_subject(db, &user, id, SubjectAction::Delete).await?;

    delete_subject(db, id).await?;
    info!(username = %user.username, subject_id = id, "Subject deleted");

    Ok(Redirect::to(uri!(subjects_index)))
}
