use sqlx::{Pool, Sqlite};
use tracing::{instrument, warn};

use crate::db::is_subject_owner;
use crate::error::AppError;

use super::{Permission, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionAction {
    Create,
    Edit,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectAction {
    Rename,
    Share,
    Delete,
}

/// Whether `user` owns the subject. Unknown subjects are never owned.
#[instrument(skip(pool), fields(user_id = user.id))]
pub async fn is_creator(pool: &Pool<Sqlite>, user: &User, subject_id: i64) -> Result<bool, AppError> {
    is_subject_owner(pool, user.id, subject_id).await
}

/// Admins may edit and delete any question but only owners may add one.
pub fn may_manage_question(user: &User, action: QuestionAction, is_creator: bool) -> bool {
    match action {
        QuestionAction::Create => is_creator,
        QuestionAction::Edit | QuestionAction::Delete => {
            is_creator || user.has_permission(Permission::ManageAllQuestions)
        }
    }
}

/// Renaming, sharing and deleting a subject share one rule: owner or admin.
pub fn may_manage_subject(user: &User, is_creator: bool) -> bool {
    (is_creator && user.has_permission(Permission::ManageOwnSubjects))
        || user.has_permission(Permission::ManageAllSubjects)
}

pub async fn authorize_question(
    pool: &Pool<Sqlite>,
    user: &User,
    subject_id: i64,
    action: QuestionAction,
) -> Result<(), AppError> {
    let creator = is_creator(pool, user, subject_id).await?;

    if may_manage_question(user, action, creator) {
        Ok(())
    } else {
        warn!(
            username = %user.username,
            subject_id,
            action = ?action,
            "Question action denied"
        );
        Err(AppError::Authorization(format!(
            "{} may not {:?} questions of subject {}",
            user.username, action, subject_id
        )))
    }
}

pub async fn authorize_subject(
    pool: &Pool<Sqlite>,
    user: &User,
    subject_id: i64,
    action: SubjectAction,
) -> Result<(), AppError> {
    let creator = is_creator(pool, user, subject_id).await?;

    if may_manage_subject(user, creator) {
        Ok(())
    } else {
        warn!(
            username = %user.username,
            subject_id,
            action = ?action,
            "Subject action denied"
        );
        Err(AppError::Authorization(format!(
            "{} may not {:?} subject {}",
            user.username, action, subject_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn user(role: Role) -> User {
        User {
            id: 1,
            username: "someone".to_string(),
            role,
        }
    }

    #[test]
    fn test_owner_may_do_everything_with_questions() {
        let member = user(Role::Member);
        for action in [QuestionAction::Create, QuestionAction::Edit, QuestionAction::Delete] {
            assert!(may_manage_question(&member, action, true));
        }
    }

    #[test]
    fn test_stranger_may_do_nothing_with_questions() {
        let member = user(Role::Member);
        for action in [QuestionAction::Create, QuestionAction::Edit, QuestionAction::Delete] {
            assert!(!may_manage_question(&member, action, false));
        }
    }

    #[test]
    fn test_admin_override_excludes_create() {
        let admin = user(Role::Admin);
        assert!(!may_manage_question(&admin, QuestionAction::Create, false));
        assert!(may_manage_question(&admin, QuestionAction::Edit, false));
        assert!(may_manage_question(&admin, QuestionAction::Delete, false));
    }

    #[test]
    fn test_subject_policy() {
        let member = user(Role::Member);
        let admin = user(Role::Admin);
        assert!(may_manage_subject(&member, true));
        assert!(!may_manage_subject(&member, false));
        assert!(may_manage_subject(&admin, false));
    }
}
