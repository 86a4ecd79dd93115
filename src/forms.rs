use rocket::FromForm;
use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::models::{Question, QuestionInput};
use crate::validation::FormErrors;

pub const MASTERY_MIN: i64 = 0;
pub const MASTERY_MAX: i64 = 5;

fn validate_mastery(value: &str) -> Result<(), ValidationError> {
    match value.trim().parse::<i64>() {
        Ok(mastery) if (MASTERY_MIN..=MASTERY_MAX).contains(&mastery) => Ok(()),
        _ => {
            let mut error = ValidationError::new("mastery");
            error.message = Some(
                format!(
                    "Mastery must be a whole number from {} to {}",
                    MASTERY_MIN, MASTERY_MAX
                )
                .into(),
            );
            Err(error)
        }
    }
}

/// Validates `form` and hands back either the value or its field errors.
pub fn check<T: Validate>(form: T) -> Result<T, (T, FormErrors)> {
    match form.validate() {
        Ok(()) => Ok(form),
        Err(errors) => Err((form, FormErrors::from(errors))),
    }
}

#[derive(Debug, Clone, Default, FromForm, Validate, Serialize)]
pub struct SubjectForm {
    #[validate(length(min = 2, message = "Subject name must be at least 2 characters"))]
    pub name: String,
}

impl SubjectForm {
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, FromForm, Validate, Serialize)]
pub struct QuestionForm {
    #[validate(length(min = 2, message = "Question must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Answer must not be empty"))]
    pub answer: String,
    #[validate(custom(function = "validate_mastery"))]
    pub mastery: String,
}

impl QuestionForm {
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            answer: self.answer.trim().to_string(),
            mastery: self.mastery.trim().to_string(),
        }
    }

    pub fn to_input(&self) -> Result<QuestionInput, AppError> {
        validate_mastery(&self.mastery).map_err(|_| {
            AppError::Validation(format!("Mastery '{}' is out of range", self.mastery))
        })?;

        let mastery = self.mastery.trim().parse().map_err(|_| {
            AppError::Validation(format!("Mastery '{}' is not a number", self.mastery))
        })?;

        Ok(QuestionInput {
            name: self.name.clone(),
            answer: self.answer.clone(),
            mastery,
        })
    }
}

impl From<&Question> for QuestionForm {
    fn from(question: &Question) -> Self {
        Self {
            name: question.name.clone(),
            answer: question.answer.clone(),
            mastery: question.mastery.to_string(),
        }
    }
}

#[derive(Debug, FromForm)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, FromForm, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 2, max = 32, message = "Username must be 2 to 32 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm: String,
}

#[derive(Debug, Clone, FromForm, Validate, Serialize)]
pub struct OwnerForm {
    #[validate(length(min = 2, message = "Enter a username"))]
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(name: &str, answer: &str, mastery: &str) -> QuestionForm {
        QuestionForm {
            name: name.to_string(),
            answer: answer.to_string(),
            mastery: mastery.to_string(),
        }
        .normalized()
    }

    #[test]
    fn test_subject_name_min_length() {
        assert!(SubjectForm { name: "A".into() }.validate().is_err());
        assert!(SubjectForm { name: "AB".into() }.validate().is_ok());

        let padded = SubjectForm { name: "  A  ".into() }.normalized();
        let (_, errors) = check(padded).unwrap_err();
        assert_eq!(
            errors.messages("name"),
            ["Subject name must be at least 2 characters".to_string()]
        );
    }

    #[test]
    fn test_valid_question_converts_to_input() {
        let form = check(question(" Capital of France? ", "Paris", " 3 ")).unwrap();
        assert_eq!(
            form.to_input().unwrap(),
            QuestionInput {
                name: "Capital of France?".into(),
                answer: "Paris".into(),
                mastery: 3,
            }
        );
    }

    #[test]
    fn test_question_field_errors() {
        let (_, errors) = check(question("Q", "", "7")).unwrap_err();
        assert_eq!(errors.messages("name").len(), 1);
        assert_eq!(errors.messages("answer").len(), 1);
        assert_eq!(
            errors.messages("mastery"),
            ["Mastery must be a whole number from 0 to 5".to_string()]
        );
    }

    #[test]
    fn test_mastery_must_be_numeric() {
        assert!(check(question("Question", "Answer", "lots")).is_err());
        assert!(check(question("Question", "Answer", "-1")).is_err());
        assert!(check(question("Question", "Answer", "0")).is_ok());
        assert!(check(question("Question", "Answer", "5")).is_ok());
    }

    #[test]
    fn test_unchecked_mastery_is_rejected_by_to_input() {
        let out_of_range = question("Question", "Answer", "9");
        assert!(matches!(out_of_range.to_input(), Err(AppError::Validation(_))));

        let garbage = question("Question", "Answer", "lots");
        assert!(matches!(garbage.to_input(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_register_passwords_must_match() {
        let form = RegisterForm {
            username: "newbie".into(),
            password: "correct horse".into(),
            confirm: "battery staple".into(),
        };
        let (_, errors) = check(form).unwrap_err();
        assert_eq!(errors.messages("confirm"), ["Passwords do not match".to_string()]);
    }
}
