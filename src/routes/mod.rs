use rocket::response::Redirect;
use rocket_dyn_templates::Template;

pub mod questions;
pub mod subjects;

pub use questions::*;
pub use subjects::*;

/// Result of a form submission: redirect after a successful write, or the form
/// again with its errors.
#[derive(Responder)]
pub enum FormOutcome {
    Redirect(Redirect),
    #[response(status = 422)]
    Invalid(Template),
}
