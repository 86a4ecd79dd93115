use serde::Serialize;
use std::collections::HashMap;
use validator::ValidationErrors;

/// Per-field messages rendered next to form inputs.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct FormErrors {
    pub fields: HashMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn with_error(field: &str, message: &str) -> Self {
        let mut fields = HashMap::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        Self { fields }
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            fields.insert(field.to_string(), messages);
        }

        Self { fields }
    }
}
