//! Onboarding Form
//!
//! Holds the visitor's draft answers, checks the same constraints a browser
//! enforces natively (required, email shape, number), and submits the
//! answers under a client-side deadline.

use std::time::Duration;

use crate::api::{FormValues, WidgetApi};
use crate::error::{WidgetError, WidgetResult};
use crate::models::{FieldType, FormField};

/// Submit control label while idle
pub const SUBMIT_LABEL: &str = "Continue";
/// Submit control label while a submission is in flight
pub const SUBMITTING_LABEL: &str = "Submitting…";
/// Inline error shown after a failed submission
pub const SUBMIT_ERROR: &str = "Error submitting form. Please try again.";
/// How long a surface should keep the inline error visible
pub const SUBMIT_ERROR_TTL: Duration = Duration::from_secs(3);

/// Why a field blocks submission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    /// Required but blank
    Missing,
    /// Not shaped like an email address
    NotAnEmail,
    /// Not a number
    NotANumber,
}

impl Violation {
    /// Message shown next to the field
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Missing => "Please fill out this field.",
            Self::NotAnEmail => "Please enter an email address.",
            Self::NotANumber => "Please enter a number.",
        }
    }
}

/// A field that failed a native constraint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldViolation {
    /// Field name
    pub field: String,
    /// What is wrong with it
    pub violation: Violation,
}

/// Submission state of the form
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubmitState {
    /// Ready for submission
    #[default]
    Idle,
    /// Request in flight, control disabled
    Submitting,
    /// Last submission failed, control re-enabled
    Failed(String),
}

impl SubmitState {
    /// Label for the submit control
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Submitting => SUBMITTING_LABEL,
            Self::Idle | Self::Failed(_) => SUBMIT_LABEL,
        }
    }

    /// Whether a submission is in flight
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }

    /// Inline error, if the last submission failed
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// The visitor's answers to the configured fields
#[derive(Clone, Debug, Default)]
pub struct FormDraft {
    fields: Vec<FormField>,
    values: FormValues,
}

impl FormDraft {
    /// Start a draft for `fields` (sorted by their order key)
    #[must_use]
    pub fn new(mut fields: Vec<FormField>) -> Self {
        fields.sort_by_key(|f| f.order);
        Self {
            fields,
            values: FormValues::new(),
        }
    }

    /// Swap in a new field list, keeping answers for fields that survive
    pub fn set_fields(&mut self, mut fields: Vec<FormField>) {
        fields.sort_by_key(|f| f.order);
        self.values
            .retain(|name, _| fields.iter().any(|f| &f.name == name));
        self.fields = fields;
    }

    /// Configured fields in display order
    #[must_use]
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Record an answer; unknown field names are ignored
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        if self.fields.iter().any(|f| f.name == name) {
            self.values.insert(name.to_string(), value.into());
        } else {
            tracing::debug!(field = name, "Ignoring value for unknown form field");
        }
    }

    /// Current answer for `name`
    #[must_use]
    pub fn value(&self, name: &str) -> &str {
        self.values.get(name).map_or("", String::as_str)
    }

    /// Check native constraints and collect every field's value
    ///
    /// Fields without an answer are submitted as `""`.
    ///
    /// # Errors
    ///
    /// Returns the first field (in display order) that violates a constraint.
    pub fn validate(&self) -> Result<FormValues, FieldViolation> {
        let mut collected = FormValues::new();
        for field in &self.fields {
            let value = self.value(&field.name);
            if let Some(violation) = check(field, value) {
                return Err(FieldViolation {
                    field: field.name.clone(),
                    violation,
                });
            }
            collected.insert(field.name.clone(), value.to_string());
        }
        Ok(collected)
    }
}

fn check(field: &FormField, value: &str) -> Option<Violation> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return field.required.then_some(Violation::Missing);
    }
    match field.field_type {
        FieldType::Email if !looks_like_email(trimmed) => Some(Violation::NotAnEmail),
        FieldType::Number if !trimmed.parse::<f64>().is_ok_and(f64::is_finite) => {
            Some(Violation::NotANumber)
        }
        _ => None,
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
}

/// Post `values` to `form/submit`, failing if `deadline` elapses first
///
/// On timeout the request future is dropped, which aborts the HTTP call.
///
/// # Errors
///
/// Returns [`WidgetError::Timeout`] when the deadline elapses, or the API
/// error otherwise.
pub async fn submit<A: WidgetApi + ?Sized>(
    api: &A,
    values: &FormValues,
    deadline: Duration,
) -> WidgetResult<()> {
    match tokio::time::timeout(deadline, api.submit_form(values)).await {
        Ok(result) => result,
        Err(_) => Err(WidgetError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{Endpoint, MockApi};

    fn draft() -> FormDraft {
        let mut age = FormField::new("age", "Age", FieldType::Number);
        age.order = 2;
        let mut email = FormField::new("email", "Email", FieldType::Email).required();
        email.order = 1;
        FormDraft::new(vec![age, email])
    }

    #[test]
    fn test_required_blank_blocks() {
        let mut form = draft();
        form.set("email", "   ");
        let err = form.validate().unwrap_err();
        assert_eq!(err.field, "email");
        assert_eq!(err.violation, Violation::Missing);
    }

    #[test]
    fn test_shape_checks() {
        let mut form = draft();
        form.set("email", "not-an-email");
        assert_eq!(form.validate().unwrap_err().violation, Violation::NotAnEmail);

        form.set("email", "a@b.com");
        form.set("age", "forty");
        assert_eq!(form.validate().unwrap_err().violation, Violation::NotANumber);

        form.set("age", "");
        let values = form.validate().unwrap();
        assert_eq!(values.get("email").map(String::as_str), Some("a@b.com"));
        assert_eq!(values.get("age").map(String::as_str), Some(""));
    }

    #[test]
    fn test_set_fields_keeps_surviving_answers() {
        let mut form = draft();
        form.set("email", "a@b.com");
        form.set("age", "3");
        form.set("nickname", "x");
        form.set_fields(vec![FormField::new("email", "Email", FieldType::Email)]);
        assert_eq!(form.value("email"), "a@b.com");
        assert_eq!(form.value("age"), "");
        assert_eq!(form.fields().len(), 1);
    }

    #[test]
    fn test_submit_state_labels() {
        assert_eq!(SubmitState::Idle.label(), "Continue");
        assert_eq!(SubmitState::Submitting.label(), "Submitting…");
        let failed = SubmitState::Failed(SUBMIT_ERROR.to_string());
        assert_eq!(failed.label(), "Continue");
        assert_eq!(failed.error(), Some(SUBMIT_ERROR));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_times_out() {
        let api = MockApi::new();
        api.set_delay(Endpoint::SubmitForm, Duration::from_secs(30));

        let err = submit(&api, &FormValues::new(), Duration::from_millis(5000))
            .await
            .unwrap_err();
        assert!(matches!(err, WidgetError::Timeout(d) if d == Duration::from_millis(5000)));
    }
}
