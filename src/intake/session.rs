//! The wizard state machine shared by every intake form.

use axum::{http::StatusCode, Json};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;
use validator::ValidateEmail;

use crate::error::{ApiError, FieldError};
use crate::models::{new_id, now, Submission, SubmissionStatus, SubmissionType};

pub const NETWORK_ERROR_MESSAGE: &str = "Network error, please try again";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntakeError {
    #[error("Please complete all required fields")]
    StepInvalid { step: u8, errors: Vec<FieldError> },
    #[error("Please complete all required fields")]
    FormInvalid { errors: Vec<FieldError> },
    #[error("The form can only be submitted from step {total}")]
    NotFinalStep { step: u8, total: u8 },
    #[error("The form cannot be changed while {phase}")]
    Locked { phase: Phase },
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("No attachment at position {0}")]
    NoSuchAttachment(usize),
    #[error("Network error, please try again")]
    Network,
}

impl IntakeError {
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            IntakeError::StepInvalid { errors, .. } | IntakeError::FormInvalid { errors } => {
                Some(errors)
            }
            _ => None,
        }
    }
}

impl From<IntakeError> for (StatusCode, Json<ApiError>) {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::StepInvalid { errors, .. } | IntakeError::FormInvalid { errors } => {
                let (status, Json(mut body)) = ApiError::validation(errors);
                body.message = "Please complete all required fields".to_string();
                (status, Json(body))
            }
            IntakeError::Network => {
                ApiError::service_unavailable(NETWORK_ERROR_MESSAGE, "NETWORK_ERROR")
            }
            other => ApiError::bad_request(other.to_string(), "INVALID_INTAKE_ACTION"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Editing,
    Submitting,
    Submitted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Editing => "editing",
            Phase::Submitting => "submitting",
            Phase::Submitted => "submitted",
        })
    }
}

/// Metadata for a file picked in the browser. Upload happens elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[schema(example = "site-plan.pdf")]
    pub name: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Contact columns every submission row carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// One kind of wizard: its steps, fields and per-step validators.
pub trait IntakeForm: Default + Clone + Serialize + DeserializeOwned + Send + 'static {
    const KIND: SubmissionType;
    /// Step names in order; step numbers are 1-indexed positions in this list.
    const STEPS: &'static [&'static str];
    /// Name used for the multi-select accumulator in payloads and errors.
    const SELECTION_FIELD: &'static str;

    fn set_field(&mut self, field: &str, value: String) -> Result<(), IntakeError>;

    /// Empty when the step passes.
    fn validate_step(&self, step: u8, selections: &[String], attachments: &[Attachment])
        -> Vec<FieldError>;

    fn contact(&self) -> ContactDetails;

    fn total_steps() -> u8 {
        Self::STEPS.len() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Updated,
    StepChanged(u8),
    Submitting,
    Submitted,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntakeAction {
    SetField { field: String, value: String },
    Toggle(String),
    AddAttachments(Vec<Attachment>),
    RemoveAttachment(usize),
    Next,
    Prev,
    Submit,
    SubmissionSucceeded,
    SubmissionFailed,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeSession<F> {
    pub step: u8,
    pub form: F,
    pub selections: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl<F: IntakeForm> Default for IntakeSession<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: IntakeForm> IntakeSession<F> {
    pub fn new() -> Self {
        Self {
            step: 1,
            form: F::default(),
            selections: Vec::new(),
            attachments: Vec::new(),
            phase: Phase::Editing,
            last_error: None,
        }
    }

    /// A session holding an already-complete form, positioned on the last step.
    pub fn from_parts(form: F, selections: Vec<String>, attachments: Vec<Attachment>) -> Self {
        let mut session = Self::new();
        session.form = form;
        for item in selections {
            if !session.selections.contains(&item) {
                session.selections.push(item);
            }
        }
        session.attachments = attachments;
        session.step = F::total_steps();
        session
    }

    pub fn total_steps(&self) -> u8 {
        F::total_steps()
    }

    pub fn step_name(&self) -> &'static str {
        F::STEPS
            .get(usize::from(self.step.saturating_sub(1)))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_final_step(&self) -> bool {
        self.step >= F::total_steps()
    }

    pub fn validate_current(&self) -> Vec<FieldError> {
        self.form
            .validate_step(self.step, &self.selections, &self.attachments)
    }

    pub fn validate_all(&self) -> Vec<FieldError> {
        (1..=F::total_steps())
            .flat_map(|step| {
                self.form
                    .validate_step(step, &self.selections, &self.attachments)
            })
            .collect()
    }

    /// Applies one action. A rejected action leaves the session untouched,
    /// except `SubmissionFailed`, which reopens the form and reports the error.
    pub fn reduce(&mut self, action: IntakeAction) -> Result<Transition, IntakeError> {
        // A restored session may carry any step number.
        self.step = self.step.clamp(1, F::total_steps());

        match action {
            IntakeAction::Reset => {
                *self = Self::new();
                return Ok(Transition::Reset);
            }
            IntakeAction::SubmissionSucceeded => {
                self.expect_phase(Phase::Submitting)?;
                *self = Self::new();
                self.phase = Phase::Submitted;
                return Ok(Transition::Submitted);
            }
            IntakeAction::SubmissionFailed => {
                self.expect_phase(Phase::Submitting)?;
                self.phase = Phase::Editing;
                self.last_error = Some(NETWORK_ERROR_MESSAGE.to_string());
                return Err(IntakeError::Network);
            }
            _ => self.expect_phase(Phase::Editing)?,
        }

        match action {
            IntakeAction::SetField { field, value } => {
                self.form.set_field(&field, value)?;
                Ok(Transition::Updated)
            }
            IntakeAction::Toggle(item) => {
                if let Some(pos) = self.selections.iter().position(|s| *s == item) {
                    self.selections.remove(pos);
                } else {
                    self.selections.push(item);
                }
                Ok(Transition::Updated)
            }
            IntakeAction::AddAttachments(files) => {
                self.attachments.extend(files);
                Ok(Transition::Updated)
            }
            IntakeAction::RemoveAttachment(index) => {
                if index >= self.attachments.len() {
                    return Err(IntakeError::NoSuchAttachment(index));
                }
                self.attachments.remove(index);
                Ok(Transition::Updated)
            }
            IntakeAction::Next => {
                let errors = self.validate_current();
                if !errors.is_empty() {
                    return Err(IntakeError::StepInvalid {
                        step: self.step,
                        errors,
                    });
                }
                self.step = self.step.saturating_add(1).min(F::total_steps());
                Ok(Transition::StepChanged(self.step))
            }
            IntakeAction::Prev => {
                self.step = self.step.saturating_sub(1).max(1);
                Ok(Transition::StepChanged(self.step))
            }
            IntakeAction::Submit => {
                if !self.is_final_step() {
                    return Err(IntakeError::NotFinalStep {
                        step: self.step,
                        total: F::total_steps(),
                    });
                }
                let errors = self.validate_all();
                if !errors.is_empty() {
                    return Err(IntakeError::FormInvalid { errors });
                }
                self.phase = Phase::Submitting;
                self.last_error = None;
                Ok(Transition::Submitting)
            }
            IntakeAction::Reset
            | IntakeAction::SubmissionSucceeded
            | IntakeAction::SubmissionFailed => Ok(Transition::Updated),
        }
    }

    /// Builds the `contact_submissions` row after full validation.
    pub fn to_submission(&self) -> Result<Submission, IntakeError> {
        let errors = self.validate_all();
        if !errors.is_empty() {
            return Err(IntakeError::FormInvalid { errors });
        }

        let contact = self.form.contact();
        let mut details = serde_json::to_value(&self.form).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(map) = &mut details {
            map.insert(
                F::SELECTION_FIELD.to_string(),
                serde_json::json!(self.selections),
            );
            map.insert(
                "attachments".to_string(),
                serde_json::to_value(&self.attachments).unwrap_or_default(),
            );
        }

        let ts = now();
        Ok(Submission {
            id: new_id(),
            submission_type: F::KIND,
            first_name: contact.first_name,
            last_name: contact.last_name,
            email: contact.email.trim().to_lowercase(),
            phone: contact.phone,
            subject: contact.subject,
            message: contact.message,
            details: Some(details),
            status: SubmissionStatus::New,
            responded_at: None,
            created_at: ts,
            updated_at: ts,
        })
    }

    fn expect_phase(&self, phase: Phase) -> Result<(), IntakeError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(IntakeError::Locked { phase: self.phase })
        }
    }
}

// ============================================================================
// Shared field checks
// ============================================================================

pub(crate) fn require(errors: &mut Vec<FieldError>, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

/// Column widths of `contact_submissions`, and the cap on free text.
pub(crate) const NAME_MAX: usize = 100;
pub(crate) const EMAIL_MAX: usize = 255;
pub(crate) const PHONE_MAX: usize = 30;
pub(crate) const SHORT_TEXT_MAX: usize = 255;
pub(crate) const LONG_TEXT_MAX: usize = 5000;

/// Flags a value longer than `max` characters once trimmed.
pub(crate) fn max_len(errors: &mut Vec<FieldError>, field: &str, value: &str, max: usize) {
    if value.trim().chars().count() > max {
        errors.push(FieldError {
            field: field.to_string(),
            message: format!("Must be at most {max} characters"),
        });
    }
}

/// The personal-details step both wizards open with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonalInfo {
    #[schema(example = "Jane")]
    pub first_name: String,
    #[schema(example = "Wanjiru")]
    pub last_name: String,
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[schema(example = "+254 712 345 678")]
    pub phone: String,
}

impl PersonalInfo {
    /// Returns `false` when the field is not a personal-details field.
    pub fn set(&mut self, field: &str, value: String) -> bool {
        match field {
            "firstName" => self.first_name = value,
            "lastName" => self.last_name = value,
            "email" => self.email = value,
            "phone" => self.phone = value,
            _ => return false,
        }
        true
    }

    pub fn validate(&self, errors: &mut Vec<FieldError>) {
        require(errors, "firstName", &self.first_name, "First name is required");
        max_len(errors, "firstName", &self.first_name, NAME_MAX);
        require(errors, "lastName", &self.last_name, "Last name is required");
        max_len(errors, "lastName", &self.last_name, NAME_MAX);
        if self.email.trim().is_empty() {
            require(errors, "email", &self.email, "Email is required");
        } else if self.email.trim().chars().count() > EMAIL_MAX
            || !self.email.trim().validate_email()
        {
            errors.push(FieldError {
                field: "email".to_string(),
                message: "Valid email is required".to_string(),
            });
        }
        require(errors, "phone", &self.phone, "Phone number is required");
        max_len(errors, "phone", &self.phone, PHONE_MAX);
    }

    pub fn optional_phone(&self) -> Option<String> {
        Some(self.phone.trim().to_string()).filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-step form: a name, then at least one selection.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Tiny {
        name: String,
    }

    impl IntakeForm for Tiny {
        const KIND: SubmissionType = SubmissionType::Contact;
        const STEPS: &'static [&'static str] = &["name", "choices", "confirm"];
        const SELECTION_FIELD: &'static str = "choices";

        fn set_field(&mut self, field: &str, value: String) -> Result<(), IntakeError> {
            match field {
                "name" => self.name = value,
                other => return Err(IntakeError::UnknownField(other.to_string())),
            }
            Ok(())
        }

        fn validate_step(&self, step: u8, selections: &[String], _: &[Attachment]) -> Vec<FieldError> {
            let mut errors = Vec::new();
            match step {
                1 => require(&mut errors, "name", &self.name, "Name is required"),
                2 if selections.is_empty() => errors.push(FieldError {
                    field: "choices".into(),
                    message: "Pick one".into(),
                }),
                _ => {}
            }
            errors
        }

        fn contact(&self) -> ContactDetails {
            ContactDetails {
                first_name: self.name.clone(),
                last_name: String::new(),
                email: "tiny@example.com".into(),
                phone: None,
                subject: None,
                message: None,
            }
        }
    }

    fn set(session: &mut IntakeSession<Tiny>, field: &str, value: &str) {
        session
            .reduce(IntakeAction::SetField {
                field: field.into(),
                value: value.into(),
            })
            .unwrap();
    }

    fn filled() -> IntakeSession<Tiny> {
        let mut session = IntakeSession::<Tiny>::new();
        set(&mut session, "name", "Jane");
        session.reduce(IntakeAction::Next).unwrap();
        session.reduce(IntakeAction::Toggle("a".into())).unwrap();
        session.reduce(IntakeAction::Next).unwrap();
        session
    }

    #[test]
    fn test_next_on_invalid_step_keeps_step() {
        let mut session = IntakeSession::<Tiny>::new();
        let err = session.reduce(IntakeAction::Next).unwrap_err();

        assert!(matches!(err, IntakeError::StepInvalid { step: 1, .. }));
        assert_eq!(err.field_errors().unwrap()[0].field, "name");
        assert_eq!(session.step, 1);
    }

    #[test]
    fn test_next_advances_by_one_and_caps() {
        let mut session = filled();
        assert_eq!(session.step, 3);
        assert!(session.is_final_step());

        assert_eq!(
            session.reduce(IntakeAction::Next).unwrap(),
            Transition::StepChanged(3)
        );
        assert_eq!(session.step, 3);
    }

    #[test]
    fn test_prev_is_clamped() {
        let mut session = filled();
        session.reduce(IntakeAction::Prev).unwrap();
        assert_eq!(session.step, 2);
        session.reduce(IntakeAction::Prev).unwrap();
        session.reduce(IntakeAction::Prev).unwrap();
        assert_eq!(session.step, 1);
    }

    #[test]
    fn test_toggle_twice_restores_selection() {
        let mut session = IntakeSession::<Tiny>::new();
        session.reduce(IntakeAction::Toggle("a".into())).unwrap();
        let before = session.selections.clone();

        session.reduce(IntakeAction::Toggle("b".into())).unwrap();
        session.reduce(IntakeAction::Toggle("b".into())).unwrap();
        assert_eq!(session.selections, before);

        session.reduce(IntakeAction::Toggle("a".into())).unwrap();
        assert!(session.selections.is_empty());
    }

    #[test]
    fn test_attachments_accumulate_and_remove_by_index() {
        let file = |name: &str| Attachment {
            name: name.into(),
            size_bytes: 10,
            content_type: None,
        };
        let mut session = IntakeSession::<Tiny>::new();
        session
            .reduce(IntakeAction::AddAttachments(vec![file("a"), file("b")]))
            .unwrap();
        session
            .reduce(IntakeAction::AddAttachments(vec![file("c")]))
            .unwrap();
        session.reduce(IntakeAction::RemoveAttachment(1)).unwrap();

        let names: Vec<_> = session.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(
            session.reduce(IntakeAction::RemoveAttachment(5)),
            Err(IntakeError::NoSuchAttachment(5))
        );
    }

    #[test]
    fn test_submit_only_from_final_step() {
        let mut session = IntakeSession::<Tiny>::new();
        set(&mut session, "name", "Jane");
        assert!(matches!(
            session.reduce(IntakeAction::Submit),
            Err(IntakeError::NotFinalStep { step: 1, total: 3 })
        ));
        assert_eq!(session.phase, Phase::Editing);
    }

    #[test]
    fn test_successful_submission_clears_everything() {
        let mut session = filled();
        assert_eq!(
            session.reduce(IntakeAction::Submit).unwrap(),
            Transition::Submitting
        );
        assert_eq!(
            session.reduce(IntakeAction::Toggle("x".into())),
            Err(IntakeError::Locked {
                phase: Phase::Submitting
            })
        );

        session.reduce(IntakeAction::SubmissionSucceeded).unwrap();
        assert_eq!(session.phase, Phase::Submitted);
        assert_eq!(session.step, 1);
        assert_eq!(session.form, Tiny::default());
        assert!(session.selections.is_empty());

        assert!(session.reduce(IntakeAction::Next).is_err());
        session.reduce(IntakeAction::Reset).unwrap();
        assert_eq!(session.phase, Phase::Editing);
    }

    #[test]
    fn test_failed_submission_keeps_data() {
        let mut session = filled();
        session.reduce(IntakeAction::Submit).unwrap();

        let err = session.reduce(IntakeAction::SubmissionFailed).unwrap_err();
        assert_eq!(err.to_string(), NETWORK_ERROR_MESSAGE);
        assert_eq!(session.phase, Phase::Editing);
        assert_eq!(session.form.name, "Jane");
        assert_eq!(session.last_error.as_deref(), Some(NETWORK_ERROR_MESSAGE));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut session = IntakeSession::<Tiny>::new();
        assert_eq!(
            session.reduce(IntakeAction::SetField {
                field: "nope".into(),
                value: "x".into()
            }),
            Err(IntakeError::UnknownField("nope".into()))
        );
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let session = filled();
        let json = serde_json::to_string(&session).unwrap();
        let restored: IntakeSession<Tiny> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_to_submission_carries_details() {
        let submission = filled().to_submission().unwrap();
        assert_eq!(submission.submission_type, SubmissionType::Contact);
        assert_eq!(submission.status, SubmissionStatus::New);

        let details = submission.details.unwrap();
        assert_eq!(details["name"], "Jane");
        assert_eq!(details["choices"], serde_json::json!(["a"]));
    }

    #[test]
    fn test_restored_step_is_clamped() {
        let mut session = filled();
        session.step = 255;
        assert_eq!(
            session.reduce(IntakeAction::Next).unwrap(),
            Transition::StepChanged(3)
        );

        let json = serde_json::json!({
            "step": 0,
            "form": { "name": "" },
            "selections": [],
            "attachments": [],
            "phase": "editing"
        });
        let mut restored: IntakeSession<Tiny> = serde_json::from_value(json).unwrap();
        assert!(matches!(
            restored.reduce(IntakeAction::Next),
            Err(IntakeError::StepInvalid { step: 1, .. })
        ));
        assert_eq!(restored.step, 1);
    }

    #[test]
    fn test_overlong_personal_info_is_rejected() {
        let mut errors = Vec::new();
        PersonalInfo {
            first_name: "J".repeat(NAME_MAX + 1),
            last_name: "Wanjiru".into(),
            email: format!("{}@example.com", "a".repeat(EMAIL_MAX)),
            phone: "0".repeat(PHONE_MAX + 1),
        }
        .validate(&mut errors);

        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["firstName", "email", "phone"]);

        let mut errors = Vec::new();
        PersonalInfo {
            first_name: "J".repeat(NAME_MAX),
            last_name: "Wanjiru".into(),
            email: "jane@example.com".into(),
            phone: "+254 712 345 678".into(),
        }
        .validate(&mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_personal_info_validation() {
        let mut errors = Vec::new();
        PersonalInfo {
            first_name: "Jane".into(),
            last_name: " ".into(),
            email: "not-an-email".into(),
            phone: String::new(),
        }
        .validate(&mut errors);

        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["lastName", "email", "phone"]);
    }
}
