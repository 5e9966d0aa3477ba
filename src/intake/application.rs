//! Job application wizard.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::session::{
    max_len, require, Attachment, ContactDetails, IntakeError, IntakeForm, IntakeSession,
    PersonalInfo, LONG_TEXT_MAX, NAME_MAX, SHORT_TEXT_MAX,
};
use crate::error::FieldError;
use crate::models::SubmissionType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplicationForm {
    #[serde(flatten)]
    pub personal: PersonalInfo,
    #[schema(example = "Site Engineer")]
    pub position: String,
    #[schema(example = "immediately")]
    pub availability: String,
    pub experience_years: String,
    pub cover_letter: String,
}

impl IntakeForm for ApplicationForm {
    const KIND: SubmissionType = SubmissionType::Application;
    const STEPS: &'static [&'static str] =
        &["personal_info", "position", "skills", "documents", "review"];
    const SELECTION_FIELD: &'static str = "skills";

    fn set_field(&mut self, field: &str, value: String) -> Result<(), IntakeError> {
        if self.personal.set(field, value.clone()) {
            return Ok(());
        }
        match field {
            "position" => self.position = value,
            "availability" => self.availability = value,
            "experienceYears" => self.experience_years = value,
            "coverLetter" => self.cover_letter = value,
            other => return Err(IntakeError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    fn validate_step(
        &self,
        step: u8,
        selections: &[String],
        attachments: &[Attachment],
    ) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match step {
            1 => self.personal.validate(&mut errors),
            2 => {
                require(&mut errors, "position", &self.position, "Position is required");
                max_len(&mut errors, "position", &self.position, NAME_MAX);
                require(
                    &mut errors,
                    "availability",
                    &self.availability,
                    "Availability is required",
                );
                max_len(&mut errors, "availability", &self.availability, NAME_MAX);
                max_len(&mut errors, "experienceYears", &self.experience_years, NAME_MAX);
            }
            3 => {
                if selections.is_empty() {
                    errors.push(FieldError {
                        field: Self::SELECTION_FIELD.to_string(),
                        message: "Please select at least one skill".to_string(),
                    });
                }
            }
            4 => {
                if attachments.is_empty() {
                    errors.push(FieldError {
                        field: "attachments".to_string(),
                        message: "Please attach your CV".to_string(),
                    });
                }
                require(
                    &mut errors,
                    "coverLetter",
                    &self.cover_letter,
                    "Cover letter is required",
                );
                max_len(&mut errors, "coverLetter", &self.cover_letter, LONG_TEXT_MAX);
                for attachment in attachments {
                    max_len(&mut errors, "attachments", &attachment.name, SHORT_TEXT_MAX);
                }
            }
            _ => {}
        }
        errors
    }

    fn contact(&self) -> ContactDetails {
        ContactDetails {
            first_name: self.personal.first_name.trim().to_string(),
            last_name: self.personal.last_name.trim().to_string(),
            email: self.personal.email.trim().to_string(),
            phone: self.personal.optional_phone(),
            subject: Some(format!("Application: {}", self.position.trim())),
            message: Some(self.cover_letter.trim().to_string()),
        }
    }
}

/// Body of `POST /applications`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSubmission {
    #[serde(flatten)]
    pub form: ApplicationForm,
    #[serde(default)]
    #[schema(example = json!(["autocad", "site-supervision"]))]
    pub skills: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl ApplicationSubmission {
    pub fn into_session(self) -> IntakeSession<ApplicationForm> {
        IntakeSession::from_parts(self.form, self.skills, self.attachments)
    }
}
