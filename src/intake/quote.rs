//! Quote request wizard.

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
pub struct QuoteForm {
    #[serde(flatten)]
    pub personal: PersonalInfo,
    pub company: String,
    #[schema(example = "residential")]
    pub project_type: String,
    #[schema(example = "Nairobi, Karen")]
    pub location: String,
    pub budget_range: String,
    pub timeline: String,
    #[schema(example = "Four-bedroom maisonette on a quarter-acre plot")]
    pub description: String,
}

impl IntakeForm for QuoteForm {
    const KIND: SubmissionType = SubmissionType::Quote;
    const STEPS: &'static [&'static str] = &[
        "personal_info",
        "project_info",
        "services",
        "project_details",
        "confirmation",
    ];
    const SELECTION_FIELD: &'static str = "services";

    fn set_field(&mut self, field: &str, value: String) -> Result<(), IntakeError> {
        if self.personal.set(field, value.clone()) {
            return Ok(());
        }
        match field {
            "company" => self.company = value,
            "projectType" => self.project_type = value,
            "location" => self.location = value,
            "budgetRange" => self.budget_range = value,
            "timeline" => self.timeline = value,
            "description" => self.description = value,
            other => return Err(IntakeError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    fn validate_step(
        &self,
        step: u8,
        selections: &[String],
        _attachments: &[Attachment],
    ) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match step {
            1 => self.personal.validate(&mut errors),
            2 => {
                require(
                    &mut errors,
                    "projectType",
                    &self.project_type,
                    "Project type is required",
                );
                max_len(&mut errors, "projectType", &self.project_type, NAME_MAX);
                require(&mut errors, "location", &self.location, "Location is required");
                max_len(&mut errors, "location", &self.location, SHORT_TEXT_MAX);
                max_len(&mut errors, "company", &self.company, SHORT_TEXT_MAX);
            }
            3 => {
                if selections.is_empty() {
                    errors.push(FieldError {
                        field: Self::SELECTION_FIELD.to_string(),
                        message: "Please select at least one service".to_string(),
                    });
                }
            }
            4 => {
                require(
                    &mut errors,
                    "description",
                    &self.description,
                    "Project description is required",
                );
                max_len(&mut errors, "description", &self.description, LONG_TEXT_MAX);
                max_len(&mut errors, "budgetRange", &self.budget_range, NAME_MAX);
                max_len(&mut errors, "timeline", &self.timeline, NAME_MAX);
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
            subject: Some(format!("Quote request: {}", self.project_type.trim())),
            message: Some(self.description.trim().to_string()),
        }
    }
}

/// Body of `POST /quote-requests`: the whole wizard in one document.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSubmission {
    #[serde(flatten)]
    pub form: QuoteForm,
    #[serde(default)]
    #[schema(example = json!(["residential-construction", "renovation"]))]
    pub services: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl QuoteSubmission {
    pub fn into_session(self) -> IntakeSession<QuoteForm> {
        IntakeSession::from_parts(self.form, self.services, self.attachments)
    }
}
