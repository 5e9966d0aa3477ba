//! Multi-step intake wizards (quote requests and job applications).
//!
//! A wizard is an `IntakeSession<F>` driven by `IntakeAction`s. The same
//! session type re-validates the consolidated payload on the server.

pub mod application;
pub mod quote;
pub mod session;

pub use application::{ApplicationForm, ApplicationSubmission};
pub use quote::{QuoteForm, QuoteSubmission};
pub use session::{
    Attachment, IntakeAction, IntakeError, IntakeForm, IntakeSession, Phase, Transition,
    NETWORK_ERROR_MESSAGE,
};
