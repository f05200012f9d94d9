pub mod message;
pub mod submission;

pub use message::OutgoingMessage;
pub use submission::{FieldLimits, FieldViolation, Submission};
