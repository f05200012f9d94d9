use lettre::Address;

use super::Submission;

pub const SUBJECT: &str = "Заявка с сайта";
pub const NAME_LABEL: &str = "Имя:";
pub const PHONE_LABEL: &str = "Телефон:";

/// An email ready to be handed to the mail dispatcher.
#[derive(Clone, Debug)]
pub struct OutgoingMessage {
    pub subject: String,
    pub recipients: Vec<Address>,
    pub body: String,
}

impl OutgoingMessage {
    pub fn from_submission(submission: Submission, recipient: Address) -> Self {
        let body = format!(
            "{} {}\n{} {}\n---\n\n{}\n",
            NAME_LABEL, submission.name, PHONE_LABEL, submission.phone, submission.message
        );

        OutgoingMessage {
            subject: SUBJECT.to_string(),
            recipients: vec![recipient],
            body,
        }
    }

    /// Comma separated recipients, for log records.
    pub fn recipient_list(&self) -> String {
        self.recipients
            .iter()
            .map(Address::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
