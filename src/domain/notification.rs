use blake3::Hasher;

pub const ASSIGNMENT_SUBJECT: &str = "Ticket Assigned";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentNotice {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl AssignmentNotice {
    pub fn new(to: &str, ticket_title: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: ASSIGNMENT_SUBJECT.to_string(),
            body: format!("A new ticket has been assigned to you: {ticket_title}"),
        }
    }

    /// Identifies one delivery of this notice for a ticket, so a replayed
    /// notification step can tell the mail already went out.
    pub fn delivery_key(&self, ticket_id: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(ticket_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.to.to_lowercase().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.subject.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}
