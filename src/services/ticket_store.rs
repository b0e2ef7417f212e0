use async_trait::async_trait;

use crate::domain::ticket::{Ticket, TicketStatus, TicketTriageUpdate};
use crate::error::AppResult;

/// Each write touches a single ticket row and is safe to repeat.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn find_ticket(&self, id: &str) -> AppResult<Option<Ticket>>;
    async fn set_status(&self, id: &str, status: TicketStatus) -> AppResult<()>;
    /// Writes priority, description and skills and moves the ticket to
    /// `IN_PROGRESS` in one update.
    async fn apply_triage(&self, id: &str, update: &TicketTriageUpdate) -> AppResult<()>;
    async fn assign(&self, id: &str, user_id: Option<&str>) -> AppResult<()>;
}
