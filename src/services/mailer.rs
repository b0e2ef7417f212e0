use async_trait::async_trait;

use crate::domain::notification::AssignmentNotice;
use crate::error::AppResult;

#[async_trait]
pub trait MailService: Send + Sync {
    async fn send(&self, notice: &AssignmentNotice) -> AppResult<()>;
}

#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    async fn was_delivered(&self, key: &str) -> AppResult<bool>;
    async fn record_delivery(&self, key: &str, ticket_id: &str, recipient: &str) -> AppResult<()>;
}
