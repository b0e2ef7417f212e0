use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const TICKET_CREATED: &str = "ticket/created";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCreatedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data: TicketCreatedData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketCreatedData {
    pub ticket_id: String,
}

impl TicketCreatedEvent {
    pub fn for_ticket(ticket_id: &str) -> Self {
        Self {
            name: Some(TICKET_CREATED.to_string()),
            data: TicketCreatedData {
                ticket_id: ticket_id.to_string(),
            },
        }
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        let event: Self = serde_json::from_str(raw)
            .map_err(|err| AppError::InvalidEvent(format!("malformed event: {err}")))?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = self.name.as_deref().filter(|name| *name != TICKET_CREATED) {
            return Err(AppError::InvalidEvent(format!(
                "expected '{TICKET_CREATED}' event, got '{name}'"
            )));
        }
        if self.data.ticket_id.trim().is_empty() {
            return Err(AppError::InvalidEvent("event carries an empty ticket id".to_string()));
        }
        Ok(())
    }

    pub fn ticket_id(&self) -> &str {
        self.data.ticket_id.trim()
    }
}
