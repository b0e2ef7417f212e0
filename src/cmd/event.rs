use std::path::PathBuf;

use tokio::io::AsyncReadExt;

use crate::context::AppContext;
use crate::domain::event::TicketCreatedEvent;
use crate::error::AppResult;
use crate::workflow::ticket::{WorkflowOutcome, on_ticket_created};

#[derive(Debug, Clone)]
pub enum EventSource {
    TicketId(String),
    File(PathBuf),
    Stdin,
}

pub async fn read_event(source: EventSource) -> AppResult<TicketCreatedEvent> {
    let raw = match source {
        EventSource::TicketId(id) => {
            let event = TicketCreatedEvent::for_ticket(&id);
            event.validate()?;
            return Ok(event);
        }
        EventSource::File(path) => tokio::fs::read_to_string(path).await?,
        EventSource::Stdin => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            raw
        }
    };
    TicketCreatedEvent::from_json(&raw)
}

pub async fn run(ctx: &AppContext, event: &TicketCreatedEvent) -> WorkflowOutcome {
    tracing::info!(ticket_id = event.ticket_id(), "handling ticket/created event");
    on_ticket_created(ctx, event).await
}
