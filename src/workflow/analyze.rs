use crate::context::AppContext;
use crate::domain::ticket::Ticket;
use crate::domain::triage::{SYSTEM_INSTRUCTION, TriageReport, user_prompt};
use crate::error::AppResult;

/// Asks the triage agent about a ticket. Transport failures propagate so the
/// step can be retried; anything the agent says is turned into a report.
pub async fn analyze_ticket(ctx: &AppContext, ticket: &Ticket) -> AppResult<TriageReport> {
    let prompt = user_prompt(&ticket.title, &ticket.description);
    let reply = ctx
        .language_model
        .complete(SYSTEM_INSTRUCTION, &prompt)
        .await?;
    let report = TriageReport::parse_reply(&reply);
    tracing::debug!(
        ticket_id = %ticket.id,
        title = report.title.as_deref(),
        summary = report.summary.as_deref(),
        "triage agent replied"
    );
    Ok(report)
}
