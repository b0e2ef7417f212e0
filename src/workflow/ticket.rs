use serde::Serialize;

use crate::context::AppContext;
use crate::domain::event::TicketCreatedEvent;
use crate::domain::notification::AssignmentNotice;
use crate::domain::ticket::{Priority, Ticket, TicketStatus, TicketTriageUpdate};
use crate::domain::triage::{SkillPattern, TriageReport};
use crate::domain::user::{Role, User};
use crate::error::{AppError, AppResult};
use crate::workflow::analyze::analyze_ticket;
use crate::workflow::step::StepRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkflowOutcome {
    pub success: bool,
}

/// Handles a `ticket/created` event. Never fails: errors are logged and
/// reported as `success: false`.
pub async fn on_ticket_created(ctx: &AppContext, event: &TicketCreatedEvent) -> WorkflowOutcome {
    let ticket_id = event.ticket_id();
    match triage_ticket(ctx, ticket_id).await {
        Ok(()) => {
            tracing::info!(ticket_id, "ticket workflow completed");
            WorkflowOutcome { success: true }
        }
        Err(err) => {
            tracing::error!(ticket_id, "error running ticket: {err}");
            WorkflowOutcome { success: false }
        }
    }
}

async fn triage_ticket(ctx: &AppContext, ticket_id: &str) -> AppResult<()> {
    let steps = StepRunner::from_config(&ctx.config);

    let ticket = steps
        .run("fetch-ticket", move || async move { load_ticket(ctx, ticket_id).await })
        .await?;
    let ticket = &ticket;
    let id = ticket.id.as_str();

    steps
        .run("update-ticket-status", move || async move {
            ctx.tickets.set_status(id, TicketStatus::Todo).await
        })
        .await?;

    let report = steps
        .run("analyze-ticket", move || async move { analyze_ticket(ctx, ticket).await })
        .await?;
    let report = &report;

    let skills = steps
        .run("ai-processing", move || async move { apply_triage(ctx, id, report).await })
        .await?;
    let skills = skills.as_slice();

    let assignee = steps
        .run("assign-moderator", move || async move {
            assign_moderator(ctx, id, skills).await
        })
        .await?;
    let assignee = assignee.as_ref();

    steps
        .run("send-email-notification", move || async move {
            notify_assignee(ctx, id, assignee).await
        })
        .await?;

    Ok(())
}

async fn load_ticket(ctx: &AppContext, ticket_id: &str) -> AppResult<Ticket> {
    let ticket = ctx
        .tickets
        .find_ticket(ticket_id)
        .await?
        .ok_or_else(|| AppError::TicketNotFound(ticket_id.to_string()))?;
    tracing::debug!(
        ticket_id,
        status = ticket.status.as_str(),
        priority = ticket.priority.as_str(),
        skills = ?ticket.related_skills,
        assigned_to = ticket.assigned_to.as_deref(),
        "loaded ticket"
    );
    Ok(ticket)
}

async fn apply_triage(
    ctx: &AppContext,
    ticket_id: &str,
    report: &TriageReport,
) -> AppResult<Vec<String>> {
    let update = TicketTriageUpdate {
        priority: Priority::normalize(report.priority.as_deref()),
        description: report.description.clone(),
        related_skills: report.related_skills.clone(),
    };
    ctx.tickets.apply_triage(ticket_id, &update).await?;

    tracing::info!(
        ticket_id,
        priority = update.priority.as_str(),
        skills = ?update.related_skills,
        "ticket moved to IN_PROGRESS"
    );
    Ok(update.related_skills)
}

async fn assign_moderator(
    ctx: &AppContext,
    ticket_id: &str,
    skills: &[String],
) -> AppResult<Option<User>> {
    let assignee = match find_moderator(ctx, skills).await? {
        Some(moderator) => Some(moderator),
        None => ctx
            .users
            .users_with_role(Role::Admin)
            .await?
            .into_iter()
            .next(),
    };

    ctx.tickets
        .assign(ticket_id, assignee.as_ref().map(|user| user.id.as_str()))
        .await?;

    match &assignee {
        Some(user) => tracing::info!(
            ticket_id,
            user_id = %user.id,
            role = user.role.as_str(),
            "ticket assigned"
        ),
        None => tracing::warn!(ticket_id, "no moderator or admin available; ticket left unassigned"),
    }
    Ok(assignee)
}

async fn find_moderator(ctx: &AppContext, skills: &[String]) -> AppResult<Option<User>> {
    let pattern = SkillPattern::from_skills(skills)
        .map_err(|err| AppError::InvalidSkillPattern(format!("{}: {err}", skills.join("|"))))?;
    tracing::debug!(pattern = pattern.as_str(), "matching moderators");

    let moderators = ctx.users.users_with_role(Role::Moderator).await?;
    Ok(moderators
        .into_iter()
        .find(|moderator| pattern.matches_any(&moderator.skills)))
}

async fn notify_assignee(
    ctx: &AppContext,
    ticket_id: &str,
    assignee: Option<&User>,
) -> AppResult<()> {
    let Some(user) = assignee else {
        tracing::debug!(ticket_id, "nobody assigned; skipping notification");
        return Ok(());
    };

    let ticket = load_ticket(ctx, ticket_id).await?;
    let notice = AssignmentNotice::new(&user.email, &ticket.title);
    let key = notice.delivery_key(&ticket.id);

    if ctx.deliveries.was_delivered(&key).await? {
        tracing::info!(ticket_id, to = %notice.to, "assignment already notified");
        return Ok(());
    }

    ctx.mailer.send(&notice).await?;
    ctx.deliveries
        .record_delivery(&key, &ticket.id, &notice.to)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::{AppConfig, StoredConfig};
    use crate::infra::sqlite::Database;
    use crate::services::{LanguageModelService, MailService, TicketStore};

    #[derive(Default)]
    struct ScriptedModel {
        replies: Mutex<VecDeque<AppResult<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModelService for ScriptedModel {
        async fn complete(&self, _system: &str, prompt: &str) -> AppResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<AssignmentNotice>>,
        failures_left: AtomicU32,
    }

    impl RecordingMailer {
        fn sent(&self) -> Vec<AssignmentNotice> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailService for RecordingMailer {
        async fn send(&self, notice: &AssignmentNotice) -> AppResult<()> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
            {
                return Err(AppError::Mail("connection reset".to_string()));
            }
            self.sent.lock().unwrap().push(notice.clone());
            Ok(())
        }
    }

    struct Harness {
        db: Arc<Database>,
        model: Arc<ScriptedModel>,
        mailer: Arc<RecordingMailer>,
        ctx: AppContext,
    }

    impl Harness {
        fn new(replies: Vec<AppResult<String>>, mail_failures: u32) -> Self {
            let mut config = AppConfig::resolve(StoredConfig::default(), |_| None).unwrap();
            config.retry_delay = Duration::ZERO;

            let db = Arc::new(Database::in_memory());
            let model = Arc::new(ScriptedModel {
                replies: Mutex::new(replies.into()),
                ..ScriptedModel::default()
            });
            let mailer = Arc::new(RecordingMailer {
                failures_left: AtomicU32::new(mail_failures),
                ..RecordingMailer::default()
            });
            let ctx = AppContext::new(
                config,
                db.clone(),
                db.clone(),
                db.clone(),
                model.clone(),
                mailer.clone(),
            );
            Self {
                db,
                model,
                mailer,
                ctx,
            }
        }

        fn replying(reply: &str) -> Self {
            Self::new(vec![Ok(reply.to_string())], 0)
        }

        async fn add_user(&self, id: &str, role: Role, skills: &[&str]) {
            self.db
                .insert_user(&User {
                    id: id.to_string(),
                    email: format!("{id}@example.com"),
                    role,
                    skills: skills.iter().map(|skill| skill.to_string()).collect(),
                })
                .await
                .unwrap();
        }

        async fn add_ticket(&self, id: &str, title: &str, description: &str) {
            self.db.insert_ticket(id, title, description).await.unwrap();
        }

        async fn run(&self, ticket_id: &str) -> WorkflowOutcome {
            on_ticket_created(&self.ctx, &TicketCreatedEvent::for_ticket(ticket_id)).await
        }

        async fn ticket(&self, id: &str) -> Ticket {
            self.db.find_ticket(id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn triages_login_ticket_end_to_end() {
        let harness = Harness::replying(
            "```json\n{\"priority\":\"High\",\"relatedSkills\":[\"Auth\"]}\n```",
        );
        harness.add_user("mod-react", Role::Moderator, &["React"]).await;
        harness.add_user("mod-auth", Role::Moderator, &["OAuth", "SSO"]).await;
        harness.add_user("admin", Role::Admin, &[]).await;
        harness.add_ticket("t-1", "Login broken", "Cannot log in").await;

        let outcome = harness.run("t-1").await;
        assert_eq!(outcome, WorkflowOutcome { success: true });

        let ticket = harness.ticket("t-1").await;
        assert_eq!(ticket.priority, Priority::High);
        assert_eq!(ticket.related_skills, vec!["Auth"]);
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.description, "Cannot log in");
        assert_eq!(ticket.assigned_to.as_deref(), Some("mod-auth"));

        let prompts = harness.model.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Login broken"));
        assert!(prompts[0].contains("Cannot log in"));

        assert_eq!(
            harness.mailer.sent(),
            vec![AssignmentNotice::new("mod-auth@example.com", "Login broken")]
        );
    }

    #[tokio::test]
    async fn missing_ticket_fails_without_side_effects() {
        let harness = Harness::replying(r#"{"priority":"high"}"#);
        harness.add_user("admin", Role::Admin, &[]).await;

        let outcome = harness.run("ghost").await;

        assert_eq!(outcome, WorkflowOutcome { success: false });
        assert_eq!(harness.model.calls(), 0);
        assert!(harness.mailer.sent().is_empty());
        assert!(harness.db.find_ticket("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn falls_back_to_admin_when_no_moderator_matches() {
        let harness = Harness::replying(r#"{"priority":"low","relatedSkills":["Kubernetes"]}"#);
        harness.add_user("mod-react", Role::Moderator, &["React"]).await;
        harness.add_user("admin-1", Role::Admin, &[]).await;
        harness.add_ticket("t-1", "Pods crash", "CrashLoopBackOff").await;

        assert!(harness.run("t-1").await.success);

        let ticket = harness.ticket("t-1").await;
        assert_eq!(ticket.priority, Priority::Low);
        assert_eq!(ticket.assigned_to.as_deref(), Some("admin-1"));
        assert_eq!(harness.mailer.sent()[0].to, "admin-1@example.com");
    }

    #[tokio::test]
    async fn leaves_ticket_unassigned_when_nobody_is_available() {
        let harness = Harness::replying(r#"{"priority":"high","relatedSkills":["Rust"]}"#);
        harness.add_user("plain", Role::User, &["Rust"]).await;
        harness.add_ticket("t-1", "Panic in parser", "").await;

        assert!(harness.run("t-1").await.success);

        let ticket = harness.ticket("t-1").await;
        assert!(ticket.assigned_to.is_none());
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert!(harness.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_still_completes_with_defaults() {
        let harness = Harness::replying("I think this is urgent!");
        harness.add_ticket("t-1", "Printer", "Out of toner").await;

        assert!(harness.run("t-1").await.success);

        let ticket = harness.ticket("t-1").await;
        assert_eq!(ticket.priority, Priority::Medium);
        assert_eq!(ticket.description, "");
        assert!(ticket.related_skills.is_empty());
        assert_eq!(ticket.status, TicketStatus::InProgress);
    }

    #[tokio::test]
    async fn empty_reply_still_completes_with_defaults() {
        let harness = Harness::new(vec![], 0);
        harness.add_ticket("t-1", "Printer", "Out of toner").await;

        assert!(harness.run("t-1").await.success);
        assert_eq!(harness.ticket("t-1").await.priority, Priority::Medium);
    }

    #[tokio::test]
    async fn priority_outside_allow_list_becomes_medium() {
        let harness =
            Harness::replying(r#"{"priority":"URGENT","description":"Outage","relatedSkills":[]}"#);
        harness.add_ticket("t-1", "Site down", "").await;

        assert!(harness.run("t-1").await.success);

        let ticket = harness.ticket("t-1").await;
        assert_eq!(ticket.priority, Priority::Medium);
        assert_eq!(ticket.description, "Outage");
    }

    #[tokio::test]
    async fn null_fields_keep_the_rest_of_the_reply() {
        let harness = Harness::replying(
            r#"{"priority":"high","description":null,"relatedSkills":["Auth"]}"#,
        );
        harness.add_user("mod-auth", Role::Moderator, &["Auth"]).await;
        harness.add_ticket("t-1", "Login broken", "Cannot log in").await;

        assert!(harness.run("t-1").await.success);

        let ticket = harness.ticket("t-1").await;
        assert_eq!(ticket.priority, Priority::High);
        assert_eq!(ticket.description, "Cannot log in");
        assert_eq!(ticket.related_skills, vec!["Auth"]);
        assert_eq!(ticket.assigned_to.as_deref(), Some("mod-auth"));
    }

    #[tokio::test]
    async fn null_skills_are_stored_as_empty() {
        let harness = Harness::replying(
            r#"{"priority":"low","description":"Toner empty","relatedSkills":null}"#,
        );
        harness.add_user("admin-1", Role::Admin, &[]).await;
        harness.add_ticket("t-1", "Printer", "Out of toner").await;

        assert!(harness.run("t-1").await.success);

        let ticket = harness.ticket("t-1").await;
        assert_eq!(ticket.priority, Priority::Low);
        assert_eq!(ticket.description, "Toner empty");
        assert!(ticket.related_skills.is_empty());
        assert_eq!(ticket.assigned_to.as_deref(), Some("admin-1"));
    }

    #[tokio::test]
    async fn wrongly_typed_field_discards_the_whole_reply() {
        let harness = Harness::replying(
            r#"{"priority":5,"description":"Outage","relatedSkills":["Auth"]}"#,
        );
        harness.add_user("mod-auth", Role::Moderator, &["Auth"]).await;
        harness.add_user("admin-1", Role::Admin, &[]).await;
        harness.add_ticket("t-1", "Site down", "Nothing loads").await;

        assert!(harness.run("t-1").await.success);

        let ticket = harness.ticket("t-1").await;
        assert_eq!(ticket.priority, Priority::Medium);
        assert_eq!(ticket.description, "");
        assert!(ticket.related_skills.is_empty());
        assert_eq!(ticket.assigned_to.as_deref(), Some("admin-1"));
    }

    #[tokio::test]
    async fn regex_metacharacters_in_skills_match_unescaped() {
        let harness = Harness::replying(r#"{"priority":"medium","relatedSkills":["C++"]}"#);
        harness.add_user("mod-cpp", Role::Moderator, &["C++"]).await;
        harness.add_user("admin-1", Role::Admin, &[]).await;
        harness.add_ticket("t-1", "Segfault", "").await;

        assert!(harness.run("t-1").await.success);
        assert_eq!(
            harness.ticket("t-1").await.assigned_to.as_deref(),
            Some("mod-cpp")
        );
    }

    #[tokio::test]
    async fn uncompilable_skill_pattern_fails_without_retrying() {
        let harness = Harness::new(
            vec![
                Ok(r#"{"priority":"high","relatedSkills":["C("]}"#.to_string()),
                Ok(r#"{"priority":"high","relatedSkills":["C("]}"#.to_string()),
            ],
            0,
        );
        harness.add_user("mod-cpp", Role::Moderator, &["C"]).await;
        harness.add_user("admin-1", Role::Admin, &[]).await;
        harness.add_ticket("t-1", "Segfault", "").await;

        assert!(!harness.run("t-1").await.success);

        let ticket = harness.ticket("t-1").await;
        assert_eq!(harness.model.calls(), 1);
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.related_skills, vec!["C("]);
        assert!(ticket.assigned_to.is_none());
        assert!(harness.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn retries_transient_mail_failures() {
        let harness = Harness::new(
            vec![Ok(r#"{"priority":"high","relatedSkills":["Auth"]}"#.to_string())],
            2,
        );
        harness.add_user("mod-auth", Role::Moderator, &["auth"]).await;
        harness.add_ticket("t-1", "Login broken", "").await;

        assert!(harness.run("t-1").await.success);
        assert_eq!(harness.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn reports_failure_once_retries_are_exhausted() {
        let harness = Harness::new(
            vec![Ok(r#"{"priority":"high","relatedSkills":["Auth"]}"#.to_string())],
            3,
        );
        harness.add_user("mod-auth", Role::Moderator, &["auth"]).await;
        harness.add_ticket("t-1", "Login broken", "").await;

        assert!(!harness.run("t-1").await.success);
        assert!(harness.mailer.sent().is_empty());
        // Earlier steps already committed their writes.
        assert_eq!(
            harness.ticket("t-1").await.assigned_to.as_deref(),
            Some("mod-auth")
        );
    }

    #[tokio::test]
    async fn retries_language_model_outage() {
        let harness = Harness::new(
            vec![
                Err(AppError::LanguageModel("503".to_string())),
                Ok(r#"{"priority":"low"}"#.to_string()),
            ],
            0,
        );
        harness.add_ticket("t-1", "Typo on homepage", "").await;

        assert!(harness.run("t-1").await.success);
        assert_eq!(harness.model.calls(), 2);
        assert_eq!(harness.ticket("t-1").await.priority, Priority::Low);
    }

    #[tokio::test]
    async fn persistent_model_outage_fails_before_triage_is_written() {
        let harness = Harness::new(
            (0..3)
                .map(|_| Err(AppError::LanguageModel("503".to_string())))
                .collect(),
            0,
        );
        harness.add_ticket("t-1", "Typo on homepage", "").await;

        assert!(!harness.run("t-1").await.success);
        assert_eq!(harness.model.calls(), 3);
        assert_eq!(harness.ticket("t-1").await.status, TicketStatus::Todo);
    }

    #[tokio::test]
    async fn replay_does_not_send_a_second_email() {
        let reply = r#"{"priority":"high","relatedSkills":["Auth"]}"#;
        let harness = Harness::new(vec![Ok(reply.to_string()), Ok(reply.to_string())], 0);
        harness.add_user("mod-auth", Role::Moderator, &["Auth"]).await;
        harness.add_ticket("t-1", "Login broken", "").await;

        assert!(harness.run("t-1").await.success);
        assert!(harness.run("t-1").await.success);

        assert_eq!(harness.model.calls(), 2);
        assert_eq!(harness.mailer.sent().len(), 1);
    }
}
