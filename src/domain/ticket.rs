#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Todo,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Todo => "TODO",
            TicketStatus::InProgress => "IN_PROGRESS",
            TicketStatus::Closed => "CLOSED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "TODO" => Some(TicketStatus::Todo),
            "IN_PROGRESS" => Some(TicketStatus::InProgress),
            "CLOSED" => Some(TicketStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    /// Maps whatever the triage agent suggested onto the allow-list.
    /// Unknown or missing values become `medium`.
    pub fn normalize(raw: Option<&str>) -> Self {
        raw.and_then(Self::from_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub related_skills: Vec<String>,
    pub assigned_to: Option<String>,
}

/// Fields written back once the triage agent has looked at a ticket.
/// `description: None` keeps the stored description.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketTriageUpdate {
    pub priority: Priority,
    pub description: Option<String>,
    pub related_skills: Vec<String>,
}
