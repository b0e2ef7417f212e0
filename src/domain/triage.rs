use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer};

pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert AI assistant for technical support tickets.
Respond ONLY in valid JSON. No markdown or extra formatting.
Format:
{
  "title": "...",
  "summary": "...",
  "priority": "low|medium|high",
  "description": "...",
  "relatedSkills": ["React", "Node.js"]
}"#;

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"```json\s*(.*?)\s*```")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("fence pattern is valid")
});

pub fn user_prompt(title: &str, description: &str) -> String {
    format!(
        "Analyze the ticket and respond ONLY in strict JSON:\n- Title: {title}\n- Description: {description}\n"
    )
}

/// What the triage agent said about a ticket. Every field has a default so a
/// partial reply still yields a usable value; a `null` counts as missing.
/// `priority` stays raw until the ticket updater normalizes it, and a missing
/// `description` leaves the ticket's own description in place.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriageReport {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub priority: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub related_skills: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl TriageReport {
    pub fn fallback() -> Self {
        Self {
            priority: Some("medium".to_string()),
            description: Some(String::new()),
            ..Self::default()
        }
    }

    /// Parses the agent's raw text reply. Never fails: an empty or malformed
    /// reply degrades to [`TriageReport::fallback`].
    pub fn parse_reply(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            tracing::warn!("triage agent returned an empty reply");
            return Self::fallback();
        }

        let json = JSON_FENCE
            .captures(raw)
            .and_then(|captures| captures.get(1))
            .map(|body| body.as_str())
            .unwrap_or(raw);

        match serde_json::from_str::<TriageReport>(json) {
            Ok(report) => {
                tracing::debug!(?report, "parsed triage reply");
                report
            }
            Err(err) => {
                tracing::warn!(reply = json, "failed to parse triage reply: {err}");
                Self::fallback()
            }
        }
    }
}

/// Case-insensitive alternation over a ticket's skills, matched as a
/// substring against each skill a user lists. Skill names are not escaped.
#[derive(Debug, Clone)]
pub struct SkillPattern(Regex);

impl SkillPattern {
    pub fn from_skills(skills: &[String]) -> Result<Self, regex::Error> {
        RegexBuilder::new(&skills.join("|"))
            .case_insensitive(true)
            .build()
            .map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn matches_any(&self, skills: &[String]) -> bool {
        skills.iter().any(|skill| self.0.is_match(skill))
    }
}
