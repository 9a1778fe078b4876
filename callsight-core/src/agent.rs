//! Agent entity and its language set

use crate::{AgentId, Timestamp};
use serde::{Deserialize, Deserializer, Serialize};

/// Ordered, de-duplicated list of languages an agent speaks.
///
/// Upstream payloads deliver languages as a JSON list, a single string, a
/// comma separated string or null. All of them collapse into this one shape
/// on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct Languages(Vec<String>);

impl Languages {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for item in items {
            for part in item.as_ref().split(',') {
                let trimmed = part.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if !out.iter().any(|l| l.eq_ignore_ascii_case(trimmed)) {
                    out.push(trimmed.to_string());
                }
            }
        }
        Self(out)
    }

    /// Parse a comma separated string.
    pub fn parse(raw: &str) -> Self {
        Self::new([raw])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LanguagesRepr {
    List(Vec<Option<String>>),
    Text(String),
}

impl<'de> Deserialize<'de> for Languages {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = Option::<LanguagesRepr>::deserialize(deserializer)?;
        Ok(match repr {
            None => Languages::default(),
            Some(LanguagesRepr::Text(text)) => Languages::parse(&text),
            Some(LanguagesRepr::List(items)) => Languages::new(items.into_iter().flatten()),
        })
    }
}

/// A call-center agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Agent {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub name: String,
    /// Unique external employee code.
    pub employee_id: String,
    #[serde(default)]
    pub languages: Languages,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Agent {
    pub fn new(name: impl Into<String>, employee_id: impl Into<String>, languages: Languages) -> Self {
        Self {
            agent_id: crate::new_entity_id(),
            name: name.into(),
            employee_id: employee_id.into(),
            languages,
            created_at: chrono::Utc::now(),
        }
    }
}
