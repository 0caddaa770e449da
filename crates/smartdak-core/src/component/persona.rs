//! Generic personas, persisted as FHIR Shorthand `ActorDefinition` instances.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{
    ComponentData, ComponentKind, DakComponent, SerializationError, check_identity, non_blank,
};
use crate::validation::{ValidationIssue, ValidationResult};

static INSTANCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Instance:\s*(\S+)").unwrap());
static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^(?:Title:|\*\s*title\s*=)\s*"((?:[^"\\]|\\.)*)""#).unwrap()
});
static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^(?:Description:|\*\s*description\s*=)\s*"((?:[^"\\]|\\.)*)""#).unwrap()
});
static ACTOR_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\*\s*type\s*=\s*#(\w+)").unwrap());
static FHIR_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-.]{1,64}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Person,
    System,
}

impl ActorType {
    fn code(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub actor_type: Option<ActorType>,
    /// Verbatim FSH source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsh: Option<String>,
}

impl ComponentData for Persona {
    fn id(&self) -> Option<&str> {
        non_blank(&self.id)
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn label(&self) -> Option<&str> {
        non_blank(&self.name)
    }
}

pub struct PersonaComponent;

impl DakComponent for PersonaComponent {
    type Data = Persona;

    const KIND: ComponentKind = ComponentKind::Personas;

    fn serialize_to_file(&self, data: &Persona) -> Result<String, SerializationError> {
        if let Some(fsh) = data.fsh.as_ref().filter(|f| !f.trim().is_empty()) {
            if !INSTANCE.is_match(fsh) {
                return Err(SerializationError::Malformed {
                    kind: Self::KIND,
                    reason: "FSH source has no `Instance:` declaration".into(),
                });
            }
            return Ok(fsh.clone());
        }

        let id = data.id().unwrap_or(Self::KIND.placeholder_id());
        let title = data.label().unwrap_or(id);
        let mut out = format!(
            "Instance: {id}\nInstanceOf: ActorDefinition\nUsage: #definition\nTitle: \"{}\"\n",
            fsh_escape(title)
        );
        if let Some(description) = non_blank(&data.description) {
            out.push_str(&format!("Description: \"{}\"\n", fsh_escape(description)));
        }
        out.push_str(&format!("* name = \"{}\"\n", fsh_escape(id)));
        out.push_str(&format!("* title = \"{}\"\n", fsh_escape(title)));
        out.push_str("* status = #active\n");
        if let Some(actor_type) = data.actor_type {
            out.push_str(&format!("* type = #{}\n", actor_type.code()));
        }
        if let Some(description) = non_blank(&data.description) {
            out.push_str(&format!("* description = \"{}\"\n", fsh_escape(description)));
        }
        Ok(out)
    }

    fn parse_from_file(&self, content: &str) -> Result<Persona, SerializationError> {
        Ok(Persona {
            id: capture(&INSTANCE, content),
            name: capture(&TITLE, content).map(|t| fsh_unescape(&t)),
            description: capture(&DESCRIPTION, content).map(|d| fsh_unescape(&d)),
            actor_type: capture(&ACTOR_TYPE, content).and_then(|code| match code.as_str() {
                "person" => Some(ActorType::Person),
                "system" => Some(ActorType::System),
                _ => None,
            }),
            fsh: Some(content.to_string()),
        })
    }

    fn validate(&self, data: &Persona) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_identity(&mut result, &data.id, &data.name, "name");
        if let Some(id) = data.id()
            && !FHIR_ID.is_match(id)
        {
            result.error(
                ValidationIssue::new(
                    "INVALID_ID",
                    format!("persona id `{id}` must be 1-64 letters, digits, `-` or `.`"),
                )
                .on_field("id"),
            );
        }
        if data.actor_type.is_none() {
            result.warning(
                ValidationIssue::new("MISSING_ACTOR_TYPE", "actor type (person or system) is not set")
                    .on_field("type"),
            );
        }
        if let Some(fsh) = non_blank(&data.fsh)
            && !INSTANCE.is_match(fsh)
        {
            result.error(ValidationIssue::new(
                "MALFORMED_FSH",
                "FSH source has no `Instance:` declaration",
            ));
        }
        result
    }
}

fn capture(re: &Regex, content: &str) -> Option<String> {
    re.captures(content).map(|c| c[1].to_string())
}

fn fsh_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn fsh_unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
