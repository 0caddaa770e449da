//! `sushi-config.yaml` must depend on the SMART base IG.

use serde_yaml::Value;
use smartdak_core::ValidationLevel;

use crate::file::DakFile;
use crate::rule::{FileType, Finding, ValidationContext, ValidationRule, line_of};

pub const SUSHI_CONFIG: &str = "sushi-config.yaml";
pub const SMART_BASE_DEPENDENCY: &str = "smart.who.int.base";

pub struct SushiConfigDependency;

impl ValidationRule for SushiConfigDependency {
    fn id(&self) -> &'static str {
        "sushi-config-dependency"
    }

    fn component(&self) -> &'static str {
        "sushi-config"
    }

    fn level(&self) -> ValidationLevel {
        ValidationLevel::Error
    }

    fn file_types(&self) -> &'static [FileType] {
        &[FileType::Yaml]
    }

    fn description(&self) -> &'static str {
        "sushi-config.yaml must declare smart.who.int.base under dependencies"
    }

    fn applies_to(&self, path: &str) -> bool {
        path == SUSHI_CONFIG || path.ends_with(&format!("/{SUSHI_CONFIG}"))
    }

    fn validate(&self, file: &DakFile, _ctx: &ValidationContext) -> Vec<Finding> {
        let content = &file.content;
        let config: Value = match serde_yaml::from_str(content) {
            Ok(config) => config,
            Err(e) => {
                let finding = Finding::new("SUSHI_CONFIG_INVALID_YAML", format!("malformed YAML: {e}"));
                let finding = match e.location() {
                    Some(loc) => finding.at(loc.line(), loc.column()),
                    None => finding,
                };
                return vec![finding];
            }
        };

        let dependencies = config.get("dependencies");
        let Some(Value::Mapping(dependencies)) = dependencies else {
            let message = match dependencies {
                Some(_) => "`dependencies` is not a mapping of package ids to versions",
                None => "no `dependencies` block",
            };
            return vec![
                Finding::new("MISSING_DEPENDENCIES", message)
                    .maybe_line(line_of(content, "dependencies"))
                    .suggest(format!("add `dependencies:` with `{SMART_BASE_DEPENDENCY}`")),
            ];
        };

        if dependencies.contains_key(SMART_BASE_DEPENDENCY) {
            return Vec::new();
        }
        vec![
            Finding::new(
                "MISSING_DEPENDENCY",
                format!("`dependencies` does not declare {SMART_BASE_DEPENDENCY}"),
            )
            .maybe_line(line_of(content, "dependencies"))
            .suggest(format!("add `{SMART_BASE_DEPENDENCY}: current` under `dependencies`")),
        ]
    }
}
