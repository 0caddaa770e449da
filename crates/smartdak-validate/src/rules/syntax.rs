//! Well-formedness of XML-family and JSON files.

use roxmltree::{Document, ParsingOptions};
use serde::de::IgnoredAny;
use smartdak_core::ValidationLevel;

use crate::file::DakFile;
use crate::rule::{FileType, Finding, ValidationContext, ValidationRule};

pub struct XmlWellFormed;

impl ValidationRule for XmlWellFormed {
    fn id(&self) -> &'static str {
        "xml-well-formed"
    }

    fn component(&self) -> &'static str {
        "xml"
    }

    fn level(&self) -> ValidationLevel {
        ValidationLevel::Error
    }

    fn file_types(&self) -> &'static [FileType] {
        &[FileType::Xml, FileType::Bpmn, FileType::Dmn]
    }

    fn description(&self) -> &'static str {
        "XML, BPMN and DMN files must parse as well-formed XML"
    }

    fn validate(&self, file: &DakFile, _ctx: &ValidationContext) -> Vec<Finding> {
        let mut opts = ParsingOptions::default();
        opts.allow_dtd = true;
        match Document::parse_with_options(&file.content, opts) {
            Ok(_) => Vec::new(),
            Err(e) => {
                let pos = e.pos();
                vec![
                    Finding::new("MALFORMED_XML", format!("not well-formed XML: {e}"))
                        .at(pos.row as usize, pos.col as usize),
                ]
            }
        }
    }
}

pub struct JsonValid;

impl ValidationRule for JsonValid {
    fn id(&self) -> &'static str {
        "json-valid"
    }

    fn component(&self) -> &'static str {
        "json"
    }

    fn level(&self) -> ValidationLevel {
        ValidationLevel::Error
    }

    fn file_types(&self) -> &'static [FileType] {
        &[FileType::Json]
    }

    fn description(&self) -> &'static str {
        "JSON files must parse"
    }

    fn validate(&self, file: &DakFile, _ctx: &ValidationContext) -> Vec<Finding> {
        match serde_json::from_str::<IgnoredAny>(&file.content) {
            Ok(_) => Vec::new(),
            Err(e) => {
                let finding = Finding::new("INVALID_JSON", format!("invalid JSON: {e}"));
                let finding = match e.line() {
                    0 => finding,
                    line => finding.at(line, e.column().max(1)),
                };
                vec![finding]
            }
        }
    }
}
