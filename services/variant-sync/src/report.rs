//! Sync Reporting
//!
//! What a sync run did and what the user should be told about it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Warning,
}

/// A non-blocking message for the user who saved the template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMessage {
    pub level: MessageLevel,
    pub title: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BomFailure {
    pub bom: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedVariant {
    pub item_code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncOutcome {
    pub template_bom: String,
    pub synced: Vec<String>,
    pub failed: Vec<BomFailure>,
    pub skipped_variants: Vec<SkippedVariant>,
    pub messages: Vec<UserMessage>,
}

impl SyncOutcome {
    pub fn new(template_bom: impl Into<String>) -> Self {
        Self {
            template_bom: template_bom.into(),
            synced: Vec::new(),
            failed: Vec::new(),
            skipped_variants: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn info(&mut self, body: impl Into<String>) {
        self.messages.push(UserMessage {
            level: MessageLevel::Info,
            title: None,
            body: body.into(),
        });
    }

    /// Adds one warning whose body is `lines` joined by newlines
    pub fn warning(&mut self, title: impl Into<String>, lines: &[String]) {
        self.messages.push(UserMessage {
            level: MessageLevel::Warning,
            title: Some(title.into()),
            body: lines.join("\n"),
        });
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|m| m.level == MessageLevel::Warning)
    }

    /// Whether any variant BOM was written
    pub fn touched_any(&self) -> bool {
        !self.synced.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_joins_lines() {
        let mut outcome = SyncOutcome::new("BOM-SHIRT-001");
        outcome.warning(
            "Errors in Syncing Variant BOMs",
            &["first".to_string(), "second".to_string()],
        );

        assert!(outcome.has_warnings());
        assert_eq!(outcome.messages[0].body, "first\nsecond");
        assert_eq!(outcome.messages[0].title.as_deref(), Some("Errors in Syncing Variant BOMs"));
    }

    #[test]
    fn test_info_is_not_a_warning() {
        let mut outcome = SyncOutcome::new("BOM-SHIRT-001");
        outcome.info("Successfully updated all variant BOMs.");

        assert!(!outcome.has_warnings());
        assert!(!outcome.touched_any());
        assert_eq!(
            serde_json::to_value(&outcome.messages[0]).unwrap()["level"],
            "info"
        );
    }
}
