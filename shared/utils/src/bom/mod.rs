//! BOM (Bill of Materials) Helpers
//!
//! Template linting and variant matching used by the variant sync service.

pub mod validator;
pub mod variant;

pub use validator::{BomValidator, ValidationIssue, ValidationResult, ValidationSeverity};
pub use variant::{find_matching_variant, MatchKey, MissingAttribute};
