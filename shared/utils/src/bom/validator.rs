//! BOM Validator
//!
//! Lints a template BOM for issues that would make variant sync produce
//! surprising results. Lint findings are advisory and never block a save.

use std::collections::HashMap;

use bomsync_models::Bom;

/// Validation severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    Warning,
    Info,
}

/// Single validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub row: Option<i32>,
    pub field: Option<String>,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Validation result for a BOM
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warning_count: usize,
    pub issues: Vec<ValidationIssue>,
    pub summary: ValidationSummary,
}

/// Summary statistics for validation
#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    pub total_lines: usize,
    pub total_operations: usize,
    pub duplicate_item_codes: usize,
    pub non_positive_quantities: usize,
    pub missing_uoms: usize,
    pub invalid_conversion_factors: usize,
    pub duplicate_sequence_ids: usize,
}

/// BOM validator
pub struct BomValidator {
    require_uom: bool,
    check_duplicate_items: bool,
    check_operation_sequence: bool,
}

impl Default for BomValidator {
    fn default() -> Self {
        Self {
            require_uom: true,
            check_duplicate_items: true,
            check_operation_sequence: true,
        }
    }
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl BomValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lint a template BOM
    pub fn validate(&self, bom: &Bom) -> ValidationResult {
        let mut issues = Vec::new();
        let mut summary = ValidationSummary {
            total_lines: bom.items.len(),
            total_operations: bom.operations.len(),
            ..ValidationSummary::default()
        };

        let mut seen_codes: HashMap<&str, i32> = HashMap::new();

        for line in &bom.items {
            // Duplicate item codes collapse into one entry when qty/rate are carried over
            if self.check_duplicate_items {
                if let Some(first_row) = seen_codes.insert(line.item_code.as_str(), line.idx) {
                    summary.duplicate_item_codes += 1;
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Warning,
                        row: Some(line.idx),
                        field: Some("item_code".to_string()),
                        message: format!(
                            "Item {} already appears in row {}",
                            line.item_code, first_row
                        ),
                        suggestion: Some(
                            "Variant BOMs keep a single quantity and rate per item code".to_string(),
                        ),
                    });
                }
            }

            if line.qty <= 0.0 {
                summary.non_positive_quantities += 1;
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Warning,
                    row: Some(line.idx),
                    field: Some("qty".to_string()),
                    message: format!("Item {} has quantity {}", line.item_code, line.qty),
                    suggestion: Some("Set a positive quantity".to_string()),
                });
            }

            if self.require_uom && line.uom.as_deref().map_or(true, str::is_empty) {
                summary.missing_uoms += 1;
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Info,
                    row: Some(line.idx),
                    field: Some("uom".to_string()),
                    message: format!("Item {} has no unit of measure", line.item_code),
                    suggestion: None,
                });
            }

            if line.conversion_factor <= 0.0 {
                summary.invalid_conversion_factors += 1;
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Warning,
                    row: Some(line.idx),
                    field: Some("conversion_factor".to_string()),
                    message: format!(
                        "Item {} has conversion factor {}",
                        line.item_code, line.conversion_factor
                    ),
                    suggestion: Some("Conversion factor must be greater than zero".to_string()),
                });
            }
        }

        if self.check_operation_sequence {
            let mut seen_sequences: HashMap<i32, &str> = HashMap::new();
            for op in bom.operations.iter().filter(|op| op.sequence_id > 0) {
                if let Some(other) = seen_sequences.insert(op.sequence_id, op.operation.as_str()) {
                    summary.duplicate_sequence_ids += 1;
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Warning,
                        row: Some(op.idx),
                        field: Some("sequence_id".to_string()),
                        message: format!(
                            "Operations {} and {} share sequence id {}",
                            other, op.operation, op.sequence_id
                        ),
                        suggestion: None,
                    });
                }
            }
        }

        let warning_count = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Warning)
            .count();

        ValidationResult {
            warning_count,
            issues,
            summary,
        }
    }
}
