//! Bill of Materials models.
//!
//! A BOM is a document with two child tables: component lines (`BomItem`)
//! and manufacturing operations (`BomOperation`). Template and variant BOMs
//! share the same structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use validator::Validate;

/// Document lifecycle marker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "i16", into = "i16")]
pub enum DocStatus {
    #[default]
    Draft,
    Submitted,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid docstatus: {0}")]
pub struct InvalidDocStatus(pub i16);

impl TryFrom<i16> for DocStatus {
    type Error = InvalidDocStatus;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Draft),
            1 => Ok(Self::Submitted),
            2 => Ok(Self::Cancelled),
            other => Err(InvalidDocStatus(other)),
        }
    }
}

impl From<DocStatus> for i16 {
    fn from(status: DocStatus) -> Self {
        match status {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
            DocStatus::Cancelled => 2,
        }
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Submitted => write!(f, "submitted"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A full BOM document including both child tables.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Bom {
    #[validate(length(min = 1, max = 140, message = "BOM name must be between 1 and 140 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 140, message = "Item code must be between 1 and 140 characters"))]
    pub item: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub docstatus: DocStatus,
    #[serde(default)]
    pub routing: Option<String>,
    #[serde(default)]
    #[validate]
    pub items: Vec<BomItem>,
    #[serde(default)]
    #[validate]
    pub operations: Vec<BomOperation>,
    #[serde(default = "Utc::now")]
    pub modified: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Header fields returned by BOM queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BomSummary {
    pub name: String,
    pub item: String,
    pub docstatus: DocStatus,
    pub is_active: bool,
}

/// One component line of a BOM.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq, Default)]
pub struct BomItem {
    #[validate(length(min = 1, message = "Item code is required"))]
    pub item_code: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub do_not_explode: bool,
    #[serde(default)]
    pub bom_no: Option<String>,
    #[serde(default)]
    pub allow_alternative_item: bool,
    #[validate(range(min = 0.0, message = "Quantity must not be negative"))]
    pub qty: f64,
    #[serde(default)]
    pub uom: Option<String>,
    #[serde(default)]
    pub stock_qty: f64,
    #[serde(default)]
    pub stock_uom: Option<String>,
    #[serde(default = "default_conversion_factor")]
    pub conversion_factor: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Rate must not be negative"))]
    pub rate: f64,
    #[serde(default)]
    pub has_variants: bool,
    #[serde(default = "default_true")]
    pub include_item_in_manufacturing: bool,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub sourced_by_supplier: bool,
    #[serde(default)]
    pub idx: i32,
}

fn default_conversion_factor() -> f64 {
    1.0
}

/// One manufacturing operation of a BOM.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq, Default)]
pub struct BomOperation {
    #[validate(length(min = 1, message = "Operation is required"))]
    pub operation: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub workstation: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Operation time must not be negative"))]
    pub time_in_mins: f64,
    #[serde(default)]
    pub fixed_time: bool,
    #[serde(default)]
    pub sequence_id: i32,
    #[serde(default)]
    pub idx: i32,
}

impl Bom {
    pub fn new(name: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item: item.into(),
            is_active: true,
            is_default: false,
            docstatus: DocStatus::Draft,
            routing: None,
            items: Vec::new(),
            operations: Vec::new(),
            modified: Utc::now(),
        }
    }

    pub fn summary(&self) -> BomSummary {
        BomSummary {
            name: self.name.clone(),
            item: self.item.clone(),
            docstatus: self.docstatus,
            is_active: self.is_active,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.docstatus == DocStatus::Submitted
    }
}

impl BomSummary {
    pub fn is_submitted(&self) -> bool {
        self.docstatus == DocStatus::Submitted
    }
}

impl BomItem {
    /// Line for `item_code` with the given quantity and rate and a 1:1 conversion
    pub fn new(item_code: impl Into<String>, qty: f64, rate: f64) -> Self {
        let item_code = item_code.into();
        Self {
            item_name: item_code.clone(),
            item_code,
            qty,
            stock_qty: qty,
            conversion_factor: 1.0,
            rate,
            amount: qty * rate,
            include_item_in_manufacturing: true,
            ..Self::default()
        }
    }
}

impl BomOperation {
    pub fn new(operation: impl Into<String>, workstation: impl Into<String>, time_in_mins: f64) -> Self {
        Self {
            operation: operation.into(),
            workstation: Some(workstation.into()),
            time_in_mins,
            ..Self::default()
        }
    }
}
