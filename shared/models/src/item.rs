//! Item master models.
//!
//! Items are either plain stock items, templates (`has_variants`) or
//! variants pointing back at their template through `variant_of`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A catalog entry together with its variant attribute values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Item {
    pub item_code: String,
    pub item_name: String,
    #[serde(default)]
    pub has_variants: bool,
    #[serde(default)]
    pub variant_of: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub attributes: Vec<ItemVariantAttribute>,
}

/// One attribute/value pair of a variant, e.g. `Size` = `M`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq, Hash)]
pub struct ItemVariantAttribute {
    pub attribute: String,
    pub attribute_value: String,
}

impl ItemVariantAttribute {
    pub fn new(attribute: impl Into<String>, attribute_value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            attribute_value: attribute_value.into(),
        }
    }
}

impl Item {
    /// Creates a template item that carries variants
    pub fn template(item_code: impl Into<String>) -> Self {
        let item_code = item_code.into();
        Self {
            item_name: item_code.clone(),
            item_code,
            has_variants: true,
            ..Self::default()
        }
    }

    /// Creates a variant of `template` with the given attribute values
    pub fn variant(
        item_code: impl Into<String>,
        template: impl Into<String>,
        attributes: Vec<ItemVariantAttribute>,
    ) -> Self {
        let item_code = item_code.into();
        Self {
            item_name: item_code.clone(),
            item_code,
            variant_of: Some(template.into()),
            attributes,
            ..Self::default()
        }
    }

    /// Creates a plain stock item
    pub fn stock(item_code: impl Into<String>) -> Self {
        let item_code = item_code.into();
        Self {
            item_name: item_code.clone(),
            item_code,
            ..Self::default()
        }
    }

    pub fn is_variant(&self) -> bool {
        self.variant_of.is_some()
    }

    /// Value of the named attribute, if the item carries it
    pub fn attribute_value(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.attribute == attribute)
            .map(|a| a.attribute_value.as_str())
    }
}
