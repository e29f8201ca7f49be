//! Variant Matching
//!
//! Pairs a variant of one template with the variant of another template
//! that shares the same values for a configured set of attributes.

use std::fmt;

use bomsync_models::Item;

/// Attribute values of one variant, in the configured attribute order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    values: Vec<(String, String)>,
}

/// A variant lacks one of the matching attributes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Variant {item_code} has no value for attribute {attribute}")]
pub struct MissingAttribute {
    pub item_code: String,
    pub attribute: String,
}

impl MatchKey {
    /// Reads `attributes` from `item`, failing on the first one it lacks
    pub fn for_item(item: &Item, attributes: &[String]) -> Result<Self, MissingAttribute> {
        let values = attributes
            .iter()
            .map(|attribute| {
                item.attribute_value(attribute)
                    .map(|value| (attribute.clone(), value.to_string()))
                    .ok_or_else(|| MissingAttribute {
                        item_code: item.item_code.clone(),
                        attribute: attribute.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { values })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when `item` carries every attribute of the key with the same value
    pub fn matches(&self, item: &Item) -> bool {
        self.values
            .iter()
            .all(|(attribute, value)| item.attribute_value(attribute) == Some(value.as_str()))
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(attribute, value)| format!("{} = {}", attribute, value))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// First candidate (by item code) matching `key`.
pub fn find_matching_variant<'a>(candidates: &'a [Item], key: &MatchKey) -> Option<&'a Item> {
    candidates
        .iter()
        .filter(|candidate| key.matches(candidate))
        .min_by(|a, b| a.item_code.cmp(&b.item_code))
}
