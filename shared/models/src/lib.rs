//! # Bomsync Domain Models
//!
//! Core domain models for variant BOM synchronization.
//!
//! ## Key Models
//!
//! - **Item**: catalog entry, possibly a template (`has_variants`) or a variant (`variant_of`)
//! - **ItemVariantAttribute**: attribute/value pair distinguishing a variant
//! - **Bom**: bill of materials document with line items and operations
//! - **BomItem** / **BomOperation**: the two child tables of a BOM
//! - **DocStatus**: draft, submitted or cancelled
//!
//! Inbound documents are validated with the `validator` crate.

pub mod item;
pub mod bom;
pub mod error_log;

#[cfg(test)]
pub mod property_tests;

pub use item::*;
pub use bom::*;
pub use error_log::*;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_docstatus_conversion() {
        assert_eq!(DocStatus::try_from(0).unwrap(), DocStatus::Draft);
        assert_eq!(DocStatus::try_from(1).unwrap(), DocStatus::Submitted);
        assert_eq!(DocStatus::try_from(2).unwrap(), DocStatus::Cancelled);
        assert!(DocStatus::try_from(3).is_err());
        assert_eq!(i16::from(DocStatus::Submitted), 1);
    }

    #[test]
    fn test_docstatus_serializes_as_integer() {
        let json = serde_json::to_string(&DocStatus::Submitted).unwrap();
        assert_eq!(json, "1");

        let status: DocStatus = serde_json::from_str("2").unwrap();
        assert_eq!(status, DocStatus::Cancelled);
        assert!(serde_json::from_str::<DocStatus>("7").is_err());
    }

    #[test]
    fn test_item_attribute_lookup() {
        let item = Item::variant(
            "SHIRT-M",
            "SHIRT",
            vec![
                ItemVariantAttribute::new("Size", "M"),
                ItemVariantAttribute::new("Colour", "Red"),
            ],
        );

        assert!(item.is_variant());
        assert!(!item.has_variants);
        assert_eq!(item.attribute_value("Size"), Some("M"));
        assert_eq!(item.attribute_value("Colour"), Some("Red"));
        assert_eq!(item.attribute_value("Fit"), None);
    }

    #[test]
    fn test_bom_deserializes_with_host_defaults() {
        let bom: Bom = serde_json::from_str(
            r#"{
                "name": "BOM-SHIRT-001",
                "item": "SHIRT",
                "items": [{"item_code": "FABRIC", "qty": 2.0}],
                "operations": [{"operation": "Cutting"}]
            }"#,
        )
        .unwrap();

        assert!(bom.is_active);
        assert_eq!(bom.docstatus, DocStatus::Draft);
        assert_eq!(bom.items[0].conversion_factor, 1.0);
        assert!(bom.items[0].include_item_in_manufacturing);
        assert_eq!(bom.operations[0].time_in_mins, 0.0);
    }

    #[test]
    fn test_bom_validation_rejects_blank_item_code() {
        let mut bom = Bom::new("BOM-SHIRT-001", "SHIRT");
        bom.items.push(BomItem::new("", 1.0, 1.0));

        assert!(bom.validate().is_err());
    }

    #[test]
    fn test_bom_validation_rejects_negative_qty() {
        let mut bom = Bom::new("BOM-SHIRT-001", "SHIRT");
        bom.items.push(BomItem::new("FABRIC", -1.0, 1.0));

        assert!(bom.validate().is_err());
    }

    #[test]
    fn test_bom_validation_accepts_well_formed_document() {
        let mut bom = Bom::new("BOM-SHIRT-001", "SHIRT");
        bom.items.push(BomItem::new("FABRIC", 2.0, 4.5));
        bom.operations.push(BomOperation::new("Cutting", "Cutting Table", 15.0));

        assert!(bom.validate().is_ok());
        assert_eq!(bom.items[0].amount, 9.0);
    }
}
