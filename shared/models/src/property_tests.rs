//! Property-based tests for the bomsync domain models.

use proptest::prelude::*;
use validator::Validate;

use crate::{Bom, BomItem, BomOperation, DocStatus, Item, ItemVariantAttribute};

prop_compose! {
    fn arb_item_code()(code in "[A-Z]{2,6}-[0-9]{2,4}") -> String {
        code
    }
}

prop_compose! {
    fn arb_bom_item()(
        item_code in arb_item_code(),
        qty in 0.0f64..10_000.0,
        rate in 0.0f64..1_000.0,
        idx in 1i32..500,
    ) -> BomItem {
        let mut line = BomItem::new(item_code, qty, rate);
        line.idx = idx;
        line
    }
}

prop_compose! {
    fn arb_bom_operation()(
        operation in "[A-Z][a-z]{3,12}",
        workstation in "[A-Z][a-z]{3,12}",
        time_in_mins in 0.0f64..600.0,
        sequence_id in 0i32..50,
    ) -> BomOperation {
        let mut op = BomOperation::new(operation, workstation, time_in_mins);
        op.sequence_id = sequence_id;
        op
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_docstatus_accepts_only_known_codes(code in any::<i16>()) {
        match DocStatus::try_from(code) {
            Ok(status) => {
                prop_assert!((0..=2).contains(&code));
                prop_assert_eq!(i16::from(status), code);
            }
            Err(_) => prop_assert!(!(0..=2).contains(&code)),
        }
    }

    #[test]
    fn prop_well_formed_bom_validates(
        items in prop::collection::vec(arb_bom_item(), 0..20),
        operations in prop::collection::vec(arb_bom_operation(), 0..10),
    ) {
        let mut bom = Bom::new("BOM-TEMPLATE-001", "TEMPLATE");
        bom.items = items;
        bom.operations = operations;

        prop_assert!(bom.validate().is_ok());
    }

    #[test]
    fn prop_attribute_lookup_finds_every_declared_attribute(
        values in prop::collection::btree_map("[A-Z][a-z]{2,8}", "[A-Z0-9]{1,4}", 1..5),
    ) {
        let attributes = values
            .iter()
            .map(|(k, v)| ItemVariantAttribute::new(k.clone(), v.clone()))
            .collect();
        let item = Item::variant("VARIANT-01", "TEMPLATE", attributes);

        for (attribute, value) in &values {
            prop_assert_eq!(item.attribute_value(attribute), Some(value.as_str()));
        }
        prop_assert_eq!(item.attribute_value("not-an-attribute"), None);
    }
}
