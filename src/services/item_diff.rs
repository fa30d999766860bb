use std::collections::BTreeMap;
use uuid::Uuid;

/// Net per-product quantity change between two item lists.
///
/// `delta > 0` means the new document moves more stock in the document's
/// forward direction than the old one did; `delta < 0` means part of the old
/// effect must be compensated. Items sharing a product id are summed before
/// diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QuantityDelta {
    pub product_id: Uuid,
    pub delta: i32,
}

pub(crate) fn diff_quantities(
    old: impl IntoIterator<Item = (Uuid, i32)>,
    new: impl IntoIterator<Item = (Uuid, i32)>,
) -> Vec<QuantityDelta> {
    let mut totals: BTreeMap<Uuid, i32> = BTreeMap::new();
    for (product_id, quantity) in old {
        *totals.entry(product_id).or_default() -= quantity;
    }
    for (product_id, quantity) in new {
        *totals.entry(product_id).or_default() += quantity;
    }
    totals
        .into_iter()
        .filter(|(_, delta)| *delta != 0)
        .map(|(product_id, delta)| QuantityDelta { product_id, delta })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn unchanged_items_produce_no_delta() {
        let deltas = diff_quantities(vec![(id(1), 5)], vec![(id(1), 5)]);
        assert!(deltas.is_empty());
    }

    #[test]
    fn quantity_change_produces_the_difference_only() {
        let deltas = diff_quantities(vec![(id(1), 10)], vec![(id(1), 4)]);
        assert_eq!(deltas, vec![QuantityDelta { product_id: id(1), delta: -6 }]);
    }

    #[test]
    fn added_and_removed_items_produce_full_quantities() {
        let deltas = diff_quantities(vec![(id(1), 3)], vec![(id(2), 7)]);
        assert_eq!(
            deltas,
            vec![
                QuantityDelta { product_id: id(1), delta: -3 },
                QuantityDelta { product_id: id(2), delta: 7 },
            ]
        );
    }

    #[test]
    fn duplicate_product_lines_are_summed() {
        let deltas = diff_quantities(vec![(id(1), 2), (id(1), 3)], vec![(id(1), 9)]);
        assert_eq!(deltas, vec![QuantityDelta { product_id: id(1), delta: 4 }]);
    }

    proptest::proptest! {
        /// Folding the deltas into the old per-product totals reproduces the
        /// new totals exactly.
        #[test]
        fn deltas_transform_old_totals_into_new(
            old in proptest::collection::vec((0u128..8, 1i32..100), 0..10),
            new in proptest::collection::vec((0u128..8, 1i32..100), 0..10),
        ) {
            let old: Vec<_> = old.into_iter().map(|(n, q)| (id(n), q)).collect();
            let new: Vec<_> = new.into_iter().map(|(n, q)| (id(n), q)).collect();

            let mut totals: BTreeMap<Uuid, i32> = BTreeMap::new();
            for (p, q) in &old {
                *totals.entry(*p).or_default() += q;
            }
            for delta in diff_quantities(old, new.clone()) {
                *totals.entry(delta.product_id).or_default() += delta.delta;
            }
            totals.retain(|_, q| *q != 0);

            let mut expected: BTreeMap<Uuid, i32> = BTreeMap::new();
            for (p, q) in new {
                *expected.entry(p).or_default() += q;
            }
            proptest::prop_assert_eq!(totals, expected);
        }
    }
}
