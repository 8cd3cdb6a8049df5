//! Normalized input data: code -> value.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reported line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDataItem {
    pub code: u32,
    pub value: Decimal,
}

/// The values a run is evaluated against. Keys are unique; a code that is
/// absent reads as zero through [`InputMapping::get_or_zero`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputMapping {
    values: BTreeMap<u32, Decimal>,
}

impl InputMapping {
    pub fn new() -> Self {
        InputMapping::default()
    }

    /// Build a mapping from items in file order. Duplicate policy is
    /// last-seen wins; the second return value lists every code whose
    /// earlier value was overwritten, once per overwrite.
    pub fn from_items<I>(items: I) -> (InputMapping, Vec<u32>)
    where
        I: IntoIterator<Item = InputDataItem>,
    {
        let mut mapping = InputMapping::new();
        let mut overwritten = Vec::new();
        for item in items {
            if mapping.insert(item.code, item.value).is_some() {
                overwritten.push(item.code);
            }
        }
        (mapping, overwritten)
    }

    /// Insert a value, returning the previous one for that code.
    pub fn insert(&mut self, code: u32, value: Decimal) -> Option<Decimal> {
        self.values.insert(code, value)
    }

    pub fn get(&self, code: u32) -> Option<Decimal> {
        self.values.get(&code).copied()
    }

    /// Missing codes are not an error: they contribute zero.
    pub fn get_or_zero(&self, code: u32) -> Decimal {
        self.get(code).unwrap_or(Decimal::ZERO)
    }

    pub fn contains(&self, code: u32) -> bool {
        self.values.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in ascending code order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Decimal)> + '_ {
        self.values.iter().map(|(c, v)| (*c, *v))
    }
}

impl FromIterator<(u32, Decimal)> for InputMapping {
    /// Collects with the same last-seen-wins policy as [`InputMapping::from_items`].
    fn from_iter<T: IntoIterator<Item = (u32, Decimal)>>(iter: T) -> Self {
        InputMapping {
            values: iter.into_iter().collect(),
        }
    }
}
