//! Per-operation prices.
//!
//! A [`PriceTable`] is built once at startup from configuration and is
//! read-only afterwards. Changing a price means rebuilding the table.

use std::collections::BTreeMap;

use crate::amount::MinorUnits;
use crate::error::{DuplicateOperation, PriceError, UnknownOperation};
use crate::network::ChainNetwork;

/// Default window, in seconds, a client has to complete payment.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// The price of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceEntry {
    /// Key the operation is registered under.
    pub operation_key: String,
    /// Price in minor units of `asset`. Zero means free.
    pub amount: MinorUnits,
    /// Token contract or mint the price is denominated in.
    pub asset: String,
    /// Settlement network.
    pub network: ChainNetwork,
    /// Recipient address.
    pub pay_to: String,
    /// Human-readable description shown in challenges.
    pub description: String,
    /// Seconds the client has to complete payment.
    pub max_timeout_seconds: u64,
}

impl PriceEntry {
    /// Creates an entry priced in the network's USDC with the default
    /// payment window and an empty description.
    #[must_use]
    pub fn new(
        operation_key: impl Into<String>,
        amount: MinorUnits,
        network: ChainNetwork,
        pay_to: impl Into<String>,
    ) -> Self {
        Self {
            operation_key: operation_key.into(),
            amount,
            asset: network.usdc().to_owned(),
            network,
            pay_to: pay_to.into(),
            description: String::new(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
        }
    }

    /// Sets the asset.
    #[must_use]
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = asset.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the payment window.
    #[must_use]
    pub const fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// Whether the operation is free.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.amount.is_zero()
    }
}

/// Operation key to price, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTable {
    entries: BTreeMap<String, PriceEntry>,
}

impl PriceTable {
    /// Builds a table, rejecting duplicate keys and zero payment windows.
    ///
    /// # Errors
    ///
    /// [`PriceError::Duplicate`] when two entries share a key,
    /// [`PriceError::ZeroTimeout`] when an entry has `max_timeout_seconds == 0`.
    pub fn try_from_entries<I>(entries: I) -> Result<Self, PriceError>
    where
        I: IntoIterator<Item = PriceEntry>,
    {
        let mut table = BTreeMap::new();
        for entry in entries {
            if entry.max_timeout_seconds == 0 {
                return Err(PriceError::ZeroTimeout(entry.operation_key));
            }
            if table.contains_key(&entry.operation_key) {
                return Err(DuplicateOperation(entry.operation_key).into());
            }
            table.insert(entry.operation_key.clone(), entry);
        }
        Ok(Self { entries: table })
    }

    /// Returns the entry for `key`.
    ///
    /// # Errors
    ///
    /// [`UnknownOperation`] when no entry has that key.
    pub fn lookup(&self, key: &str) -> Result<&PriceEntry, UnknownOperation> {
        self.entries
            .get(key)
            .ok_or_else(|| UnknownOperation(key.to_owned()))
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &PriceEntry> {
        self.entries.values()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, amount: u64) -> PriceEntry {
        PriceEntry::new(key, MinorUnits::new(amount), ChainNetwork::Base, "0xPAYEE")
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        let table =
            PriceTable::try_from_entries([entry("post-bounty", 250_000), entry("system-info", 0)])
                .unwrap();
        let bounty = table.lookup("post-bounty").unwrap();
        assert_eq!(bounty.amount.get(), 250_000);
        assert_eq!(bounty.asset, crate::network::USDC_BASE);
        assert!(table.lookup("system-info").unwrap().is_free());
        assert_eq!(
            table.lookup("nope").unwrap_err(),
            UnknownOperation("nope".into())
        );
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = PriceTable::try_from_entries([entry("a", 1), entry("a", 2)]).unwrap_err();
        assert_eq!(err, PriceError::Duplicate(DuplicateOperation("a".into())));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = PriceTable::try_from_entries([entry("a", 1).with_max_timeout_seconds(0)])
            .unwrap_err();
        assert_eq!(err, PriceError::ZeroTimeout("a".into()));
    }

    #[test]
    fn test_iterates_in_key_order() {
        let table =
            PriceTable::try_from_entries([entry("b", 1), entry("c", 1), entry("a", 1)]).unwrap();
        let keys: Vec<_> = table.iter().map(|e| e.operation_key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(table.len(), 3);
    }
}
