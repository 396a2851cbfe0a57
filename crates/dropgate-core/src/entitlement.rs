//! Entitlements: who may claim how much, and at which tree position.

use crate::errors::EntitlementError;
use crate::types::{amount_hex, Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One recipient's claimable amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entitlement {
    /// Dense, zero-based leaf position
    pub index: u64,
    /// Recipient account
    pub account: Address,
    /// Claimable amount
    #[serde(with = "amount_hex")]
    pub amount: Amount,
}

impl Entitlement {
    /// Create a new entitlement.
    pub fn new(index: u64, account: Address, amount: impl Into<Amount>) -> Self {
        Self {
            index,
            account,
            amount: amount.into(),
        }
    }
}

/// A validated, index-ordered entitlement manifest.
///
/// Construction enforces: non-empty, unique indices, unique accounts, indices
/// dense from zero, non-zero amounts, and a total that fits 256 bits. Input
/// order is irrelevant; entries are stored sorted by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementSet {
    entries: Vec<Entitlement>,
    total: Amount,
}

impl EntitlementSet {
    /// Validate and order a list of entitlements.
    pub fn new(mut entries: Vec<Entitlement>) -> Result<Self, EntitlementError> {
        if entries.is_empty() {
            return Err(EntitlementError::EmptySet);
        }

        entries.sort_by_key(|e| e.index);

        let mut indices = HashSet::with_capacity(entries.len());
        if let Some(repeat) = entries.iter().find(|e| !indices.insert(e.index)) {
            return Err(EntitlementError::DuplicateIndex(repeat.index));
        }

        let mut accounts = HashSet::with_capacity(entries.len());
        let mut total = Amount::zero();
        for (position, entry) in entries.iter().enumerate() {
            let expected = position as u64;
            if entry.index != expected {
                return Err(EntitlementError::IndexGap {
                    expected,
                    found: entry.index,
                });
            }
            if !accounts.insert(entry.account) {
                return Err(EntitlementError::DuplicateAccount(entry.account));
            }
            if entry.amount.is_zero() {
                return Err(EntitlementError::ZeroAmount { index: entry.index });
            }
            total = total
                .checked_add(entry.amount)
                .ok_or(EntitlementError::AmountOverflow)?;
        }

        Ok(Self { entries, total })
    }

    /// Validate a list and check it against a declared total.
    pub fn with_declared_total(
        entries: Vec<Entitlement>,
        declared: Amount,
    ) -> Result<Self, EntitlementError> {
        let set = Self::new(entries)?;
        if set.total != declared {
            return Err(EntitlementError::TotalMismatch {
                declared,
                actual: set.total,
            });
        }
        Ok(set)
    }

    /// Build a set from an account balance map, assigning indices in
    /// ascending account order.
    pub fn from_balances(balances: &BTreeMap<Address, Amount>) -> Result<Self, EntitlementError> {
        let entries = balances
            .iter()
            .enumerate()
            .map(|(index, (account, amount))| Entitlement::new(index as u64, *account, *amount))
            .collect();
        Self::new(entries)
    }

    /// Entries ordered by index.
    pub fn entries(&self) -> &[Entitlement] {
        &self.entries
    }

    /// Sum of all amounts.
    pub fn total(&self) -> Amount {
        self.total
    }

    /// Number of entitlements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; an empty set cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entitlement at `index`.
    pub fn get(&self, index: u64) -> Option<&Entitlement> {
        usize::try_from(index).ok().and_then(|i| self.entries.get(i))
    }

    /// Entitlement belonging to `account`.
    pub fn find_account(&self, account: &Address) -> Option<&Entitlement> {
        self.entries.iter().find(|e| &e.account == account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn test_sorts_by_index() {
        let set = EntitlementSet::new(vec![
            Entitlement::new(1, addr(2), 200u64),
            Entitlement::new(0, addr(1), 100u64),
        ])
        .unwrap();
        assert_eq!(set.entries()[0].index, 0);
        assert_eq!(set.total(), Amount::from(300u64));
        assert_eq!(set.get(1).unwrap().account, addr(2));
        assert_eq!(set.find_account(&addr(1)).unwrap().index, 0);
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(EntitlementSet::new(vec![]), Err(EntitlementError::EmptySet));
    }

    #[test]
    fn test_rejects_duplicate_index() {
        let err = EntitlementSet::new(vec![
            Entitlement::new(0, addr(1), 1u64),
            Entitlement::new(0, addr(2), 1u64),
        ])
        .unwrap_err();
        assert_eq!(err, EntitlementError::DuplicateIndex(0));
    }

    #[test]
    fn test_duplicate_index_reported_before_gap() {
        let err = EntitlementSet::new(vec![
            Entitlement::new(0, addr(1), 1u64),
            Entitlement::new(2, addr(2), 1u64),
            Entitlement::new(2, addr(3), 1u64),
        ])
        .unwrap_err();
        assert_eq!(err, EntitlementError::DuplicateIndex(2));

        let err = EntitlementSet::new(vec![
            Entitlement::new(1, addr(1), 1u64),
            Entitlement::new(1, addr(2), 1u64),
        ])
        .unwrap_err();
        assert_eq!(err, EntitlementError::DuplicateIndex(1));
    }

    #[test]
    fn test_rejects_duplicate_account() {
        let err = EntitlementSet::new(vec![
            Entitlement::new(0, addr(1), 1u64),
            Entitlement::new(1, addr(1), 1u64),
        ])
        .unwrap_err();
        assert_eq!(err, EntitlementError::DuplicateAccount(addr(1)));
    }

    #[test]
    fn test_rejects_gap_and_zero_amount() {
        let err = EntitlementSet::new(vec![
            Entitlement::new(0, addr(1), 1u64),
            Entitlement::new(2, addr(2), 1u64),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            EntitlementError::IndexGap {
                expected: 1,
                found: 2
            }
        );

        let err = EntitlementSet::new(vec![Entitlement::new(0, addr(1), 0u64)]).unwrap_err();
        assert_eq!(err, EntitlementError::ZeroAmount { index: 0 });
    }

    #[test]
    fn test_declared_total_mismatch() {
        let err = EntitlementSet::with_declared_total(
            vec![Entitlement::new(0, addr(1), 100u64)],
            Amount::from(101u64),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EntitlementError::TotalMismatch {
                declared: Amount::from(101u64),
                actual: Amount::from(100u64)
            }
        );
    }

    #[test]
    fn test_overflow_is_rejected() {
        let err = EntitlementSet::new(vec![
            Entitlement::new(0, addr(1), Amount::MAX),
            Entitlement::new(1, addr(2), 1u64),
        ])
        .unwrap_err();
        assert_eq!(err, EntitlementError::AmountOverflow);
    }

    #[test]
    fn test_from_balances_orders_by_account() {
        let mut balances = BTreeMap::new();
        balances.insert(addr(9), Amount::from(5u64));
        balances.insert(addr(3), Amount::from(7u64));
        let set = EntitlementSet::from_balances(&balances).unwrap();
        assert_eq!(set.entries()[0].account, addr(3));
        assert_eq!(set.entries()[1].account, addr(9));
        assert_eq!(set.entries()[1].index, 1);
    }
}
