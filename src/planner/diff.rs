//! Diff engine
//!
//! Turns (current, desired) pairs into intents. Emission order is fixed so
//! that nonce assignment and dry-run output are reproducible:
//! owners (add, remove, swap, threshold), then operators (remove, add), then
//! tokens (remove, add).
//!
//! Owner predecessors are resolved here, once, against the owner list as
//! read from the chain. Nothing downstream recomputes them.

use alloy::primitives::Address;

use crate::safe::contracts::SENTINEL_OWNERS;
use crate::safe::types::{PolicyState, WalletState};

use super::intent::Intent;

/// Elements of `from` missing in `other`, in `from` order
pub fn set_difference(from: &[Address], other: &[Address]) -> Vec<Address> {
    from.iter()
        .filter(|address| !other.contains(address))
        .copied()
        .collect()
}

/// Predecessor of `owner` in the Safe's owner linked list
///
/// The first owner is preceded by the sentinel. Returns `None` if `owner` is
/// not in the list.
pub fn predecessor(owners: &[Address], owner: &Address) -> Option<Address> {
    let index = owners.iter().position(|o| o == owner)?;
    Some(if index == 0 {
        SENTINEL_OWNERS
    } else {
        owners[index - 1]
    })
}

/// Owner set changes before they become intents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerChanges {
    /// Owners added outright
    pub to_add: Vec<Address>,

    /// Owners removed outright
    pub to_remove: Vec<Address>,

    /// (old, new) pairs replaced in place
    pub to_swap: Vec<(Address, Address)>,
}

impl OwnerChanges {
    /// Compute additions, removals and swaps between current and desired owners
    ///
    /// The first `min(|add|, |remove|)` candidates of each side are paired
    /// into swaps: one call instead of two.
    pub fn compute(current: &[Address], desired: &[Address]) -> Self {
        let to_remove = set_difference(current, desired);
        let to_add = set_difference(desired, current);
        let swaps = to_add.len().min(to_remove.len());

        Self {
            to_swap: to_remove[..swaps]
                .iter()
                .copied()
                .zip(to_add[..swaps].iter().copied())
                .collect(),
            to_add: to_add[swaps..].to_vec(),
            to_remove: to_remove[swaps..].to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_swap.is_empty()
    }
}

/// Owner and threshold intents
///
/// Each add/remove carries a threshold that is valid for the owner count
/// right after it executes; the last one carries `desired_threshold`. If no
/// add/remove is emitted and the threshold differs, a threshold change
/// follows the swaps.
pub fn owner_intents(
    current: &WalletState,
    desired_owners: &[Address],
    desired_threshold: u64,
) -> Vec<Intent> {
    let changes = OwnerChanges::compute(&current.owners, desired_owners);
    if changes.is_empty() {
        return if desired_threshold == current.threshold {
            Vec::new()
        } else {
            vec![Intent::ChangeThreshold {
                threshold: desired_threshold,
            }]
        };
    }

    let mut intents = Vec::with_capacity(
        changes.to_add.len() + changes.to_remove.len() + changes.to_swap.len() + 1,
    );
    let mut owner_count = current.owners.len() as u64;

    for owner in &changes.to_add {
        owner_count += 1;
        intents.push(Intent::AddOwner {
            owner: *owner,
            threshold: desired_threshold.min(owner_count),
        });
    }

    for owner in &changes.to_remove {
        owner_count -= 1;
        // Removal targets come from `current.owners`, so the lookup cannot miss
        let prev = predecessor(&current.owners, owner).unwrap_or(SENTINEL_OWNERS);
        intents.push(Intent::RemoveOwner {
            prev,
            owner: *owner,
            threshold: desired_threshold.min(owner_count),
        });
    }

    for (old, new) in &changes.to_swap {
        let prev = predecessor(&current.owners, old).unwrap_or(SENTINEL_OWNERS);
        intents.push(Intent::SwapOwner {
            prev,
            old: *old,
            new: *new,
        });
    }

    let threshold_carried = !changes.to_add.is_empty() || !changes.to_remove.is_empty();
    if !threshold_carried && desired_threshold != current.threshold {
        intents.push(Intent::ChangeThreshold {
            threshold: desired_threshold,
        });
    }

    intents
}

/// Operator intents: removals first, then additions
pub fn operator_intents(current: &[Address], desired: &[Address]) -> Vec<Intent> {
    let removals = set_difference(current, desired)
        .into_iter()
        .map(|operator| Intent::RemoveOperator { operator });
    let additions = set_difference(desired, current)
        .into_iter()
        .map(|operator| Intent::AddOperator { operator });
    removals.chain(additions).collect()
}

/// Token whitelist intents: removals first, then additions
pub fn asset_intents(current: &[Address], desired: &[Address]) -> Vec<Intent> {
    let removals = set_difference(current, desired)
        .into_iter()
        .map(|token| Intent::RemoveAsset { token });
    let additions = set_difference(desired, current)
        .into_iter()
        .map(|token| Intent::AddAsset { token });
    removals.chain(additions).collect()
}

/// Target state for a full reconciliation
#[derive(Debug, Clone, Copy)]
pub struct DesiredState<'a> {
    pub owners: &'a [Address],
    pub threshold: u64,
    pub operators: &'a [Address],
    pub tokens: &'a [Address],
}

/// All intents in emission order; empty means nothing to update
pub fn diff(wallet: &WalletState, policy: &PolicyState, desired: &DesiredState<'_>) -> Vec<Intent> {
    let mut intents = owner_intents(wallet, desired.owners, desired.threshold);
    intents.extend(operator_intents(&policy.operators, desired.operators));
    intents.extend(asset_intents(&policy.tokens, desired.tokens));
    intents
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x10;
        bytes[19] = n;
        Address::from(bytes)
    }

    fn addrs(ns: &[u8]) -> Vec<Address> {
        ns.iter().map(|n| addr(*n)).collect()
    }

    fn wallet(owners: &[u8], threshold: u64) -> WalletState {
        WalletState {
            owners: addrs(owners),
            threshold,
            nonce: U256::ZERO,
        }
    }

    /// Apply owner intents to a linked list, checking each predecessor
    /// against the original list the way the Safe checks its storage
    fn apply_to_original(original: &[Address], intents: &[Intent]) -> Vec<Address> {
        let mut owners = original.to_vec();
        for intent in intents {
            match intent {
                Intent::AddOwner { owner, .. } => {
                    assert!(!owners.contains(owner));
                    owners.push(*owner);
                }
                Intent::RemoveOwner { prev, owner, .. } => {
                    assert_eq!(predecessor(original, owner), Some(*prev));
                    owners.retain(|o| o != owner);
                }
                Intent::SwapOwner { prev, old, new } => {
                    assert_eq!(predecessor(original, old), Some(*prev));
                    let slot = owners.iter().position(|o| o == old).unwrap();
                    owners[slot] = *new;
                }
                Intent::ChangeThreshold { .. } => {}
                other => panic!("unexpected intent {}", other),
            }
        }
        owners
    }

    fn counts(intents: &[Intent]) -> (usize, usize, usize) {
        let adds = intents.iter().filter(|i| matches!(i, Intent::AddOwner { .. })).count();
        let removes = intents.iter().filter(|i| matches!(i, Intent::RemoveOwner { .. })).count();
        let swaps = intents.iter().filter(|i| matches!(i, Intent::SwapOwner { .. })).count();
        (adds, removes, swaps)
    }

    #[test]
    fn test_predecessor_sentinel_middle_and_last() {
        let owners = addrs(&[1, 2, 3]);
        assert_eq!(predecessor(&owners, &addr(1)), Some(SENTINEL_OWNERS));
        assert_eq!(predecessor(&owners, &addr(2)), Some(addr(1)));
        assert_eq!(predecessor(&owners, &addr(3)), Some(addr(2)));
        assert_eq!(predecessor(&owners, &addr(9)), None);
    }

    #[test]
    fn test_owner_rotation_becomes_swaps() {
        let intents = owner_intents(&wallet(&[1, 2, 3], 2), &addrs(&[1, 4, 5]), 2);
        assert_eq!(
            intents,
            vec![
                Intent::SwapOwner {
                    prev: addr(1),
                    old: addr(2),
                    new: addr(4)
                },
                Intent::SwapOwner {
                    prev: addr(2),
                    old: addr(3),
                    new: addr(5)
                },
            ]
        );
    }

    #[test]
    fn test_emission_order_add_remove_swap() {
        // remove {1,2,3}, add {7}: one swap (1 -> 7), two removals
        let intents = owner_intents(&wallet(&[1, 2, 3, 4], 1), &addrs(&[4, 7]), 1);
        assert_eq!(
            intents,
            vec![
                Intent::RemoveOwner {
                    prev: addr(1),
                    owner: addr(2),
                    threshold: 1
                },
                Intent::RemoveOwner {
                    prev: addr(2),
                    owner: addr(3),
                    threshold: 1
                },
                Intent::SwapOwner {
                    prev: SENTINEL_OWNERS,
                    old: addr(1),
                    new: addr(7)
                },
            ]
        );

        let intents = owner_intents(&wallet(&[1], 1), &addrs(&[2, 3, 4]), 1);
        assert!(matches!(intents[0], Intent::AddOwner { .. }));
        assert!(matches!(intents[1], Intent::AddOwner { .. }));
        assert!(matches!(intents[2], Intent::SwapOwner { .. }));
    }

    #[test]
    fn test_thresholds_stay_valid_while_growing() {
        let intents = owner_intents(&wallet(&[1], 1), &addrs(&[1, 2, 3]), 3);
        assert_eq!(
            intents,
            vec![
                Intent::AddOwner {
                    owner: addr(2),
                    threshold: 2
                },
                Intent::AddOwner {
                    owner: addr(3),
                    threshold: 3
                },
            ]
        );
    }

    #[test]
    fn test_threshold_only_change() {
        assert!(OwnerChanges::compute(&addrs(&[1, 2, 3]), &addrs(&[3, 2, 1])).is_empty());

        let intents = owner_intents(&wallet(&[1, 2, 3], 1), &addrs(&[1, 2, 3]), 2);
        assert_eq!(intents, vec![Intent::ChangeThreshold { threshold: 2 }]);

        let intents = owner_intents(&wallet(&[1, 2], 1), &addrs(&[1, 3]), 2);
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[1], Intent::ChangeThreshold { threshold: 2 });
    }

    #[test]
    fn test_diff_correctness_and_swap_bound() {
        let cases: &[(&[u8], &[u8])] = &[
            (&[1, 2, 3], &[1, 2, 3]),
            (&[1, 2, 3], &[4, 5, 6]),
            (&[1, 2, 3], &[3]),
            (&[1], &[1, 2, 3, 4]),
            (&[1, 2, 3, 4, 5], &[2, 6]),
            (&[5, 4, 3, 2, 1], &[1, 9, 8, 5]),
            (&[1, 2], &[3, 4, 5, 6]),
            (&[9], &[8]),
        ];

        for (current, desired) in cases {
            let c = addrs(current);
            let d = addrs(desired);
            let intents = owner_intents(&wallet(current, 1), &d, 1);

            let added = set_difference(&d, &c).len();
            let removed = set_difference(&c, &d).len();
            let (adds, removes, swaps) = counts(&intents);

            assert_eq!(adds + swaps, added, "case {:?} -> {:?}", current, desired);
            assert_eq!(removes + swaps, removed, "case {:?} -> {:?}", current, desired);
            assert_eq!(
                adds + removes + swaps,
                added + removed - added.min(removed),
                "case {:?} -> {:?}",
                current,
                desired
            );

            let mut result = apply_to_original(&c, &intents);
            let mut expected = d.clone();
            result.sort();
            expected.sort();
            assert_eq!(result, expected, "case {:?} -> {:?}", current, desired);
        }
    }

    #[test]
    fn test_operator_and_asset_order() {
        let intents = operator_intents(&addrs(&[1, 2]), &addrs(&[2, 3]));
        assert_eq!(
            intents,
            vec![
                Intent::RemoveOperator { operator: addr(1) },
                Intent::AddOperator { operator: addr(3) },
            ]
        );

        let intents = asset_intents(&addrs(&[5]), &addrs(&[6, 5, 7]));
        assert_eq!(
            intents,
            vec![
                Intent::AddAsset { token: addr(6) },
                Intent::AddAsset { token: addr(7) },
            ]
        );
    }

    #[test]
    fn test_full_diff_category_order() {
        let policy = PolicyState {
            operators: addrs(&[20]),
            tokens: addrs(&[30]),
        };
        let owners = addrs(&[1, 2]);
        let operators = addrs(&[21]);
        let tokens = addrs(&[31]);
        let desired = DesiredState {
            owners: &owners,
            threshold: 1,
            operators: &operators,
            tokens: &tokens,
        };

        let intents = diff(&wallet(&[1], 1), &policy, &desired);
        assert_eq!(
            intents,
            vec![
                Intent::AddOwner {
                    owner: addr(2),
                    threshold: 1
                },
                Intent::RemoveOperator { operator: addr(20) },
                Intent::AddOperator { operator: addr(21) },
                Intent::RemoveAsset { token: addr(30) },
                Intent::AddAsset { token: addr(31) },
            ]
        );
    }

    #[test]
    fn test_identical_state_is_noop_twice() {
        let policy = PolicyState {
            operators: addrs(&[20]),
            tokens: addrs(&[30, 31]),
        };
        let owners = addrs(&[2, 1]);
        let desired = DesiredState {
            owners: &owners,
            threshold: 2,
            operators: &policy.operators,
            tokens: &[addr(31), addr(30)],
        };
        let state = wallet(&[1, 2], 2);

        assert!(diff(&state, &policy, &desired).is_empty());
        assert!(diff(&state, &policy, &desired).is_empty());
    }
}
