use crate::sema::access::{Authorization, EntitlementSetAccess, EntitlementType, SetKind};
use indexmap::{IndexMap, IndexSet};

/// A conjunction of entitlements plus disjunction groups.
///
/// The set is not kept minimal: adding an entitlement that also occurs in a
/// disjunction leaves the disjunction in place until [`EntitlementSet::minimize`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntitlementSet {
    entitlements: IndexSet<EntitlementType>,
    disjunctions: IndexMap<String, IndexSet<EntitlementType>>,
}

/// Structural key of a disjunction, independent of member order.
pub fn disjunction_key(disjunction: &IndexSet<EntitlementType>) -> String {
    let mut ids: Vec<String> = disjunction.iter().map(EntitlementType::id).collect();
    ids.sort();
    ids.join("|")
}

impl EntitlementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entitlements(&self) -> &IndexSet<EntitlementType> {
        &self.entitlements
    }

    pub fn disjunctions(&self) -> impl Iterator<Item = &IndexSet<EntitlementType>> {
        self.disjunctions.values()
    }

    pub fn disjunction_count(&self) -> usize {
        self.disjunctions.len()
    }

    pub fn contains_disjunction(&self, disjunction: &IndexSet<EntitlementType>) -> bool {
        self.disjunctions.contains_key(&disjunction_key(disjunction))
    }

    pub fn is_empty(&self) -> bool {
        self.entitlements.is_empty() && self.disjunctions.is_empty()
    }

    pub fn add(&mut self, entitlement: EntitlementType) {
        self.entitlements.insert(entitlement);
    }

    pub fn add_disjunction(&mut self, disjunction: IndexSet<EntitlementType>) {
        // Already implied by the conjunction.
        if disjunction
            .iter()
            .any(|entitlement| self.entitlements.contains(entitlement))
        {
            return;
        }
        let key = disjunction_key(&disjunction);
        self.disjunctions.entry(key).or_insert(disjunction);
    }

    /// Records what an access requirement demands of the holder.
    pub fn add_requirement(&mut self, requirement: &EntitlementSetAccess) {
        match requirement.kind {
            SetKind::Conjunction => {
                for entitlement in &requirement.entitlements {
                    self.add(entitlement.clone());
                }
            }
            SetKind::Disjunction if requirement.entitlements.len() == 1 => {
                self.entitlements.extend(requirement.entitlements.iter().cloned());
            }
            SetKind::Disjunction => self.add_disjunction(requirement.entitlements.clone()),
        }
    }

    pub fn merge(&mut self, other: &EntitlementSet) {
        for entitlement in &other.entitlements {
            self.add(entitlement.clone());
        }
        for disjunction in other.disjunctions.values() {
            self.add_disjunction(disjunction.clone());
        }
    }

    pub fn minimize(&mut self) {
        let entitlements = &self.entitlements;
        self.disjunctions.retain(|_, disjunction| {
            !disjunction
                .iter()
                .any(|entitlement| entitlements.contains(entitlement))
        });
    }

    /// Projects the set onto a single authorization.
    ///
    /// This mutates the receiver: it calls [`EntitlementSet::minimize`] on
    /// `self` before projecting, so implied disjunctions are gone afterwards.
    /// Clone the set first to keep a non-minimal state. When the formula cannot be expressed as one
    /// conjunction or one disjunction, the result is the conjunction of every
    /// entitlement mentioned, which is at least as strong as the formula.
    pub fn access(&mut self) -> Authorization {
        self.minimize();

        if self.disjunctions.is_empty() {
            if self.entitlements.is_empty() {
                return Authorization::Unauthorized;
            }
            return Authorization::conjunction(self.entitlements.iter().cloned());
        }

        if self.entitlements.is_empty() && self.disjunctions.len() == 1 {
            if let Some(only) = self.disjunctions.values().next() {
                return Authorization::disjunction(only.iter().cloned());
            }
        }

        let mut all = self.entitlements.clone();
        for disjunction in self.disjunctions.values() {
            all.extend(disjunction.iter().cloned());
        }
        Authorization::conjunction(all)
    }
}
