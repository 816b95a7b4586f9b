//! Read-only accessor for an epoch's ordered proposer group.

use crate::types::{EpochId, PointG1};
use std::collections::HashMap;

/// `ProposerGroup(e) -> [PK_0, ..., PK_{n_e-1}]`. Populated before epoch `e` begins by an external
/// selection process the beacon does not implement.
pub trait ProposerGroupSource: Send + Sync {
    fn group(&self, epoch: EpochId) -> Option<Vec<PointG1>>;
}

/// Fixed-table implementation backing tests and the demo driver, analogous to `LocalKey` holding
/// a fixed `vk_vec` once keygen completes.
#[derive(Default)]
pub struct StaticProposerGroup {
    groups: HashMap<EpochId, Vec<PointG1>>,
}

impl StaticProposerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_group(&mut self, epoch: EpochId, group: Vec<PointG1>) {
        self.groups.insert(epoch, group);
    }
}

impl ProposerGroupSource for StaticProposerGroup {
    fn group(&self, epoch: EpochId) -> Option<Vec<PointG1>> {
        self.groups.get(&epoch).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve_ops::fixed_g;

    #[test]
    fn unknown_epoch_yields_none() {
        let groups = StaticProposerGroup::new();
        assert!(groups.group(EpochId(0)).is_none());
    }

    #[test]
    fn configured_epoch_returns_its_group() {
        let mut groups = StaticProposerGroup::new();
        groups.set_group(EpochId(1), vec![fixed_g(), fixed_g()]);
        assert_eq!(groups.group(EpochId(1)).unwrap().len(), 2);
    }
}
