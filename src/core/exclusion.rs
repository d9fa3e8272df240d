use std::collections::BTreeSet;

use uuid::Uuid;

use crate::core::interactions::InteractionLedger;
use crate::models::Block;

/// IDs that must never be shown to one requester
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    ids: BTreeSet<Uuid>,
    stats: ExclusionStats,
}

/// Breakdown of why IDs were excluded, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExclusionStats {
    pub blocked: usize,
    pub decided: usize,
    pub mutual: usize,
}

impl ExclusionSet {
    /// Union of self, blocks in both directions, every active decision the
    /// requester made, and every mutual match partner.
    pub fn build(requester_id: Uuid, blocks: &[Block], ledger: &InteractionLedger) -> Self {
        let mut ids = BTreeSet::new();
        ids.insert(requester_id);

        let blocked: BTreeSet<Uuid> = blocks
            .iter()
            .filter_map(|block| block.counterpart(requester_id))
            .collect();

        let decided: BTreeSet<Uuid> = ledger.decided_targets(requester_id).collect();

        let mutual: BTreeSet<Uuid> = ledger
            .counterparts(requester_id)
            .filter(|other| ledger.is_mutual(requester_id, *other))
            .collect();

        let stats = ExclusionStats {
            blocked: blocked.len(),
            decided: decided.len(),
            mutual: mutual.len(),
        };

        ids.extend(blocked);
        ids.extend(decided);
        ids.extend(mutual);

        Self { ids, stats }
    }

    #[inline]
    pub fn contains(&self, user_id: &Uuid) -> bool {
        self.ids.contains(user_id)
    }

    /// Never empty: the requester is always excluded
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn stats(&self) -> ExclusionStats {
        self.stats
    }

    /// Sorted IDs, for binding into store queries
    pub fn to_vec(&self) -> Vec<Uuid> {
        self.ids.iter().copied().collect()
    }
}
