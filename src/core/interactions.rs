use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{Interaction, InteractionAction};

/// Latest interaction per ordered `(user, target)` pair.
///
/// The store keeps at most one active record per ordered pair, but a feed
/// read can still observe superseded rows. The newest record for a pair is
/// authoritative; if it is unmatched the pair has no active action.
#[derive(Debug, Clone, Default)]
pub struct InteractionLedger {
    latest: HashMap<(Uuid, Uuid), Interaction>,
}

impl InteractionLedger {
    pub fn from_records(records: &[Interaction]) -> Self {
        let mut latest: HashMap<(Uuid, Uuid), Interaction> = HashMap::with_capacity(records.len());
        for record in records {
            let key = (record.user_id, record.target_user_id);
            match latest.get(&key) {
                Some(existing) if existing.created_at > record.created_at => {}
                _ => {
                    latest.insert(key, record.clone());
                }
            }
        }
        Self { latest }
    }

    /// Active action `from` took toward `to`, if any
    pub fn active_action(&self, from: Uuid, to: Uuid) -> Option<InteractionAction> {
        self.latest
            .get(&(from, to))
            .filter(|record| record.is_active())
            .map(|record| record.action)
    }

    /// `from` currently likes or super-likes `to`
    pub fn has_liked(&self, from: Uuid, to: Uuid) -> bool {
        self.active_action(from, to)
            .is_some_and(InteractionAction::is_positive)
    }

    /// Reciprocal active positive interactions between `a` and `b`
    pub fn is_mutual(&self, a: Uuid, b: Uuid) -> bool {
        a != b && self.has_liked(a, b) && self.has_liked(b, a)
    }

    /// Targets of every active action taken by `user`
    pub fn decided_targets(&self, user: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.latest
            .values()
            .filter(move |record| record.user_id == user && record.is_active())
            .map(|record| record.target_user_id)
    }

    /// Everyone with an active like or super like toward `user`
    pub fn admirers(&self, user: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.latest
            .values()
            .filter(move |record| {
                record.target_user_id == user && record.is_active() && record.action.is_positive()
            })
            .map(|record| record.user_id)
    }

    /// Everyone `user` has a record with, in either direction
    pub fn counterparts(&self, user: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.latest.keys().filter_map(move |(from, to)| {
            if *from == user {
                Some(*to)
            } else if *to == user {
                Some(*from)
            } else {
                None
            }
        })
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

/// Whether `a` and `b` form a mutual match according to `interactions`
pub fn is_mutual(a: Uuid, b: Uuid, interactions: &[Interaction]) -> bool {
    InteractionLedger::from_records(interactions).is_mutual(a, b)
}
