use uuid::Uuid;

use crate::core::interactions::InteractionLedger;
use crate::models::Candidate;

/// Flag candidates whose current action toward the requester is a like or
/// super like. Membership is never changed here.
pub fn annotate_liked_me(candidates: &mut [Candidate], requester_id: Uuid, ledger: &InteractionLedger) {
    for candidate in candidates.iter_mut() {
        candidate.has_liked_me = ledger.has_liked(candidate.user_id(), requester_id);
    }
}
