// libs/appointment-cell/src/services/graph.rs
//
// Legal canonical-status edges. Only the transition validator reads this table.

use crate::models::CanonicalStatus;

pub(crate) fn allowed_transitions(status: CanonicalStatus) -> &'static [CanonicalStatus] {
    use CanonicalStatus::*;

    match status {
        AwaitingPayment => &[PaymentProcessing, AwaitingMatch, Cancelled],
        PaymentProcessing => &[AwaitingMatch, AwaitingPayment, Cancelled],
        AwaitingMatch => &[MatchPendingAcceptance, Cancelled],
        // A declined proposal goes back to matching.
        MatchPendingAcceptance => &[AwaitingScheduling, AwaitingMatch, Cancelled],
        AwaitingScheduling => &[Confirmed, Cancelled],
        Confirmed => &[Rescheduled, Completed, Cancelled, NoShow],
        Rescheduled => &[Confirmed, Rescheduled, Completed, Cancelled, NoShow],
        // Terminal states - no transitions allowed
        Completed | Cancelled | NoShow => &[],
    }
}

pub(crate) fn is_allowed(from: CanonicalStatus, to: CanonicalStatus) -> bool {
    allowed_transitions(from).contains(&to)
}
