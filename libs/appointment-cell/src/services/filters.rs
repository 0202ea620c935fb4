// libs/appointment-cell/src/services/filters.rs
use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::models::{AppointmentError, AppointmentSnapshot, CanonicalStatus, IntegrityWarning, ResolvedStatus};
use crate::services::resolver::StatusResolver;

/// An appointment paired with the status the resolver derived for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedAppointment {
    pub snapshot: AppointmentSnapshot,
    pub status: ResolvedStatus,
    pub warnings: Vec<IntegrityWarning>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterParams {
    /// Reference instant for date-relative predicates; defaults to now at the HTTP edge.
    pub now: Option<DateTime<Utc>>,
    pub owner_id: Option<Uuid>,
    pub operator_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentFilter {
    Upcoming,
    AwaitingPayment,
    AwaitingMatch,
    AwaitingScheduling,
    AwaitingFulfillmentValidation,
    FulfilledUnpaidOut,
    CancelledOrNoShow,
    ByOwner(Uuid),
    ByOperator(Uuid),
    /// Half-open range `[from, to)` on the scheduled timestamp.
    ByDateRange { from: DateTime<Utc>, to: DateTime<Utc> },
    Today,
    ThisWeek,
    Active,
}

impl AppointmentFilter {
    pub fn from_name(name: &str, params: &FilterParams) -> Result<Self, AppointmentError> {
        let filter = match name {
            "upcoming" => AppointmentFilter::Upcoming,
            "awaiting_payment" => AppointmentFilter::AwaitingPayment,
            "awaiting_match" => AppointmentFilter::AwaitingMatch,
            "awaiting_scheduling" => AppointmentFilter::AwaitingScheduling,
            "awaiting_fulfillment_validation" => AppointmentFilter::AwaitingFulfillmentValidation,
            "fulfilled_unpaid_out" => AppointmentFilter::FulfilledUnpaidOut,
            "cancelled_or_no_show" => AppointmentFilter::CancelledOrNoShow,
            "by_owner" => AppointmentFilter::ByOwner(params.owner_id.ok_or_else(|| {
                AppointmentError::InvalidFilterParams("by_owner requires owner_id".to_string())
            })?),
            "by_operator" => AppointmentFilter::ByOperator(params.operator_id.ok_or_else(|| {
                AppointmentError::InvalidFilterParams("by_operator requires operator_id".to_string())
            })?),
            "by_date_range" => {
                let (from, to) = params.from.zip(params.to).ok_or_else(|| {
                    AppointmentError::InvalidFilterParams("by_date_range requires from and to".to_string())
                })?;
                if to < from {
                    return Err(AppointmentError::InvalidFilterParams(
                        "by_date_range requires from <= to".to_string(),
                    ));
                }
                AppointmentFilter::ByDateRange { from, to }
            }
            "today" => AppointmentFilter::Today,
            "this_week" => AppointmentFilter::ThisWeek,
            "active" => AppointmentFilter::Active,
            other => return Err(AppointmentError::UnknownFilter(other.to_string())),
        };
        Ok(filter)
    }

    /// Date-relative predicates compare against `now`; nothing here reads the clock.
    pub fn matches(&self, appointment: &ResolvedAppointment, now: DateTime<Utc>) -> bool {
        let status = &appointment.status;
        let snapshot = &appointment.snapshot;
        let scheduled = snapshot.scheduled_at;

        match self {
            AppointmentFilter::Upcoming => is_booked(status) && scheduled.map(|at| at >= now).unwrap_or(false),
            AppointmentFilter::AwaitingPayment => status.is(CanonicalStatus::AwaitingPayment),
            AppointmentFilter::AwaitingMatch => status.is(CanonicalStatus::AwaitingMatch),
            AppointmentFilter::AwaitingScheduling => status.is(CanonicalStatus::AwaitingScheduling),
            AppointmentFilter::AwaitingFulfillmentValidation => {
                is_booked(status)
                    && !snapshot.operator_validated
                    && scheduled.map(|at| at < now).unwrap_or(false)
            }
            AppointmentFilter::FulfilledUnpaidOut => {
                status.is(CanonicalStatus::Completed) && !snapshot.operator_paid_out
            }
            AppointmentFilter::CancelledOrNoShow => {
                status.is(CanonicalStatus::Cancelled) || status.is(CanonicalStatus::NoShow)
            }
            AppointmentFilter::ByOwner(owner_id) => snapshot.requester_id == *owner_id,
            AppointmentFilter::ByOperator(operator_id) => snapshot.assigned_operator_id == Some(*operator_id),
            AppointmentFilter::ByDateRange { from, to } => {
                scheduled.map(|at| at >= *from && at < *to).unwrap_or(false)
            }
            AppointmentFilter::Today => scheduled.map(|at| at.date_naive() == now.date_naive()).unwrap_or(false),
            AppointmentFilter::ThisWeek => scheduled.map(|at| at.iso_week() == now.iso_week()).unwrap_or(false),
            AppointmentFilter::Active => match status.canonical() {
                Some(s) => !matches!(
                    s,
                    CanonicalStatus::AwaitingPayment
                        | CanonicalStatus::Cancelled
                        | CanonicalStatus::NoShow
                        | CanonicalStatus::Completed
                ),
                None => false,
            },
        }
    }
}

/// Confirmed and rescheduled behave identically outside display.
fn is_booked(status: &ResolvedStatus) -> bool {
    status.is(CanonicalStatus::Confirmed) || status.is(CanonicalStatus::Rescheduled)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    DateAscending,
    DateDescending,
    /// Operational dashboard order, ties broken by ascending date.
    StatusPriority,
}

/// Dashboard priority; lower sorts first. Unknown tokens sort last.
pub fn status_priority(status: &ResolvedStatus) -> u8 {
    match status.canonical() {
        Some(CanonicalStatus::Confirmed) => 0,
        Some(CanonicalStatus::Rescheduled) => 1,
        Some(CanonicalStatus::AwaitingScheduling) => 2,
        Some(CanonicalStatus::MatchPendingAcceptance) => 3,
        Some(CanonicalStatus::AwaitingMatch) => 4,
        Some(CanonicalStatus::PaymentProcessing) => 5,
        Some(CanonicalStatus::AwaitingPayment) => 6,
        Some(CanonicalStatus::Completed) => 7,
        Some(CanonicalStatus::NoShow) => 8,
        Some(CanonicalStatus::Cancelled) => 9,
        None => 10,
    }
}

/// Undated appointments sort after dated ones in either direction.
fn compare_dates(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_appointments(appointments: &mut [ResolvedAppointment], order: SortOrder) {
    match order {
        SortOrder::DateAscending => appointments
            .sort_by(|a, b| compare_dates(a.snapshot.scheduled_at, b.snapshot.scheduled_at, false)),
        SortOrder::DateDescending => appointments
            .sort_by(|a, b| compare_dates(a.snapshot.scheduled_at, b.snapshot.scheduled_at, true)),
        SortOrder::StatusPriority => appointments.sort_by(|a, b| {
            status_priority(&a.status)
                .cmp(&status_priority(&b.status))
                .then_with(|| compare_dates(a.snapshot.scheduled_at, b.snapshot.scheduled_at, false))
        }),
    }
}

/// Read-path query layer. Every status it looks at comes from the resolver.
#[derive(Debug, Clone, Copy)]
pub struct AppointmentQueryService {
    resolver: StatusResolver,
}

impl AppointmentQueryService {
    pub fn new(resolver: StatusResolver) -> Self {
        Self { resolver }
    }

    pub fn resolve_all(&self, snapshots: Vec<AppointmentSnapshot>) -> Vec<ResolvedAppointment> {
        snapshots
            .into_iter()
            .map(|snapshot| {
                let resolution = self.resolver.resolve_with_warnings(&snapshot, None);
                ResolvedAppointment {
                    snapshot,
                    status: resolution.status,
                    warnings: resolution.warnings,
                }
            })
            .collect()
    }

    pub fn filter_appointments(
        &self,
        snapshots: Vec<AppointmentSnapshot>,
        filter: &AppointmentFilter,
        now: DateTime<Utc>,
    ) -> Vec<ResolvedAppointment> {
        let total = snapshots.len();
        let matched: Vec<ResolvedAppointment> = self
            .resolve_all(snapshots)
            .into_iter()
            .filter(|appointment| filter.matches(appointment, now))
            .collect();

        debug!(filter = ?filter, total, matched = matched.len(), "Filtered appointments");
        matched
    }

    /// Name-based entry point used by list views.
    pub fn filter_by_name(
        &self,
        snapshots: Vec<AppointmentSnapshot>,
        predicate: &str,
        params: &FilterParams,
        sort: Option<SortOrder>,
    ) -> Result<Vec<ResolvedAppointment>, AppointmentError> {
        let filter = AppointmentFilter::from_name(predicate, params)?;
        let now = params.now.unwrap_or_else(Utc::now);
        let mut matched = self.filter_appointments(snapshots, &filter, now);
        if let Some(order) = sort {
            sort_appointments(&mut matched, order);
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use shared_config::BalancePaymentPolicy;

    fn now() -> DateTime<Utc> {
        // A Wednesday.
        Utc.with_ymd_and_hms(2026, 4, 15, 12, 0, 0).unwrap()
    }

    fn service() -> AppointmentQueryService {
        AppointmentQueryService::new(StatusResolver::with_policy(BalancePaymentPolicy::Trusted))
    }

    fn appointment(raw: &str, scheduled_at: Option<DateTime<Utc>>) -> AppointmentSnapshot {
        let mut snapshot = AppointmentSnapshot::new(Uuid::new_v4(), Uuid::new_v4());
        snapshot.raw_status = raw.to_string();
        snapshot.payment.provider_verified = true;
        snapshot.assigned_operator_id = Some(Uuid::new_v4());
        snapshot.scheduled_at = scheduled_at;
        snapshot
    }

    fn ids(appointments: &[ResolvedAppointment]) -> Vec<Uuid> {
        appointments.iter().map(|a| a.snapshot.id).collect()
    }

    #[test]
    fn test_upcoming_uses_resolved_status() {
        let future = appointment("confirmed", Some(now() + Duration::days(1)));
        let past = appointment("confirmed", Some(now() - Duration::days(1)));
        let mut unpaid = appointment("approved", Some(now() + Duration::days(2)));
        unpaid.payment.provider_verified = false;
        let mut rescheduled = appointment("confirmed", Some(now() + Duration::hours(3)));
        rescheduled.rescheduled = true;

        let expected = vec![future.id, rescheduled.id];
        let result = service().filter_appointments(
            vec![future, past, unpaid, rescheduled],
            &AppointmentFilter::Upcoming,
            now(),
        );
        assert_eq!(ids(&result), expected);
    }

    #[test]
    fn test_awaiting_payment_includes_reversed_payments() {
        let mut reversed = appointment("confirmed", Some(now()));
        reversed.payment.provider_verified = false;
        let paid = appointment("confirmed", Some(now()));

        let result = service().filter_appointments(
            vec![reversed.clone(), paid],
            &AppointmentFilter::AwaitingPayment,
            now(),
        );
        assert_eq!(ids(&result), vec![reversed.id]);
    }

    #[test]
    fn test_fulfillment_predicates() {
        let awaiting_validation = appointment("completed", Some(now() - Duration::hours(2)));
        let mut validated = appointment("completed", Some(now() - Duration::hours(2)));
        validated.operator_validated = true;
        let mut paid_out = validated.clone();
        paid_out.id = Uuid::new_v4();
        paid_out.operator_paid_out = true;

        let snapshots = vec![awaiting_validation.clone(), validated.clone(), paid_out];
        let pending = service().filter_appointments(
            snapshots.clone(),
            &AppointmentFilter::AwaitingFulfillmentValidation,
            now(),
        );
        assert_eq!(ids(&pending), vec![awaiting_validation.id]);

        let unpaid_out = service().filter_appointments(snapshots, &AppointmentFilter::FulfilledUnpaidOut, now());
        assert_eq!(ids(&unpaid_out), vec![validated.id]);
    }

    #[test]
    fn test_active_excludes_closed_and_unpaid() {
        let snapshots = vec![
            appointment("awaiting_match", None),
            appointment("cancelled", None),
            appointment("missed", None),
            appointment("mystery", None),
            appointment("confirmed", Some(now())),
        ];
        let mut unpaid = appointment("awaiting_scheduling", None);
        unpaid.payment.provider_verified = false;

        let expected = vec![snapshots[0].id, snapshots[4].id];
        let mut all = snapshots;
        all.push(unpaid);
        let result = service().filter_appointments(all, &AppointmentFilter::Active, now());
        assert_eq!(ids(&result), expected);
    }

    #[test]
    fn test_date_predicates() {
        let today = appointment("confirmed", Some(now() + Duration::hours(3)));
        let monday = appointment("confirmed", Some(Utc.with_ymd_and_hms(2026, 4, 13, 9, 0, 0).unwrap()));
        let next_week = appointment("confirmed", Some(Utc.with_ymd_and_hms(2026, 4, 20, 9, 0, 0).unwrap()));
        let undated = appointment("awaiting_scheduling", None);
        let snapshots = vec![today.clone(), monday.clone(), next_week.clone(), undated];

        let result = service().filter_appointments(snapshots.clone(), &AppointmentFilter::Today, now());
        assert_eq!(ids(&result), vec![today.id]);

        let result = service().filter_appointments(snapshots.clone(), &AppointmentFilter::ThisWeek, now());
        assert_eq!(ids(&result), vec![today.id, monday.id]);

        let range = AppointmentFilter::ByDateRange {
            from: Utc.with_ymd_and_hms(2026, 4, 13, 9, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2026, 4, 20, 9, 0, 0).unwrap(),
        };
        let result = service().filter_appointments(snapshots, &range, now());
        assert_eq!(ids(&result), vec![today.id, monday.id]);
    }

    #[test]
    fn test_from_name_requires_params() {
        let params = FilterParams::default();
        assert_eq!(AppointmentFilter::from_name("active", &params).unwrap(), AppointmentFilter::Active);
        assert!(matches!(
            AppointmentFilter::from_name("by_owner", &params),
            Err(AppointmentError::InvalidFilterParams(_))
        ));
        assert!(matches!(
            AppointmentFilter::from_name("popular", &params),
            Err(AppointmentError::UnknownFilter(_))
        ));

        let owner = Uuid::new_v4();
        let params = FilterParams { owner_id: Some(owner), ..FilterParams::default() };
        assert_eq!(AppointmentFilter::from_name("by_owner", &params).unwrap(), AppointmentFilter::ByOwner(owner));
    }

    #[test]
    fn test_status_priority_sort_breaks_ties_by_date() {
        let early = appointment("confirmed", Some(now()));
        let late = appointment("confirmed", Some(now() + Duration::days(1)));
        let matching = appointment("awaiting_match", None);
        let cancelled = appointment("cancelled", Some(now() - Duration::days(3)));

        let mut resolved = service().resolve_all(vec![cancelled.clone(), matching.clone(), late.clone(), early.clone()]);
        sort_appointments(&mut resolved, SortOrder::StatusPriority);
        assert_eq!(ids(&resolved), vec![early.id, late.id, matching.id, cancelled.id]);

        sort_appointments(&mut resolved, SortOrder::DateDescending);
        assert_eq!(ids(&resolved), vec![late.id, early.id, cancelled.id, matching.id]);
    }
}
