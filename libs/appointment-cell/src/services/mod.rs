pub mod filters;
pub mod graph;
pub mod legacy;
pub mod lifecycle;
pub mod resolver;
pub mod store;
pub mod transition;

pub use filters::{AppointmentFilter, AppointmentQueryService, FilterParams, ResolvedAppointment, SortOrder};
pub use legacy::{map_status_token, MappedStatus};
pub use lifecycle::TransitionValidator;
pub use resolver::StatusResolver;
pub use store::{AppointmentStore, InMemoryAppointmentStore, PaymentVerifier, StoreError};
pub use transition::TransitionService;
