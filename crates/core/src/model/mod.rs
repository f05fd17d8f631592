mod input;
pub(crate) mod plan;
mod session;
mod weakness;

pub use input::{ExamDateMap, InputValidationError, Severity, Subject, SubjectList};
pub use plan::{
    DEFAULT_TIPS, MalformedPlanError, MalformedReason, PlanDocument, ProgressStats, SessionRef,
    SlotMap, TIME_OF_DAY_SLOTS,
};
pub use session::{ParseStatusError, Session, SessionStatus, parse_hours};
pub use weakness::{DEFAULT_DEBOUNCE_MS, DraftKey, WeaknessMap, WeaknessRegistry};
