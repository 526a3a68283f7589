//! Outbound calls: validation, the in-flight registry and the call log.

pub mod coordinator;
pub mod log_store;
pub mod registry;

pub use coordinator::{CallCoordinator, DialOutcome, DialRequest, validate_phone_number};
pub use log_store::{CallLog, CallLogFilter, CallLogStore, MemoryCallLogStore, NewCallLog};
pub use registry::{CallIdGenerator, CallRegistry, CallSession};
