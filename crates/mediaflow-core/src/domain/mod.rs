//! Domain model (ids, status, requests, outcomes, policies, decisions).
//!
//! No I/O lives here. Everything in this module is plain data or a pure
//! function over plain data.

pub mod attempt;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod policy;
pub mod poll;
pub mod request;
pub mod status;

pub use attempt::CycleRecord;
pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{DriverError, FailureKind, PollError, SubmitError};
pub use ids::{CycleId, GenerationId, ProviderId, TaskHandle};
pub use outcome::{
    CycleOutcome, GenerationOutput, GenerationResult, ResultMetadata, StatusReport, TimeoutReason,
};
pub use policy::{
    DEFAULT_CONTENT_FLAG_PHRASES, PollCadence, PollPolicy, RetryPolicy, is_content_flag,
};
pub use poll::{PollObservation, PollState, PollStep, PollVerdict};
pub use request::{GenerationCall, GenerationRequest, MediaInput, ProviderSelection, SubmissionPayload};
pub use status::TaskStatus;
