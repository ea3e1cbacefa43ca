//! Public types for the gateway API.

mod operation;
mod options;
mod outcome;
mod response;

pub use operation::OperationKind;
pub use options::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, GenerationParams, RequestInput,
    collapse_whitespace,
};
pub use outcome::CallOutcome;
pub use response::{Enforced, GatewayResponse, Source};
