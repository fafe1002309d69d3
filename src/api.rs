//! LLM API access: provider adapters, the optimization orchestrator and
//! connection checks.

pub mod connection;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use connection::{test_api_connection, validate_provider_config, ConnectionReport};
pub use error::{AbortReason, ApiError, ErrorKind};
pub use orchestrator::{OptimizeOptions, Optimizer};
pub use provider::{ProviderAdapter, ProviderRegistry};
pub use types::{NormalizedRequest, NormalizedResult, ProviderConfig, RawHttpResponse, Usage};
