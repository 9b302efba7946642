//! HTTP middleware components.

pub mod canonical_host;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod security_headers;
pub mod trace_id;

pub use canonical_host::canonical_host;
pub use metrics::{init_metrics, metrics_handler, metrics_middleware};
pub use rate_limit::{redeem_rate_limit, RateLimiterState};
pub use security_headers::security_headers;
pub use trace_id::{trace_id, RequestId, REQUEST_ID_HEADER};
