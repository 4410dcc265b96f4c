//! Quota-aware multi-account request routing.

pub mod classify;
pub mod parser;
pub mod quota;
pub mod retry;
pub mod router;
pub mod selector;
pub mod transport;

pub use classify::{
    analyze, classify, classify_status, decide, should_failover, AttemptDecision, ErrorCategory,
    FailureAnalysis,
};
pub use parser::{is_permission_denied, parse_duration_ms, parse_retry_hint_ms};
pub use quota::{quota_key, QuotaStateManager};
pub use retry::{RetryPolicy, RetryWait};
pub use router::{RequestRouter, RouterDeps};
pub use selector::{AccountSelector, SelectionPrefs};
pub use transport::{collect_stream, ByteStream, HttpTransport, Transport, TransportOutcome};
