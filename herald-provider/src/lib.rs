//! Typed clients for the external email and SMS providers.
//!
//! Each client follows the same lifecycle: `initialize(config)` exactly once,
//! then sends and delivery-report queries under the configured deadline, with
//! `health_check` only succeeding after initialization. Wire transports are
//! trait objects so tests and single-node deployments can run against the
//! in-memory implementations.

pub mod email;
pub mod error;
pub mod sms;
pub mod transport;

pub use email::{
    EmailClient, EmailProviderConfig, SendEmailRequest, SendEmailResponse,
};
pub use error::{PermanentError, ProviderError, TransientError};
pub use sms::{
    SendSmsRequest, SendSmsResponse, SmsClient, SmsProviderConfig, SmsRecipientResult,
};
pub use transport::{
    EmailTransport, MemoryEmailTransport, MemorySmsTransport, SmsTransport,
};
