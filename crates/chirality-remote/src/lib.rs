//! Network-backed resolution for the chirality algebra
//!
//! [`RemoteResolver`] turns a [`ResolveRequest`](chirality_algebra::ResolveRequest)
//! into an OpenAI-compatible chat completion, retries transient failures
//! with exponential backoff, and accepts only payloads of the exact
//! expected shape.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = HttpChatTransport::new(DEFAULT_BASE_URL, Some(key), Duration::from_secs(60))?;
//! let resolver = RemoteResolver::new(Arc::new(transport), "gpt-4o");
//! let algebra = Algebra::new(Arc::new(resolver));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod payload;
mod resolver;
mod retry;
mod transport;

pub use error::TransportError;
pub use payload::parse_payload;
pub use resolver::{temperature, RemoteResolver, DEFAULT_MAX_TOKENS};
pub use retry::RetryPolicy;
pub use transport::{
    ChatMessage, ChatRequest, ChatTransport, HttpChatTransport, ResponseFormat, DEFAULT_BASE_URL,
};
