//! HTTP transport layer.

mod http;

pub use http::{Credentials, HttpTransport, RawResponse, TransportError};
