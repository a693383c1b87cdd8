//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → server.rs (hyper-util auto builder, header read timeout)
//!     → request.rs (assign/propagate request ID)
//!     → filter.rs (deadline, JSON body check)
//!     → application routes | liveness | catch-all NOT_FOUND
//!       (extract.rs: body rejections as INVALID_REQUEST)
//!     → response.rs (structured ApiResponse body)
//! ```

pub mod extract;
pub mod filter;
pub mod request;
pub mod response;
pub mod server;

pub use extract::ApiJson;
pub use filter::TimeoutPolicy;
pub use request::X_REQUEST_ID;
pub use response::{ApiResponse, ResponseKind};
pub use server::{HttpServer, ServerError, ServerHandle};
