//! HTTP protocol implementation.
//!
//! One request per connection: the head is parsed, the matched handler runs,
//! the response is written and the socket is closed.
//!
//! # Architecture
//!
//! - **`scanner`**: Separator-driven byte reader with a Content-Length budget
//! - **`parser`**: Request line and header block parsing
//! - **`request`**: Parsed request, query string access
//! - **`context`**: What a handler sees: request, lazy body reads, response
//! - **`multipart`**: `multipart/form-data` decoding with on-disk staging
//! - **`response`**: Response being built, status codes, helper bodies
//! - **`writer`**: Serializes a response to the client
//! - **`mime`**: MIME type detection based on file extensions
//! - **`connection`**: Per-connection state machine
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Parse request line and headers
//!        └──────┬──────┘
//!               │ Request parsed (malformed → 400 → Writing)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Route lookup, run handler
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │
//!               ▼
//!             Closed
//! ```

pub mod connection;
pub mod context;
pub mod mime;
pub mod multipart;
pub mod parser;
pub mod request;
pub mod response;
pub mod scanner;
pub mod writer;
