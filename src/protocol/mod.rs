//! Wire protocol between the evaluation proxy and an isolated host.
//!
//! Every frame is a JSON text message:
//!
//! ```json
//! {"id": "corr_01h455vb4pex5vsknk084sn02q", "kind": "eval-request", "payload": {"script": ["..."]}}
//! {"kind": "event", "payload": {"type": "console", "level": "warn", "args": ["..."]}}
//! ```

mod envelope;
mod event;

pub use envelope::{EnvelopeKind, EvalFailure, MessageEnvelope, NavigationRequest, CATCH_CLICKS};
pub use event::{display_value, error_message, ConsoleLevel, ConsoleLog, RuntimeEvent};
