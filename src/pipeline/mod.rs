//! Ticket message pipeline.
//!
//! Every message posted in a ticket thread flows through:
//! 1. `GiftCardDetector::detect()`: fast pattern matching (no LLM)
//! 2. `AnswerService::answer()`: FAQ lookup + model call
//! 3. `MessageRouter`: picks exactly one action per message
//!
//! Gift-card messages never reach the model; they go to the payment channel.

pub mod alert;
pub mod answer;
pub mod router;
pub mod rules;
pub mod types;

pub use answer::{AnswerService, ESCALATION_MESSAGE};
pub use router::{MessageRouter, RouterConfig, RouterState};
pub use rules::GiftCardDetector;
pub use types::{InboundMessage, RouteOutcome, SupportPlatform};
