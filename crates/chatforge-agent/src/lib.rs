//! # ChatForge Agent
//!
//! The conversational orchestrator: one user message drives one sequential
//! pipeline — rate check → retrieve → generate → optional tool round-trip —
//! surfaced to the caller as an ordered stream of [`StreamFragment`]s.
//!
//! ## Turn lifecycle
//! ```text
//! user message
//!   ↓ RateLimiter — reject ⇒ one warning fragment, done
//!   ↓ embed query + RagService::search (best effort, failures swallowed)
//!   ↓ system instruction = persona + tool directives + knowledge context
//!   ↓ ChatProvider::stream_chat
//!   ├─ text/citations ⇒ fragments (sources de-duplicated by URL)
//!   └─ function call ⇒ execute tool, send result back, relay continuation
//!   ↓ done (stream ends) — errors become one diagnostic fragment
//! ```
//!
//! Each turn's stream is lazy, finite, and non-restartable; a new message
//! starts a new stream. Dropping the stream mid-turn drops the provider
//! stream and with it the outbound connection.

pub mod embed;
pub mod session;

pub use embed::GatedEmbedder;
pub use session::{ChatSession, FragmentStream};
