//! Conversation engine for Engage.
//!
//! Extracts analytics directives from assistant replies, tracks the active
//! session, archives completed sessions and drives the landing/chat/analytics
//! view machine against a pluggable chat backend.

pub mod archive;
pub mod backend;
pub mod briefing;
pub mod controller;
pub mod error;
pub mod gemini;
pub mod remote;
pub mod session;
pub mod tags;
pub mod view;

pub use archive::{AnalyticsReport, SessionArchive};
pub use backend::{BackendError, ChatBackend, PromptGenerator, SessionStart};
pub use briefing::{BriefingBuilder, OPENING_INSTRUCTION};
pub use controller::{ControllerSettings, ConversationController, SendOutcome, SkipReason};
pub use error::ChatError;
pub use gemini::GeminiBackend;
pub use remote::RemoteChatBackend;
pub use session::SessionStore;
pub use tags::{Directive, ExtractedReply, TagExtractor};
pub use view::{ChatState, LandingState, View, ViewName, ViewSnapshot};
