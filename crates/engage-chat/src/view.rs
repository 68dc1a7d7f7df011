//! The three-state view machine and its serializable snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use engage_core::types::{Delivery, Message, Patient, SessionData};
use serde::{Deserialize, Serialize};

use crate::archive::AnalyticsReport;
use crate::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewName {
    Landing,
    Chat,
    Analytics,
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewName::Landing => "landing",
            ViewName::Chat => "chat",
            ViewName::Analytics => "analytics",
        };
        f.write_str(name)
    }
}

/// Transient flags of the landing view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandingState {
    pub generating_prompts: bool,
    /// A scripted demo chat is being prepared.
    pub simulating: bool,
}

/// Everything belonging to the conversation on screen.
#[derive(Debug, Clone)]
pub struct ChatState {
    pub patient: Patient,
    pub session: SessionStore,
    pub messages: Vec<Message>,
    /// Backend session id, absent when the backend could not be reached.
    pub backend_session: Option<String>,
    /// A reply is pending.
    pub composing: bool,
    /// Identifies this chat among all chats opened by the controller.
    pub generation: u64,
    next_message_id: u64,
}

impl ChatState {
    pub fn new(patient: Patient, generation: u64) -> Self {
        let mut session = SessionStore::new();
        session.start(patient.id);
        Self {
            patient,
            session,
            messages: Vec::new(),
            backend_session: None,
            composing: false,
            generation,
            next_message_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        id
    }

    /// Append a pending user turn and return its id.
    pub fn push_user(&mut self, content: &str, at: DateTime<Utc>) -> u64 {
        let id = self.next_id();
        self.messages.push(Message::user(id, content, at));
        id
    }

    pub fn push_ai(&mut self, content: &str, at: DateTime<Utc>, scheduling_url: &str) -> u64 {
        let id = self.next_id();
        self.messages.push(Message::ai(id, content, at, scheduling_url));
        id
    }

    pub fn set_delivery(&mut self, message_id: u64, delivery: Delivery) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == message_id) {
            msg.delivery = delivery;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.backend_session.is_some()
    }
}

/// Exactly one view is active at a time.
#[derive(Debug, Clone)]
pub enum View {
    Landing(LandingState),
    Chat(Box<ChatState>),
    Analytics(AnalyticsReport),
}

impl Default for View {
    fn default() -> Self {
        View::Landing(LandingState::default())
    }
}

impl View {
    pub fn name(&self) -> ViewName {
        match self {
            View::Landing(_) => ViewName::Landing,
            View::Chat(_) => ViewName::Chat,
            View::Analytics(_) => ViewName::Analytics,
        }
    }

    /// The chat with the given generation, if it is still on screen.
    pub fn chat_mut(&mut self, generation: u64) -> Option<&mut ChatState> {
        match self {
            View::Chat(chat) if chat.generation == generation => Some(&mut **chat),
            _ => None,
        }
    }

    pub fn snapshot(&self, prompts: &[String]) -> ViewSnapshot {
        match self {
            View::Landing(landing) => ViewSnapshot::Landing {
                prompts: prompts.to_vec(),
                generating_prompts: landing.generating_prompts,
                simulating: landing.simulating,
            },
            View::Chat(chat) => ViewSnapshot::Chat {
                patient: chat.patient.clone(),
                session: chat.session.snapshot(),
                messages: chat.messages.clone(),
                composing: chat.composing,
                connected: chat.is_connected(),
            },
            View::Analytics(report) => ViewSnapshot::Analytics {
                report: report.clone(),
            },
        }
    }
}

/// What a client needs to render the active view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum ViewSnapshot {
    Landing {
        prompts: Vec<String>,
        generating_prompts: bool,
        simulating: bool,
    },
    Chat {
        patient: Patient,
        session: Option<SessionData>,
        messages: Vec<Message>,
        composing: bool,
        connected: bool,
    },
    Analytics {
        report: AnalyticsReport,
    },
}

impl ViewSnapshot {
    pub fn name(&self) -> ViewName {
        match self {
            ViewSnapshot::Landing { .. } => ViewName::Landing,
            ViewSnapshot::Chat { .. } => ViewName::Chat,
            ViewSnapshot::Analytics { .. } => ViewName::Analytics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engage_core::directory::demo_patients;
    use engage_core::types::Sender;

    #[test]
    fn test_view_name_display_and_serde() {
        assert_eq!(ViewName::Analytics.to_string(), "analytics");
        assert_eq!(serde_json::to_string(&ViewName::Landing).unwrap(), "\"landing\"");
        let parsed: ViewName = serde_json::from_str("\"chat\"").unwrap();
        assert_eq!(parsed, ViewName::Chat);
    }

    #[test]
    fn test_default_view_is_landing() {
        assert_eq!(View::default().name(), ViewName::Landing);
    }

    #[test]
    fn test_chat_state_opens_session_and_numbers_messages() {
        let patient = demo_patients().remove(1);
        let mut chat = ChatState::new(patient, 3);
        assert!(chat.session.is_active());
        assert!(!chat.is_connected());

        let now = Utc::now();
        let first = chat.push_ai("Welcome!", now, "");
        let second = chat.push_user("hi", now);
        assert_eq!((first, second), (1, 2));
        assert_eq!(chat.messages[1].sender, Sender::User);
        assert_eq!(chat.messages[1].delivery, Delivery::Pending);

        chat.set_delivery(second, Delivery::Delivered);
        assert_eq!(chat.messages[1].delivery, Delivery::Delivered);
    }

    #[test]
    fn test_chat_mut_checks_generation() {
        let patient = demo_patients().remove(0);
        let mut view = View::Chat(Box::new(ChatState::new(patient, 5)));
        assert!(view.chat_mut(5).is_some());
        assert!(view.chat_mut(4).is_none());
        assert!(View::default().chat_mut(5).is_none());
    }

    #[test]
    fn test_snapshot_is_tagged() {
        let view = View::default();
        let json = serde_json::to_value(view.snapshot(&["a".to_string()])).unwrap();
        assert_eq!(json["view"], "landing");
        assert_eq!(json["prompts"][0], "a");
        assert_eq!(json["simulating"], false);
    }
}
