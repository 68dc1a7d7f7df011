//! Conversation controller: the single owner of view state.
//!
//! Every UI action goes through here. State lives behind one
//! `std::sync::Mutex` that is only held for short critical sections; backend
//! calls run with the lock released. Each chat carries a generation number and
//! a backend result is applied only if that chat is still on screen.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use engage_core::config::EngageConfig;
use engage_core::directory::{self, demo_patients, SCHEDULING_URL};
use engage_core::types::{
    AppointmentDetails, ChatRecord, Delivery, NewPatientForm, Patient, PatientId,
    SCHEDULED_ONLINE_OUTCOME,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::archive::{AnalyticsReport, SessionArchive};
use crate::backend::{BackendError, ChatBackend, PromptGenerator, SessionStart};
use crate::briefing::{BriefingBuilder, OPENING_INSTRUCTION};
use crate::error::ChatError;
use crate::tags::TagExtractor;
use crate::view::{ChatState, LandingState, View, ViewName, ViewSnapshot};

/// Shown when the opening call to the backend fails.
pub const CONNECT_APOLOGY: &str =
    "I'm sorry, I'm having trouble connecting right now. Please try again later.";

/// Shown when a follow-up message fails.
pub const SEND_APOLOGY: &str =
    "I'm having some trouble at the moment. Please give me a minute and try again.";

/// Why a send was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BlankMessage,
    NoBackendSession,
    ReplyPending,
}

/// How a backend exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SendOutcome {
    Skipped(SkipReason),
    /// The reply was appended to the chat.
    Replied,
    /// The backend failed and an apology was appended instead.
    Failed,
    /// The chat was closed before the backend answered.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub scheduling_url: String,
    /// Name of the patient used for simulated chats.
    pub demo_patient: String,
    pub max_message_length: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            scheduling_url: SCHEDULING_URL.to_string(),
            demo_patient: "James Washington".to_string(),
            max_message_length: 2000,
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &EngageConfig) -> Self {
        Self {
            scheduling_url: config.clinic.scheduling_url.clone(),
            demo_patient: config.clinic.demo_patient.clone(),
            max_message_length: config.chat.max_message_length,
        }
    }
}

struct ControllerState {
    view: View,
    prompts: Vec<String>,
    archive: SessionArchive,
    last_generation: u64,
}

impl ControllerState {
    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }
}

/// Work whose in-progress flag must not outlive the future awaiting it.
#[derive(Debug, Clone, Copy)]
enum PendingWork {
    Simulation,
    Prompts,
    Reply {
        generation: u64,
        /// User turn waiting on the reply; `None` for the opening call.
        message_id: Option<u64>,
        apology: &'static str,
    },
}

/// Resets the flag for `work` if the future is dropped mid-await, as happens
/// on client disconnect or a caller-side timeout. The normal path disarms it.
struct PendingGuard<'a> {
    controller: &'a ConversationController,
    work: PendingWork,
    /// Backend session opened before the drop; closed in the background.
    orphan_session: Option<String>,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(controller: &'a ConversationController, work: PendingWork) -> Self {
        Self {
            controller,
            work,
            orphan_session: None,
            armed: true,
        }
    }

    fn track_session(&mut self, session_id: &str) {
        self.orphan_session = Some(session_id.to_string());
    }

    fn disarm(mut self) {
        self.armed = false;
    }

    fn reset(&self, view: &mut View) -> bool {
        match self.work {
            PendingWork::Simulation => match view {
                View::Landing(landing) => std::mem::take(&mut landing.simulating),
                _ => false,
            },
            PendingWork::Prompts => match view {
                View::Landing(landing) => std::mem::take(&mut landing.generating_prompts),
                _ => false,
            },
            PendingWork::Reply {
                generation,
                message_id,
                apology,
            } => {
                let Some(chat) = view.chat_mut(generation) else {
                    return false;
                };
                if !std::mem::take(&mut chat.composing) {
                    return false;
                }
                if let Some(id) = message_id {
                    chat.set_delivery(id, Delivery::Failed);
                }
                chat.push_ai(apology, Utc::now(), &self.controller.settings.scheduling_url);
                true
            }
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let reset = match self.controller.state.lock() {
            Ok(mut state) => self.reset(&mut state.view),
            Err(_) => false,
        };
        if reset {
            tracing::warn!(work = ?self.work, "Backend call abandoned, pending state reset");
            self.controller.publish();
        }

        if let Some(session_id) = self.orphan_session.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let backend = Arc::clone(&self.controller.backend);
                handle.spawn(async move { backend.end_session(&session_id).await });
            }
        }
    }
}

pub struct ConversationController {
    backend: Arc<dyn ChatBackend>,
    prompt_generator: Arc<dyn PromptGenerator>,
    briefing: BriefingBuilder,
    extractor: TagExtractor,
    settings: ControllerSettings,
    patients: Vec<Patient>,
    state: Mutex<ControllerState>,
    events: Option<broadcast::Sender<ViewSnapshot>>,
}

impl ConversationController {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        prompt_generator: Arc<dyn PromptGenerator>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            backend,
            prompt_generator,
            briefing: BriefingBuilder::new(settings.scheduling_url.clone()),
            extractor: TagExtractor,
            settings,
            patients: demo_patients(),
            state: Mutex::new(ControllerState {
                view: View::default(),
                prompts: directory::default_prompts(),
                archive: SessionArchive::new(),
                last_generation: 0,
            }),
            events: None,
        }
    }

    pub fn with_patients(mut self, patients: Vec<Patient>) -> Self {
        self.patients = patients;
        self
    }

    /// Publish a snapshot on `tx` after every state change.
    pub fn with_events(mut self, tx: broadcast::Sender<ViewSnapshot>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    fn lock(&self) -> Result<MutexGuard<'_, ControllerState>, ChatError> {
        self.state
            .lock()
            .map_err(|e| ChatError::StateError(format!("controller lock poisoned: {}", e)))
    }

    fn publish(&self) {
        let Some(tx) = &self.events else {
            return;
        };
        if let Ok(state) = self.state.lock() {
            // No subscribers is fine.
            let _ = tx.send(state.view.snapshot(&state.prompts));
        }
    }

    fn apply_reply(&self, chat: &mut ChatState, raw: &str) {
        let reply = self.extractor.extract(raw);
        if reply.has_tags() {
            tracing::debug!(
                generation = chat.generation,
                needs = ?reply.needs,
                notes = ?reply.notes,
                "Directives extracted"
            );
        }
        chat.session.append_needs(reply.needs);
        chat.session.append_notes(reply.notes);
        chat.push_ai(&reply.text, Utc::now(), &self.settings.scheduling_url);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn view(&self) -> Result<ViewSnapshot, ChatError> {
        let state = self.lock()?;
        Ok(state.view.snapshot(&state.prompts))
    }

    pub fn view_name(&self) -> Result<ViewName, ChatError> {
        Ok(self.lock()?.view.name())
    }

    pub fn prompts(&self) -> Result<Vec<String>, ChatError> {
        Ok(self.lock()?.prompts.clone())
    }

    pub fn report(&self) -> Result<AnalyticsReport, ChatError> {
        Ok(self.lock()?.archive.report())
    }

    pub fn archived_sessions(&self) -> Result<usize, ChatError> {
        Ok(self.lock()?.archive.len())
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// Open a chat with a directory patient.
    pub async fn start_with_patient(&self, patient_id: PatientId) -> Result<SendOutcome, ChatError> {
        let patient = directory::find_patient(&self.patients, patient_id)
            .cloned()
            .ok_or(ChatError::PatientNotFound(patient_id))?;
        self.start_conversation(patient).await
    }

    /// Open a chat with a patient entered through the new-patient form.
    pub async fn start_with_new_patient(
        &self,
        form: NewPatientForm,
    ) -> Result<SendOutcome, ChatError> {
        let id = Utc::now().timestamp_millis().max(0) as u64;
        let patient = form.into_patient(id)?;
        self.start_conversation(patient).await
    }

    /// Landing to chat. A backend failure leaves the chat open with an
    /// apology and no backend session.
    pub async fn start_conversation(&self, patient: Patient) -> Result<SendOutcome, ChatError> {
        let context = self.briefing.build(&patient);
        let generation = {
            let mut state = self.lock()?;
            match &state.view {
                View::Landing(landing) if landing.simulating => {
                    return Err(ChatError::Busy(
                        "a simulated chat is being prepared".to_string(),
                    ));
                }
                View::Landing(_) => {}
                other => {
                    return Err(ChatError::InvalidTransition {
                        view: other.name(),
                        action: "start a conversation",
                    });
                }
            }
            let generation = state.next_generation();
            tracing::info!(patient_id = patient.id, generation, "Conversation started");
            let mut chat = ChatState::new(patient, generation);
            chat.composing = true;
            state.view = View::Chat(Box::new(chat));
            generation
        };
        self.publish();

        let guard = PendingGuard::new(
            self,
            PendingWork::Reply {
                generation,
                message_id: None,
                apology: CONNECT_APOLOGY,
            },
        );
        let result = self
            .backend
            .start_session(&context, OPENING_INSTRUCTION)
            .await;
        guard.disarm();

        let (outcome, orphan) = {
            let mut state = self.lock()?;
            let chat = state.view.chat_mut(generation);
            match chat {
                None => {
                    tracing::debug!(generation, "Chat closed before the opening reply arrived");
                    (SendOutcome::Discarded, result.ok().map(|start| start.session_id))
                }
                Some(chat) => {
                    chat.composing = false;
                    let outcome = match result {
                        Ok(start) => {
                            tracing::debug!(backend_session = %start.session_id, "Backend session opened");
                            chat.backend_session = Some(start.session_id);
                            self.apply_reply(chat, &start.response_text);
                            SendOutcome::Replied
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, generation, "Failed to open backend session");
                            chat.push_ai(CONNECT_APOLOGY, Utc::now(), &self.settings.scheduling_url);
                            SendOutcome::Failed
                        }
                    };
                    (outcome, None)
                }
            }
        };
        self.publish();

        if let Some(session_id) = orphan {
            self.backend.end_session(&session_id).await;
        }
        Ok(outcome)
    }

    /// Chat to chat. Blank text, a missing backend session or a pending reply
    /// make this a no-op.
    pub async fn send_user_message(&self, text: &str) -> Result<SendOutcome, ChatError> {
        let (generation, session_id, message_id) = {
            let mut state = self.lock()?;
            let chat = match &mut state.view {
                View::Chat(chat) => chat,
                other => {
                    return Err(ChatError::InvalidTransition {
                        view: other.name(),
                        action: "send a message",
                    });
                }
            };

            if text.trim().is_empty() {
                return Ok(SendOutcome::Skipped(SkipReason::BlankMessage));
            }
            if text.chars().count() > self.settings.max_message_length {
                return Err(ChatError::MessageTooLong(self.settings.max_message_length));
            }
            let Some(session_id) = chat.backend_session.clone() else {
                return Ok(SendOutcome::Skipped(SkipReason::NoBackendSession));
            };
            if chat.composing {
                return Ok(SendOutcome::Skipped(SkipReason::ReplyPending));
            }

            let message_id = chat.push_user(text, Utc::now());
            chat.composing = true;
            (chat.generation, session_id, message_id)
        };
        self.publish();

        let guard = PendingGuard::new(
            self,
            PendingWork::Reply {
                generation,
                message_id: Some(message_id),
                apology: SEND_APOLOGY,
            },
        );
        let result = self.backend.send_message(&session_id, text).await;
        guard.disarm();

        let outcome = {
            let mut state = self.lock()?;
            let Some(chat) = state.view.chat_mut(generation) else {
                // The session was closed along with the chat.
                tracing::debug!(generation, "Chat closed before the reply arrived");
                return Ok(SendOutcome::Discarded);
            };
            chat.composing = false;
            match result {
                Ok(raw) => {
                    chat.set_delivery(message_id, Delivery::Delivered);
                    self.apply_reply(chat, &raw);
                    SendOutcome::Replied
                }
                Err(e) => {
                    tracing::warn!(error = %e, backend_session = %session_id, "Message send failed");
                    chat.set_delivery(message_id, Delivery::Failed);
                    chat.push_ai(SEND_APOLOGY, Utc::now(), &self.settings.scheduling_url);
                    SendOutcome::Failed
                }
            }
        };
        self.publish();
        Ok(outcome)
    }

    /// Mark the open session as converted to an online booking.
    pub fn record_conversion(&self) -> Result<(), ChatError> {
        {
            let mut state = self.lock()?;
            let chat = match &mut state.view {
                View::Chat(chat) => chat,
                other => {
                    return Err(ChatError::InvalidTransition {
                        view: other.name(),
                        action: "record a conversion",
                    });
                }
            };
            chat.session.record_outcome(SCHEDULED_ONLINE_OUTCOME);
            tracing::info!(generation = chat.generation, "Conversion recorded");
        }
        self.publish();
        Ok(())
    }

    /// Attach a booked appointment to the open session.
    pub fn record_appointment(&self, details: AppointmentDetails) -> Result<(), ChatError> {
        if [&details.time, &details.provider, &details.location]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(ChatError::InvalidInput(
                "appointment time, provider and location are required".to_string(),
            ));
        }
        {
            let mut state = self.lock()?;
            let chat = match &mut state.view {
                View::Chat(chat) => chat,
                other => {
                    return Err(ChatError::InvalidTransition {
                        view: other.name(),
                        action: "record an appointment",
                    });
                }
            };
            tracing::info!(
                generation = chat.generation,
                provider = %details.provider,
                "Appointment recorded"
            );
            chat.session.record_appointment(details);
        }
        self.publish();
        Ok(())
    }

    /// Chat to landing. Archives the session, releases the backend session
    /// and returns the record.
    pub async fn end_conversation(&self) -> Result<ChatRecord, ChatError> {
        let (record, backend_session) = {
            let mut state = self.lock()?;
            if !matches!(state.view, View::Chat(_)) {
                return Err(ChatError::InvalidTransition {
                    view: state.view.name(),
                    action: "end the conversation",
                });
            }
            let View::Chat(mut chat) = std::mem::take(&mut state.view) else {
                return Err(ChatError::StateError("chat view vanished".to_string()));
            };
            let session = chat
                .session
                .clear()
                .ok_or_else(|| ChatError::StateError("chat has no open session".to_string()))?;
            let record = ChatRecord::from_session(&session, &chat.patient, Utc::now());
            state.archive.append(record.clone());
            (record, chat.backend_session.take())
        };
        self.publish();

        if let Some(session_id) = backend_session {
            self.backend.end_session(&session_id).await;
        }
        Ok(record)
    }

    /// Landing to chat with a scripted opening: the demo patient, the
    /// backend's welcome, `prompt` and the backend's answer to it. The view
    /// only switches once the whole transcript is ready; on failure it stays
    /// on landing.
    pub async fn start_simulated_chat(&self, prompt: &str) -> Result<(), ChatError> {
        if prompt.trim().is_empty() {
            return Err(ChatError::InvalidInput("prompt must not be empty".to_string()));
        }
        if prompt.chars().count() > self.settings.max_message_length {
            return Err(ChatError::MessageTooLong(self.settings.max_message_length));
        }
        let patient = directory::demo_patient(&self.patients, &self.settings.demo_patient)
            .cloned()
            .ok_or(ChatError::NoDemoPatient)?;

        {
            let mut state = self.lock()?;
            match &mut state.view {
                View::Landing(landing) if landing.simulating => {
                    return Err(ChatError::Busy(
                        "a simulated chat is already being prepared".to_string(),
                    ));
                }
                View::Landing(landing) => landing.simulating = true,
                other => {
                    return Err(ChatError::InvalidTransition {
                        view: other.name(),
                        action: "start a simulated chat",
                    });
                }
            }
        }
        self.publish();

        let context = self.briefing.build(&patient);
        let mut guard = PendingGuard::new(self, PendingWork::Simulation);
        let exchange: Result<(SessionStart, String), (BackendError, Option<String>)> =
            match self.backend.start_session(&context, OPENING_INSTRUCTION).await {
                Err(e) => Err((e, None)),
                Ok(start) => {
                    guard.track_session(&start.session_id);
                    match self.backend.send_message(&start.session_id, prompt).await {
                        Ok(reply) => Ok((start, reply)),
                        Err(e) => Err((e, Some(start.session_id))),
                    }
                }
            };
        guard.disarm();

        let (result, orphan) = {
            let mut state = self.lock()?;
            match exchange {
                Err((e, orphan)) => {
                    tracing::warn!(error = %e, "Simulated chat failed");
                    if let View::Landing(landing) = &mut state.view {
                        landing.simulating = false;
                    }
                    (Err(ChatError::Backend(e)), orphan)
                }
                Ok((start, reply)) => {
                    let generation = state.next_generation();
                    let now = Utc::now();
                    let mut chat = ChatState::new(patient, generation);
                    chat.backend_session = Some(start.session_id);
                    self.apply_reply(&mut chat, &start.response_text);
                    let user_id = chat.push_user(prompt, now);
                    chat.set_delivery(user_id, Delivery::Delivered);
                    self.apply_reply(&mut chat, &reply);
                    tracing::info!(
                        patient_id = chat.patient.id,
                        generation,
                        "Simulated chat started"
                    );
                    state.view = View::Chat(Box::new(chat));
                    (Ok(()), None)
                }
            }
        };
        self.publish();

        if let Some(session_id) = orphan {
            self.backend.end_session(&session_id).await;
        }
        result
    }

    // =========================================================================
    // Landing and analytics
    // =========================================================================

    /// Replace the example prompts. Falls back to the built-in list when the
    /// generator fails or returns nothing.
    pub async fn generate_example_prompts(&self) -> Result<Vec<String>, ChatError> {
        {
            let mut state = self.lock()?;
            match &mut state.view {
                View::Landing(landing) if landing.generating_prompts => {
                    return Err(ChatError::Busy("prompts are already being generated".to_string()));
                }
                View::Landing(landing) => landing.generating_prompts = true,
                other => {
                    return Err(ChatError::InvalidTransition {
                        view: other.name(),
                        action: "generate prompts",
                    });
                }
            }
        }
        self.publish();

        let guard = PendingGuard::new(self, PendingWork::Prompts);
        let generated = self.prompt_generator.generate_prompts().await;
        guard.disarm();

        let prompts = match generated {
            Ok(list) => {
                let list: Vec<String> = list
                    .into_iter()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                if list.is_empty() {
                    tracing::warn!("Prompt generator returned nothing, using defaults");
                    directory::default_prompts()
                } else {
                    list
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Prompt generation failed, using defaults");
                directory::default_prompts()
            }
        };

        {
            let mut state = self.lock()?;
            state.prompts = prompts.clone();
            if let View::Landing(landing) = &mut state.view {
                landing.generating_prompts = false;
            }
        }
        self.publish();
        Ok(prompts)
    }

    /// Landing (or analytics) to analytics with a freshly computed report.
    pub fn show_analytics(&self) -> Result<AnalyticsReport, ChatError> {
        let report = {
            let mut state = self.lock()?;
            match &state.view {
                View::Landing(landing) if landing.simulating => {
                    return Err(ChatError::Busy(
                        "a simulated chat is being prepared".to_string(),
                    ));
                }
                View::Landing(_) | View::Analytics(_) => {}
                View::Chat(_) => {
                    return Err(ChatError::InvalidTransition {
                        view: ViewName::Chat,
                        action: "open analytics",
                    });
                }
            }
            let report = state.archive.report();
            state.view = View::Analytics(report.clone());
            report
        };
        self.publish();
        Ok(report)
    }

    /// Analytics (or landing) to landing.
    pub fn show_landing(&self) -> Result<(), ChatError> {
        {
            let mut state = self.lock()?;
            match state.view.name() {
                ViewName::Analytics => state.view = View::Landing(LandingState::default()),
                ViewName::Landing => {}
                ViewName::Chat => {
                    return Err(ChatError::InvalidTransition {
                        view: ViewName::Chat,
                        action: "return to landing",
                    });
                }
            }
        }
        self.publish();
        Ok(())
    }

    /// Navigate to a top-level view by name. Chat is only reachable by
    /// starting a conversation.
    pub fn navigate(&self, target: ViewName) -> Result<ViewSnapshot, ChatError> {
        match target {
            ViewName::Landing => self.show_landing()?,
            ViewName::Analytics => {
                self.show_analytics()?;
            }
            ViewName::Chat => {
                return Err(ChatError::InvalidInput(
                    "start a conversation to open the chat view".to_string(),
                ));
            }
        }
        self.view()
    }
}
