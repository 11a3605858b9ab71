//! Conversation state driven by the chat event stream.
//!
//! [`ChatOrchestrator`] owns the session list, the messages of the current
//! session and the streaming flags. It opens one stream per user turn through
//! a [`ChatBackend`], feeds it through a [`StreamConsumer`] and folds every
//! event into state. Observers follow along through [`ChatOrchestrator::subscribe`].
//!
//! State sits behind a `std::sync::Mutex` that is never held across an await.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::backend::{ChatBackend, StreamParams};
use crate::config::OrchestratorConfig;
use crate::consumer::{ReadOutcome, StreamConsumer, StreamHandler};
use crate::error::{ChatStreamError, Result};
use crate::sse::{EventStream, until_terminal};
use crate::types::{
    ChatContent, ContentType, CreateSessionRequest, ErrorPayload, Message, MessageRole,
    QuickPrompt, Session, StreamEvent, UiComponentData, title_from_message,
};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Change notification emitted after state is mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    /// The session list changed.
    SessionsChanged,
    /// A different session (or none) is current.
    CurrentSessionChanged(Option<String>),
    /// A message was appended.
    MessageAdded {
        /// Id of the new message.
        message_id: String,
    },
    /// A token was appended to a streaming message.
    TokenAppended {
        /// Id of the growing message.
        message_id: String,
        /// The token.
        token: String,
    },
    /// A UI component was attached to a message.
    ComponentAttached {
        /// Id of the owning message.
        message_id: String,
    },
    /// The message list was replaced wholesale.
    MessagesReplaced,
    /// The recent-components buffer changed.
    ComponentsChanged,
    /// The first component of the conversation arrived; collapse the side panel.
    SidePanelCollapse,
    /// `is_streaming` flipped.
    StreamingChanged(bool),
    /// The input buffer changed.
    InputChanged,
    /// Quick prompts were reloaded.
    QuickPromptsChanged,
}

/// Result of [`ChatOrchestrator::handle_send_message`].
#[derive(Debug)]
pub enum SendOutcome {
    /// Blank text, or a turn is already in flight. Nothing happened.
    Skipped,
    /// No session was current and creating one failed.
    SessionCreateFailed(ChatStreamError),
    /// The stream could not be opened. Messages are untouched.
    StreamOpenFailed(ChatStreamError),
    /// The stream was read until it ended.
    Finished(ReadOutcome),
}

impl SendOutcome {
    /// Whether the stream ran to a normal end.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Finished(ReadOutcome::Completed))
    }
}

#[derive(Debug, Default)]
struct ChatState {
    sessions: Vec<Session>,
    current_session: Option<Session>,
    messages: Vec<Message>,
    current_assistant: Option<String>,
    ui_components: Vec<UiComponentData>,
    quick_prompts: Vec<QuickPrompt>,
    input: String,
    is_sending: bool,
    is_streaming: bool,
}

impl ChatState {
    fn push_message(&mut self, message: Message) {
        let session_id = message.session_id.clone();
        self.messages.push(message);
        for session in self
            .sessions
            .iter_mut()
            .chain(self.current_session.as_mut())
            .filter(|s| s.id == session_id)
        {
            session.message_count = session.message_count.saturating_add(1);
        }
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    fn is_current(&self, session_id: &str) -> bool {
        self.current_session.as_ref().is_some_and(|s| s.id == session_id)
    }

    fn has_components(&self) -> bool {
        self.messages.iter().any(|m| !m.ui_components.is_empty())
    }
}

struct Shared {
    state: Mutex<ChatState>,
    updates: broadcast::Sender<ChatUpdate>,
    config: OrchestratorConfig,
    stops: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, update: ChatUpdate) {
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }

    fn set_streaming(&self, st: &mut ChatState, streaming: bool) {
        if st.is_streaming != streaming {
            st.is_streaming = streaming;
            self.emit(ChatUpdate::StreamingChanged(streaming));
        }
    }

    fn finish_turn(&self) {
        let mut st = self.lock();
        st.current_assistant = None;
        self.set_streaming(&mut st, false);
    }

    fn mirror_component(&self, component: UiComponentData) {
        self.lock().ui_components.insert(0, component);
        self.emit(ChatUpdate::ComponentsChanged);
    }
}

/// Resets the send flags when a turn ends, however it ends.
struct SendGuard<'a> {
    shared: &'a Shared,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.shared.lock();
        st.is_sending = false;
        self.shared.set_streaming(&mut st, false);
    }
}

/// Applies the events of one turn to shared state.
struct TurnHandler<'a> {
    session_id: String,
    shared: Arc<Shared>,
    consumer: &'a StreamConsumer,
    stop_epoch: u64,
}

impl TurnHandler<'_> {
    /// Lock state for a write, or `None` once another session has become current.
    fn lock_owned(&self) -> Option<MutexGuard<'_, ChatState>> {
        let st = self.shared.lock();
        if st.is_current(&self.session_id) {
            Some(st)
        } else {
            tracing::debug!(session_id = %self.session_id, "dropping event for a session no longer current");
            None
        }
    }

    fn apply_message(&self, content: ChatContent) {
        match content.content_type {
            ContentType::User => self.apply_user_echo(content),
            ContentType::Assistant => self.apply_token(content),
            ContentType::Other => {
                tracing::trace!(session_id = %self.session_id, "ignoring message with unknown content type");
            }
        }
    }

    fn apply_user_echo(&self, content: ChatContent) {
        let mut user = Message::new(self.session_id.as_str(), MessageRole::User, content.content);
        if let Some(id) = content.message_id {
            user.id = id;
        }
        let user_id = user.id.clone();
        let assistant = Message::new(self.session_id.as_str(), MessageRole::Assistant, "");
        let assistant_id = assistant.id.clone();

        let Some(mut st) = self.lock_owned() else {
            return;
        };
        st.push_message(user);
        st.input.clear();
        st.push_message(assistant);
        st.current_assistant = Some(assistant_id.clone());
        drop(st);

        self.shared.emit(ChatUpdate::MessageAdded {
            message_id: user_id,
        });
        self.shared.emit(ChatUpdate::InputChanged);
        self.shared.emit(ChatUpdate::MessageAdded {
            message_id: assistant_id,
        });
    }

    fn apply_token(&self, content: ChatContent) {
        let Some(mut st) = self.lock_owned() else {
            return;
        };

        let current = st.current_assistant.clone();
        if let Some(id) = current
            && let Some(message) = st.message_mut(&id)
        {
            message.content.push_str(&content.content);
            drop(st);
            self.shared.emit(ChatUpdate::TokenAppended {
                message_id: id,
                token: content.content,
            });
            return;
        }

        let mut assistant = Message::new(
            self.session_id.as_str(),
            MessageRole::Assistant,
            content.content,
        );
        if let Some(id) = content.message_id {
            assistant.id = id;
        }
        let id = assistant.id.clone();
        st.push_message(assistant);
        st.current_assistant = Some(id.clone());
        drop(st);

        self.shared.emit(ChatUpdate::MessageAdded { message_id: id });
    }

    fn apply_component(&self, component: UiComponentData) {
        let Some(mut st) = self.lock_owned() else {
            return;
        };
        let first = !st.has_components();

        let attached_to = st.current_assistant.clone().and_then(|id| {
            let message = st.message_mut(&id)?;
            message.ui_components.insert(0, component.clone());
            Some(id)
        });
        drop(st);

        if first && attached_to.is_some() {
            self.shared.emit(ChatUpdate::SidePanelCollapse);
        }
        match attached_to {
            Some(message_id) => self.shared.emit(ChatUpdate::ComponentAttached { message_id }),
            None => {
                tracing::debug!(session_id = %self.session_id, "ui component arrived without an assistant message");
            }
        }

        let delay = self.shared.config.mirror.delay;
        if delay.is_zero() {
            self.shared.mirror_component(component);
        } else {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                shared.mirror_component(component);
            });
        }
    }

    fn apply_error(&self, payload: &ErrorPayload) {
        tracing::error!(
            session_id = %self.session_id,
            code = payload.code.as_deref().unwrap_or("-"),
            message = payload.message.as_deref().unwrap_or("-"),
            "chat stream reported an error"
        );
        self.shared.finish_turn();
    }
}

impl StreamHandler<StreamEvent> for TurnHandler<'_> {
    fn on_data(&mut self, event: StreamEvent) {
        if self.shared.stops.load(Ordering::SeqCst) != self.stop_epoch {
            self.consumer.cancel();
            return;
        }

        match event {
            StreamEvent::Message(content) => self.apply_message(content),
            StreamEvent::Status(status) => {
                tracing::trace!(session_id = %self.session_id, %status, "status");
            }
            StreamEvent::UiComponent(payload) => self.apply_component(payload.into_component()),
            StreamEvent::Completed(_) => {
                tracing::debug!(session_id = %self.session_id, "turn completed");
                self.shared.finish_turn();
            }
            StreamEvent::Error(payload) => self.apply_error(&payload),
            StreamEvent::Unknown { event, .. } => {
                tracing::debug!(session_id = %self.session_id, %event, "ignoring unknown event");
            }
        }
    }

    fn on_complete(&mut self) {
        self.shared.finish_turn();
    }

    fn on_error(&mut self, error: ChatStreamError) {
        tracing::warn!(session_id = %self.session_id, error = %error, "chat stream failed");
        self.shared.finish_turn();
    }

    fn on_abort(&mut self) {
        tracing::debug!(session_id = %self.session_id, "chat stream aborted");
        self.shared.finish_turn();
    }
}

/// Chat state machine over a [`ChatBackend`].
pub struct ChatOrchestrator<B> {
    backend: B,
    shared: Arc<Shared>,
    consumer: StreamConsumer,
}

impl<B> std::fmt::Debug for ChatOrchestrator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("config", &self.shared.config)
            .field("consumer", &self.consumer)
            .finish_non_exhaustive()
    }
}

impl<B: ChatBackend> ChatOrchestrator<B> {
    /// Create an orchestrator with empty state.
    pub fn new(backend: B, config: OrchestratorConfig) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            backend,
            shared: Arc::new(Shared {
                state: Mutex::new(ChatState::default()),
                updates,
                config,
                stops: AtomicU64::new(0),
            }),
            consumer: StreamConsumer::new(),
        }
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// Receive change notifications from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.shared.updates.subscribe()
    }

    // ==================== Sessions ====================

    /// Replace the session list with the server's, filtered by the configured owner.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the list is left unchanged.
    pub async fn load_sessions(&self) -> Result<()> {
        let sessions = self
            .backend
            .list_sessions(self.shared.config.user_id.as_deref())
            .await?;
        tracing::debug!(count = sessions.len(), "sessions loaded");
        self.shared.lock().sessions = sessions;
        self.shared.emit(ChatUpdate::SessionsChanged);
        Ok(())
    }

    /// Delete a session remotely and drop it from the list.
    ///
    /// Deleting the current session also clears it.
    ///
    /// # Errors
    ///
    /// Returns the backend error; local state is left unchanged.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.backend.delete_session(id).await?;

        let was_current = {
            let mut st = self.shared.lock();
            st.sessions.retain(|s| s.id != id);
            st.current_session.as_ref().is_some_and(|s| s.id == id)
        };
        self.shared.emit(ChatUpdate::SessionsChanged);

        if was_current {
            self.clear_current_session();
        }
        Ok(())
    }

    /// Make `session` current and load its history.
    ///
    /// Any active stream is stopped first. History that arrives after another
    /// session became current is discarded.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the session stays current with no messages.
    pub async fn select_session(&self, session: Session) -> Result<()> {
        self.stop_streaming();

        let id = session.id.clone();
        {
            let mut st = self.shared.lock();
            st.current_session = Some(session);
            st.messages.clear();
            st.current_assistant = None;
        }
        self.shared
            .emit(ChatUpdate::CurrentSessionChanged(Some(id.clone())));
        self.shared.emit(ChatUpdate::MessagesReplaced);

        let messages = self.backend.session_messages(&id).await?;

        let applied = {
            let mut st = self.shared.lock();
            let still_current = st.current_session.as_ref().is_some_and(|s| s.id == id);
            if still_current {
                st.messages = messages;
            }
            still_current
        };
        if applied {
            self.shared.emit(ChatUpdate::MessagesReplaced);
        } else {
            tracing::debug!(session_id = %id, "discarding history of a session no longer current");
        }
        Ok(())
    }

    /// Drop the current session and its messages.
    pub fn clear_current_session(&self) {
        self.stop_streaming();
        {
            let mut st = self.shared.lock();
            st.current_session = None;
            st.messages.clear();
            st.current_assistant = None;
        }
        self.shared.emit(ChatUpdate::CurrentSessionChanged(None));
        self.shared.emit(ChatUpdate::MessagesReplaced);
    }

    /// Reload the quick prompts.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn load_quick_prompts(&self) -> Result<()> {
        let prompts = self.backend.quick_prompts().await?;
        self.shared.lock().quick_prompts = prompts;
        self.shared.emit(ChatUpdate::QuickPromptsChanged);
        Ok(())
    }

    // ==================== Streaming ====================

    /// Send `text` as the next user turn and stream the reply.
    ///
    /// With no current session one is created first, titled after the text.
    /// Returns once the stream has ended or delivered its terminal event,
    /// even if the server keeps the connection open. Calls made while a turn is in
    /// flight return [`SendOutcome::Skipped`].
    pub async fn handle_send_message(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Skipped;
        }

        {
            let mut st = self.shared.lock();
            if st.is_sending || st.is_streaming {
                tracing::debug!("send ignored: a turn is already in flight");
                return SendOutcome::Skipped;
            }
            st.is_sending = true;
        }
        let _guard = SendGuard {
            shared: &self.shared,
        };
        let stop_epoch = self.shared.stops.load(Ordering::SeqCst);

        let session_id = match self.ensure_session(text).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create session");
                return SendOutcome::SessionCreateFailed(e);
            }
        };

        let params = self.stream_params(&session_id, text);
        let stream = match self.backend.open_stream(&params).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "failed to open chat stream");
                return SendOutcome::StreamOpenFailed(e);
            }
        };

        if self.shared.stops.load(Ordering::SeqCst) != stop_epoch {
            tracing::debug!(session_id = %session_id, "stop requested while opening stream");
            return SendOutcome::Finished(ReadOutcome::Aborted);
        }

        SendOutcome::Finished(self.run_stream(session_id, stream, stop_epoch).await)
    }

    /// Drive `stream` for `session_id` and apply its events until it ends or
    /// yields `completed` or `error`.
    ///
    /// Events are applied only while `session_id` is the current session.
    pub async fn handle_stream_events(
        &self,
        session_id: impl Into<String>,
        stream: EventStream,
    ) -> ReadOutcome {
        let stop_epoch = self.shared.stops.load(Ordering::SeqCst);
        self.run_stream(session_id.into(), stream, stop_epoch).await
    }

    /// Cancel the active stream.
    ///
    /// `is_streaming` drops immediately. Content received so far is kept.
    pub fn stop_streaming(&self) {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        self.consumer.cancel();
        let mut st = self.shared.lock();
        self.shared.set_streaming(&mut st, false);
    }

    async fn run_stream(&self, session_id: String, stream: EventStream, stop_epoch: u64) -> ReadOutcome {
        {
            let mut st = self.shared.lock();
            st.current_assistant = None;
            self.shared.set_streaming(&mut st, true);
        }
        tracing::debug!(session_id = %session_id, "chat stream opened");

        let mut handler = TurnHandler {
            session_id,
            shared: Arc::clone(&self.shared),
            consumer: &self.consumer,
            stop_epoch,
        };
        self.consumer.read(until_terminal(stream), &mut handler).await
    }

    async fn ensure_session(&self, text: &str) -> Result<String> {
        let current = self.shared.lock().current_session.as_ref().map(|s| s.id.clone());
        if let Some(id) = current {
            return Ok(id);
        }

        let req = CreateSessionRequest {
            title: Some(title_from_message(text, self.shared.config.title_max_chars)),
            user_id: self.shared.config.user_id.clone(),
        };
        let session = self.backend.create_session(&req).await?;
        let id = session.id.clone();
        tracing::info!(session_id = %id, "session created");

        {
            let mut st = self.shared.lock();
            st.sessions.insert(0, session.clone());
            st.current_session = Some(session);
        }
        self.shared.emit(ChatUpdate::SessionsChanged);
        self.shared
            .emit(ChatUpdate::CurrentSessionChanged(Some(id.clone())));
        Ok(id)
    }

    fn stream_params(&self, session_id: &str, text: &str) -> StreamParams {
        let config = &self.shared.config;
        StreamParams {
            user_id: config.user_id.clone(),
            show_thinking: config.show_thinking,
            typing_speed: config.typing_speed,
            ..StreamParams::new(session_id, text)
        }
    }

    // ==================== UI components and input ====================

    /// Put `component` at the head of the recent-components buffer.
    pub fn add_ui_component(&self, component: UiComponentData) {
        self.shared.mirror_component(component);
    }

    /// Dismiss the recent component at `index`. Message copies are unaffected.
    pub fn remove_ui_component(&self, index: usize) -> Option<UiComponentData> {
        let removed = {
            let mut st = self.shared.lock();
            (index < st.ui_components.len()).then(|| st.ui_components.remove(index))
        };
        if removed.is_some() {
            self.shared.emit(ChatUpdate::ComponentsChanged);
        }
        removed
    }

    /// Replace the input buffer.
    pub fn set_input(&self, text: impl Into<String>) {
        self.shared.lock().input = text.into();
        self.shared.emit(ChatUpdate::InputChanged);
    }

    // ==================== Snapshots ====================

    /// Messages of the current session, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().messages.clone()
    }

    /// Known sessions, newest first.
    pub fn sessions(&self) -> Vec<Session> {
        self.shared.lock().sessions.clone()
    }

    /// The current session.
    pub fn current_session(&self) -> Option<Session> {
        self.shared.lock().current_session.clone()
    }

    /// The assistant message currently receiving tokens.
    pub fn current_assistant_message(&self) -> Option<Message> {
        let st = self.shared.lock();
        let id = st.current_assistant.as_deref()?;
        st.messages.iter().find(|m| m.id == id).cloned()
    }

    /// Recent UI components, newest first.
    pub fn ui_components(&self) -> Vec<UiComponentData> {
        self.shared.lock().ui_components.clone()
    }

    /// Cached quick prompts.
    pub fn quick_prompts(&self) -> Vec<QuickPrompt> {
        self.shared.lock().quick_prompts.clone()
    }

    /// The input buffer.
    pub fn input(&self) -> String {
        self.shared.lock().input.clone()
    }

    /// Whether a turn is in flight, from send until its stream loop exits.
    pub fn is_sending(&self) -> bool {
        self.shared.lock().is_sending
    }

    /// Whether a stream is delivering events.
    pub fn is_streaming(&self) -> bool {
        self.shared.lock().is_streaming
    }
}
