use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::clipboard::ClipboardSink;
use crate::events::AppEvent;
use crate::extract::{extract, RenderableDocument};
use crate::models::{FormSpecification, GenerationTask};

/// Identity of one submission. Events carrying a ticket that is no longer
/// current for its task are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub id: Uuid,
    pub task: GenerationTask,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("A {0} request is already in progress")]
    TaskBusy(GenerationTask),
    #[error(transparent)]
    Invalid(#[from] crate::models::FormError),
}

/// Per-task in-flight state.
#[derive(Debug, Default)]
pub struct TaskSlot {
    pub is_loading: bool,
    pub current: Option<RequestTicket>,
    /// UI-visible text, refreshed from the request's buffer
    pub response: String,
    pub last_error: Option<String>,
    /// Consumer task of the in-flight request
    task_handle: Option<AbortHandle>,
}

impl TaskSlot {
    fn accepts(&self, ticket: &RequestTicket) -> bool {
        self.is_loading && self.current.as_ref() == Some(ticket)
    }

    fn settle(&mut self) {
        self.is_loading = false;
        self.current = None;
        self.task_handle = None;
    }
}

#[derive(Debug, Default)]
pub struct App {
    pub form: FormSpecification,
    pub generate: TaskSlot,
    pub improve: TaskSlot,
    pub preview: Option<RenderableDocument>,
    /// Set once the generated text reached the clipboard
    pub copied: bool,
}

impl App {
    pub fn new(form: FormSpecification) -> Self {
        Self {
            form,
            ..Self::default()
        }
    }

    pub const fn slot(&self, task: GenerationTask) -> &TaskSlot {
        match task {
            GenerationTask::GenerateAnimation => &self.generate,
            GenerationTask::ImprovePrompt => &self.improve,
        }
    }

    fn slot_mut(&mut self, task: GenerationTask) -> &mut TaskSlot {
        match task {
            GenerationTask::GenerateAnimation => &mut self.generate,
            GenerationTask::ImprovePrompt => &mut self.improve,
        }
    }

    pub const fn is_loading(&self, task: GenerationTask) -> bool {
        self.slot(task).is_loading
    }

    /// Start a submission for `task`. The form is validated first and a
    /// task that is already in flight is refused.
    pub fn begin(&mut self, task: GenerationTask) -> Result<RequestTicket, SubmitError> {
        self.form.validate()?;
        let slot = self.slot_mut(task);
        if slot.is_loading {
            return Err(SubmitError::TaskBusy(task));
        }

        let ticket = RequestTicket {
            id: Uuid::new_v4(),
            task,
        };
        slot.is_loading = true;
        slot.current = Some(ticket);
        slot.response.clear();
        slot.last_error = None;
        if task == GenerationTask::GenerateAnimation {
            self.copied = false;
        }
        Ok(ticket)
    }

    /// Tie the consumer task reading `ticket`'s stream to its slot, so that
    /// [`App::abort`] can stop it. Ignored for a ticket that is not current.
    pub fn attach(&mut self, ticket: &RequestTicket, handle: AbortHandle) {
        let slot = self.slot_mut(ticket.task);
        if slot.accepts(ticket) {
            slot.task_handle = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Drop the in-flight request for `task`. Its consumer task is stopped,
    /// which closes the connection, and any late events are ignored.
    pub fn abort(&mut self, task: GenerationTask) {
        let slot = self.slot_mut(task);
        if let Some(handle) = slot.task_handle.take() {
            handle.abort();
            tracing::debug!(task = %task, "aborted in-flight request");
        }
        slot.settle();
    }

    /// Apply an update from a consumer task. Returns whether state changed.
    pub fn apply(&mut self, event: AppEvent) -> bool {
        let task = event.ticket().task;
        if !self.slot(task).accepts(event.ticket()) {
            tracing::debug!(task = %task, "ignoring event from stale request");
            return false;
        }

        match event {
            AppEvent::Progress { text, .. } => {
                self.slot_mut(task).response = text;
            }
            AppEvent::Finished { text, .. } => {
                match task {
                    GenerationTask::GenerateAnimation => {
                        self.preview = Some(extract(&text));
                    }
                    GenerationTask::ImprovePrompt => {
                        self.form.general_instruction = text.trim().to_string();
                    }
                }
                let slot = self.slot_mut(task);
                slot.response = text;
                slot.settle();
            }
            AppEvent::Failed { error, .. } => {
                let slot = self.slot_mut(task);
                slot.last_error = Some(error);
                slot.settle();
            }
        }
        true
    }

    /// Text offered for copy-to-clipboard once generation is done.
    pub fn copy_text(&self) -> Option<&str> {
        if self.generate.is_loading || self.generate.response.is_empty() {
            return None;
        }
        Some(&self.generate.response)
    }

    /// Put [`App::copy_text`] on the clipboard. Failures are logged and
    /// leave `copied` unset; they never abort the caller.
    pub fn copy_to(&mut self, clipboard: &mut dyn ClipboardSink) -> bool {
        let Some(text) = self.copy_text() else {
            tracing::warn!("nothing to copy yet");
            return false;
        };
        match clipboard.set_text(text) {
            Ok(()) => {
                tracing::info!(bytes = text.len(), "copied response to clipboard");
                self.copied = true;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to copy response to clipboard");
                self.copied = false;
            }
        }
        self.copied
    }
}
