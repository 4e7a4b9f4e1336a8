//! Drives one streamed request/response exchange: opens the transport, runs
//! chunks through the frame assembler and payload decoder, feeds the tool
//! tracker and invokes the caller's callbacks in arrival order.

pub mod callbacks;
pub mod cancel;
pub mod state;

pub use callbacks::{CallbackSet, StreamingCallbacks};
pub use cancel::CancelHandle;
pub use state::{SessionOutcome, SessionStatus, StreamSession};

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::StreamError;
use crate::observability::log_session_complete;
use crate::stream::{decode_frame, Frame, FrameAssembler, FramingPolicy, StreamEvent};
use crate::tools::ToolExecutionTracker;
use crate::transport::{StreamRequest, Transport};

/// Opens sessions against one transport.
#[derive(Debug)]
pub struct SessionController<T> {
    transport: Arc<T>,
    framing: FramingPolicy,
}

impl<T> Clone for SessionController<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            framing: self.framing,
        }
    }
}

impl<T: Transport + 'static> SessionController<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    #[must_use]
    pub fn from_shared(transport: Arc<T>) -> Self {
        Self {
            transport,
            framing: FramingPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_framing(mut self, framing: FramingPolicy) -> Self {
        self.framing = framing;
        self
    }

    #[must_use]
    pub fn framing(&self) -> FramingPolicy {
        self.framing
    }

    /// Spawn a session on the current tokio runtime.
    ///
    /// The returned handle cancels the session and yields its outcome.
    pub fn start<C>(&self, request: StreamRequest, callbacks: C) -> StreamHandle
    where
        C: StreamingCallbacks + Send + 'static,
    {
        let cancel = CancelHandle::new();
        let task_cancel = cancel.clone();
        let controller = self.clone();
        let join = tokio::spawn(async move {
            let mut callbacks = callbacks;
            controller.run(&request, &mut callbacks, task_cancel).await
        });
        StreamHandle { cancel, join }
    }

    /// Drive a session to completion on the calling task.
    ///
    /// Never fails: transport and protocol errors are reported through
    /// `on_error` and recorded in the outcome as `failed`; cancellation through
    /// `cancel` yields `aborted` without further callbacks.
    pub async fn run<C>(
        &self,
        request: &StreamRequest,
        callbacks: &mut C,
        cancel: CancelHandle,
    ) -> SessionOutcome
    where
        C: StreamingCallbacks + ?Sized,
    {
        let session = StreamSession::new(cancel);
        let span = tracing::info_span!("stream_session", session_id = %session.id);
        let driver = SessionDriver::new(session, self.framing, callbacks);
        driver
            .drive(self.transport.as_ref(), request)
            .instrument(span)
            .await
    }
}

/// Handle to a session spawned with [`SessionController::start`].
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancelHandle,
    join: JoinHandle<SessionOutcome>,
}

impl StreamHandle {
    /// Stop the session. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the session to reach a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Internal`] when the session task panicked.
    pub async fn join(self) -> Result<SessionOutcome, StreamError> {
        self.join
            .await
            .map_err(|err| StreamError::Internal(format!("stream session task failed: {err}")))
    }
}

struct SessionDriver<'a, C: ?Sized> {
    session: StreamSession,
    tracker: ToolExecutionTracker,
    assembler: FrameAssembler,
    frames: Vec<Frame>,
    callbacks: &'a mut C,
}

impl<'a, C> SessionDriver<'a, C>
where
    C: StreamingCallbacks + ?Sized,
{
    fn new(session: StreamSession, framing: FramingPolicy, callbacks: &'a mut C) -> Self {
        Self {
            session,
            tracker: ToolExecutionTracker::new(),
            assembler: FrameAssembler::with_policy(framing),
            frames: Vec::new(),
            callbacks,
        }
    }

    async fn drive<T: Transport>(mut self, transport: &T, request: &StreamRequest) -> SessionOutcome {
        let started = Instant::now();
        let cancel = self.session.cancel_handle().clone();

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = transport.open(request, cancel.token()) => Some(result),
        };
        let mut source = match opened {
            None => return self.finish(started),
            Some(Err(err)) => {
                self.transport_failed(&err);
                return self.finish(started);
            }
            Some(Ok(source)) => source,
        };

        self.session.transition(SessionStatus::Open);
        tracing::info!(url = %request.url, method = %request.method, "stream session open");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = source.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    self.assembler.feed_into(&chunk, &mut self.frames);
                    if self.dispatch_frames().is_break() {
                        break;
                    }
                }
                Some(Err(err)) => {
                    self.transport_failed(&err);
                    break;
                }
                None => {
                    self.complete();
                    break;
                }
            }
        }
        drop(source);
        self.finish(started)
    }

    /// Decode and dispatch everything the assembler produced.
    fn dispatch_frames(&mut self) -> ControlFlow<()> {
        let mut frames = std::mem::take(&mut self.frames);
        let mut flow = ControlFlow::Continue(());
        'frames: for frame in &frames {
            for event in decode_frame(frame) {
                flow = self.dispatch(event);
                if flow.is_break() {
                    break 'frames;
                }
            }
        }
        frames.clear();
        self.frames = frames;
        flow
    }

    fn dispatch(&mut self, event: StreamEvent) -> ControlFlow<()> {
        if self.session.cancel_handle().is_cancelled() {
            return ControlFlow::Break(());
        }
        tracing::trace!(event = event.kind(), "dispatching stream event");
        match event {
            StreamEvent::Started { meta } => {
                self.session.transition(SessionStatus::Open);
                self.callbacks.on_start(&meta);
            }
            StreamEvent::Token { text } => {
                self.session.push_token(&text);
                self.callbacks.on_token(&text);
            }
            StreamEvent::ToolCallRequested(call) => {
                if let Some(execution) = self.tracker.register(call) {
                    self.callbacks.on_tool_call(&execution.tool_call);
                }
            }
            StreamEvent::ToolResultReceived(result) => {
                self.tracker.record_result(&result);
                self.callbacks.on_tool_result(&result);
            }
            StreamEvent::Ended { meta } => {
                self.session.transition(SessionStatus::Ended);
                self.callbacks.on_end(meta.as_ref());
                return ControlFlow::Break(());
            }
            StreamEvent::Failed { message } => {
                tracing::warn!(error = %message, "backend reported stream error");
                self.session.fail(message.as_str());
                self.callbacks.on_error(&message);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// The body closed cleanly: drain the assembler and end the session if
    /// the backend never sent a terminal frame.
    fn complete(&mut self) {
        self.frames.extend(self.assembler.flush());
        if self.dispatch_frames().is_break() {
            return;
        }
        if self.session.cancel_handle().is_cancelled() {
            return;
        }
        tracing::debug!("stream closed without terminal frame");
        self.session.transition(SessionStatus::Ended);
        self.callbacks.on_end(None);
    }

    fn transport_failed(&mut self, err: &StreamError) {
        if self.session.cancel_handle().is_cancelled() {
            return;
        }
        let message = err.user_message();
        tracing::warn!(error = %err, category = ?err.category(), "stream transport failed");
        self.session.fail(message.as_str());
        self.callbacks.on_error(&message);
    }

    fn finish(mut self, started: Instant) -> SessionOutcome {
        if !self.session.status().is_terminal() && self.session.cancel_handle().is_cancelled() {
            let aborted_tools = self.tracker.abort_all();
            self.session.transition(SessionStatus::Aborted);
            tracing::info!(aborted_tools, "stream session cancelled");
        }
        let (active, history) = self.tracker.into_parts();
        let outcome = self.session.into_outcome(active, history);
        log_session_complete(&outcome, started.elapsed());
        outcome
    }
}
