//! Playback engine: the request loop and its lifecycle

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::PlaybackConfig;
use crate::message::Message;
use crate::recording::RecordingPool;
use crate::{PlaybackError, Result};

use super::correlate::correlate;
use super::subject::{Subject, Subscription};
use super::{LoopOutcome, LoopState, MessageReceiver, MessageSender, MessageTracker, PlaybackStats};

/// Stands in for a live kernel by answering requests from a recording
///
/// The loop task starts on construction and owns the recording pool;
/// everything else talks to it through the request queue.
pub struct MessagePlayback {
    requests: mpsc::UnboundedSender<Message>,
    sent: Arc<Subject<Message>>,
    received: Arc<Subject<Message>>,
    cancel: watch::Sender<bool>,
    state: watch::Receiver<LoopState>,
    counters: Arc<Counters>,
    disposed: AtomicBool,
}

impl MessagePlayback {
    /// Start playing back `messages`
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or no tokio runtime is
    /// running
    pub fn new(
        messages: impl IntoIterator<Item = Message>,
        config: &PlaybackConfig,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?;

        let pool = RecordingPool::load(messages);
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(LoopState::Running);

        let counters = Arc::new(Counters::default());
        counters.remaining.store(pool.len(), Ordering::Relaxed);

        let sent = Arc::new(Subject::unbounded());
        let received = Arc::new(Subject::bounded(config.received_capacity));

        let worker = PlaybackLoop {
            pool,
            requests: requests_rx,
            received: Arc::clone(&received),
            cancel: cancel_rx,
            state: state_tx,
            counters: Arc::clone(&counters),
            emit_timeout: config.emit_timeout(),
            idle_interval: config.idle_interval(),
        };
        runtime.spawn(worker.run());

        Ok(Self {
            requests: requests_tx,
            sent,
            received,
            cancel: cancel_tx,
            state: state_rx,
            counters,
            disposed: AtomicBool::new(false),
        })
    }

    /// Send a request to the simulated peer
    ///
    /// Never waits for a reply and always succeeds; replies, if the recording
    /// has any, arrive on [`received_messages`](Self::received_messages).
    ///
    /// # Errors
    ///
    /// Never returns an error; the `Result` mirrors a live transport
    pub fn send(&self, message: Message) -> Result<()> {
        self.sent.publish_now(&message);
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        if self.requests.send(message).is_err() {
            debug!("Playback loop has stopped, request will not be answered");
        }

        Ok(())
    }

    /// Subscribe to replies emitted from now on
    pub fn received_messages(&self) -> Subscription<Message> {
        self.received.subscribe()
    }

    /// Subscribe to requests passed to [`send`](Self::send) from now on
    pub fn sent_messages(&self) -> Subscription<Message> {
        self.sent.subscribe()
    }

    /// Current loop state
    pub fn state(&self) -> LoopState {
        self.state.borrow().clone()
    }

    /// Wait until the loop has stopped and return its final state
    pub async fn stopped(&self) -> LoopState {
        let mut state = self.state.clone();
        let stopped = state.wait_for(LoopState::is_stopped).await.map(|s| s.clone());

        match stopped {
            Ok(state) => state,
            // Loop task went away without reporting, e.g. runtime shutdown
            Err(_) => state.borrow().clone(),
        }
    }

    /// Snapshot of the playback counters
    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            replies_emitted: self.counters.emitted.load(Ordering::Relaxed),
            unmatched: self.counters.unmatched.load(Ordering::Relaxed),
            remaining: self.counters.remaining.load(Ordering::Relaxed),
        }
    }

    /// Stop the loop and end both observation streams
    ///
    /// Safe to call more than once; never panics.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            debug!("Message playback already disposed");
            return;
        }

        info!("Disposing message playback");

        // Cancel first so the loop stops before its channel goes away
        self.cancel.send_replace(true);

        if !self.sent.close() {
            warn!("Sent messages channel was already closed");
        }
        if !self.received.close() {
            warn!("Received messages channel was already closed");
        }
    }
}

impl Drop for MessagePlayback {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl MessageSender for MessagePlayback {
    fn send(&self, message: Message) -> Result<()> {
        MessagePlayback::send(self, message)
    }
}

impl MessageReceiver for MessagePlayback {
    fn messages(&self) -> Subscription<Message> {
        self.received_messages()
    }
}

impl MessageTracker for MessagePlayback {
    fn attach(&self, _sender: Arc<dyn MessageSender>, _receiver: Arc<dyn MessageReceiver>) {
        debug!("Message playback ignores attached transport");
    }
}

#[derive(Default)]
struct Counters {
    requests: AtomicUsize,
    emitted: AtomicUsize,
    unmatched: AtomicUsize,
    remaining: AtomicUsize,
}

/// Background worker; sole owner of the recording pool
struct PlaybackLoop {
    pool: RecordingPool,
    requests: mpsc::UnboundedReceiver<Message>,
    received: Arc<Subject<Message>>,
    cancel: watch::Receiver<bool>,
    state: watch::Sender<LoopState>,
    counters: Arc<Counters>,
    emit_timeout: Duration,
    idle_interval: Duration,
}

impl PlaybackLoop {
    async fn run(mut self) {
        info!("Playback loop started: {} recorded messages", self.pool.len());

        let outcome = self.drive().await;

        match &outcome {
            LoopOutcome::Succeeded => info!(
                "Playback loop stopped: {} recorded messages unused",
                self.pool.len()
            ),
            LoopOutcome::Failed(reason) => error!("Playback loop failed: {reason}"),
        }

        self.state.send_replace(LoopState::Stopped(outcome));
    }

    async fn drive(&mut self) -> LoopOutcome {
        loop {
            if *self.cancel.borrow() {
                return LoopOutcome::Succeeded;
            }

            match self.requests.try_recv() {
                Ok(request) => {
                    self.state.send_replace(LoopState::Draining);

                    if let Err(e) = self.service(&request).await {
                        return LoopOutcome::Failed(e.to_string());
                    }

                    self.state.send_replace(LoopState::Running);
                }
                Err(TryRecvError::Empty) => self.idle().await,
                Err(TryRecvError::Disconnected) => return LoopOutcome::Succeeded,
            }
        }
    }

    async fn idle(&mut self) {
        tokio::select! {
            () = tokio::time::sleep(self.idle_interval) => {}
            _ = self.cancel.changed() => {}
        }
    }

    /// Answer one request with its recorded group, in recorded order
    async fn service(&mut self, request: &Message) -> Result<()> {
        let replies = correlate(&mut self.pool, request);
        self.counters
            .remaining
            .store(self.pool.len(), Ordering::Relaxed);

        if replies.is_empty() {
            debug!(
                "No recorded replies for {} ({})",
                request.msg_type(),
                request.header.msg_id
            );
            self.counters.unmatched.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        info!(
            "Got {} responses for {} ({})",
            replies.len(),
            request.msg_type(),
            request.header.msg_id
        );

        for reply in replies {
            if self.received.is_closed() {
                debug!("Received channel closed, dropping rest of group");
                break;
            }

            debug!(
                "Reply: {} ({}), {} recorded messages left",
                reply.msg_type(),
                reply.content.kind(),
                self.pool.len()
            );

            match tokio::time::timeout(self.emit_timeout, self.received.publish(&reply)).await {
                Ok(Ok(())) => {
                    self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(PlaybackError::ChannelClosed)) => break,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(PlaybackError::EmitTimeout {
                        msg_type: reply.header.msg_type,
                        timeout_ms: u64::try_from(self.emit_timeout.as_millis())
                            .unwrap_or(u64::MAX),
                    })
                }
            }
        }

        Ok(())
    }
}
