//! The long-lived task that keeps one investigation's state current.
//!
//! A single spawned task owns the open stream, the pending retry and the
//! aggregate. Everything it learns is published through a `watch` channel, so
//! readers always see a complete snapshot and never a half-applied event.
//! Changing the target, cancelling the token or dropping the handle tears the
//! connection down; nothing reconnects after that.

use std::future::{Future, pending};
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;
use crate::event::classify;
use crate::reconnect::{Backoff, ConnectionState, RetryDecision, RetryTimer, StopReason};
use crate::reducer::project;
use crate::state::InvestigationSnapshot;
use crate::transport::{Connector, EventStream, WireMessage};

type PendingConnect = Pin<Box<dyn Future<Output = Result<EventStream, TransportError>> + Send>>;

#[derive(Debug)]
enum Command {
    SetTarget(Option<String>),
}

/// Handle to a running synchronizer task.
pub struct Synchronizer {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<InvestigationSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Synchronizer {
    /// Start synchronizing `target` (if any) on the current runtime.
    pub fn spawn<C: Connector>(connector: C, backoff: Backoff, target: Option<String>) -> Self {
        Self::spawn_with_cancel(connector, backoff, target, CancellationToken::new())
    }

    /// Like [`Synchronizer::spawn`], torn down when `cancel` fires.
    pub fn spawn_with_cancel<C: Connector>(
        connector: C,
        backoff: Backoff,
        target: Option<String>,
        cancel: CancellationToken,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(InvestigationSnapshot::default());

        let actor = Actor {
            connector: Arc::new(connector),
            target: None,
            link: ConnectionState::new(backoff),
            timer: RetryTimer::new(),
            connecting: None,
            stream: None,
            store: snapshot_tx,
        };
        let task = tokio::spawn(actor.run(command_rx, cancel.clone(), target));

        Self {
            commands: command_tx,
            snapshot: snapshot_rx,
            cancel,
            task: Some(task),
        }
    }

    /// Switch to another investigation, or to none.
    ///
    /// The old connection is closed and the state starts over empty. Setting
    /// the target it already has is a no-op.
    pub fn set_target(&self, target: Option<String>) {
        if self.commands.send(Command::SetTarget(target)).is_err() {
            debug!("synchronizer task already stopped, ignoring target change");
        }
    }

    /// A copy of the latest published state.
    pub fn snapshot(&self) -> InvestigationSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<InvestigationSnapshot> {
        self.snapshot.clone()
    }

    /// Tear down the connection and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "synchronizer task ended abnormally");
            }
        }
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Actor<C> {
    connector: Arc<C>,
    target: Option<String>,
    link: ConnectionState,
    timer: RetryTimer,
    connecting: Option<PendingConnect>,
    stream: Option<EventStream>,
    store: watch::Sender<InvestigationSnapshot>,
}

impl<C: Connector> Actor<C> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
        initial: Option<String>,
    ) {
        self.retarget(initial);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.teardown();
                    break;
                }
                command = commands.recv() => match command {
                    Some(Command::SetTarget(target)) => self.retarget(target),
                    None => {
                        self.teardown();
                        break;
                    }
                },
                result = next_connection(&mut self.connecting) => {
                    self.connecting = None;
                    match result {
                        Ok(stream) => self.on_open(stream),
                        Err(e) => self.on_failure(e),
                    }
                }
                item = next_message(&mut self.stream) => match item {
                    Some(Ok(message)) => self.on_message(message),
                    Some(Err(e)) => self.on_failure(e),
                    None => self.on_failure(TransportError::Closed),
                },
                attempt = self.timer.fired() => self.on_retry(attempt),
            }
        }

        debug!(investigation = ?self.target, "synchronizer stopped");
    }

    fn retarget(&mut self, target: Option<String>) {
        if target.is_some() && target == self.target {
            trace!(investigation = ?target, "target unchanged");
            return;
        }

        self.close();
        self.link.reset();
        self.target = target.clone();
        self.store.send_replace(InvestigationSnapshot::for_target(target));

        if self.target.is_some() {
            self.connect();
        }
    }

    fn connect(&mut self) {
        let Some(target) = self.target.clone() else {
            return;
        };
        info!(
            investigation = %target,
            attempt = self.link.attempt(),
            "connecting to event stream"
        );

        let connector = Arc::clone(&self.connector);
        self.connecting = Some(Box::pin(async move { connector.connect(&target).await }));
    }

    fn on_open(&mut self, stream: EventStream) {
        self.link.on_open();
        self.stream = Some(stream);
        info!(investigation = ?self.target, "event stream open");
        self.publish_link();
    }

    fn on_message(&mut self, message: WireMessage) {
        let Some(raw) = classify(&message.event, &message.data) else {
            return;
        };

        let mut terminal = false;
        self.store.send_modify(|snapshot| {
            let state = std::mem::take(&mut snapshot.state);
            snapshot.state = project(state, raw);
            terminal = snapshot.state.is_terminal();
        });

        if terminal {
            info!(
                investigation = ?self.target,
                "investigation reached a terminal event, closing stream"
            );
            self.teardown();
        }
    }

    fn on_failure(&mut self, error: TransportError) {
        self.stream = None;
        let terminal = self.store.borrow().state.is_terminal();

        let decision = if error.is_permanent() && !terminal {
            self.link.on_permanent_error()
        } else {
            self.link.on_error(terminal)
        };
        match decision {
            RetryDecision::Retry { attempt, delay } => {
                warn!(
                    investigation = ?self.target,
                    error = %error,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "event stream failed, will retry"
                );
                self.timer.arm(delay, attempt);
            }
            RetryDecision::Stop(StopReason::Exhausted) => {
                warn!(
                    investigation = ?self.target,
                    error = %error,
                    "event stream failed, retries exhausted"
                );
            }
            RetryDecision::Stop(StopReason::Permanent) => {
                warn!(
                    investigation = ?self.target,
                    error = %error,
                    "event stream cannot be opened, not retrying"
                );
            }
            RetryDecision::Stop(StopReason::Terminal) => {
                debug!(error = %error, "stream closed after terminal event");
            }
        }

        self.publish_link();
    }

    fn on_retry(&mut self, attempt: u32) {
        if !self.link.should_fire(attempt) {
            debug!(attempt, "stale retry ignored");
            return;
        }
        info!(investigation = ?self.target, attempt, "reconnection attempt");
        self.connect();
    }

    /// Drop the stream, any connect in flight, and the pending retry.
    fn close(&mut self) {
        self.stream = None;
        self.connecting = None;
        self.timer.disarm();
    }

    fn teardown(&mut self) {
        self.close();
        self.link.disarm();
        self.publish_link();
    }

    fn publish_link(&self) {
        let connected = self.link.connected();
        let reconnecting = self.link.reconnecting();
        let gave_up = self.link.gave_up();
        self.store.send_if_modified(|snapshot| {
            let changed = snapshot.connected != connected
                || snapshot.reconnecting != reconnecting
                || snapshot.gave_up != gave_up;
            snapshot.connected = connected;
            snapshot.reconnecting = reconnecting;
            snapshot.gave_up = gave_up;
            changed
        });
    }
}

async fn next_connection(
    connecting: &mut Option<PendingConnect>,
) -> Result<EventStream, TransportError> {
    match connecting.as_mut() {
        Some(pending_connect) => pending_connect.await,
        None => pending().await,
    }
}

async fn next_message(
    stream: &mut Option<EventStream>,
) -> Option<Result<WireMessage, TransportError>> {
    match stream.as_mut() {
        Some(stream) => stream.next().await,
        None => pending().await,
    }
}
