//! The serialised operation executor.
//!
//! One worker task owns the serial port for an entire session: it opens the
//! port, runs a startup operation, executes queued operations strictly in
//! FIFO order, and closes the session with a shutdown operation before
//! releasing the port, even when an operation failed. When the queue drains
//! the worker lingers briefly so a continuation can enqueue its next
//! operation without paying for a fresh session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};

use crate::config::Smart3Config;
use crate::error::{Result, Smart3Error};
use crate::operations::{Operation, SessionContext, Shutdown, Startup};
use crate::smart3::console::Console;
use crate::smart3::serial::{open_port, SerialLink, Smart3Port};
use crate::smart3::transceiver::Transceiver;

/// How long the worker waits for a continuation before closing the session.
const CONTINUATION_LINGER: Duration = Duration::from_millis(250);

/// A boxed operation together with its completion channel.
struct Queued<L: SerialLink> {
    op: Box<dyn Operation<L>>,
    completion: oneshot::Sender<Result<()>>,
}

struct QueueState<L: SerialLink> {
    queue: VecDeque<Queued<L>>,
    worker_live: bool,
}

struct ManagerShared<L: SerialLink> {
    config: Smart3Config,
    link_factory: Box<dyn Fn() -> Result<L> + Send + Sync>,
    state: Mutex<QueueState<L>>,
    notify: Notify,
}

/// Handle to the process's serialised operation executor. Clones share the
/// same queue and worker.
pub struct OperationManager<L: SerialLink + 'static> {
    shared: Arc<ManagerShared<L>>,
}

impl<L: SerialLink + 'static> Clone for OperationManager<L> {
    fn clone(&self) -> Self {
        OperationManager {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl OperationManager<tokio_serial::SerialStream> {
    /// Manager over the OS serial device named in the configuration.
    pub fn new(config: Smart3Config) -> Self {
        let open_config = config.clone();
        Self::with_link_factory(config, move || open_port(&open_config))
    }
}

impl<L: SerialLink + 'static> OperationManager<L> {
    /// Manager with an injected link factory; used by tests to run sessions
    /// over a mock port.
    pub fn with_link_factory(
        config: Smart3Config,
        link_factory: impl Fn() -> Result<L> + Send + Sync + 'static,
    ) -> Self {
        OperationManager {
            shared: Arc::new(ManagerShared {
                config,
                link_factory: Box::new(link_factory),
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    worker_live: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Queues an operation for execution. The returned channel resolves
    /// with the operation's outcome; it resolves with an error immediately
    /// when a preceding operation has already failed the session.
    pub fn enqueue(&self, op: Box<dyn Operation<L>>) -> oneshot::Receiver<Result<()>> {
        let (tx, rx) = oneshot::channel();
        let spawn_worker = {
            let mut state = self.shared.state.lock().unwrap();
            state.queue.push_back(Queued { op, completion: tx });
            if state.worker_live {
                false
            } else {
                state.worker_live = true;
                true
            }
        };
        if spawn_worker {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(run_worker(shared));
        } else {
            self.shared.notify.notify_one();
        }
        rx
    }
}

/// Worker entry point: runs sessions until the queue is empty at a session
/// boundary.
async fn run_worker<L: SerialLink + 'static>(shared: Arc<ManagerShared<L>>) {
    loop {
        run_session(&shared).await;
        let mut state = shared.state.lock().unwrap();
        if state.queue.is_empty() {
            state.worker_live = false;
            return;
        }
        // Work arrived while the session was closing; open a fresh one.
    }
}

/// One complete session: open, startup, operation loop, shutdown.
async fn run_session<L: SerialLink + 'static>(shared: &Arc<ManagerShared<L>>) {
    let link = match (shared.link_factory)() {
        Ok(link) => link,
        Err(e) => {
            log::error!("opening the serial port failed: {e}");
            abort_queued(shared, &e);
            return;
        }
    };
    let port = Smart3Port::new(link, &shared.config);
    let transceiver = match Transceiver::new(port, &shared.config) {
        Ok(t) => t,
        Err(e) => {
            log::error!("link configuration rejected: {e}");
            abort_queued(shared, &e);
            return;
        }
    };
    let mut console = Console::new(transceiver);
    let mut session = SessionContext::default();

    let mut session_error: Option<Smart3Error> = None;
    if let Err(e) = Startup.execute(&mut console, &mut session).await {
        let e = e.into_protocol();
        log::error!("startup failed: {e}");
        session_error = Some(e);
    }

    if session_error.is_none() {
        loop {
            let next = shared.state.lock().unwrap().queue.pop_front();
            match next {
                Some(Queued { mut op, completion }) => {
                    log::debug!("executing operation {}", op.name());
                    let outcome = op
                        .execute(&mut console, &mut session)
                        .await
                        .map_err(Smart3Error::into_protocol);
                    match outcome {
                        Ok(()) => {
                            let _ = completion.send(Ok(()));
                        }
                        Err(e) => {
                            log::error!("operation {} failed: {e}", op.name());
                            let _ = completion.send(Err(e.clone()));
                            session_error = Some(e);
                            break;
                        }
                    }
                }
                None => {
                    let lingered =
                        tokio::time::timeout(CONTINUATION_LINGER, shared.notify.notified()).await;
                    if lingered.is_err() && shared.state.lock().unwrap().queue.is_empty() {
                        break;
                    }
                }
            }
        }
    }

    // A failed operation fails everything queued behind it.
    if let Some(e) = &session_error {
        abort_queued(shared, e);
    }

    // The shutdown runs no matter how the session went; the port closes
    // when the console drops.
    if let Err(e) = Shutdown.execute(&mut console, &mut session).await {
        log::warn!("shutdown failed: {e}");
    }
}

fn abort_queued<L: SerialLink + 'static>(shared: &Arc<ManagerShared<L>>, error: &Smart3Error) {
    let drained: Vec<Queued<L>> = {
        let mut state = shared.state.lock().unwrap();
        state.queue.drain(..).collect()
    };
    for queued in drained {
        let _ = queued.completion.send(Err(error.clone()));
    }
}
