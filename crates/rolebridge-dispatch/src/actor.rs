//! The authoritative context: an isolated Tokio task that owns `S`.
//!
//! Jobs arrive through an mpsc channel and run to completion one at a
//! time. There is no shared mutable state; the only way to touch `S` is to
//! send a closure here.

use std::panic::{self, AssertUnwindSafe};

use tokio::sync::{mpsc, oneshot};

/// A unit of work for the authoritative context.
pub(crate) type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Commands sent to the authority actor.
pub(crate) enum Command<S> {
    /// Run a job against the owned state.
    Run(Job<S>),

    /// Stop after draining everything queued before this command, handing
    /// the final state back to the caller.
    Shutdown { reply: oneshot::Sender<S> },
}

/// The actor itself. Lives inside the spawned task.
pub(crate) struct AuthorityActor<S> {
    state: S,
    receiver: mpsc::Receiver<Command<S>>,
}

impl<S: Send + 'static> AuthorityActor<S> {
    /// Runs the actor loop until shutdown or until every sender is gone.
    async fn run(mut self) {
        tracing::debug!("authoritative context started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                Command::Run(job) => {
                    // A panicking job must not take the context down with it:
                    // every later hand-off would fail.
                    let state = &mut self.state;
                    if panic::catch_unwind(AssertUnwindSafe(move || job(state))).is_err() {
                        tracing::error!("authoritative job panicked; continuing");
                    }
                }
                Command::Shutdown { reply } => {
                    tracing::info!("authoritative context shutting down");
                    self.receiver.close();
                    let _ = reply.send(self.state);
                    return;
                }
            }
        }

        tracing::debug!("authoritative context stopped (all handles dropped)");
    }
}

/// Spawns the actor and returns the sending half of its queue.
pub(crate) fn spawn_authority<S: Send + 'static>(
    state: S,
    channel_size: usize,
) -> mpsc::Sender<Command<S>> {
    let (tx, rx) = mpsc::channel(channel_size);
    let actor = AuthorityActor { state, receiver: rx };
    tokio::spawn(actor.run());
    tx
}
