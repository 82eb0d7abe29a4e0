//! Shared, lazily-connected context.
//!
//! One [`ConnectionContext`] exists per client. Every sender, receiver, and
//! session receiver created from that client holds an `Arc` reference to it
//! and drives [`ConnectionContext::ensure_connected`] on first use. The
//! context runs an explicit state machine
//! (`Unconnected → Connecting → Open → Closed`): concurrent first uses
//! converge on a single transport connect attempt, and close is linearizable
//! with exactly one physical teardown no matter how many callers race it.

use crate::config::ConnectionConfig;
use crate::error::BusError;
use crate::transport::{BusConnection, TokenCredential, Transport};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;

/// Observable lifecycle state of a connection context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection has been requested yet
    Unconnected,
    /// A connect attempt is in flight
    Connecting,
    /// The shared connection is open
    Open,
    /// The context has been closed; terminal
    Closed,
}

enum State {
    Unconnected,
    /// The receiver resolves when the in-flight attempt settles
    Connecting(watch::Receiver<bool>),
    Open(Arc<dyn BusConnection>),
    Closed,
}

/// Next step decided under the state lock
enum Step {
    Ready(Arc<dyn BusConnection>),
    Closed,
    Wait(watch::Receiver<bool>),
    Connect(watch::Sender<bool>),
}

/// The shared connection owner.
///
/// Handles hold a read-only `Arc` reference; the state transition functions
/// here are the only mutations of shared state in this crate.
pub struct ConnectionContext {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    credential: Option<Arc<dyn TokenCredential>>,
    state: Mutex<State>,
}

impl ConnectionContext {
    /// Create a context; no network activity happens until first use
    pub fn new(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        credential: Option<Arc<dyn TokenCredential>>,
    ) -> Self {
        Self {
            config,
            transport,
            credential,
            state: Mutex::new(State::Unconnected),
        }
    }

    /// The immutable configuration this context was created with
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current lifecycle state
    pub async fn status(&self) -> ConnectionStatus {
        match &*self.state.lock().await {
            State::Unconnected => ConnectionStatus::Unconnected,
            State::Connecting(_) => ConnectionStatus::Connecting,
            State::Open(_) => ConnectionStatus::Open,
            State::Closed => ConnectionStatus::Closed,
        }
    }

    /// Check whether the context has been closed
    pub async fn is_closed(&self) -> bool {
        matches!(&*self.state.lock().await, State::Closed)
    }

    /// Get the shared connection, establishing it if necessary.
    ///
    /// Idempotent and convergent: while one caller's connect attempt is in
    /// flight, every other caller waits for that attempt instead of starting
    /// its own. A failed attempt returns the state to `Unconnected` so a
    /// later call can retry.
    pub async fn ensure_connected(&self) -> Result<Arc<dyn BusConnection>, BusError> {
        loop {
            let step = {
                let mut state = self.state.lock().await;
                match &mut *state {
                    State::Open(conn) => Step::Ready(Arc::clone(conn)),
                    State::Closed => Step::Closed,
                    State::Connecting(rx) => Step::Wait(rx.clone()),
                    State::Unconnected => {
                        let (tx, rx) = watch::channel(false);
                        *state = State::Connecting(rx);
                        Step::Connect(tx)
                    }
                }
            };

            match step {
                Step::Ready(conn) => return Ok(conn),
                Step::Closed => return Err(BusError::ClientClosed),
                Step::Connect(tx) => return self.run_connect(tx).await,
                Step::Wait(mut rx) => {
                    if rx.changed().await.is_err() {
                        // The connecting caller went away without settling
                        // the attempt (its future was dropped). Take over.
                        let mut state = self.state.lock().await;
                        if matches!(&*state, State::Connecting(peer) if peer.has_changed().is_err())
                        {
                            *state = State::Unconnected;
                        }
                    }
                }
            }
        }
    }

    /// Perform the single connect attempt this context converged on
    async fn run_connect(
        &self,
        done: watch::Sender<bool>,
    ) -> Result<Arc<dyn BusConnection>, BusError> {
        debug!(host = %self.config.host, "opening connection");
        let attempt = self
            .transport
            .connect(&self.config, self.credential.clone())
            .await;

        let mut discarded: Option<Arc<dyn BusConnection>> = None;
        let result = {
            let mut state = self.state.lock().await;
            if matches!(&*state, State::Closed) {
                // close() raced the attempt and won; the fresh connection
                // must not be handed out
                if let Ok(conn) = attempt {
                    discarded = Some(conn);
                }
                Err(BusError::ClientClosed)
            } else {
                match attempt {
                    Ok(conn) => {
                        *state = State::Open(Arc::clone(&conn));
                        Ok(conn)
                    }
                    Err(err) => {
                        *state = State::Unconnected;
                        Err(err)
                    }
                }
            }
        };

        let _ = done.send(true);

        if let Some(conn) = discarded {
            debug!(host = %self.config.host, "connection opened after close, discarding");
            let _ = conn.close().await;
        }

        match &result {
            Ok(_) => debug!(host = %self.config.host, "connection established"),
            Err(err) => debug!(host = %self.config.host, error = %err, "connection attempt failed"),
        }
        result
    }

    /// Close the context; terminal and idempotent.
    ///
    /// Exactly one caller performs the physical teardown regardless of how
    /// many close calls race. Every operation issued through any handle
    /// after this returns fails with a closed-resource error.
    pub async fn close(&self) -> Result<(), BusError> {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, State::Closed)
        };

        match previous {
            State::Open(conn) => {
                info!(host = %self.config.host, "closing connection");
                conn.close().await
            }
            _ => Ok(()),
        }
    }
}
