//! Session management.

use crate::files::FileTable;
use std::net::SocketAddr;
use std::time::Instant;
use uuid::Uuid;

/// Dispatch-loop state of a connection.
///
/// The loop cycles `AwaitingCall -> Dispatching -> Responding` for every
/// call. `Closed` is reached only from `AwaitingCall`, when the peer ends
/// the stream at the call boundary; `Failed` is reachable from any state on
/// an unrecoverable transport or protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next call-code frame.
    AwaitingCall,
    /// Arguments decoded, local operation in progress.
    Dispatching,
    /// Sending the result (and any trailing data or errno frames).
    Responding,
    /// Peer closed cleanly.
    Closed,
    /// Unrecoverable error; the connection is being torn down.
    Failed,
}

/// A client session: one accepted connection and everything it owns.
pub struct Session {
    /// Unique session ID for log correlation.
    pub id: String,

    /// Remote address.
    pub remote_addr: SocketAddr,

    state: SessionState,

    /// Files opened on behalf of this connection. Dropped with the
    /// session, closing anything the client left open.
    files: FileTable,

    calls_handled: u64,

    created_at: Instant,
}

impl Session {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr,
            state: SessionState::AwaitingCall,
            files: FileTable::new(),
            calls_handled: 0,
            created_at: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Returns the connection-local file table.
    pub fn files_mut(&mut self) -> &mut FileTable {
        &mut self.files
    }

    /// Records a dispatched call.
    pub fn record_call(&mut self) {
        self.calls_handled += 1;
    }

    pub fn calls_handled(&self) -> u64 {
        self.calls_handled
    }

    /// Returns the session age.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}
