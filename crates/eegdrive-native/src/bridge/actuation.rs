//! Actuation control server
//!
//! Listens for exactly one actuator connection and forwards classification
//! decisions to it as single-byte, newline-terminated tokens.
//!
//! ```text
//!  Listening ──accept──► Connected ──Terminate / write error──► Closed
//!      │                                                          ▲
//!      └──────────────────────── Terminate ───────────────────────┘
//! ```
//!
//! Labels received while listening are held in a bounded backlog (oldest
//! dropped first) and written in order once the actuator connects.

use std::collections::VecDeque;
use std::net::SocketAddr;

use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use eegdrive_core::protocol::TokenTable;
use eegdrive_core::types::StateLabel;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that end the actuation server.
#[derive(Debug, Error)]
pub enum ActuationError {
    /// Listener could not be bound
    #[error("Failed to bind actuator listener on {addr}: {source}")]
    Bind {
        /// Requested bind address
        addr: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Accepting the actuator connection failed
    #[error("Accept failed: {0}")]
    Accept(std::io::Error),

    /// Writing a token to the actuator failed
    #[error("Actuator write failed: {0}")]
    Write(std::io::Error),
}

/// Result type for actuation operations.
pub type ActuationResult<T> = Result<T, ActuationError>;

// ============================================================================
// Messages and State
// ============================================================================

/// Message from the analysis loop to the actuation server.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActuationMessage {
    /// Latest classification decision
    Label(StateLabel),
    /// Close the connection and end the server
    Terminate,
}

/// Actuation server connection state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ServerState {
    /// Waiting for the actuator to connect
    Listening,
    /// Forwarding tokens to the actuator
    Connected,
    /// Connection closed, server ended
    Closed,
}

/// Counters reported when the server ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ActuationSummary {
    /// Tokens written to the actuator
    pub tokens_written: usize,
    /// Labels without a token
    pub labels_ignored: usize,
    /// Labels dropped from a full backlog
    pub labels_dropped: usize,
    /// State when the server ended
    pub final_state: ServerState,
}

// ============================================================================
// Server
// ============================================================================

/// Single-client actuation server.
pub struct ActuationServer {
    listener: TcpListener,
    tokens: TokenTable,
    backlog_capacity: usize,
    backlog: VecDeque<StateLabel>,
    summary: ActuationSummary,
}

impl ActuationServer {
    /// Bind the listener.
    ///
    /// # Arguments
    ///
    /// * `addr` - Bind address, e.g. `0.0.0.0:12345`
    /// * `tokens` - Label to token mapping
    /// * `backlog` - Labels retained while no actuator is connected
    ///
    /// # Errors
    ///
    /// Returns [`ActuationError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: &str, tokens: TokenTable, backlog: usize) -> ActuationResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ActuationError::Bind { addr: addr.to_string(), source })?;
        tracing::info!("Actuation server listening on {}", addr);

        Ok(Self {
            listener,
            tokens,
            backlog_capacity: backlog,
            backlog: VecDeque::with_capacity(backlog),
            summary: ActuationSummary {
                tokens_written: 0,
                labels_ignored: 0,
                labels_dropped: 0,
                final_state: ServerState::Listening,
            },
        })
    }

    /// Address the listener is bound to
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the address cannot be queried.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run until terminated.
    ///
    /// A closed message channel counts as `Terminate`.
    ///
    /// # Errors
    ///
    /// Returns [`ActuationError::Accept`] or [`ActuationError::Write`] when the
    /// connection fails; the server does not reconnect.
    pub async fn run(
        mut self,
        mut messages: mpsc::Receiver<ActuationMessage>,
    ) -> ActuationResult<ActuationSummary> {
        let Some(mut stream) = self.listen(&mut messages).await? else {
            return Ok(self.close());
        };

        while let Some(label) = self.backlog.pop_front() {
            self.forward(&mut stream, label).await?;
        }

        while let Some(message) = messages.recv().await {
            match message {
                ActuationMessage::Label(label) => self.forward(&mut stream, label).await?,
                ActuationMessage::Terminate => break,
            }
        }

        if let Err(e) = stream.shutdown().await {
            tracing::debug!("Actuator shutdown: {}", e);
        }
        Ok(self.close())
    }

    /// Wait for the actuator, backlogging labels. `None` if terminated first.
    async fn listen(
        &mut self,
        messages: &mut mpsc::Receiver<ActuationMessage>,
    ) -> ActuationResult<Option<TcpStream>> {
        loop {
            tokio::select! {
                biased;

                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(ActuationError::Accept)?;
                    tracing::info!("Actuator connected from {}", peer);
                    self.summary.final_state = ServerState::Connected;
                    return Ok(Some(stream));
                }

                message = messages.recv() => match message {
                    Some(ActuationMessage::Label(label)) => self.hold(label),
                    Some(ActuationMessage::Terminate) | None => {
                        tracing::info!("Actuation terminating before a client connected");
                        return Ok(None);
                    }
                },
            }
        }
    }

    fn hold(&mut self, label: StateLabel) {
        if self.tokens.token_for(label).is_none() {
            self.ignore(label);
            return;
        }
        if self.backlog_capacity == 0 {
            self.summary.labels_dropped += 1;
            return;
        }
        if self.backlog.len() == self.backlog_capacity {
            self.backlog.pop_front();
            self.summary.labels_dropped += 1;
        }
        self.backlog.push_back(label);
    }

    async fn forward(&mut self, stream: &mut TcpStream, label: StateLabel) -> ActuationResult<()> {
        let Some(token) = self.tokens.token_for(label) else {
            self.ignore(label);
            return Ok(());
        };

        if let Err(e) = stream.write_all(&token.encode()).await {
            tracing::error!("Actuator write failed: {}", e);
            return Err(ActuationError::Write(e));
        }
        self.summary.tokens_written += 1;
        tracing::debug!("Sent {:?} for {}", char::from(token), label.name());
        Ok(())
    }

    fn ignore(&mut self, label: StateLabel) {
        self.summary.labels_ignored += 1;
        tracing::debug!("No actuator token for {:?}", label);
    }

    fn close(mut self) -> ActuationSummary {
        self.summary.final_state = ServerState::Closed;
        tracing::info!("Actuation server closed: {:?}", self.summary);
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eegdrive_core::protocol::ActuatorToken;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    async fn server(tokens: TokenTable, backlog: usize) -> (ActuationServer, SocketAddr) {
        let server = ActuationServer::bind("127.0.0.1:0", tokens, backlog).await.expect("bind");
        let addr = server.local_addr().expect("addr");
        (server, addr)
    }

    async fn read_all(mut client: TcpStream) -> Vec<u8> {
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.expect("read");
        out
    }

    #[tokio::test]
    async fn test_queued_labels_written_in_order() {
        let (server, addr) = server(TokenTable::default(), 8).await;
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(server.run(rx));

        tx.send(ActuationMessage::Label(StateLabel::Active)).await.expect("send");
        tx.send(ActuationMessage::Label(StateLabel::Quiescent)).await.expect("send");

        let mut client = TcpStream::connect(addr).await.expect("connect");
        let mut head = [0u8; 4];
        client.read_exact(&mut head).await.expect("read");
        tx.send(ActuationMessage::Terminate).await.expect("send");

        assert_eq!(&head, b"m\nm\n");
        assert!(read_all(client).await.is_empty());
        let summary = handle.await.expect("join").expect("clean termination");
        assert_eq!(summary.tokens_written, 2);
        assert_eq!(summary.final_state, ServerState::Closed);
    }

    #[tokio::test]
    async fn test_custom_tokens_and_unknown_labels() {
        let tokens = TokenTable {
            active: Some(ActuatorToken::MOTION),
            quiescent: Some(ActuatorToken::HALT),
        };
        let (server, addr) = server(tokens, 8).await;
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(server.run(rx));

        let client = TcpStream::connect(addr).await.expect("connect");
        tx.send(ActuationMessage::Label(StateLabel::Active)).await.expect("send");
        tx.send(ActuationMessage::Label(StateLabel::Unknown(5))).await.expect("send");
        tx.send(ActuationMessage::Label(StateLabel::Quiescent)).await.expect("send");
        tx.send(ActuationMessage::Terminate).await.expect("send");

        assert_eq!(read_all(client).await, b"m\ns\n");
        let summary = handle.await.expect("join").expect("clean termination");
        assert_eq!(summary.labels_ignored, 1);
    }

    #[tokio::test]
    async fn test_terminate_while_listening() {
        let (server, _addr) = server(TokenTable::default(), 8).await;
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(server.run(rx));

        tx.send(ActuationMessage::Label(StateLabel::Active)).await.expect("send");
        tx.send(ActuationMessage::Terminate).await.expect("send");

        let summary = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server ended within 2 s")
            .expect("join")
            .expect("clean termination");
        assert_eq!(summary.tokens_written, 0);
        assert_eq!(summary.final_state, ServerState::Closed);
    }

    #[tokio::test]
    async fn test_backlog_drops_oldest() {
        let tokens = TokenTable {
            active: Some(ActuatorToken::MOTION),
            quiescent: Some(ActuatorToken::HALT),
        };
        let (server, addr) = server(tokens, 2).await;
        let (tx, rx) = mpsc::channel(8);

        tx.send(ActuationMessage::Label(StateLabel::Active)).await.expect("send");
        tx.send(ActuationMessage::Label(StateLabel::Quiescent)).await.expect("send");
        tx.send(ActuationMessage::Label(StateLabel::Quiescent)).await.expect("send");
        let handle = tokio::spawn(server.run(rx));

        // Let the server drain the queue into its backlog before connecting
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut client = TcpStream::connect(addr).await.expect("connect");
        let mut head = [0u8; 4];
        client.read_exact(&mut head).await.expect("read");
        drop(tx);

        assert_eq!(&head, b"s\ns\n");
        assert!(read_all(client).await.is_empty());
        let summary = handle.await.expect("join").expect("clean termination");
        assert_eq!(summary.labels_dropped, 1);
        assert_eq!(summary.tokens_written, 2);
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let (first, addr) = server(TokenTable::default(), 1).await;
        let result = ActuationServer::bind(&addr.to_string(), TokenTable::default(), 1).await;
        assert!(matches!(result, Err(ActuationError::Bind { .. })));
        drop(first);
    }
}
