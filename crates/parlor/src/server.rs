//! `LobbyServer` builder and accept loop.
//!
//! This is the entry point for running a Parlor lobby server. It ties
//! together all the layers: transport → protocol → room registry over an
//! injected store.

use std::collections::HashMap;
use std::sync::Arc;

use parlor_room::RoomRegistry;
use parlor_store::StoreProvider;
use parlor_transport::{TcpLineTransport, Transport};
use tokio::sync::Mutex;

use crate::handler::{handle_connection, ServerState};
use crate::ParlorError;

/// Builder for configuring and starting a lobby server.
///
/// # Example
///
/// ```rust,no_run
/// use parlor::{LobbyServerBuilder, MemoryStore};
///
/// # async fn run() -> Result<(), parlor::ParlorError> {
/// let server = LobbyServerBuilder::new()
///     .bind("0.0.0.0:7400")
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LobbyServerBuilder {
    bind_addr: String,
}

impl LobbyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7400".to_string(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Builds the server over the given store provider.
    pub async fn build<P: StoreProvider>(
        self,
        store: P,
    ) -> Result<LobbyServer<P>, ParlorError> {
        let transport = TcpLineTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: RoomRegistry::new(store),
            peers: Mutex::new(HashMap::new()),
        });

        Ok(LobbyServer { transport, state })
    }
}

impl Default for LobbyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running lobby server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LobbyServer<P: StoreProvider> {
    transport: TcpLineTransport,
    state: Arc<ServerState<P>>,
}

impl<P: StoreProvider> LobbyServer<P> {
    /// Creates a new builder.
    pub fn builder() -> LobbyServerBuilder {
        LobbyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), ParlorError> {
        tracing::info!("Parlor lobby server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
