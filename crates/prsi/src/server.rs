//! `PrsiServer` builder and the reactor loop.
//!
//! The loop is single-threaded: one task polls the reactor, hands every
//! readiness event to [`ServerState`], runs the liveness sweep, closes
//! whatever the state gave up on, and refreshes write interest. No locks,
//! no spawned tasks per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use prsi_transport::{Reactor, Readiness};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{PrsiError, ServerConfig, ServerState};

/// Builder for configuring and starting a Prsi server.
///
/// ```rust,ignore
/// let server = PrsiServer::builder()
///     .bind("127.0.0.1:3750")
///     .build()
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Default)]
pub struct PrsiServerBuilder {
    config: ServerConfig,
    bind: Option<String>,
    rng_seed: Option<u64>,
}

impl PrsiServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the configured bind address.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind = Some(addr.to_string());
        self
    }

    /// Makes every shuffle reproducible.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Validates the configuration and binds the listener.
    pub async fn build(self) -> Result<PrsiServer, PrsiError> {
        let mut config = self.config;
        if let Some(addr) = self.bind {
            config.bind_address = addr;
        }
        let config = config.validated();

        let reactor = Reactor::bind(&config.bind_address, config.max_events).await?;
        let rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(PrsiServer {
            reactor,
            state: ServerState::new(config, rng),
        })
    }
}

/// A bound Prsi server. Call [`run`](Self::run) to start serving.
pub struct PrsiServer {
    reactor: Reactor,
    state: ServerState,
}

impl PrsiServer {
    pub fn builder() -> PrsiServerBuilder {
        PrsiServerBuilder::new()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, PrsiError> {
        Ok(self.reactor.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        self.state.config()
    }

    /// Serves until the process is terminated.
    pub async fn run(self) -> Result<(), PrsiError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` completes.
    ///
    /// Shutdown is checked between iterations, so a batch of readiness is
    /// always handled completely.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), PrsiError> {
        let timeout = self.state.config().poll_timeout();
        tracing::info!(
            addr = %self.local_addr()?,
            max_clients = self.state.config().max_clients,
            max_rooms = self.state.config().max_rooms,
            "Prsi server running"
        );
        tokio::pin!(shutdown);

        loop {
            let polled = tokio::select! {
                () = &mut shutdown => break,
                polled = self.reactor.poll(timeout) => polled,
            };
            let events = polled.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "poll failed");
                Vec::new()
            });

            self.tick(events, Instant::now());
        }

        tracing::info!(clients = self.state.sessions().len(), "Prsi server stopped");
        Ok(())
    }

    /// One loop iteration after the reactor returned.
    fn tick(&mut self, events: Vec<Readiness>, now: Instant) {
        for event in events {
            match event {
                Readiness::Accepted { id, peer } => {
                    if self.state.accept(id, now) {
                        tracing::debug!(connection_id = %id, %peer, "peer accepted");
                    }
                }
                Readiness::Io {
                    id,
                    readable,
                    writable,
                    hangup,
                } => {
                    let Some(conn) = self.reactor.connection(id) else {
                        continue;
                    };
                    // A hangup surfaces as a failed or empty read.
                    if readable || hangup {
                        self.state.on_readable(conn, now);
                    }
                    if writable {
                        self.state.on_writable(conn);
                    }
                }
            }
        }

        self.state.sweep(now);

        for id in self.state.take_closed() {
            self.reactor.close(id);
        }
        for (id, wanted) in self.state.write_interest() {
            if self.reactor.wants_write(id) != wanted {
                tracing::trace!(connection_id = %id, wanted, "write interest changed");
                self.reactor.set_write_interest(id, wanted);
            }
        }
    }
}
