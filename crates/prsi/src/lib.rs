//! # Prsi
//!
//! Authoritative multiplayer server for Prsi, the Czech shedding card game.
//!
//! Clients speak a line-oriented text protocol over TCP. The server keeps
//! every piece of game state: who is connected, which rooms exist, whose
//! turn it is and what everyone holds. Clients only ever send intents.
//!
//! ## Layers
//!
//! ```text
//! PrsiServer     ← reactor loop (this crate)
//! ServerState    ← dispatch, broadcasts, liveness consequences (this crate)
//! prsi-room      ← lobby and room lifecycle
//! prsi-game      ← the rules
//! prsi-session   ← buffering, liveness, identity per connection
//! prsi-protocol  ← the PRSI text codec
//! prsi-transport ← non-blocking TCP readiness
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use prsi::{PrsiServer, ServerConfig};
//!
//! # async fn start() -> Result<(), prsi::PrsiError> {
//! let server = PrsiServer::builder()
//!     .config(ServerConfig::default())
//!     .bind("127.0.0.1:3750")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod server;
mod state;

#[cfg(test)]
mod testing;

pub use config::ServerConfig;
pub use error::PrsiError;
pub use server::{PrsiServer, PrsiServerBuilder};
pub use state::ServerState;
