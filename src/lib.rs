//! # Phoenix Channels for Rust
//!
//! An async client for the Phoenix Channels WebSocket protocol: one
//! persistent connection, any number of joinable topic channels multiplexed
//! over it, event listeners, and acknowledged pushes. The connection
//! heartbeats, reconnects with jittered backoff, and rejoins subscribed
//! channels on its own.
//!
//! ## Example
//!
//! ```no_run
//! use phoenix_channels_rs::{PhoenixClient, PhoenixClientOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PhoenixClient::new(
//!         "ws://localhost:4000/socket/websocket",
//!         PhoenixClientOptions::default(),
//!     )?;
//!     client.connect().await?;
//!
//!     let channel = client.channel("general:lobby", Default::default()).await?;
//!     let mut shouts = channel.on("shout").await;
//!     channel.subscribe().await?;
//!
//!     channel
//!         .push("shout", json!({"type": "inn", "data": "7707083893"}))
//!         .receive("ok", |_| println!("acknowledged"))
//!         .send()
//!         .await?;
//!
//!     while let Some(payload) = shouts.recv().await {
//!         println!("{payload}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use channel::{ChannelStatus, PhoenixChannel, PhoenixChannelOptions, Push, PushRef};
pub use client::{ConnectionState, PhoenixClient, PhoenixClientOptions};
pub use messaging::{ChannelEvent, SystemEvent};
pub use types::{PhoenixError, PhoenixMessage};
