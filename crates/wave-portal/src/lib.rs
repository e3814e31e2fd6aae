//! # wave-portal
//!
//! Client-side session logic for the WavePortal contract: connect a wallet, send short messages
//! ("waves") as transactions, and keep a live, duplicate-free list of every wave ever sent.
//!
//! ## Architecture
//!
//! - [`WalletSession`] owns the wallet connection and the active [`Account`].
//! - [`ContractGateway`] is the stateless read/write surface over a [`WaveContract`] bound to
//!   that account, including the live [`Subscription`] to `NewWave` events.
//! - [`WaveLedger`] merges the batch-fetched history with live events.
//! - [`TransactionTracker`] follows a submitted wave from `Submitted` to `Confirmed`/`Failed`.
//! - [`SessionController`] wires them together and is what a renderer talks to.
//!
//! The wallet and the contract are reached through the [`WalletProvider`] and
//! [`ContractBinder`]/[`WaveContract`] traits; [`rpc`] implements them over JSON-RPC.

#[macro_use]
extern crate tracing;

pub mod config;
pub mod contract;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod provider;
pub mod rpc;
pub mod tracker;
pub mod types;
pub mod wallet;

pub use config::WavePortalConfig;
pub use contract::{ContractBinder, RawWave, WaveContract, WaveReceipt, WaveStream};
pub use controller::{SessionController, SessionSnapshot, UserIntent};
pub use error::{ProviderError, WaveError};
pub use gateway::{ContractGateway, GatewayLimits, Subscription};
pub use ledger::{SharedLedger, WaveLedger};
pub use provider::{AccountsRequest, NoWallet, WalletProvider};
pub use tracker::TransactionTracker;
pub use types::{Account, ConnectionPhase, SessionState, TransactionHandle, TxState, WaveRecord};
pub use wallet::WalletSession;
