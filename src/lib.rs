//! A continuous double-auction matching engine for binary prediction markets.
//!
//! Every market has two mutually exclusive outcomes, YES and NO. Both sides of
//! the book hold *buy* orders for their outcome; an incoming YES order matches
//! against resting NO liquidity and vice versa. The [`engine::Engine`] facade
//! owns one book per market, matches submissions under a per-market lock, and
//! records trades, fill progress, positions and top-of-book prices through the
//! [`persistence::Persistence`] port.

pub mod decimal;
pub mod engine;
pub mod matcher;
pub mod memory;
pub mod orderbook;
pub mod orders;
pub mod persistence;
pub mod position;
pub mod store;
pub mod trade;
