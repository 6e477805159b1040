//! Offline-first synchronization of judge scores with the scoring server.
//!
//! Saves go live while the network answers and fall back to a durable per-judge
//! queue otherwise; the queue is uploaded in one batch when connectivity returns.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod services;
pub mod state;
