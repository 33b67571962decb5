//! Binance module - Spot REST client and exchange gateway

pub mod auth;
pub mod client;
pub mod messages;
pub mod rest;

pub use client::BinanceClient;
pub use rest::BinanceRestClient;
