pub mod binding;
pub mod client;
pub mod config;
pub mod connector;
pub mod game;
pub mod sessions;
pub mod ui;
pub mod units;
pub mod wallets;
