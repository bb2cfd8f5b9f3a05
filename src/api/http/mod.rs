// src/api/http/mod.rs

pub mod audit;
pub mod auth;
pub mod chat;
pub mod health;
pub mod queues;
pub mod search;
pub mod sessions;
pub mod teams;
pub mod uploads;
pub mod vault;
