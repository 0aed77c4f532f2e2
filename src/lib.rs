//! Anonymous diary exchange: users post short diaries, receive a daily batch
//! of other people's entries, and may keep one of them per day.

pub mod app;
pub mod calendar;
pub mod config;
pub mod diaries;
pub mod distribution;
pub mod error;
pub mod extract;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod users;
