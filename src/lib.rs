//! Voice interview — a spoken mock-interview client.
//!
//! An interviewer voice asks questions, the candidate answers out loud (or
//! a simulator answers in test mode), and the finished conversation is
//! scored by the backend.

pub mod audio;
pub mod config;
pub mod conversation;
pub mod services;
pub mod session;
