//! Command-Line Interface
//!
//! Thin callers of the two library entrypoints (`process_document` and
//! `answer_query`); all wiring happens once in [`session::Session`].

pub mod commands;
pub mod output;
pub mod session;
