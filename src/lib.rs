//! # autoprompt
//!
//! Prompt optimization for LLM chat front-ends.
//!
//! ## Features
//!
//! - Provider adapters for OpenAI-compatible, Anthropic and Gemini APIs
//! - Built-in and user-defined optimization strategies
//! - Retry, timeout and cancellation around every provider call
//! - A site table and DOM injection session for supported chat pages
//!
//! ## Quick Start
//!
//! ```rust
//! use autoprompt::sites::resolve_for_url;
//!
//! let site = resolve_for_url("https://chat.openai.com/c/42").unwrap();
//! assert_eq!(site.site_id, "chatgpt");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod dom;
pub mod history;
pub mod injector;
pub mod prompts;
pub mod rpc;
pub mod sites;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of autoprompt.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
