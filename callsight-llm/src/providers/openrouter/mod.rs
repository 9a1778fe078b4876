//! OpenRouter provider implementation
//!
//! Chat completions against the OpenRouter API, which speaks the OpenAI wire
//! format.

pub mod client;
pub mod generation;
pub mod types;

pub use client::OpenRouterClient;
pub use generation::OpenRouterGenerator;
