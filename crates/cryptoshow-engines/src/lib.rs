//! Engine implementations for CryptoShow.
//!
//! This crate provides [`HeadlessEngine`], an in-memory scene graph
//! implementing the [`Engine`](cryptoshow_abstraction::Engine) trait. It
//! records every command, tracks node lifetimes, and can inject failures,
//! which makes it the engine of choice for the CLI and for tests.

pub mod headless;

pub use headless::{EngineOp, HeadlessEngine, NodeKind};
