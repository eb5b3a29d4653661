//! Error taxonomy for tree, layout, and lifecycle operations.
//!
//! Navigation itself never fails: out-of-range positions, missing popups and
//! empty columns are handled by returning early. Only the plumbing around it
//! (handles, layout, JSON input, the global context) reports errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("Handle(0) is the invalid sentinel")]
    InvalidSentinel,

    #[error("Invalid handle: {0}")]
    InvalidHandle(u32),

    #[error("Invalid node kind: {0}")]
    InvalidKind(u8),

    #[error("Invalid breakpoint rule: {0}")]
    InvalidBreakpoint(u8),

    #[error("Handle {handle} is not a {expected}")]
    WrongKind { handle: u32, expected: &'static str },

    #[error("Node {child} cannot be appended under its own descendant {parent}")]
    Cycle { parent: u32, child: u32 },

    #[error("No root set. Call gnav_set_root() first.")]
    NoRoot,

    #[error("Layout failed: {0}")]
    Layout(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid UTF-8 input")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Context not initialized. Call gnav_init_headless() first.")]
    NotInitialized,

    #[error("Context already initialized. Call gnav_shutdown() first.")]
    AlreadyInitialized,

    #[error("{0} lock poisoned after panic")]
    LockPoisoned(&'static str),

    #[error("Context access from non-owner thread is unsupported")]
    WrongThread,
}

impl From<taffy::TaffyError> for NavError {
    fn from(e: taffy::TaffyError) -> Self {
        NavError::Layout(format!("{e:?}"))
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
