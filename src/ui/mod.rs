//! # UI Module
//!
//! Shared styling for the monitor window. The window itself lives in
//! `app.rs` and the review chart in `charts.rs`.

pub mod styles;
