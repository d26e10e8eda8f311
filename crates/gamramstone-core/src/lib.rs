//! Gamramstone Core Library
//!
//! Client core for the Gamramstone translation archive: fetches channel
//! video lists, applies finished caption tracks to YouTube one at a time,
//! confirms the new status with the backend and keeps the local list in
//! step without re-fetching.
//!
//! Frontends (the CLI, a desktop shell) build a [`core::apply::CaptionApplyService`]
//! around a [`core::platform::CaptionPlatform`] and register
//! [`core::channel::ChannelView::applied_hook`] as its "on applied" callback.

pub mod core;

pub use crate::core::apply::{AppliedCallback, CaptionApplyService};
pub use crate::core::channel::{ChannelView, ListSource};
pub use crate::core::envelope::ApiFailure;
pub use crate::core::{CoreError, CoreResult};
