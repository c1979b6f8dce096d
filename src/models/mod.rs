// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod event;
pub mod features;
pub mod token;

pub use event::{RawDocument, WebhookEvent};
pub use features::ActivityFeatures;
pub use token::TokenRecord;
