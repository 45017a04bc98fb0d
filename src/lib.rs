// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keycloak Gate - bearer token verification and role-based authorization
//!
//! Verifies Keycloak-issued access tokens against the realm's published
//! signing keys and grants or denies protected operations by role.
//!
//! ## Modules
//!
//! - `auth` - Key cache, token verifier, role evaluation, authorization guard
//! - `api` - HTTP API handlers (Axum)
//! - `config` - Environment-driven settings
//! - `logging` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
