// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthGuard, KeyCache};

#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<AuthGuard>,
}

impl AppState {
    pub fn new(guard: AuthGuard) -> Self {
        Self {
            guard: Arc::new(guard),
        }
    }

    /// The key cache behind the guard's verifier.
    pub fn keys(&self) -> &Arc<KeyCache> {
        self.guard.verifier().keys()
    }
}
