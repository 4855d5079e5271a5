// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state, grounded in the teacher's `MuxState`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::DispatchConfig;
use crate::store::Store;

/// Shared dispatch-core state.
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<DispatchConfig>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: DispatchConfig, shutdown: CancellationToken) -> Self {
        Self { store: Arc::new(Store::new()), config: Arc::new(config), shutdown }
    }
}
