// This file is part of the terraform-provider-appservice project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use thiserror::Error;

use crate::ids::IdError;

/// Classified failure of a call against Azure Resource Manager
#[derive(Debug, Error)]
pub enum ArmError {
    #[error("the provider has not been configured")]
    NotConfigured,
    #[error("authenticating against {endpoint}: {message}")]
    Auth { endpoint: String, message: String },
    #[error("{path} was not found")]
    NotFound { path: String },
    #[error("conflict on {path}: {message}")]
    Conflict { path: String, message: String },
    #[error("unexpected status {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("timeout while waiting for state to become {target:?} (last state: {last_state:?}, timeout: {timeout:?})")]
    Timeout {
        target: Vec<String>,
        last_state: String,
        timeout: Duration,
    },
    #[error("unexpected state {state:?}, wanted target {target:?}")]
    UnexpectedState { state: String, target: Vec<String> },
    #[error("couldn't find resource (tried {checks} times)")]
    NotFoundChecks { checks: usize },
    #[error("long-running operation ended with status {status:?}: {message}")]
    OperationFailed { status: String, message: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Id(#[from] IdError),
}

impl ArmError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArmError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ArmError::Conflict { .. })
    }
}

/// Error raised when a resource about to be created already exists remotely
pub fn requires_import(resource_name: &str, id: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!(
        "A resource with the ID \"{id}\" already exists - to be managed via Terraform this resource needs to be imported into the State. Please see the resource documentation for {resource_name:?} for more information."
    )
}
