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

//! Azure Resource Manager transport
//!
//! Resources only talk to ARM through the [`Arm`] trait.
//! [`ArmExt`] adds typed requests and long-running operation handling on top of any transport.

use std::fmt::{Debug, Display};
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::Environment;
use crate::error::ArmError;
use crate::poll::StateChangeConf;

pub mod auth;
pub mod connection;
pub mod models;

#[cfg(test)]
pub mod fake;

pub use connection::ArmConnection;

use models::{ErrorResponse, OperationStatus};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Patch,
    Post,
    Delete,
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArmRequest {
    pub method: Method,
    /// Resource path (`/subscriptions/...`) or absolute URL given by a previous response
    pub path: String,
    pub api_version: Option<&'static str>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ArmRequest {
    pub fn new(method: Method, path: impl Into<String>, api_version: &'static str) -> Self {
        Self {
            method,
            path: path.into(),
            api_version: Some(api_version),
            query: Vec::new(),
            body: None,
        }
    }

    /// Request an absolute URL returned by ARM (the URL already carries its api-version)
    pub fn url(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            path: url.into(),
            api_version: None,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ArmError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn is_absolute(&self) -> bool {
        self.path.starts_with("https://") || self.path.starts_with("http://")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArmResponse {
    pub status: u16,
    pub body: serde_json::Value,
    /// `Azure-AsyncOperation` header
    pub async_operation: Option<String>,
    /// `Location` header
    pub location: Option<String>,
    pub retry_after: Option<Duration>,
}

impl ArmResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body,
            ..Default::default()
        }
    }
}

/// Transport to Azure Resource Manager
#[async_trait]
pub trait Arm: Send + Sync + Clone + Debug + 'static {
    /// Subscription the provider has been configured with
    async fn subscription_id(&self) -> Result<String, ArmError>;

    /// Cloud the provider has been configured for
    async fn environment(&self) -> Result<Environment, ArmError>;

    /// Send a request
    ///
    /// Statuses outside of the 2xx range are returned as errors (see [`classify`]).
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError>;
}

/// Turn an unsuccessful response into an [`ArmError`]
pub fn classify(path: &str, status: u16, body: &serde_json::Value) -> ArmError {
    let detail = serde_json::from_value::<ErrorResponse>(body.clone())
        .ok()
        .and_then(|response| response.error)
        .unwrap_or_default();
    match status {
        404 => ArmError::NotFound {
            path: path.to_owned(),
        },
        409 => ArmError::Conflict {
            path: path.to_owned(),
            message: detail.message,
        },
        _ => ArmError::Api {
            status,
            code: detail.code,
            message: if detail.message.is_empty() {
                body.to_string()
            } else {
                detail.message
            },
        },
    }
}

/// Typed requests over an [`Arm`] transport
#[async_trait]
pub trait ArmExt: Arm {
    async fn get<T>(&self, path: &str, api_version: &'static str) -> Result<T, ArmError>
    where
        T: DeserializeOwned + Send,
    {
        let response = self
            .send(ArmRequest::new(Method::Get, path, api_version))
            .await?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// Get a resource, `None` when it does not exist
    async fn get_optional<T>(
        &self,
        path: &str,
        api_version: &'static str,
    ) -> Result<Option<T>, ArmError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(path, api_version).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn put<B, T>(&self, path: &str, api_version: &'static str, body: &B) -> Result<T, ArmError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        let request = ArmRequest::new(Method::Put, path, api_version).with_body(body)?;
        let body = self.execute(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn patch<B, T>(
        &self,
        path: &str,
        api_version: &'static str,
        body: &B,
    ) -> Result<T, ArmError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        let request = ArmRequest::new(Method::Patch, path, api_version).with_body(body)?;
        let body = self.execute(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn post<B, T>(
        &self,
        path: &str,
        api_version: &'static str,
        body: &B,
    ) -> Result<T, ArmError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        let request = ArmRequest::new(Method::Post, path, api_version).with_body(body)?;
        let body = self.execute(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// `POST {path}` without body, used by the `list*` actions
    async fn list<T>(&self, path: &str, api_version: &'static str) -> Result<T, ArmError>
    where
        T: DeserializeOwned + Send,
    {
        let body = self
            .execute(ArmRequest::new(Method::Post, path, api_version))
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Delete a resource, succeeding when it is already gone
    async fn delete(
        &self,
        path: &str,
        api_version: &'static str,
        query: &[(&str, &str)],
    ) -> Result<(), ArmError> {
        let mut request = ArmRequest::new(Method::Delete, path, api_version);
        for (key, value) in query {
            request = request.with_query(*key, *value);
        }
        match self.execute(request).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Send a request and wait for the operation it started to complete
    async fn execute(&self, request: ArmRequest) -> Result<serde_json::Value, ArmError> {
        let method = request.method;
        let path = request.path.clone();
        let api_version = request.api_version;
        let response = self.send(request).await?;
        let interval = response.retry_after.unwrap_or(DEFAULT_POLL_INTERVAL);

        if let Some(operation) = &response.async_operation {
            tracing::debug!(%method, path, operation, "waiting for async operation");
            let this = self;
            let operation = operation.as_str();
            StateChangeConf::new(
                ["InProgress", "Running", "Accepted", "Creating", "Updating", "Deleting"],
                ["Succeeded"],
                OPERATION_TIMEOUT,
            )
            .with_poll_interval(interval)
            .with_delay(interval)
            .wait_for_state(move || async move {
                let response = this.send(ArmRequest::url(Method::Get, operation)).await?;
                let status: OperationStatus = serde_json::from_value(response.body)?;
                match status.status.as_str() {
                    "Failed" | "Canceled" | "Cancelled" => Err(ArmError::OperationFailed {
                        message: status.error.map(|err| err.message).unwrap_or_default(),
                        status: status.status,
                    }),
                    _ => Ok(Some(((), status.status))),
                }
            })
            .await?;

            return match (method, api_version, &response.location) {
                (Method::Put | Method::Patch, Some(api_version), _) => {
                    let response = self
                        .send(ArmRequest::new(Method::Get, path, api_version))
                        .await?;
                    Ok(response.body)
                }
                (Method::Post, _, Some(location)) => {
                    let response = self.send(ArmRequest::url(Method::Get, location)).await?;
                    Ok(response.body)
                }
                _ => Ok(serde_json::Value::Null),
            };
        }

        if response.status == 202 {
            if let Some(location) = &response.location {
                tracing::debug!(%method, path, location, "waiting for operation location");
                let this = self;
                let location = location.as_str();
                return StateChangeConf::new(["202"], ["200", "201", "204"], OPERATION_TIMEOUT)
                    .with_poll_interval(interval)
                    .with_delay(interval)
                    .wait_for_state(move || async move {
                        let response = this.send(ArmRequest::url(Method::Get, location)).await?;
                        Ok(Some((response.body, response.status.to_string())))
                    })
                    .await;
            }
        }

        Ok(response.body)
    }
}

impl<A: Arm> ArmExt for A {}
