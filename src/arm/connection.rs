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

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use tokio::sync::RwLock;

use super::auth::TokenCache;
use super::{classify, Arm, ArmRequest, ArmResponse, Method};
use crate::config::{Environment, Settings};
use crate::error::ArmError;

const MAX_THROTTLING_RETRIES: usize = 3;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct Session {
    endpoint: &'static str,
    environment: Environment,
    subscription_id: String,
    tokens: TokenCache,
    client: reqwest::Client,
}

/// [`Arm`] implementation over HTTPS
///
/// Clones share the same session, set once the provider is configured.
#[derive(Debug, Clone, Default)]
pub struct ArmConnection {
    session: Arc<RwLock<Option<Arc<Session>>>>,
}

impl ArmConnection {
    pub async fn configure(&self, settings: Settings) -> Result<(), ArmError> {
        let mut user_agent = format!(
            "terraform-provider-appservice/{}",
            env!("CARGO_PKG_VERSION")
        );
        if let Some(partner_id) = &settings.partner_id {
            user_agent.push_str(" pid-");
            user_agent.push_str(partner_id);
        }
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        tracing::info!(
            environment = %settings.environment,
            subscription_id = settings.subscription_id,
            credential = ?settings.credential,
            "configuring Azure Resource Manager connection"
        );

        let session = Session {
            endpoint: settings.environment.management_endpoint(),
            environment: settings.environment,
            subscription_id: settings.subscription_id,
            tokens: TokenCache::new(settings.credential, settings.environment),
            client,
        };
        *self.session.write().await = Some(Arc::new(session));
        Ok(())
    }

    async fn session(&self) -> Result<Arc<Session>, ArmError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(ArmError::NotConfigured)
    }
}

fn header(headers: &HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Arm for ArmConnection {
    async fn subscription_id(&self) -> Result<String, ArmError> {
        Ok(self.session().await?.subscription_id.clone())
    }

    async fn environment(&self) -> Result<Environment, ArmError> {
        Ok(self.session().await?.environment)
    }

    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError> {
        let session = self.session().await?;
        let url = if request.is_absolute() {
            request.path.clone()
        } else {
            format!("{}{}", session.endpoint, request.path)
        };

        let mut retries = 0;
        loop {
            let token = session.tokens.token(&session.client).await?;
            let mut builder = session
                .client
                .request(request.method.into(), &url)
                .bearer_auth(token);
            if let Some(api_version) = request.api_version {
                builder = builder.query(&[("api-version", api_version)]);
            }
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            tracing::debug!(method = %request.method, url, "sending request");
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let retry_after = header(&headers, RETRY_AFTER)
                .and_then(|value| value.parse().ok())
                .map(Duration::from_secs);
            let bytes = response.bytes().await?;
            let body = if bytes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                    serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
                })
            };
            tracing::debug!(method = %request.method, url, status, "received response");

            if status == 429 && retries < MAX_THROTTLING_RETRIES {
                retries += 1;
                let wait = retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
                tracing::warn!(url, ?wait, retries, "throttled by Azure Resource Manager");
                tokio::time::sleep(wait).await;
                continue;
            }

            if !(200..300).contains(&status) {
                return Err(classify(&request.path, status, &body));
            }

            return Ok(ArmResponse {
                status,
                body,
                async_operation: header(&headers, "Azure-AsyncOperation"),
                location: header(&headers, LOCATION),
                retry_after,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_before_configure_fail() {
        let connection = ArmConnection::default();
        let err = connection
            .send(ArmRequest::new(Method::Get, "/subscriptions/x", "v"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArmError::NotConfigured));
        assert!(matches!(
            connection.subscription_id().await,
            Err(ArmError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn clones_share_the_session() {
        let connection = ArmConnection::default();
        let clone = connection.clone();
        connection
            .configure(Settings {
                subscription_id: "00000000-0000-0000-0000-000000000000".to_owned(),
                environment: Default::default(),
                credential: crate::arm::auth::Credential::AccessToken("t".to_owned()),
                partner_id: None,
            })
            .await
            .unwrap();
        assert_eq!(
            clone.subscription_id().await.unwrap(),
            "00000000-0000-0000-0000-000000000000"
        );
    }
}
