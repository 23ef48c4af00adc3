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

use std::fmt::Debug;

use serde::Deserialize;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::config::Environment;
use crate::error::ArmError;

/// Tokens are renewed this long before they expire
const EXPIRY_MARGIN: time::Duration = time::Duration::minutes(5);

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// OAuth2 client credentials grant of a service principal
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// Token of the account logged in the Azure CLI
    AzureCli,
    /// Token given as is
    AccessToken(String),
}

impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Credential::AzureCli => f.write_str("AzureCli"),
            Credential::AccessToken(_) => f.write_str("AccessToken(..)"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
struct CachedToken {
    value: String,
    expires_at: Option<OffsetDateTime>,
}

impl Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl CachedToken {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .map_or(true, |expires_at| now + EXPIRY_MARGIN < expires_at)
    }
}

#[derive(Deserialize)]
struct OAuthToken {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

fn parse_oauth_token(body: &[u8], now: OffsetDateTime) -> Result<CachedToken, serde_json::Error> {
    let token: OAuthToken = serde_json::from_slice(body)?;
    Ok(CachedToken {
        value: token.access_token,
        expires_at: token
            .expires_in
            .map(|seconds| now + time::Duration::seconds(seconds)),
    })
}

fn parse_cli_token(output: &[u8]) -> Result<CachedToken, serde_json::Error> {
    let token: CliToken = serde_json::from_slice(output)?;
    Ok(CachedToken {
        value: token.access_token,
        expires_at: token
            .expires_on
            .and_then(|timestamp| OffsetDateTime::from_unix_timestamp(timestamp).ok()),
    })
}

/// Bearer tokens for the management endpoint, cached until shortly before they expire
#[derive(Debug)]
pub struct TokenCache {
    credential: Credential,
    environment: Environment,
    token: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(credential: Credential, environment: Environment) -> Self {
        Self {
            credential,
            environment,
            token: Mutex::new(None),
        }
    }

    pub async fn token(&self, client: &reqwest::Client) -> Result<String, ArmError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(OffsetDateTime::now_utc()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch(client).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch(&self, client: &reqwest::Client) -> Result<CachedToken, ArmError> {
        let resource = self.environment.management_endpoint();
        match &self.credential {
            Credential::AccessToken(token) => Ok(CachedToken {
                value: token.clone(),
                expires_at: None,
            }),
            Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let endpoint = format!(
                    "{}/{tenant_id}/oauth2/v2.0/token",
                    self.environment.login_endpoint()
                );
                tracing::debug!(endpoint, client_id, "requesting token");
                let scope = format!("{resource}/.default");
                let response = client
                    .post(&endpoint)
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("scope", scope.as_str()),
                    ])
                    .send()
                    .await?;
                let status = response.status();
                let body = response.bytes().await?;
                if !status.is_success() {
                    return Err(ArmError::Auth {
                        endpoint,
                        message: format!("{status}: {}", String::from_utf8_lossy(&body)),
                    });
                }
                parse_oauth_token(&body, OffsetDateTime::now_utc()).map_err(|err| {
                    ArmError::Auth {
                        endpoint,
                        message: err.to_string(),
                    }
                })
            }
            Credential::AzureCli => {
                let auth_error = |message: String| ArmError::Auth {
                    endpoint: "az account get-access-token".to_owned(),
                    message,
                };
                tracing::debug!("requesting token from the Azure CLI");
                let output = tokio::process::Command::new("az")
                    .args(["account", "get-access-token", "--resource", resource])
                    .args(["--output", "json"])
                    .kill_on_drop(true)
                    .output()
                    .await
                    .map_err(|err| auth_error(format!("could not run the Azure CLI: {err}")))?;
                if !output.status.success() {
                    return Err(auth_error(
                        String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                    ));
                }
                parse_cli_token(&output.stdout).map_err(|err| auth_error(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let token = |seconds: i64| CachedToken {
            value: "t".to_owned(),
            expires_at: Some(now + time::Duration::seconds(seconds)),
        };
        assert!(token(3600).is_fresh(now));
        assert!(!token(240).is_fresh(now));
        assert!(!token(-10).is_fresh(now));
        assert!(CachedToken {
            value: "t".to_owned(),
            expires_at: None
        }
        .is_fresh(now));
    }

    #[test]
    fn token_responses() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let token = parse_oauth_token(
            br#"{"token_type":"Bearer","expires_in":3599,"access_token":"abc"}"#,
            now,
        )
        .unwrap();
        assert_eq!(token.value, "abc");
        assert_eq!(token.expires_at, Some(now + time::Duration::seconds(3599)));

        let token = parse_cli_token(
            br#"{"accessToken":"xyz","expiresOn":"2023-11-14 23:13:20.000000","expires_on":1700003600,"tokenType":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(token.value, "xyz");
        assert_eq!(
            token.expires_at,
            Some(OffsetDateTime::from_unix_timestamp(1_700_003_600).unwrap())
        );
    }

    #[test]
    fn secrets_are_not_printed() {
        let credential = Credential::ClientSecret {
            tenant_id: "tenant".to_owned(),
            client_id: "client".to_owned(),
            client_secret: "hunter2".to_owned(),
        };
        assert!(!format!("{credential:?}").contains("hunter2"));
        assert!(!format!("{:?}", Credential::AccessToken("hunter2".to_owned())).contains("hunter2"));
    }

    #[tokio::test]
    async fn static_token() {
        let cache = TokenCache::new(
            Credential::AccessToken("static".to_owned()),
            Environment::Public,
        );
        let client = reqwest::Client::new();
        assert_eq!(cache.token(&client).await.unwrap(), "static");
        assert_eq!(cache.token(&client).await.unwrap(), "static");
    }
}
