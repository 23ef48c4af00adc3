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

//! Provider block and `ARM_*` environment fallbacks

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::arm::auth::Credential;
use crate::utils::{WithSchema, WithValidate};
use crate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Public,
    UsGovernment,
    China,
}

impl Environment {
    pub const NAMES: &'static [&'static str] = &["public", "usgovernment", "china"];

    pub fn management_endpoint(self) -> &'static str {
        match self {
            Environment::Public => "https://management.azure.com",
            Environment::UsGovernment => "https://management.usgovcloudapi.net",
            Environment::China => "https://management.chinacloudapi.cn",
        }
    }

    pub fn login_endpoint(self) -> &'static str {
        match self {
            Environment::Public => "https://login.microsoftonline.com",
            Environment::UsGovernment => "https://login.microsoftonline.us",
            Environment::China => "https://login.chinacloudapi.cn",
        }
    }

    /// Suffix of the storage account endpoints, used in connection strings
    pub fn storage_suffix(self) -> &'static str {
        match self {
            Environment::Public => "core.windows.net",
            Environment::UsGovernment => "core.usgovcloudapi.net",
            Environment::China => "core.chinacloudapi.cn",
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Environment::Public),
            "usgovernment" => Ok(Environment::UsGovernment),
            "china" => Ok(Environment::China),
            _ => Err(anyhow!(
                "unknown environment {s:?}, expected one of {:?}",
                Environment::NAMES
            )),
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Environment::Public => "public",
            Environment::UsGovernment => "usgovernment",
            Environment::China => "china",
        })
    }
}

/// Provider block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub subscription_id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub client_id: ValueString<'a>,
    pub client_secret: ValueString<'a>,
    pub access_token: ValueString<'a>,
    pub environment: ValueString<'a>,
    pub use_cli: ValueBool,
    pub partner_id: ValueString<'a>,
}

/// Settings resolved from the provider block and the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub subscription_id: String,
    pub environment: Environment,
    pub credential: Credential,
    pub partner_id: Option<String>,
}

lazy_static! {
    static ref OPTIONAL_STRING: Attribute = Attribute {
        attr_type: AttributeType::String,
        constraint: AttributeConstraint::Optional,
        ..Default::default()
    };
}

fn optional_string(description: &str, sensitive: bool) -> Attribute {
    Attribute {
        description: Description::plain(description),
        sensitive,
        ..OPTIONAL_STRING.clone()
    }
}

impl WithSchema for ProviderConfig<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Manage Azure App Service resources"),
                attributes: map! {
                    "subscription_id" => optional_string("Subscription ID (env: `ARM_SUBSCRIPTION_ID`)", false),
                    "tenant_id" => optional_string("Tenant ID of the service principal (env: `ARM_TENANT_ID`)", false),
                    "client_id" => optional_string("Client ID of the service principal (env: `ARM_CLIENT_ID`)", false),
                    "client_secret" => optional_string("Client secret of the service principal (env: `ARM_CLIENT_SECRET`)", true),
                    "access_token" => optional_string("Bearer token used as is (env: `ARM_ACCESS_TOKEN`)", true),
                    "environment" => optional_string("Cloud environment: `public`, `usgovernment` or `china` (env: `ARM_ENVIRONMENT`)", false),
                    "use_cli" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Authenticate with the Azure CLI when no other credential is set (env: `ARM_USE_CLI`)"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "partner_id" => optional_string("GUID appended to the User-Agent for partner attribution", false),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for ProviderConfig<'_> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(environment) = &self.environment {
            if let Err(err) = environment.parse::<Environment>() {
                diags.error(
                    "Invalid environment",
                    err.to_string(),
                    attr_path.clone().attribute("environment"),
                );
            }
        }
        validate::not_empty(
            diags,
            attr_path.clone().attribute("partner_id"),
            &self.partner_id,
        );
        if self.client_secret.is_value() && self.access_token.is_value() {
            diags.error(
                "Conflicting credentials",
                "`client_secret` and `access_token` cannot be set together",
                attr_path.attribute("access_token"),
            );
        }
    }
}

impl<'a> ProviderConfig<'a> {
    /// Resolve the settings, falling back to `lookup` (the process environment) for unset attributes
    pub fn resolve(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Settings> {
        let get = |value: &ValueString<'a>, var: &str| -> Option<String> {
            value
                .as_deref_option()
                .map(str::to_owned)
                .or_else(|| lookup(var))
                .filter(|value| !value.is_empty())
        };

        let subscription_id = get(&self.subscription_id, "ARM_SUBSCRIPTION_ID").ok_or_else(|| {
            anyhow!("`subscription_id` must be set, either in the provider block or with `ARM_SUBSCRIPTION_ID`")
        })?;
        let environment = get(&self.environment, "ARM_ENVIRONMENT")
            .map(|environment| environment.parse())
            .transpose()?
            .unwrap_or_default();

        let use_cli = match self.use_cli {
            Value::Value(use_cli) => use_cli,
            _ => lookup("ARM_USE_CLI")
                .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true"))
                .unwrap_or(true),
        };

        let credential = if let Some(token) = get(&self.access_token, "ARM_ACCESS_TOKEN") {
            Credential::AccessToken(token)
        } else if let Some(client_secret) = get(&self.client_secret, "ARM_CLIENT_SECRET") {
            let tenant_id = get(&self.tenant_id, "ARM_TENANT_ID")
                .ok_or_else(|| anyhow!("`tenant_id` is required to authenticate with a client secret"))?;
            let client_id = get(&self.client_id, "ARM_CLIENT_ID")
                .ok_or_else(|| anyhow!("`client_id` is required to authenticate with a client secret"))?;
            Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            }
        } else if use_cli {
            Credential::AzureCli
        } else {
            return Err(anyhow!(
                "no credential available: set `client_secret`, `access_token` or enable `use_cli`"
            ));
        };

        Ok(Settings {
            subscription_id,
            environment,
            credential,
            partner_id: self.partner_id.as_deref_option().map(str::to_owned),
        })
    }
}
