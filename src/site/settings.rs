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

//! App settings owned by the provider
//!
//! Several attributes are stored remotely as app settings.
//! Those settings are written along the user `app_settings` and filtered out when reading them back.

use std::collections::BTreeMap;

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

pub const WEBSITE_HEALTHCHECK_MAXPINGFAILURES: &str = "WEBSITE_HEALTHCHECK_MAXPINGFAILURES";

pub const AZURE_WEB_JOBS_STORAGE: &str = "AzureWebJobsStorage";
pub const AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME: &str = "AzureWebJobsStorage__accountName";
pub const AZURE_WEB_JOBS_DASHBOARD: &str = "AzureWebJobsDashboard";
pub const AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME: &str = "AzureWebJobsDashboard__accountName";
pub const FUNCTIONS_EXTENSION_VERSION: &str = "FUNCTIONS_EXTENSION_VERSION";
pub const WEBSITE_CONTENTSHARE: &str = "WEBSITE_CONTENTSHARE";
pub const WEBSITE_CONTENTAZUREFILECONNECTIONSTRING: &str =
    "WEBSITE_CONTENTAZUREFILECONNECTIONSTRING";

/// Settings written by the platform or by other attributes, never reported in `app_settings`
pub const SITE_MANAGED_SETTINGS: &[&str] = &[
    "DIAGNOSTICS_AZUREBLOBCONTAINERSASURL",
    "DIAGNOSTICS_AZUREBLOBRETENTIONINDAYS",
    "WEBSITE_HTTPLOGGING_CONTAINER_URL",
    "WEBSITE_HTTPLOGGING_RETENTION_DAYS",
    "WEBSITE_VNET_ROUTE_ALL",
    WEBSITE_HEALTHCHECK_MAXPINGFAILURES,
];

pub const FUNCTION_MANAGED_SETTINGS: &[&str] = &[
    AZURE_WEB_JOBS_STORAGE,
    AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME,
    AZURE_WEB_JOBS_DASHBOARD,
    AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME,
    FUNCTIONS_EXTENSION_VERSION,
    WEBSITE_CONTENTSHARE,
    WEBSITE_CONTENTAZUREFILECONNECTIONSTRING,
];

const MANAGED_PREFIXES: &[&str] = &["spring.datasource."];

pub fn is_managed(key: &str, managed: &[&str]) -> bool {
    SITE_MANAGED_SETTINGS
        .iter()
        .chain(managed)
        .any(|managed| managed.eq_ignore_ascii_case(key))
        || MANAGED_PREFIXES
            .iter()
            .any(|prefix| key.to_ascii_lowercase().starts_with(prefix))
}

/// Remote settings without the ones owned by the provider
pub fn user_settings(
    remote: &BTreeMap<String, String>,
    managed: &[&str],
) -> BTreeMap<String, String> {
    remote
        .iter()
        .filter(|(key, _)| !is_managed(key, managed))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Complete set of settings to write: the provider settings, overridden by the user ones
pub fn merge_app_settings(
    user: &BTreeMap<String, String>,
    mut provider: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    for (key, value) in user {
        provider.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
        provider.insert(key.clone(), value.clone());
    }
    provider
}

/// Platform settings kept as they are when rewriting the settings of an existing site
pub fn preserved_settings(
    remote: &BTreeMap<String, String>,
    managed: &[&str],
) -> BTreeMap<String, String> {
    remote
        .iter()
        .filter(|(key, _)| {
            SITE_MANAGED_SETTINGS
                .iter()
                .filter(|key| **key != WEBSITE_HEALTHCHECK_MAXPINGFAILURES)
                .any(|preserved| preserved.eq_ignore_ascii_case(key))
                && !managed.iter().any(|managed| managed.eq_ignore_ascii_case(key))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub fn storage_connection_string(account_name: &str, access_key: &str, suffix: &str) -> String {
    format!(
        "DefaultEndpointsProtocol=https;AccountName={account_name};AccountKey={access_key};EndpointSuffix={suffix}"
    )
}

/// Account name and key of a storage connection string
pub fn parse_storage_connection_string(input: &str) -> Option<(String, String)> {
    let mut name = None;
    let mut key = None;
    for part in input.split(';') {
        if let Some((k, v)) = part.split_once('=') {
            match k {
                "AccountName" => name = Some(v.to_owned()),
                "AccountKey" => key = Some(v.to_owned()),
                _ => (),
            }
        }
    }
    Some((name?, key?))
}

pub fn key_vault_reference(secret_id: &str) -> String {
    format!("@Microsoft.KeyVault(SecretUri={secret_id})")
}

pub fn parse_key_vault_reference(input: &str) -> Option<&str> {
    input
        .strip_prefix("@Microsoft.KeyVault(SecretUri=")?
        .strip_suffix(')')
}

/// Name of the file share holding the content of a new function app
pub fn content_share_name(app_name: &str) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(char::from)
        .collect();
    format!("{app_name}-{suffix}").to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn managed_settings_are_filtered() {
        let remote = map(&[
            ("FOO", "bar"),
            ("website_healthcheck_maxpingfailures", "5"),
            ("spring.datasource.url", "jdbc:x"),
            ("DOCKER_REGISTRY_SERVER_URL", "https://r"),
            ("WEBSITE_VNET_ROUTE_ALL", "1"),
        ]);
        assert_eq!(
            user_settings(&remote, &["DOCKER_REGISTRY_SERVER_URL"]),
            map(&[("FOO", "bar")])
        );
        assert_eq!(
            preserved_settings(&remote, &[]),
            map(&[("WEBSITE_VNET_ROUTE_ALL", "1")])
        );
    }

    #[test]
    fn user_settings_win() {
        let merged = merge_app_settings(
            &map(&[("functions_worker_runtime", "custom"), ("A", "1")]),
            map(&[("FUNCTIONS_WORKER_RUNTIME", "node"), ("B", "2")]),
        );
        assert_eq!(
            merged,
            map(&[("A", "1"), ("B", "2"), ("functions_worker_runtime", "custom")])
        );
    }

    #[test]
    fn storage() {
        let conn = storage_connection_string("acc", "a2V5", "core.windows.net");
        assert_eq!(
            conn,
            "DefaultEndpointsProtocol=https;AccountName=acc;AccountKey=a2V5;EndpointSuffix=core.windows.net"
        );
        assert_eq!(
            parse_storage_connection_string(&conn),
            Some(("acc".to_owned(), "a2V5".to_owned()))
        );
        assert_eq!(parse_storage_connection_string("UseDevelopmentStorage=true"), None);

        let secret = "https://vault.vault.azure.net/secrets/conn";
        assert_eq!(parse_key_vault_reference(&key_vault_reference(secret)), Some(secret));
    }

    #[test]
    fn content_share() {
        let share = content_share_name("My-Func");
        assert!(share.starts_with("my-func-"));
        assert_eq!(share.len(), "my-func-".len() + 4);
    }
}
