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

//! JSON payloads of the `Microsoft.Web` and `Microsoft.Relay` resource providers

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const WEB_API_VERSION: &str = "2023-12-01";
pub const RELAY_API_VERSION: &str = "2021-11-01";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedServiceIdentity>,
    #[serde(default)]
    pub properties: SiteProperties,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_farm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_affinity_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_cert_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_cert_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault_reference_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_memory_time_quota: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_config: Option<SiteConfig>,
    #[serde(skip_serializing)]
    pub state: Option<String>,
    #[serde(skip_serializing)]
    pub default_host_name: Option<String>,
    #[serde(skip_serializing)]
    pub outbound_ip_addresses: Option<String>,
    #[serde(skip_serializing)]
    pub possible_outbound_ip_addresses: Option<String>,
    #[serde(skip_serializing)]
    pub custom_domain_verification_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_on: Option<bool>,
    #[serde(rename = "http20Enabled", skip_serializing_if = "Option::is_none")]
    pub http20_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_tls_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ftps_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    #[serde(rename = "use32BitWorkerProcess", skip_serializing_if = "Option::is_none")]
    pub use_32_bit_worker_process: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_sockets_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_workers: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_command_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linux_fx_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows_fx_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_framework_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_container_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_shell_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<NameValuePair>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_settings: Option<Vec<NameValuePair>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_security_restrictions: Option<Vec<IpSecurityRestriction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpSecurityRestriction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vnet_subnet_resource_id: Option<String>,
    /// `Default` or `ServiceTag`, the tag being then in `ip_address`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
    pub support_credentials: bool,
}

/// `properties` wrapper of the `config/web` sub-resource
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SiteConfigResource {
    #[serde(default)]
    pub properties: SiteConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StringDictionary {
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionStringDictionary {
    #[serde(default)]
    pub properties: BTreeMap<String, ConnStringValueTypePair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnStringValueTypePair {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// `config/logs` sub-resource, missing sections being disabled
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SiteLogsConfig {
    #[serde(default)]
    pub properties: SiteLogsConfigProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteLogsConfigProperties {
    pub application_logs: ApplicationLogsConfig,
    pub http_logs: HttpLogsConfig,
    pub failed_requests_tracing: EnabledConfig,
    pub detailed_error_messages: EnabledConfig,
}

impl SiteLogsConfigProperties {
    /// Same configuration, retention settings of disabled HTTP logs left out
    pub fn normalized(&self) -> Self {
        let mut normalized = self.clone();
        if !normalized.http_logs.file_system.enabled {
            normalized.http_logs.file_system = Default::default();
        }
        normalized
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationLogsConfig {
    pub file_system: FileSystemApplicationLogsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSystemApplicationLogsConfig {
    pub level: String,
}

impl Default for FileSystemApplicationLogsConfig {
    fn default() -> Self {
        Self {
            level: "Off".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpLogsConfig {
    pub file_system: FileSystemHttpLogsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSystemHttpLogsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_in_mb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_in_days: Option<i64>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledConfig {
    pub enabled: bool,
}

/// `config/azurestorageaccounts` sub-resource, keyed by mount name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AzureStoragePropertyDictionary {
    #[serde(default)]
    pub properties: BTreeMap<String, AzureStorageInfoValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureStorageInfoValue {
    /// `AzureFiles` or `AzureBlob`
    #[serde(rename = "type")]
    pub kind: String,
    pub account_name: String,
    pub share_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
}

/// `config/slotConfigNames`: settings that stay with the slot during a swap
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotConfigNamesResource {
    #[serde(default)]
    pub properties: SlotConfigNames,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotConfigNames {
    #[serde(default)]
    pub app_setting_names: Option<Vec<String>>,
    #[serde(default)]
    pub connection_string_names: Option<Vec<String>>,
}

/// Publishing credentials of a site
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub properties: UserProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProperties {
    #[serde(default)]
    pub publishing_user_name: String,
    pub publishing_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CsmPublishingCredentialsPoliciesEntity {
    #[serde(default)]
    pub properties: CsmPublishingCredentialsPoliciesProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CsmPublishingCredentialsPoliciesProperties {
    #[serde(default)]
    pub allow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceIdentity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing)]
    pub principal_id: Option<String>,
    #[serde(skip_serializing)]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_assigned_identities: Option<BTreeMap<String, UserAssignedIdentity>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    #[serde(skip_serializing)]
    pub principal_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppServicePlan {
    pub id: Option<String>,
    pub kind: Option<String>,
    pub location: Option<String>,
    pub sku: Option<SkuDescription>,
    #[serde(default)]
    pub properties: AppServicePlanProperties,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppServicePlanProperties {
    pub reserved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkuDescription {
    pub name: Option<String>,
    pub tier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNameAvailabilityRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNameAvailability {
    #[serde(default)]
    pub name_available: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
}

/// Hybrid connection of an App Service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HybridConnection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: HybridConnectionProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridConnectionProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_bus_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_arm_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_key_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_bus_suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayAccessKeys {
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
    pub key_name: Option<String>,
}

/// Hybrid connection defined on an Azure Relay namespace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelayHybridConnection {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayNamespace {
    pub id: Option<String>,
    #[serde(default)]
    pub properties: RelayNamespaceProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayNamespaceProperties {
    pub service_bus_endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SiteSourceControl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: SiteSourceControlProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSourceControlProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_manual_integration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mercurial: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_rollback_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_git_hub_action: Option<bool>,
    #[serde(skip_serializing)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub properties: CertificateProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pfx_blob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault_secret_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_farm_id: Option<String>,
    #[serde(skip_serializing)]
    pub friendly_name: Option<String>,
    #[serde(skip_serializing)]
    pub subject_name: Option<String>,
    #[serde(skip_serializing)]
    pub host_names: Option<Vec<String>>,
    #[serde(skip_serializing)]
    pub issuer: Option<String>,
    #[serde(skip_serializing)]
    pub issue_date: Option<String>,
    #[serde(skip_serializing)]
    pub expiration_date: Option<String>,
    #[serde(skip_serializing)]
    pub thumbprint: Option<String>,
    #[serde(skip_serializing)]
    pub hosting_environment_profile: Option<HostingEnvironmentProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostingEnvironmentProfile {
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<SkuDescription>,
    #[serde(default)]
    pub properties: StaticSiteProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSiteProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_config_file_updates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_environment_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing)]
    pub default_hostname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StaticSiteSecrets {
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Body of an ARM error response
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Body returned by an `Azure-AsyncOperation` URL
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub status: String,
    pub error: Option<ErrorDetail>,
}

/// Split a comma-separated list of IP addresses
pub fn split_ip_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn site_from_arm() {
        let site: Site = serde_json::from_value(json!({
            "id": "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Web/sites/app",
            "name": "app",
            "kind": "app,linux",
            "location": "West Europe",
            "properties": {
                "serverFarmId": "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Web/serverfarms/plan",
                "httpsOnly": true,
                "defaultHostName": "app.azurewebsites.net",
                "outboundIpAddresses": "1.2.3.4,5.6.7.8",
                "siteConfig": { "http20Enabled": true, "use32BitWorkerProcess": false },
                "unknownProperty": 42
            }
        }))
        .unwrap();
        assert_eq!(site.properties.https_only, Some(true));
        assert_eq!(
            site.properties.default_host_name.as_deref(),
            Some("app.azurewebsites.net")
        );
        let config = site.properties.site_config.unwrap();
        assert_eq!(config.http20_enabled, Some(true));
        assert_eq!(config.use_32_bit_worker_process, Some(false));
    }

    #[test]
    fn computed_fields_are_not_sent() {
        let site = Site {
            location: Some("westeurope".to_owned()),
            properties: SiteProperties {
                enabled: Some(true),
                default_host_name: Some("ignored".to_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&site).unwrap(),
            json!({ "location": "westeurope", "properties": { "enabled": true } })
        );
    }

    #[test]
    fn logs_from_arm() {
        let logs: SiteLogsConfig = serde_json::from_value(json!({
            "properties": {
                "applicationLogs": { "fileSystem": { "level": "Warning" }, "azureBlobStorage": null },
                "httpLogs": { "fileSystem": { "retentionInMb": 35, "retentionInDays": null, "enabled": false } },
                "detailedErrorMessages": { "enabled": true }
            }
        }))
        .unwrap();
        let properties = logs.properties;
        assert_eq!(properties.application_logs.file_system.level, "Warning");
        assert!(properties.detailed_error_messages.enabled);
        assert!(!properties.failed_requests_tracing.enabled);
        assert_eq!(properties.http_logs.file_system.retention_in_mb, Some(35));
        assert_eq!(
            properties.normalized().http_logs,
            HttpLogsConfig::default()
        );

        let disabled: SiteLogsConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(disabled.properties.application_logs.file_system.level, "Off");
    }

    #[test]
    fn ip_lists() {
        assert_eq!(split_ip_list("1.2.3.4, 5.6.7.8,"), vec!["1.2.3.4", "5.6.7.8"]);
        assert!(split_ip_list("").is_empty());
    }
}
