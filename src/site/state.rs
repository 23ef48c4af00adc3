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

//! State shared by web apps, slots and function apps

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock,
};
use tf_provider::value::{
    serde_as_vec, Value, ValueBool, ValueList, ValueMap, ValueNumber, ValueSet, ValueString,
};
use tf_provider::{map, AttributePath, Diagnostics};

use super::ops::{DesiredSite, RemoteSite};
use super::settings::{user_settings, WEBSITE_HEALTHCHECK_MAXPINGFAILURES};
use super::{SiteSettings, Stack};
use crate::arm::models::{
    split_ip_list, AzureStorageInfoValue, ConnStringValueTypePair, CorsSettings,
    FileSystemHttpLogsConfig, IpSecurityRestriction, ManagedServiceIdentity, Site,
    SiteLogsConfigProperties, SlotConfigNames, UserAssignedIdentity,
};
use crate::attributes::{
    attribute, computed_string, computed_string_list, defaulted, optional_string, sensitive,
    string_map, ID, NAME, TAGS,
};
use crate::ids::{ServicePlanId, SubnetId, UserAssignedIdentityId};
use crate::timeouts::TimeoutsState;
use crate::utils::{
    default_to, keep_empty, known, known_bool, known_map, known_number, string, string_list,
};
use crate::validate;

pub const IDENTITY_TYPES: &[&str] = &["SystemAssigned", "UserAssigned", "SystemAssigned, UserAssigned"];

pub const CONNECTION_STRING_TYPES: &[&str] = &[
    "ApiHub",
    "Custom",
    "DocDb",
    "EventHub",
    "MySql",
    "NotificationHub",
    "PostgreSQL",
    "RedisCache",
    "ServiceBus",
    "SQLAzure",
    "SQLServer",
];

/// Defaults that depend on the kind of app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteDefaults {
    pub always_on: bool,
    pub use_32_bit_worker: bool,
}

/// Plan ID in the casing of `ServicePlanId`
fn canonical_plan_id(id: &str) -> String {
    ServicePlanId::parse(id)
        .map(|id| id.to_string())
        .unwrap_or_else(|_| id.to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IdentityState<'a> {
    #[serde(borrow = "'a", rename = "type")]
    pub kind: ValueString<'a>,
    pub identity_ids: ValueSet<ValueString<'a>>,
    pub principal_id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
}

impl<'a> IdentityState<'a> {
    pub fn block() -> NestedBlock {
        NestedBlock::Optional(Block {
            attributes: map! {
                "type" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "`SystemAssigned`, `UserAssigned` or `SystemAssigned, UserAssigned`",
                ),
                "identity_ids" => attribute(
                    AttributeType::Set(AttributeType::String.into()),
                    AttributeConstraint::Optional,
                    "IDs of the user assigned identities",
                ),
                "principal_id" => computed_string("Principal ID of the system assigned identity"),
                "tenant_id" => computed_string("Tenant ID of the system assigned identity"),
            },
            description: Description::plain("Managed identity of the app"),
            ..Default::default()
        })
    }

    fn user_assigned(&self) -> bool {
        self.kind
            .as_deref_option()
            .map_or(false, |kind| kind.contains("UserAssigned"))
    }

    fn system_assigned(&self) -> bool {
        self.kind
            .as_deref_option()
            .map_or(false, |kind| kind.contains("SystemAssigned"))
    }

    pub fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate::one_of(diags, attr_path.clone().attribute("type"), &self.kind, IDENTITY_TYPES);
        let ids = self.identity_ids.as_ref_option();
        if self.kind.is_value() && self.user_assigned() != ids.map_or(false, |ids| !ids.is_empty()) {
            diags.error_short(
                "`identity_ids` must be set if and only if `type` includes `UserAssigned`",
                attr_path.clone().attribute("identity_ids"),
            );
        }
        for id in ids.into_iter().flatten() {
            validate::id(
                diags,
                attr_path.clone().attribute("identity_ids"),
                id,
                UserAssignedIdentityId::parse,
            );
        }
    }

    fn plan(&mut self, prior: Option<&Self>) {
        match prior {
            Some(prior) if prior.kind == self.kind => {
                self.principal_id = prior.principal_id.clone();
                self.tenant_id = prior.tenant_id.clone();
            }
            _ if self.system_assigned() => {
                self.principal_id = Value::Unknown;
                self.tenant_id = Value::Unknown;
            }
            _ => {
                self.principal_id = Value::Null;
                self.tenant_id = Value::Null;
            }
        }
    }

    fn expand(&self) -> ManagedServiceIdentity {
        let ids: BTreeMap<String, UserAssignedIdentity> = self
            .identity_ids
            .as_ref_option()
            .into_iter()
            .flatten()
            .filter_map(|id| Some((id.as_deref_option()?.to_owned(), Default::default())))
            .collect();
        ManagedServiceIdentity {
            kind: known(&self.kind).unwrap_or_default(),
            user_assigned_identities: (!ids.is_empty()).then_some(ids),
            ..Default::default()
        }
    }

    fn flatten(identity: Option<&ManagedServiceIdentity>) -> Value<Self> {
        let Some(identity) = identity.filter(|identity| identity.kind != "None") else {
            return Value::Null;
        };
        let ids = identity
            .user_assigned_identities
            .iter()
            .flatten()
            .map(|(id, _)| {
                let id = UserAssignedIdentityId::parse(id)
                    .map(|id| id.to_string())
                    .unwrap_or_else(|_| id.clone());
                Value::Value(Cow::Owned(id))
            })
            .collect::<std::collections::BTreeSet<_>>();
        // ARM separates the kinds with a comma and no space
        let kind = identity
            .kind
            .split(',')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(", ");
        Value::Value(Self {
            kind: string(Some(kind)),
            identity_ids: if ids.is_empty() { Value::Null } else { Value::Value(ids) },
            principal_id: string(identity.principal_id.clone()),
            tenant_id: string(identity.tenant_id.clone()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ConnectionStringState<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    #[serde(rename = "type")]
    pub kind: ValueString<'a>,
    pub value: ValueString<'a>,
}

impl<'a> ConnectionStringState<'a> {
    pub fn block() -> NestedBlock {
        NestedBlock::Set(Block {
            attributes: map! {
                "name" => attribute(AttributeType::String, AttributeConstraint::Required, "Name of the connection string"),
                "type" => attribute(
                    AttributeType::String,
                    AttributeConstraint::Required,
                    "Type of database (eg: `SQLAzure`, `PostgreSQL`, `Custom`)",
                ),
                "value" => sensitive(attribute(AttributeType::String, AttributeConstraint::Required, "Connection string value")),
            },
            description: Description::plain("Connection strings of the app"),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct SiteCredentialState<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    pub password: ValueString<'a>,
}

const DEFAULT_RESTRICTION_PRIORITY: i64 = 65000;

/// `ip_restriction` block of `site_config`, the source being an IP range, a service tag or a subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IpRestrictionState<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    pub action: ValueString<'a>,
    pub ip_address: ValueString<'a>,
    pub service_tag: ValueString<'a>,
    pub virtual_network_subnet_id: ValueString<'a>,
    pub priority: ValueNumber,
}

impl<'a> IpRestrictionState<'a> {
    pub fn block() -> NestedBlock {
        NestedBlock::List(Block {
            attributes: map! {
                "name" => optional_string("Name of the rule"),
                "action" => defaulted(AttributeType::String, "`Allow` or `Deny`, defaults to `Allow`"),
                "ip_address" => optional_string("CIDR range matched by the rule"),
                "service_tag" => optional_string("Service tag matched by the rule"),
                "virtual_network_subnet_id" => optional_string("Subnet matched by the rule"),
                "priority" => defaulted(AttributeType::Number, "Priority of the rule, lowest first, defaults to `65000`"),
            },
            description: Description::plain("Access restrictions of the app, evaluated by priority"),
            ..Default::default()
        })
    }

    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate::one_of(diags, attr_path.clone().attribute("action"), &self.action, &["Allow", "Deny"]);
        validate::id(
            diags,
            attr_path.clone().attribute("virtual_network_subnet_id"),
            &self.virtual_network_subnet_id,
            SubnetId::parse,
        );
        let sources = [&self.ip_address, &self.service_tag, &self.virtual_network_subnet_id];
        if !sources.iter().any(|source| source.is_unknown())
            && sources.iter().filter(|source| source.is_value()).count() != 1
        {
            diags.error_short(
                "Exactly one of `ip_address`, `service_tag` or `virtual_network_subnet_id` must be set",
                attr_path.clone(),
            );
        }
        if let Value::Value(priority) = self.priority {
            if !(1..=i64::from(i32::MAX)).contains(&priority) {
                diags.error(
                    "Invalid priority",
                    format!("Priority must be between 1 and {}, but was {priority}.", i32::MAX),
                    attr_path.attribute("priority"),
                );
            }
        }
    }

    fn plan(&mut self, config: &Self) {
        default_to(&mut self.action, &config.action, Cow::Borrowed("Allow"));
        default_to(&mut self.priority, &config.priority, DEFAULT_RESTRICTION_PRIORITY);
    }

    fn expand(&self) -> IpSecurityRestriction {
        let (ip_address, tag) = match known(&self.service_tag) {
            Some(service_tag) => (Some(service_tag), "ServiceTag"),
            None => (known(&self.ip_address), "Default"),
        };
        IpSecurityRestriction {
            ip_address,
            vnet_subnet_resource_id: known(&self.virtual_network_subnet_id),
            tag: Some(tag.to_owned()),
            action: Some(known(&self.action).unwrap_or_else(|| "Allow".to_owned())),
            priority: Some(known_number(&self.priority).unwrap_or(DEFAULT_RESTRICTION_PRIORITY)),
            name: known(&self.name),
        }
    }

    fn flatten(restriction: &IpSecurityRestriction) -> Self {
        let service_tag = restriction.tag.as_deref() == Some("ServiceTag");
        let (ip_address, tag) = if service_tag {
            (None, restriction.ip_address.clone())
        } else {
            (restriction.ip_address.clone(), None)
        };
        Self {
            name: string(restriction.name.clone()),
            action: string(Some(restriction.action.clone().unwrap_or_else(|| "Allow".to_owned()))),
            ip_address: string(ip_address),
            service_tag: string(tag),
            virtual_network_subnet_id: string(restriction.vnet_subnet_resource_id.clone()),
            priority: Value::Value(restriction.priority.unwrap_or(DEFAULT_RESTRICTION_PRIORITY)),
        }
    }
}

/// ARM adds a catch-all rule matching `Any` when no restriction is configured
fn is_implicit_restriction(restriction: &IpSecurityRestriction) -> bool {
    restriction.ip_address.as_deref() == Some("Any")
}

/// `cors` block of `site_config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CorsState<'a> {
    #[serde(borrow = "'a")]
    pub allowed_origins: ValueSet<ValueString<'a>>,
    pub support_credentials: ValueBool,
}

impl<'a> CorsState<'a> {
    pub fn block() -> NestedBlock {
        NestedBlock::Optional(Block {
            attributes: map! {
                "allowed_origins" => attribute(
                    AttributeType::Set(AttributeType::String.into()),
                    AttributeConstraint::Optional,
                    "Origins allowed to make cross-origin calls, `*` for all",
                ),
                "support_credentials" => defaulted(AttributeType::Bool, "Whether credentials are allowed in cross-origin calls, defaults to `false`"),
            },
            description: Description::plain("Cross-origin resource sharing of the app"),
            ..Default::default()
        })
    }

    fn expand(&self) -> CorsSettings {
        CorsSettings {
            allowed_origins: self
                .allowed_origins
                .iter()
                .flatten()
                .filter_map(known)
                .collect(),
            support_credentials: known_bool(&self.support_credentials, false),
        }
    }

    fn flatten(cors: Option<&CorsSettings>, prior: Option<&Self>) -> Value<Self> {
        let cors = cors.cloned().unwrap_or_default();
        if cors == CorsSettings::default() && prior.is_none() {
            return Value::Null;
        }
        let origins = string_set(cors.allowed_origins);
        let keep_null = prior.map_or(true, |prior| prior.allowed_origins.is_null());
        Value::Value(Self {
            allowed_origins: if origins.is_empty() && keep_null {
                Value::Null
            } else {
                Value::Value(origins)
            },
            support_credentials: Value::Value(cors.support_credentials),
        })
    }
}

fn string_set<'a>(items: Vec<String>) -> BTreeSet<ValueString<'a>> {
    items.into_iter().map(|item| string(Some(item))).collect()
}

/// `application_logs` block of `logs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApplicationLogsState {
    pub file_system_level: ValueString<'static>,
}

/// `http_logs` block of `logs`, stored on the file system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HttpLogsState {
    pub retention_in_days: ValueNumber,
    pub retention_in_mb: ValueNumber,
}

/// `logs` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LogsState {
    pub detailed_error_messages: ValueBool,
    pub failed_request_tracing: ValueBool,
    #[serde(with = "serde_as_vec")]
    pub application_logs: Value<ApplicationLogsState>,
    #[serde(with = "serde_as_vec")]
    pub http_logs: Value<HttpLogsState>,
}

pub const LOG_LEVELS: &[&str] = &["Off", "Error", "Warning", "Information", "Verbose"];

impl LogsState {
    pub fn block() -> NestedBlock {
        NestedBlock::Optional(Block {
            attributes: map! {
                "detailed_error_messages" => defaulted(AttributeType::Bool, "Whether detailed error pages are stored, defaults to `false`"),
                "failed_request_tracing" => defaulted(AttributeType::Bool, "Whether failed requests are traced, defaults to `false`"),
            },
            blocks: map! {
                "application_logs" => NestedBlock::Optional(Block {
                    attributes: map! {
                        "file_system_level" => attribute(
                            AttributeType::String,
                            AttributeConstraint::Required,
                            "`Off`, `Error`, `Warning`, `Information` or `Verbose`",
                        ),
                    },
                    description: Description::plain("Application logs written to the file system"),
                    ..Default::default()
                }),
                "http_logs" => NestedBlock::Optional(Block {
                    attributes: map! {
                        "retention_in_days" => attribute(
                            AttributeType::Number,
                            AttributeConstraint::Optional,
                            "Days the logs are kept, `0` to keep them forever",
                        ),
                        "retention_in_mb" => attribute(
                            AttributeType::Number,
                            AttributeConstraint::Required,
                            "Maximum size of the logs, between 25 and 100",
                        ),
                    },
                    description: Description::plain("HTTP logs written to the file system"),
                    ..Default::default()
                }),
            },
            description: Description::plain("Diagnostic logs of the app"),
            ..Default::default()
        })
    }

    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(application_logs) = &self.application_logs {
            validate::one_of(
                diags,
                attr_path.clone().attribute("application_logs").index(0).attribute("file_system_level"),
                &application_logs.file_system_level,
                LOG_LEVELS,
            );
        }
        if let Value::Value(http_logs) = &self.http_logs {
            let attr_path = attr_path.attribute("http_logs").index(0);
            if let Value::Value(size) = http_logs.retention_in_mb {
                if !(25..=100).contains(&size) {
                    diags.error(
                        "Invalid log size",
                        format!("Retention size must be between 25 and 100 MB, but was {size}."),
                        attr_path.clone().attribute("retention_in_mb"),
                    );
                }
            }
            if let Value::Value(days) = http_logs.retention_in_days {
                if days < 0 {
                    diags.error_short(
                        "`retention_in_days` cannot be negative",
                        attr_path.attribute("retention_in_days"),
                    );
                }
            }
        }
    }

    fn plan(&mut self, config: &Self) {
        default_to(&mut self.detailed_error_messages, &config.detailed_error_messages, false);
        default_to(&mut self.failed_request_tracing, &config.failed_request_tracing, false);
    }

    fn expand(logs: &Value<Self>) -> SiteLogsConfigProperties {
        let mut config = SiteLogsConfigProperties::default();
        let Value::Value(logs) = logs else {
            return config;
        };
        config.detailed_error_messages.enabled = known_bool(&logs.detailed_error_messages, false);
        config.failed_requests_tracing.enabled = known_bool(&logs.failed_request_tracing, false);
        if let Some(level) = logs
            .application_logs
            .as_ref_option()
            .and_then(|application_logs| known(&application_logs.file_system_level))
        {
            config.application_logs.file_system.level = level;
        }
        if let Value::Value(http_logs) = &logs.http_logs {
            config.http_logs.file_system = FileSystemHttpLogsConfig {
                retention_in_mb: known_number(&http_logs.retention_in_mb),
                retention_in_days: known_number(&http_logs.retention_in_days),
                enabled: true,
            };
        }
        config
    }

    fn flatten(config: &SiteLogsConfigProperties, prior: &Value<Self>) -> Value<Self> {
        let config = config.normalized();
        if config == SiteLogsConfigProperties::default() && prior.is_null() {
            return Value::Null;
        }
        let level = &config.application_logs.file_system.level;
        let http_logs = &config.http_logs.file_system;
        Value::Value(Self {
            detailed_error_messages: Value::Value(config.detailed_error_messages.enabled),
            failed_request_tracing: Value::Value(config.failed_requests_tracing.enabled),
            application_logs: if level.is_empty() || level.eq_ignore_ascii_case("Off") {
                Value::Null
            } else {
                Value::Value(ApplicationLogsState {
                    file_system_level: string(Some(level.clone())),
                })
            },
            http_logs: if http_logs.enabled {
                Value::Value(HttpLogsState {
                    retention_in_days: http_logs.retention_in_days.filter(|days| *days != 0).into(),
                    retention_in_mb: http_logs.retention_in_mb.into(),
                })
            } else {
                Value::Null
            },
        })
    }
}

/// `storage_account` block: Azure Files share or blob container mounted in the app
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct StorageAccountState<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    #[serde(rename = "type")]
    pub kind: ValueString<'a>,
    pub account_name: ValueString<'a>,
    pub share_name: ValueString<'a>,
    pub access_key: ValueString<'a>,
    pub mount_path: ValueString<'a>,
}

impl<'a> StorageAccountState<'a> {
    pub fn block() -> NestedBlock {
        NestedBlock::Set(Block {
            attributes: map! {
                "name" => attribute(AttributeType::String, AttributeConstraint::Required, "Name of the mount"),
                "type" => attribute(AttributeType::String, AttributeConstraint::Required, "`AzureFiles` or `AzureBlob`"),
                "account_name" => attribute(AttributeType::String, AttributeConstraint::Required, "Name of the storage account"),
                "share_name" => attribute(AttributeType::String, AttributeConstraint::Required, "File share or container mounted"),
                "access_key" => sensitive(attribute(AttributeType::String, AttributeConstraint::Required, "Access key of the storage account")),
                "mount_path" => optional_string("Path of the mount inside the app"),
            },
            description: Description::plain("Storage mounted in the app"),
            ..Default::default()
        })
    }

    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate::one_of(diags, attr_path.clone().attribute("type"), &self.kind, &["AzureFiles", "AzureBlob"]);
        validate::not_empty(diags, attr_path.clone().attribute("name"), &self.name);
        validate::not_empty(diags, attr_path.attribute("share_name"), &self.share_name);
    }

    fn expand(&self) -> Option<(String, AzureStorageInfoValue)> {
        Some((
            known(&self.name)?,
            AzureStorageInfoValue {
                kind: known(&self.kind).unwrap_or_default(),
                account_name: known(&self.account_name).unwrap_or_default(),
                share_name: known(&self.share_name).unwrap_or_default(),
                access_key: known(&self.access_key),
                mount_path: known(&self.mount_path),
            },
        ))
    }

    /// ARM does not return the access keys, the prior ones are kept
    fn flatten(name: &str, storage: &AzureStorageInfoValue, prior: Option<&Self>) -> Self {
        let access_key = match &storage.access_key {
            Some(key) if !key.is_empty() => string(Some(key.clone())),
            _ => prior.map(|prior| prior.access_key.clone()).unwrap_or_default(),
        };
        Self {
            name: string(Some(name.to_owned())),
            kind: string(Some(storage.kind.clone())),
            account_name: string(Some(storage.account_name.clone())),
            share_name: string(Some(storage.share_name.clone())),
            access_key,
            mount_path: string(storage.mount_path.clone().filter(|path| !path.is_empty())),
        }
    }
}

/// `sticky_settings` block: app settings and connection strings kept by the production slot during a swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StickySettingsState<'a> {
    #[serde(borrow = "'a")]
    pub app_setting_names: ValueList<ValueString<'a>>,
    pub connection_string_names: ValueList<ValueString<'a>>,
}

impl<'a> StickySettingsState<'a> {
    pub fn block() -> NestedBlock {
        NestedBlock::Optional(Block {
            attributes: map! {
                "app_setting_names" => attribute(
                    AttributeType::List(AttributeType::String.into()),
                    AttributeConstraint::Optional,
                    "App settings that are not swapped",
                ),
                "connection_string_names" => attribute(
                    AttributeType::List(AttributeType::String.into()),
                    AttributeConstraint::Optional,
                    "Connection strings that are not swapped",
                ),
            },
            description: Description::plain("Settings kept by the app when slots are swapped"),
            ..Default::default()
        })
    }

    pub fn expand(sticky: &Value<Self>) -> SlotConfigNames {
        let names = |list: &ValueList<ValueString<'_>>| {
            list.as_ref_option()
                .map(|list| list.iter().filter_map(known).collect::<Vec<_>>())
                .filter(|list| !list.is_empty())
        };
        match sticky {
            Value::Value(sticky) => SlotConfigNames {
                app_setting_names: names(&sticky.app_setting_names),
                connection_string_names: names(&sticky.connection_string_names),
            },
            _ => SlotConfigNames::default(),
        }
    }

    pub fn flatten(names: &SlotConfigNames) -> Value<Self> {
        let list = |names: &Option<Vec<String>>| match names {
            Some(names) if !names.is_empty() => string_list(names.iter().cloned()),
            _ => Value::Null,
        };
        let sticky = Self {
            app_setting_names: list(&names.app_setting_names),
            connection_string_names: list(&names.connection_string_names),
        };
        if sticky.app_setting_names.is_null() && sticky.connection_string_names.is_null() {
            Value::Null
        } else {
            Value::Value(sticky)
        }
    }
}

/// `site_config` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(bound(deserialize = ""))]
pub struct SiteConfigState<'a, K: Stack> {
    pub always_on: ValueBool,
    #[serde(borrow = "'a")]
    pub app_command_line: ValueString<'a>,
    #[serde(with = "serde_as_vec")]
    pub application_stack: Value<K>,
    pub ftps_state: ValueString<'a>,
    pub health_check_path: ValueString<'a>,
    pub health_check_eviction_time_in_min: ValueNumber,
    pub http2_enabled: ValueBool,
    pub minimum_tls_version: ValueString<'a>,
    pub use_32_bit_worker: ValueBool,
    pub websockets_enabled: ValueBool,
    pub worker_count: ValueNumber,
    pub ip_restriction: ValueList<Value<IpRestrictionState<'a>>>,
    #[serde(with = "serde_as_vec")]
    pub cors: Value<CorsState<'a>>,
}

impl<'a, K: Stack> SiteConfigState<'a, K> {
    pub fn block() -> NestedBlock {
        NestedBlock::Single(Block {
            attributes: map! {
                "always_on" => defaulted(AttributeType::Bool, "Whether the app is kept loaded when idle"),
                "app_command_line" => optional_string("Startup command of the app"),
                "ftps_state" => defaulted(AttributeType::String, "`AllAllowed`, `FtpsOnly` or `Disabled`, defaults to `Disabled`"),
                "health_check_path" => optional_string("Path pinged to check the health of the instances"),
                "health_check_eviction_time_in_min" => attribute(
                    AttributeType::Number,
                    AttributeConstraint::Optional,
                    "Minutes before an unhealthy instance is removed from the load balancer (2 to 10)",
                ),
                "http2_enabled" => defaulted(AttributeType::Bool, "Whether HTTP/2 is enabled, defaults to `false`"),
                "minimum_tls_version" => defaulted(AttributeType::String, "Minimum TLS version of the requests, defaults to `1.2`"),
                "use_32_bit_worker" => defaulted(AttributeType::Bool, "Whether the app runs in a 32-bit worker process"),
                "websockets_enabled" => defaulted(AttributeType::Bool, "Whether web sockets are enabled, defaults to `false`"),
                "worker_count" => defaulted(AttributeType::Number, "Number of workers of the app"),
            },
            blocks: map! {
                "application_stack" => NestedBlock::Optional(K::block()),
                "ip_restriction" => IpRestrictionState::block(),
                "cors" => CorsState::block(),
            },
            description: Description::plain("Configuration of the app"),
            ..Default::default()
        })
    }

    pub fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate::one_of(
            diags,
            attr_path.clone().attribute("ftps_state"),
            &self.ftps_state,
            &["AllAllowed", "FtpsOnly", "Disabled"],
        );
        validate::one_of(
            diags,
            attr_path.clone().attribute("minimum_tls_version"),
            &self.minimum_tls_version,
            &["1.0", "1.1", "1.2", "1.3"],
        );
        if let Value::Value(minutes) = self.health_check_eviction_time_in_min {
            if !(2..=10).contains(&minutes) {
                diags.error(
                    "Invalid eviction time",
                    format!("Eviction time must be between 2 and 10 minutes, but was {minutes}."),
                    attr_path.clone().attribute("health_check_eviction_time_in_min"),
                );
            }
            if self.health_check_path.is_null() {
                diags.error_short(
                    "`health_check_eviction_time_in_min` requires `health_check_path`",
                    attr_path.clone().attribute("health_check_eviction_time_in_min"),
                );
            }
        }
        if let Value::Value(workers) = self.worker_count {
            if workers < 1 {
                diags.error_short(
                    "`worker_count` must be positive",
                    attr_path.clone().attribute("worker_count"),
                );
            }
        }
        for (index, restriction) in self.ip_restriction.iter().flatten().enumerate() {
            if let Value::Value(restriction) = restriction {
                restriction.validate(
                    diags,
                    attr_path.clone().attribute("ip_restriction").index(index as i64),
                );
            }
        }
        if let Value::Value(stack) = &self.application_stack {
            stack.validate(diags, attr_path.attribute("application_stack"));
        }
    }

    fn plan(&mut self, prior: Option<&Self>, config: &Self, defaults: SiteDefaults) {
        default_to(&mut self.always_on, &config.always_on, defaults.always_on);
        default_to(&mut self.ftps_state, &config.ftps_state, Cow::Borrowed("Disabled"));
        default_to(&mut self.http2_enabled, &config.http2_enabled, false);
        default_to(&mut self.minimum_tls_version, &config.minimum_tls_version, Cow::Borrowed("1.2"));
        default_to(&mut self.use_32_bit_worker, &config.use_32_bit_worker, defaults.use_32_bit_worker);
        default_to(&mut self.websockets_enabled, &config.websockets_enabled, false);
        if config.worker_count.is_null() {
            self.worker_count = match prior {
                Some(prior) => prior.worker_count,
                None => Value::Unknown,
            };
        }
        if let Value::Value(stack) = &mut self.application_stack {
            stack.normalize();
        }
        if let (Value::Value(restrictions), Value::Value(config)) = (&mut self.ip_restriction, &config.ip_restriction) {
            for (restriction, config) in restrictions.iter_mut().zip(config) {
                if let (Value::Value(restriction), Value::Value(config)) = (restriction, config) {
                    restriction.plan(config);
                }
            }
        }
        if let (Value::Value(cors), Value::Value(config)) = (&mut self.cors, &config.cors) {
            default_to(&mut cors.support_credentials, &config.support_credentials, false);
        }
    }

    /// Write the block into the remote configuration
    pub fn expand(&self, settings: &mut SiteSettings) {
        let config = &mut settings.config;
        config.always_on = self.always_on.as_ref_option().copied();
        config.app_command_line = Some(known(&self.app_command_line).unwrap_or_default());
        config.ftps_state = known(&self.ftps_state);
        config.health_check_path = Some(known(&self.health_check_path).unwrap_or_default());
        config.http20_enabled = self.http2_enabled.as_ref_option().copied();
        config.min_tls_version = known(&self.minimum_tls_version);
        config.use_32_bit_worker_process = self.use_32_bit_worker.as_ref_option().copied();
        config.web_sockets_enabled = self.websockets_enabled.as_ref_option().copied();
        config.number_of_workers = known_number(&self.worker_count);
        // always sent, so that removed blocks are cleared remotely
        config.ip_security_restrictions = Some(
            self.ip_restriction
                .iter()
                .flatten()
                .filter_map(|restriction| Some(restriction.as_ref_option()?.expand()))
                .collect(),
        );
        config.cors = Some(
            self.cors
                .as_ref_option()
                .map(CorsState::expand)
                .unwrap_or_default(),
        );

        self.application_stack
            .as_ref_option()
            .cloned()
            .unwrap_or_default()
            .expand(settings);
        if let Some(minutes) = known_number(&self.health_check_eviction_time_in_min) {
            settings.app_settings.insert(
                WEBSITE_HEALTHCHECK_MAXPINGFAILURES.to_owned(),
                minutes.to_string(),
            );
        }
    }

    /// `prior` is the block in the prior state, null collections staying null when still empty
    pub fn flatten(settings: &SiteSettings, prior: Option<&Self>) -> Self {
        let config = &settings.config;
        let not_empty = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());
        let restrictions: Vec<_> = config
            .ip_security_restrictions
            .iter()
            .flatten()
            .filter(|restriction| !is_implicit_restriction(restriction))
            .map(|restriction| Value::Value(IpRestrictionState::flatten(restriction)))
            .collect();
        let keep_null = prior.map_or(true, |prior| prior.ip_restriction.is_null());
        Self {
            always_on: config.always_on.into(),
            app_command_line: string(not_empty(&config.app_command_line)),
            application_stack: K::flatten(settings).into(),
            ftps_state: string(config.ftps_state.clone()),
            health_check_path: string(not_empty(&config.health_check_path)),
            health_check_eviction_time_in_min: settings
                .app_settings
                .get(WEBSITE_HEALTHCHECK_MAXPINGFAILURES)
                .and_then(|minutes| minutes.parse::<i64>().ok())
                .into(),
            http2_enabled: config.http20_enabled.into(),
            minimum_tls_version: string(config.min_tls_version.clone()),
            use_32_bit_worker: config.use_32_bit_worker_process.into(),
            websockets_enabled: config.web_sockets_enabled.into(),
            worker_count: config.number_of_workers.into(),
            ip_restriction: if restrictions.is_empty() && keep_null {
                Value::Null
            } else {
                Value::Value(restrictions)
            },
            cors: CorsState::flatten(
                config.cors.as_ref(),
                prior.and_then(|prior| prior.cors.as_ref_option()),
            ),
        }
    }
}

/// Arguments and attributes common to every kind of site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(bound(deserialize = ""))]
pub struct SiteArgs<'a, K: Stack> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub service_plan_id: ValueString<'a>,
    pub app_settings: ValueMap<'a, ValueString<'a>>,
    pub client_affinity_enabled: ValueBool,
    pub client_certificate_enabled: ValueBool,
    pub client_certificate_mode: ValueString<'a>,
    pub enabled: ValueBool,
    pub https_only: ValueBool,
    pub public_network_access_enabled: ValueBool,
    pub key_vault_reference_identity_id: ValueString<'a>,
    pub virtual_network_subnet_id: ValueString<'a>,
    pub ftp_publish_basic_authentication_enabled: ValueBool,
    pub webdeploy_publish_basic_authentication_enabled: ValueBool,
    pub tags: ValueMap<'a, ValueString<'a>>,
    #[serde(with = "serde_as_vec")]
    pub identity: Value<IdentityState<'a>>,
    pub site_config: Value<SiteConfigState<'a, K>>,
    pub connection_string: ValueSet<Value<ConnectionStringState<'a>>>,
    #[serde(with = "serde_as_vec")]
    pub logs: Value<LogsState>,
    pub storage_account: ValueSet<Value<StorageAccountState<'a>>>,
    #[serde(with = "serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,

    pub kind: ValueString<'a>,
    pub default_hostname: ValueString<'a>,
    pub outbound_ip_addresses: ValueString<'a>,
    pub outbound_ip_address_list: ValueList<ValueString<'a>>,
    pub possible_outbound_ip_addresses: ValueString<'a>,
    pub possible_outbound_ip_address_list: ValueList<ValueString<'a>>,
    pub custom_domain_verification_id: ValueString<'a>,
    pub site_credential: ValueList<Value<SiteCredentialState<'a>>>,
}

impl<'a, K: Stack> SiteArgs<'a, K> {
    pub fn attributes(service_plan_id: Attribute) -> HashMap<String, Attribute> {
        map! {
            "id" => ID.clone(),
            "name" => NAME.clone(),
            "service_plan_id" => service_plan_id,
            "app_settings" => string_map("App settings of the app, settings managed by other attributes are rejected"),
            "client_affinity_enabled" => defaulted(AttributeType::Bool, "Whether requests of a session are routed to the same instance, defaults to `false`"),
            "client_certificate_enabled" => defaulted(AttributeType::Bool, "Whether client certificates are requested, defaults to `false`"),
            "client_certificate_mode" => defaulted(
                AttributeType::String,
                "`Required`, `Optional` or `OptionalInteractiveUser`, defaults to `Required`",
            ),
            "enabled" => defaulted(AttributeType::Bool, "Whether the app is enabled, defaults to `true`"),
            "https_only" => defaulted(AttributeType::Bool, "Whether the app only accepts HTTPS requests, defaults to `false`"),
            "public_network_access_enabled" => defaulted(AttributeType::Bool, "Whether the app is reachable from the internet, defaults to `true`"),
            "key_vault_reference_identity_id" => optional_string("User assigned identity used to resolve Key Vault references"),
            "virtual_network_subnet_id" => optional_string("Subnet used for the regional virtual network integration"),
            "ftp_publish_basic_authentication_enabled" => defaulted(AttributeType::Bool, "Whether FTP accepts basic authentication, defaults to `true`"),
            "webdeploy_publish_basic_authentication_enabled" => defaulted(AttributeType::Bool, "Whether Web Deploy accepts basic authentication, defaults to `true`"),
            "tags" => TAGS.clone(),
            "kind" => computed_string("Kind of the site"),
            "default_hostname" => computed_string("Default hostname of the app"),
            "outbound_ip_addresses" => computed_string("Comma separated outbound IP addresses"),
            "outbound_ip_address_list" => computed_string_list("Outbound IP addresses"),
            "possible_outbound_ip_addresses" => computed_string("Comma separated outbound IP addresses, including the ones of the other plan tiers"),
            "possible_outbound_ip_address_list" => computed_string_list("Outbound IP addresses, including the ones of the other plan tiers"),
            "custom_domain_verification_id" => sensitive(computed_string("Identifier used to verify custom domains")),
            "site_credential" => sensitive(attribute(
                AttributeType::List(
                    AttributeType::Object(map! {
                        "name" => AttributeType::String,
                        "password" => AttributeType::String,
                    })
                    .into(),
                ),
                AttributeConstraint::Computed,
                "Publishing credentials of the app",
            )),
        }
    }

    pub fn blocks() -> HashMap<String, NestedBlock> {
        map! {
            "identity" => IdentityState::block(),
            "site_config" => SiteConfigState::<K>::block(),
            "connection_string" => ConnectionStringState::block(),
            "logs" => LogsState::block(),
            "storage_account" => StorageAccountState::block(),
            "timeouts" => TimeoutsState::block(),
        }
    }

    /// `managed` lists the app settings owned by other attributes, with the attribute to use instead
    pub fn validate(&self, diags: &mut Diagnostics, managed: &[(&str, &str)]) {
        validate::web_app_name(diags, AttributePath::new("name"), &self.name);
        validate::id(
            diags,
            AttributePath::new("service_plan_id"),
            &self.service_plan_id,
            ServicePlanId::parse,
        );
        validate::app_settings(diags, AttributePath::new("app_settings"), &self.app_settings, managed);
        validate::one_of(
            diags,
            AttributePath::new("client_certificate_mode"),
            &self.client_certificate_mode,
            &["Required", "Optional", "OptionalInteractiveUser"],
        );
        validate::id(
            diags,
            AttributePath::new("key_vault_reference_identity_id"),
            &self.key_vault_reference_identity_id,
            UserAssignedIdentityId::parse,
        );
        validate::id(
            diags,
            AttributePath::new("virtual_network_subnet_id"),
            &self.virtual_network_subnet_id,
            SubnetId::parse,
        );
        if let Value::Value(identity) = &self.identity {
            identity.validate(diags, AttributePath::new("identity").index(0));
        }
        if let Value::Value(site_config) = &self.site_config {
            site_config.validate(diags, AttributePath::new("site_config"));
        }
        for connection_string in self.connection_string.iter().flatten() {
            if let Value::Value(connection_string) = connection_string {
                validate::one_of(
                    diags,
                    AttributePath::new("connection_string").attribute("type"),
                    &connection_string.kind,
                    CONNECTION_STRING_TYPES,
                );
            }
        }
        if let Value::Value(logs) = &self.logs {
            logs.validate(diags, AttributePath::new("logs").index(0));
        }
        for storage in self.storage_account.iter().flatten() {
            if let Value::Value(storage) = storage {
                storage.validate(diags, AttributePath::new("storage_account"));
            }
        }
        if let Value::Value(timeouts) = &self.timeouts {
            timeouts.validate(diags, AttributePath::new("timeouts").index(0));
        }
    }

    pub fn plan(&mut self, prior: Option<&Self>, config: &Self, defaults: SiteDefaults) {
        default_to(&mut self.client_affinity_enabled, &config.client_affinity_enabled, false);
        default_to(&mut self.client_certificate_enabled, &config.client_certificate_enabled, false);
        default_to(&mut self.client_certificate_mode, &config.client_certificate_mode, Cow::Borrowed("Required"));
        default_to(&mut self.enabled, &config.enabled, true);
        default_to(&mut self.https_only, &config.https_only, false);
        default_to(&mut self.public_network_access_enabled, &config.public_network_access_enabled, true);
        default_to(
            &mut self.ftp_publish_basic_authentication_enabled,
            &config.ftp_publish_basic_authentication_enabled,
            true,
        );
        default_to(
            &mut self.webdeploy_publish_basic_authentication_enabled,
            &config.webdeploy_publish_basic_authentication_enabled,
            true,
        );

        if let (Value::Value(site_config), Value::Value(config)) = (&mut self.site_config, &config.site_config) {
            let prior = prior.and_then(|prior| prior.site_config.as_ref_option());
            site_config.plan(prior, config, defaults);
        }
        if let Value::Value(identity) = &mut self.identity {
            let prior = prior.and_then(|prior| prior.identity.as_ref_option());
            identity.plan(prior);
        }
        if let (Value::Value(logs), Value::Value(config)) = (&mut self.logs, &config.logs) {
            logs.plan(config);
        }

        match prior {
            None => {
                self.id = Value::Unknown;
                self.kind = Value::Unknown;
                self.default_hostname = Value::Unknown;
                self.custom_domain_verification_id = Value::Unknown;
                self.site_credential = Value::Unknown;
                self.unknown_ip_addresses();
            }
            Some(prior) => {
                self.id = prior.id.clone();
                if prior.service_plan_id != self.service_plan_id {
                    self.unknown_ip_addresses();
                }
            }
        }
    }

    fn unknown_ip_addresses(&mut self) {
        self.outbound_ip_addresses = Value::Unknown;
        self.outbound_ip_address_list = Value::Unknown;
        self.possible_outbound_ip_addresses = Value::Unknown;
        self.possible_outbound_ip_address_list = Value::Unknown;
    }

    /// Remote configuration described by the state, `app_settings` holding only the provider settings
    pub fn settings(&self) -> SiteSettings {
        let mut settings = SiteSettings::default();
        if let Value::Value(site_config) = &self.site_config {
            site_config.expand(&mut settings);
        }
        settings
    }

    pub fn desired(&self) -> DesiredSite {
        DesiredSite {
            settings: self.settings(),
            user_app_settings: self.user_app_settings(),
            connection_strings: self.connection_strings(),
            logs: LogsState::expand(&self.logs),
            storage_accounts: self.storage_accounts(),
            ftp_basic_auth: known_bool(&self.ftp_publish_basic_authentication_enabled, true),
            scm_basic_auth: known_bool(&self.webdeploy_publish_basic_authentication_enabled, true),
        }
    }

    pub fn user_app_settings(&self) -> BTreeMap<String, String> {
        known_map(&self.app_settings)
    }

    pub fn connection_strings(&self) -> BTreeMap<String, ConnStringValueTypePair> {
        self.connection_string
            .iter()
            .flatten()
            .filter_map(|connection_string| {
                let connection_string = connection_string.as_ref_option()?;
                Some((
                    known(&connection_string.name)?,
                    ConnStringValueTypePair {
                        value: known(&connection_string.value).unwrap_or_default(),
                        kind: known(&connection_string.kind).unwrap_or_default(),
                    },
                ))
            })
            .collect()
    }

    pub fn storage_accounts(&self) -> BTreeMap<String, AzureStorageInfoValue> {
        self.storage_account
            .iter()
            .flatten()
            .filter_map(|storage| storage.as_ref_option()?.expand())
            .collect()
    }

    /// Copy the arguments into the site payload, leaving the other fields as they are
    pub fn expand(&self, site: &mut Site) {
        let properties = &mut site.properties;
        if let Some(plan) = known(&self.service_plan_id) {
            properties.server_farm_id = Some(plan);
        }
        properties.client_affinity_enabled = self.client_affinity_enabled.as_ref_option().copied();
        properties.client_cert_enabled = self.client_certificate_enabled.as_ref_option().copied();
        properties.client_cert_mode = known(&self.client_certificate_mode);
        properties.enabled = self.enabled.as_ref_option().copied();
        properties.https_only = self.https_only.as_ref_option().copied();
        properties.public_network_access = Some(
            if known_bool(&self.public_network_access_enabled, true) {
                "Enabled"
            } else {
                "Disabled"
            }
            .to_owned(),
        );
        properties.key_vault_reference_identity = Some(
            known(&self.key_vault_reference_identity_id)
                .unwrap_or_else(|| "SystemAssigned".to_owned()),
        );
        properties.virtual_network_subnet_id = match known(&self.virtual_network_subnet_id) {
            Some(subnet) => Some(subnet),
            // an empty subnet removes the integration
            None => properties.virtual_network_subnet_id.as_ref().map(|_| String::new()),
        };

        site.tags = Some(known_map(&self.tags));
        site.identity = match &self.identity {
            Value::Value(identity) => Some(identity.expand()),
            _ => site.identity.as_ref().map(|_| ManagedServiceIdentity {
                kind: "None".to_owned(),
                ..Default::default()
            }),
        };
    }

    /// Fill the state from the remote site, `managed` being the app settings hidden from `app_settings`
    pub fn flatten(&mut self, remote: &RemoteSite, managed: &[&str]) {
        let site = &remote.site;
        let properties = &site.properties;

        self.id = string(site.id.clone());
        self.name = string(site.name.clone());
        self.service_plan_id = string(properties.server_farm_id.as_deref().map(canonical_plan_id));
        self.app_settings = keep_empty(
            self.app_settings.is_value(),
            &user_settings(&remote.settings.app_settings, managed),
        );
        self.client_affinity_enabled = Value::Value(properties.client_affinity_enabled.unwrap_or(false));
        self.client_certificate_enabled = Value::Value(properties.client_cert_enabled.unwrap_or(false));
        self.client_certificate_mode = string(Some(
            properties
                .client_cert_mode
                .clone()
                .unwrap_or_else(|| "Required".to_owned()),
        ));
        self.enabled = Value::Value(properties.enabled.unwrap_or(true));
        self.https_only = Value::Value(properties.https_only.unwrap_or(false));
        self.public_network_access_enabled = Value::Value(
            properties.public_network_access.as_deref() != Some("Disabled"),
        );
        self.key_vault_reference_identity_id = string(
            properties
                .key_vault_reference_identity
                .clone()
                .filter(|identity| !identity.is_empty() && identity != "SystemAssigned"),
        );
        self.virtual_network_subnet_id = string(
            properties
                .virtual_network_subnet_id
                .clone()
                .filter(|subnet| !subnet.is_empty()),
        );
        self.ftp_publish_basic_authentication_enabled = Value::Value(remote.ftp_basic_auth);
        self.webdeploy_publish_basic_authentication_enabled = Value::Value(remote.scm_basic_auth);
        self.tags = keep_empty(
            self.tags.is_value(),
            site.tags.as_ref().unwrap_or(&BTreeMap::new()),
        );
        self.identity = IdentityState::flatten(site.identity.as_ref());
        self.site_config = Value::Value(SiteConfigState::flatten(
            &remote.settings,
            self.site_config.as_ref_option(),
        ));
        self.logs = LogsState::flatten(&remote.logs, &self.logs);

        let connection_strings: std::collections::BTreeSet<_> = remote
            .connection_strings
            .iter()
            .map(|(name, pair)| {
                Value::Value(ConnectionStringState {
                    name: string(Some(name.clone())),
                    kind: string(Some(pair.kind.clone())),
                    value: string(Some(pair.value.clone())),
                })
            })
            .collect();
        self.connection_string = if connection_strings.is_empty() {
            Value::Null
        } else {
            Value::Value(connection_strings)
        };

        let prior_storage: BTreeMap<String, StorageAccountState<'a>> = self
            .storage_account
            .iter()
            .flatten()
            .filter_map(|storage| {
                let storage = storage.as_ref_option()?;
                Some((known(&storage.name)?, storage.clone()))
            })
            .collect();
        let storage_accounts: BTreeSet<_> = remote
            .storage_accounts
            .iter()
            .map(|(name, storage)| {
                Value::Value(StorageAccountState::flatten(name, storage, prior_storage.get(name)))
            })
            .collect();
        self.storage_account = if storage_accounts.is_empty() {
            Value::Null
        } else {
            Value::Value(storage_accounts)
        };

        self.kind = string(site.kind.clone());
        self.default_hostname = string(properties.default_host_name.clone());
        self.outbound_ip_addresses = string(properties.outbound_ip_addresses.clone());
        self.outbound_ip_address_list = properties
            .outbound_ip_addresses
            .as_deref()
            .map(|ips| string_list(split_ip_list(ips)))
            .unwrap_or_default();
        self.possible_outbound_ip_addresses =
            string(properties.possible_outbound_ip_addresses.clone());
        self.possible_outbound_ip_address_list = properties
            .possible_outbound_ip_addresses
            .as_deref()
            .map(|ips| string_list(split_ip_list(ips)))
            .unwrap_or_default();
        self.custom_domain_verification_id =
            string(properties.custom_domain_verification_id.clone());
        self.site_credential = Value::Value(vec![Value::Value(SiteCredentialState {
            name: string(Some(remote.credentials.publishing_user_name.clone())),
            password: string(remote.credentials.publishing_password.clone()),
        })]);
    }
}
