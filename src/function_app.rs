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

//! `linux_function_app` and `windows_function_app` resources
//!
//! The storage arguments are not site properties:
//! they are written as app settings and read back from them.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{Attribute, AttributeType, Block, Description, Schema};
use tf_provider::value::{serde_as_vec, Value, ValueBool, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::arm::models::{AppServicePlan, Site, SiteProperties, WEB_API_VERSION};
use crate::arm::{Arm, ArmConnection};
use crate::attributes::{
    defaulted, optional_string, required_string, sensitive, LOCATION, RESOURCE_GROUP_NAME,
};
use crate::ids::{KeyVaultSecretId, WebAppId};
use crate::resource::{ensure_absent, ArmResource, Created};
use crate::site::ops::{self, check_name_available, check_plan, is_elastic_or_consumption};
use crate::site::settings::{
    content_share_name, key_vault_reference, parse_key_vault_reference,
    parse_storage_connection_string, storage_connection_string, AZURE_WEB_JOBS_DASHBOARD,
    AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME, AZURE_WEB_JOBS_STORAGE,
    AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME, FUNCTIONS_EXTENSION_VERSION, FUNCTION_MANAGED_SETTINGS,
    WEBSITE_CONTENTAZUREFILECONNECTIONSTRING, WEBSITE_CONTENTSHARE,
};
use crate::site::state::{SiteDefaults, StickySettingsState};
use crate::site::{SiteArgs, SiteOs, Stack};
use crate::timeouts::{timeout_for, Operation};
use crate::utils::{default_to, force_new, known, known_bool, known_number, location, string};
use crate::validate;
use crate::web_app::managed_attributes;

/// Arguments shared by function apps and their slots, stored as app settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FunctionArgs<'a> {
    #[serde(borrow = "'a")]
    pub storage_account_name: ValueString<'a>,
    pub storage_account_access_key: ValueString<'a>,
    pub storage_uses_managed_identity: ValueBool,
    pub storage_key_vault_secret_id: ValueString<'a>,
    pub functions_extension_version: ValueString<'a>,
    pub builtin_logging_enabled: ValueBool,
    pub content_share_force_disabled: ValueBool,
    pub daily_memory_time_quota: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(bound(deserialize = ""))]
pub struct FunctionAppState<'a, K: Stack> {
    #[serde(borrow = "'a")]
    pub resource_group_name: ValueString<'a>,
    pub location: ValueString<'a>,
    #[serde(with = "serde_as_vec")]
    pub sticky_settings: Value<StickySettingsState<'a>>,
    #[serde(flatten)]
    pub function: FunctionArgs<'a>,
    #[serde(flatten)]
    pub site: SiteArgs<'a, K>,
}

/// App settings hidden from `app_settings`
pub(crate) fn managed_settings<K: Stack>() -> Vec<&'static str> {
    FUNCTION_MANAGED_SETTINGS
        .iter()
        .chain(K::MANAGED_SETTINGS)
        .copied()
        .collect()
}

pub(crate) fn function_managed_attributes<K: Stack>() -> Vec<(&'static str, &'static str)> {
    let mut managed = managed_attributes::<K>();
    managed.extend([
        (AZURE_WEB_JOBS_STORAGE, "storage_account_access_key"),
        (AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME, "storage_uses_managed_identity"),
        (AZURE_WEB_JOBS_DASHBOARD, "builtin_logging_enabled"),
        (AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME, "builtin_logging_enabled"),
        (FUNCTIONS_EXTENSION_VERSION, "functions_extension_version"),
        (WEBSITE_CONTENTSHARE, "content_share_force_disabled"),
        (
            WEBSITE_CONTENTAZUREFILECONNECTIONSTRING,
            "content_share_force_disabled",
        ),
    ]);
    managed
}

impl<'a> FunctionArgs<'a> {
    pub fn attributes() -> HashMap<String, Attribute> {
        map! {
            "storage_account_name" => optional_string("Storage account used by the runtime"),
            "storage_account_access_key" => sensitive(optional_string("Access key of the storage account")),
            "storage_uses_managed_identity" => defaulted(
                AttributeType::Bool,
                "Whether the runtime reaches the storage account with the managed identity of the app",
            ),
            "storage_key_vault_secret_id" => optional_string("Key Vault secret holding the storage connection string"),
            "functions_extension_version" => defaulted(AttributeType::String, "Runtime version, defaults to `~4`"),
            "builtin_logging_enabled" => defaulted(
                AttributeType::Bool,
                "Whether the runtime logs to the storage account, defaults to `true`",
            ),
            "content_share_force_disabled" => defaulted(
                AttributeType::Bool,
                "Whether the content share is left unconfigured on elastic and consumption plans",
            ),
            "daily_memory_time_quota" => defaulted(
                AttributeType::Number,
                "Daily usage quota in GB-s on consumption plans, `0` for unlimited",
            ),
        }
    }

    pub fn validate(&self, diags: &mut Diagnostics) {
        let uses_identity = self.storage_uses_managed_identity != Value::Value(false)
            && !self.storage_uses_managed_identity.is_null();
        let methods = [
            !self.storage_account_access_key.is_null(),
            uses_identity,
            !self.storage_key_vault_secret_id.is_null(),
        ];
        match methods.iter().filter(|set| **set).count() {
            0 => diags.root_error(
                "Missing storage authentication",
                "Set one of `storage_account_access_key`, `storage_uses_managed_identity` or `storage_key_vault_secret_id`.",
            ),
            1 => (),
            _ => diags.root_error(
                "Conflicting storage authentication",
                "`storage_account_access_key`, `storage_uses_managed_identity` and `storage_key_vault_secret_id` are mutually exclusive.",
            ),
        }
        if self.storage_key_vault_secret_id.is_null() && self.storage_account_name.is_null() {
            diags.error_short(
                "`storage_account_name` is required unless `storage_key_vault_secret_id` is set",
                AttributePath::new("storage_account_name"),
            );
        }
        validate::id(
            diags,
            AttributePath::new("storage_key_vault_secret_id"),
            &self.storage_key_vault_secret_id,
            KeyVaultSecretId::parse,
        );
        validate::not_empty(
            diags,
            AttributePath::new("functions_extension_version"),
            &self.functions_extension_version,
        );
        if let Value::Value(quota) = &self.daily_memory_time_quota {
            if *quota < 0 {
                diags.error_short(
                    "`daily_memory_time_quota` cannot be negative",
                    AttributePath::new("daily_memory_time_quota"),
                );
            }
        }
    }

    pub fn plan(&mut self, config: &Self) {
        default_to(
            &mut self.storage_uses_managed_identity,
            &config.storage_uses_managed_identity,
            false,
        );
        default_to(
            &mut self.functions_extension_version,
            &config.functions_extension_version,
            Cow::Borrowed("~4"),
        );
        default_to(
            &mut self.builtin_logging_enabled,
            &config.builtin_logging_enabled,
            true,
        );
        default_to(
            &mut self.content_share_force_disabled,
            &config.content_share_force_disabled,
            false,
        );
        default_to(
            &mut self.daily_memory_time_quota,
            &config.daily_memory_time_quota,
            0,
        );
    }

    /// Value of `AzureWebJobsStorage`, `None` when authenticating with the managed identity
    fn storage_connection(&self, suffix: &str) -> Option<String> {
        if let Some(secret_id) = known(&self.storage_key_vault_secret_id) {
            return Some(key_vault_reference(&secret_id));
        }
        let name = known(&self.storage_account_name)?;
        let key = known(&self.storage_account_access_key)?;
        Some(storage_connection_string(&name, &key, suffix))
    }

    /// App settings derived from the function arguments
    ///
    /// `content_share` is set for the plans storing the content on a file share.
    pub fn storage_settings(&self, suffix: &str, content_share: Option<String>) -> BTreeMap<String, String> {
        let mut settings = BTreeMap::new();
        let logging = known_bool(&self.builtin_logging_enabled, true);
        match self.storage_connection(suffix) {
            Some(connection) => {
                if logging {
                    settings.insert(AZURE_WEB_JOBS_DASHBOARD.to_owned(), connection.clone());
                }
                if let Some(share) = content_share {
                    settings.insert(
                        WEBSITE_CONTENTAZUREFILECONNECTIONSTRING.to_owned(),
                        connection.clone(),
                    );
                    settings.insert(WEBSITE_CONTENTSHARE.to_owned(), share);
                }
                settings.insert(AZURE_WEB_JOBS_STORAGE.to_owned(), connection);
            }
            None => {
                if let Some(name) = known(&self.storage_account_name) {
                    if logging {
                        settings.insert(AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME.to_owned(), name.clone());
                    }
                    settings.insert(AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME.to_owned(), name);
                }
            }
        }
        if let Some(version) = known(&self.functions_extension_version) {
            settings.insert(FUNCTIONS_EXTENSION_VERSION.to_owned(), version);
        }
        settings
    }

    /// Content share to use on `plan`, keeping the one already configured
    pub fn content_share(
        &self,
        plan: &AppServicePlan,
        name: &str,
        existing: Option<&BTreeMap<String, String>>,
    ) -> Option<String> {
        if !is_elastic_or_consumption(plan) || known_bool(&self.content_share_force_disabled, false) {
            return None;
        }
        existing
            .and_then(|settings| settings.get(WEBSITE_CONTENTSHARE).cloned())
            .or_else(|| Some(content_share_name(name)))
    }

    /// Copy the arguments into a site about to be written
    pub fn expand(&self, site: &mut Site) {
        site.properties.daily_memory_time_quota = known_number(&self.daily_memory_time_quota);
    }

    pub fn flatten(&mut self, site: &Site, app_settings: &BTreeMap<String, String>) {
        let get = |key: &str| {
            app_settings
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.clone())
        };

        self.storage_account_name = Value::Null;
        self.storage_account_access_key = Value::Null;
        self.storage_key_vault_secret_id = Value::Null;
        self.storage_uses_managed_identity = Value::Value(false);
        if let Some(storage) = get(AZURE_WEB_JOBS_STORAGE) {
            if let Some(secret_id) = parse_key_vault_reference(&storage) {
                self.storage_key_vault_secret_id = string(Some(secret_id));
            } else if let Some((name, key)) = parse_storage_connection_string(&storage) {
                self.storage_account_name = string(Some(name));
                self.storage_account_access_key = string(Some(key));
            }
        } else if let Some(name) = get(AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME) {
            self.storage_account_name = string(Some(name));
            self.storage_uses_managed_identity = Value::Value(true);
        }

        self.builtin_logging_enabled = Value::Value(
            get(AZURE_WEB_JOBS_DASHBOARD).is_some()
                || get(AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME).is_some(),
        );
        self.functions_extension_version = string(get(FUNCTIONS_EXTENSION_VERSION));
        if self.content_share_force_disabled.is_null() {
            self.content_share_force_disabled = Value::Value(false);
        }
        self.daily_memory_time_quota =
            Value::Value(site.properties.daily_memory_time_quota.unwrap_or(0));
    }
}

/// Whether a site is a function app of the OS `O`
pub(crate) fn is_function_app<O: SiteOs>(site: &Site) -> bool {
    site.kind
        .as_deref()
        .map_or(false, |kind| kind.contains("functionapp"))
        && O::is_site(site.kind.as_deref(), site.properties.reserved)
}

/// Function app hosted on a `O` service plan
#[derive(Debug, Clone, Default)]
pub struct FunctionApp<O, A = ArmConnection> {
    arm: A,
    os: PhantomData<O>,
}

impl<O: SiteOs, A: Arm> FunctionApp<O, A> {
    pub fn new(arm: A) -> Self {
        Self {
            arm,
            os: PhantomData,
        }
    }

    async fn refresh<'a>(
        &self,
        mut state: FunctionAppState<'a, O::FunctionStack>,
        id: &WebAppId,
    ) -> Result<Option<FunctionAppState<'a, O::FunctionStack>>> {
        let Some(remote) = ops::fetch(&self.arm, &id.to_string()).await? else {
            return Ok(None);
        };
        if !is_function_app::<O>(&remote.site) {
            return Err(anyhow!("{id} is not a {} function app", O::NAME));
        }
        if state.site.name.is_null() {
            if let Some(plan_id) = &remote.site.properties.server_farm_id {
                check_plan::<O, _>(&self.arm, plan_id, false).await?;
            }
        }

        state.resource_group_name = string(Some(id.resource_group_name.clone()));
        state.location = location(&state.location, remote.site.location.as_deref());
        state.sticky_settings = StickySettingsState::flatten(
            &ops::fetch_slot_config_names(&self.arm, &id.to_string()).await?,
        );
        state
            .function
            .flatten(&remote.site, &remote.settings.app_settings);
        state
            .site
            .flatten(&remote, &managed_settings::<O::FunctionStack>());
        Ok(Some(state))
    }
}

fn state_id(state: &SiteArgs<'_, impl Stack>) -> Result<WebAppId> {
    let id = known(&state.id).ok_or_else(|| anyhow!("the ID of the function app is unknown"))?;
    Ok(WebAppId::parse(&id)?)
}

#[async_trait]
impl<O: SiteOs, A: Arm> ArmResource for FunctionApp<O, A> {
    type State<'a> = FunctionAppState<'a, O::FunctionStack>;

    fn type_name(&self) -> &'static str {
        O::FUNCTION_APP
    }

    fn schema(&self) -> Schema {
        let mut attributes = SiteArgs::<O::FunctionStack>::attributes(required_string(
            "ID of the service plan hosting the function app",
        ));
        attributes.insert("resource_group_name".to_owned(), RESOURCE_GROUP_NAME.clone());
        attributes.insert("location".to_owned(), LOCATION.clone());
        attributes.extend(FunctionArgs::attributes());
        let mut blocks = SiteArgs::<O::FunctionStack>::blocks();
        blocks.insert("sticky_settings".to_owned(), StickySettingsState::block());
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes,
                blocks,
                description: Description::plain(format!("{} function app", O::NAME)),
                deprecated: false,
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        config.function.validate(diags);
        config
            .site
            .validate(diags, &function_managed_attributes::<O::FunctionStack>());
    }

    fn plan<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior: Option<&Self::State<'a>>,
        config: &Self::State<'a>,
        planned: &mut Self::State<'a>,
    ) {
        planned.function.plan(&config.function);
        planned.site.plan(
            prior.map(|prior| &prior.site),
            &config.site,
            SiteDefaults {
                always_on: false,
                use_32_bit_worker: O::USE_32_BIT_WORKER,
            },
        );
    }

    fn requires_replace<'a>(
        &self,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
    ) -> Vec<AttributePath> {
        let mut replace = Vec::new();
        force_new(&mut replace, "name", &prior.site.name, &planned.site.name);
        force_new(
            &mut replace,
            "resource_group_name",
            &prior.resource_group_name,
            &planned.resource_group_name,
        );
        force_new(&mut replace, "location", &prior.location, &planned.location);
        replace
    }

    fn timeout<'a>(&self, state: &Self::State<'a>, operation: Operation) -> Duration {
        timeout_for(&state.site.timeouts, operation)
    }

    fn id<'a>(&self, state: &Self::State<'a>) -> String {
        known(&state.site.id).unwrap_or_default()
    }

    async fn create<'a>(
        &self,
        planned: Self::State<'a>,
        created: &Created,
    ) -> Result<Self::State<'a>> {
        let subscription_id = self.arm.subscription_id().await?;
        let name = known(&planned.site.name).context("the name of the function app is unknown")?;
        let resource_group =
            known(&planned.resource_group_name).context("the resource group is unknown")?;
        let id = WebAppId::new(subscription_id, resource_group, &name);
        let path = id.to_string();

        ensure_absent(&self.arm, &path, WEB_API_VERSION, O::FUNCTION_APP).await?;
        check_name_available(&self.arm, &name).await?;
        let plan_id = known(&planned.site.service_plan_id)
            .context("the service plan of the function app is unknown")?;
        let always_on = planned
            .site
            .site_config
            .as_ref_option()
            .map_or(false, |config| known_bool(&config.always_on, false));
        let plan = check_plan::<O, _>(&self.arm, &plan_id, always_on).await?;

        let mut site = Site {
            location: known(&planned.location),
            kind: Some(O::FUNCTION_KIND.to_owned()),
            properties: SiteProperties {
                reserved: Some(O::RESERVED),
                ..Default::default()
            },
            ..Default::default()
        };
        planned.site.expand(&mut site);
        planned.function.expand(&mut site);

        let suffix = self.arm.environment().await?.storage_suffix();
        let share = planned.function.content_share(&plan, &name, None);
        let mut desired = planned.site.desired();
        desired
            .settings
            .app_settings
            .extend(planned.function.storage_settings(suffix, share));
        tracing::debug!(id = path, "creating function app");
        created.record(&id);
        ops::create_site(&self.arm, &path, site, &desired).await?;
        let sticky = StickySettingsState::expand(&planned.sticky_settings);
        if sticky != Default::default() {
            ops::put_slot_config_names(&self.arm, &path, &sticky)
                .await
                .context("writing the sticky settings")?;
        }

        self.refresh(planned, &id)
            .await?
            .ok_or_else(|| anyhow!("{id} was not found after its creation"))
    }

    async fn read<'a>(&self, state: Self::State<'a>) -> Result<Option<Self::State<'a>>> {
        let id = state_id(&state.site)?;
        self.refresh(state, &id).await
    }

    async fn update<'a>(
        &self,
        _prior: Self::State<'a>,
        planned: Self::State<'a>,
    ) -> Result<Self::State<'a>> {
        let id = state_id(&planned.site)?;
        let path = id.to_string();
        let existing = ops::fetch(&self.arm, &path)
            .await?
            .ok_or_else(|| anyhow!("{id} does not exist anymore"))?;

        let plan_id = known(&planned.site.service_plan_id)
            .context("the service plan of the function app is unknown")?;
        let plan = check_plan::<O, _>(&self.arm, &plan_id, false).await?;

        let mut site = existing.site.clone();
        planned.site.expand(&mut site);
        planned.function.expand(&mut site);

        let suffix = self.arm.environment().await?.storage_suffix();
        let name = existing.site.name.clone().unwrap_or_else(|| id.site_name.clone());
        let share =
            planned
                .function
                .content_share(&plan, &name, Some(&existing.settings.app_settings));
        let mut desired = planned.site.desired();
        desired
            .settings
            .app_settings
            .extend(planned.function.storage_settings(suffix, share));
        ops::update_site(
            &self.arm,
            &path,
            site,
            &desired,
            &existing,
            &managed_settings::<O::FunctionStack>(),
        )
        .await?;
        let sticky = StickySettingsState::expand(&planned.sticky_settings);
        if sticky != ops::fetch_slot_config_names(&self.arm, &path).await? {
            ops::put_slot_config_names(&self.arm, &path, &sticky)
                .await
                .context("updating the sticky settings")?;
        }

        self.refresh(planned, &id)
            .await?
            .ok_or_else(|| anyhow!("{id} was not found after its update"))
    }

    async fn delete<'a>(&self, state: Self::State<'a>) -> Result<()> {
        let id = state_id(&state.site)?;
        ops::delete_site(&self.arm, &id.to_string()).await?;
        Ok(())
    }

    fn import<'a>(&self, id: String) -> Result<Self::State<'a>> {
        let id = WebAppId::parse(&id)?;
        Ok(FunctionAppState {
            site: SiteArgs {
                id: string(Some(id.to_string())),
                ..Default::default()
            },
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::arm::fake::{FakeArm, SUBSCRIPTION_ID};
    use crate::arm::Method;
    use crate::resource::tests::{apply_create, apply_update};
    use crate::resource::AzureResource;
    use crate::site::state::SiteConfigState;
    use crate::site::{Linux, LinuxFunctionStack};
    use crate::utils::string_list;

    fn plan_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/serverFarms/consumption")
    }

    fn site_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/sites/my-func")
    }

    fn fake() -> FakeArm {
        let arm = FakeArm::default();
        arm.seed(
            &plan_id(),
            json!({
                "kind": "functionapp,linux",
                "sku": { "name": "Y1", "tier": "Dynamic" },
                "properties": { "reserved": true }
            }),
        );
        arm
    }

    fn config() -> FunctionAppState<'static, LinuxFunctionStack> {
        FunctionAppState {
            resource_group_name: "rg".into(),
            location: "westeurope".into(),
            function: FunctionArgs {
                storage_account_name: "funcstore".into(),
                storage_account_access_key: "a2V5".into(),
                ..Default::default()
            },
            site: SiteArgs {
                name: "my-func".into(),
                service_plan_id: string(Some(plan_id())),
                app_settings: Value::Value(
                    [(Cow::from("FOO"), ValueString::from("bar"))]
                        .into_iter()
                        .collect(),
                ),
                site_config: Value::Value(SiteConfigState {
                    application_stack: Value::Value(LinuxFunctionStack {
                        python_version: "3.11".into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn storage_authentication() {
        let resource = FunctionApp::<Linux, FakeArm>::default();
        let mut diags = Diagnostics::default();
        resource.validate(&mut diags, &config());
        assert!(diags.errors.is_empty(), "{diags:?}");

        let mut both = config();
        both.function.storage_uses_managed_identity = Value::Value(true);
        let mut diags = Diagnostics::default();
        resource.validate(&mut diags, &both);
        assert_eq!(diags.errors.len(), 1);

        let mut none = config();
        none.function.storage_account_access_key = Value::Null;
        none.function.storage_account_name = Value::Null;
        let mut diags = Diagnostics::default();
        resource.validate(&mut diags, &none);
        assert_eq!(diags.errors.len(), 2);

        let mut managed = config();
        managed.site.app_settings = Value::Value(
            [(Cow::from("AzureWebJobsStorage"), ValueString::from("x"))]
                .into_iter()
                .collect(),
        );
        let mut diags = Diagnostics::default();
        resource.validate(&mut diags, &managed);
        assert!(format!("{diags:?}").contains("storage_account_access_key"));
    }

    #[test]
    fn managed_identity_settings() {
        let state = FunctionArgs {
            storage_account_name: "funcstore".into(),
            storage_uses_managed_identity: Value::Value(true),
            functions_extension_version: "~4".into(),
            builtin_logging_enabled: Value::Value(true),
            ..Default::default()
        };
        let settings = state.storage_settings("core.windows.net", Some("share".to_owned()));
        assert_eq!(
            settings,
            [
                (AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME, "funcstore"),
                (AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME, "funcstore"),
                (FUNCTIONS_EXTENSION_VERSION, "~4"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect::<BTreeMap<_, _>>()
        );

        let mut read = FunctionArgs::default();
        read.flatten(&Site::default(), &settings);
        assert_eq!(read.storage_uses_managed_identity, Value::Value(true));
        assert_eq!(read.storage_account_name, ValueString::from("funcstore"));
        assert_eq!(read.storage_account_access_key, Value::Null);
        assert_eq!(read.builtin_logging_enabled, Value::Value(true));
        assert_eq!(read.daily_memory_time_quota, Value::Value(0));
    }

    #[tokio::test]
    async fn consumption_plan_gets_a_content_share() {
        let arm = fake();
        let resource = AzureResource(FunctionApp::<Linux, _>::new(arm.clone()));
        let (diags, state) = apply_create(&resource, config()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let state = state.unwrap();

        assert_eq!(state.site.kind, ValueString::from("functionapp,linux"));
        assert_eq!(state.site.app_settings, config().site.app_settings);
        assert_eq!(state.function.storage_account_name, ValueString::from("funcstore"));
        assert_eq!(state.function.storage_account_access_key, ValueString::from("a2V5"));
        assert_eq!(state.function.functions_extension_version, ValueString::from("~4"));
        assert_eq!(state.function.builtin_logging_enabled, Value::Value(true));
        assert_eq!(state.sticky_settings, Value::Null);

        let app_settings = format!("{}/config/appsettings", site_id());
        let body = arm.last_body(Method::Put, &app_settings).unwrap();
        let connection = "DefaultEndpointsProtocol=https;AccountName=funcstore;AccountKey=a2V5;EndpointSuffix=core.windows.net";
        assert_eq!(body["properties"]["AzureWebJobsStorage"], connection);
        assert_eq!(body["properties"]["WEBSITE_CONTENTAZUREFILECONNECTIONSTRING"], connection);
        assert_eq!(body["properties"]["FUNCTIONS_WORKER_RUNTIME"], "python");
        assert_eq!(body["properties"]["FOO"], "bar");
        let share = body["properties"]["WEBSITE_CONTENTSHARE"]
            .as_str()
            .unwrap()
            .to_owned();
        assert!(share.starts_with("my-func-"));

        let site = arm.last_body(Method::Put, &site_id()).unwrap();
        assert_eq!(site["kind"], "functionapp,linux");
        assert_eq!(site["properties"]["siteConfig"]["linuxFxVersion"], "PYTHON|3.11");

        let mut config = config();
        config.function.builtin_logging_enabled = Value::Value(false);
        config.sticky_settings = Value::Value(StickySettingsState {
            connection_string_names: string_list(["db".to_owned()]),
            ..Default::default()
        });
        let (diags, _, updated) = apply_update(&resource, state, config.clone()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let updated = updated.unwrap();
        assert_eq!(updated.function.builtin_logging_enabled, Value::Value(false));
        assert_eq!(updated.sticky_settings, config.sticky_settings);
        assert_eq!(
            arm.last_body(Method::Put, &format!("{}/config/slotConfigNames", site_id())),
            Some(json!({ "properties": { "appSettingNames": null, "connectionStringNames": ["db"] } }))
        );
        let body = arm.last_body(Method::Put, &app_settings).unwrap();
        assert_eq!(body["properties"]["WEBSITE_CONTENTSHARE"], share.as_str());
        assert!(body["properties"].get("AzureWebJobsDashboard").is_none());
    }
}
