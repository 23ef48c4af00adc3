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

//! `linux_web_app` and `windows_web_app` resources

use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::value::{serde_as_vec, Value, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::arm::models::{Site, SiteProperties, WEB_API_VERSION};
use crate::arm::{Arm, ArmConnection};
use crate::attributes::{required_string, LOCATION, RESOURCE_GROUP_NAME};
use crate::ids::WebAppId;
use crate::resource::{ensure_absent, ArmResource, Created};
use crate::site::ops::{self, check_name_available, check_plan};
use crate::site::settings::WEBSITE_HEALTHCHECK_MAXPINGFAILURES;
use crate::site::state::{SiteDefaults, StickySettingsState};
use crate::site::{SiteArgs, SiteOs, Stack};
use crate::timeouts::{timeout_for, Operation};
use crate::utils::{force_new, known, known_bool, location, string};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(bound(deserialize = ""))]
pub struct WebAppState<'a, K: Stack> {
    #[serde(borrow = "'a")]
    pub resource_group_name: ValueString<'a>,
    pub location: ValueString<'a>,
    #[serde(with = "serde_as_vec")]
    pub sticky_settings: Value<StickySettingsState<'a>>,
    #[serde(flatten)]
    pub site: SiteArgs<'a, K>,
}

/// App settings that other attributes own, with the attribute to use instead
pub(crate) fn managed_attributes<K: Stack>() -> Vec<(&'static str, &'static str)> {
    let mut managed = vec![(
        WEBSITE_HEALTHCHECK_MAXPINGFAILURES,
        "site_config.health_check_eviction_time_in_min",
    )];
    managed.extend(
        K::MANAGED_SETTINGS
            .iter()
            .map(|key| (*key, "site_config.application_stack")),
    );
    managed
}

/// Web app hosted on a `O` service plan
#[derive(Debug, Clone, Default)]
pub struct WebApp<O, A = ArmConnection> {
    arm: A,
    os: PhantomData<O>,
}

impl<O: SiteOs, A: Arm> WebApp<O, A> {
    pub fn new(arm: A) -> Self {
        Self {
            arm,
            os: PhantomData,
        }
    }

    fn defaults() -> SiteDefaults {
        SiteDefaults {
            always_on: true,
            use_32_bit_worker: O::USE_32_BIT_WORKER,
        }
    }

    async fn refresh<'a>(
        &self,
        mut state: WebAppState<'a, O::WebStack>,
        id: &WebAppId,
    ) -> Result<Option<WebAppState<'a, O::WebStack>>> {
        let Some(remote) = ops::fetch(&self.arm, &id.to_string()).await? else {
            return Ok(None);
        };
        if !O::is_site(remote.site.kind.as_deref(), remote.site.properties.reserved) {
            return Err(anyhow!("{id} is not a {} web app", O::NAME));
        }
        if state.site.name.is_null() {
            // freshly imported
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
            .site
            .flatten(&remote, <O::WebStack as Stack>::MANAGED_SETTINGS);
        Ok(Some(state))
    }
}

fn state_id(state: &SiteArgs<'_, impl Stack>) -> Result<WebAppId> {
    let id = known(&state.id).ok_or_else(|| anyhow!("the ID of the web app is unknown"))?;
    Ok(WebAppId::parse(&id)?)
}

#[async_trait]
impl<O: SiteOs, A: Arm> ArmResource for WebApp<O, A> {
    type State<'a> = WebAppState<'a, O::WebStack>;

    fn type_name(&self) -> &'static str {
        O::WEB_APP
    }

    fn schema(&self) -> Schema {
        let mut attributes = SiteArgs::<O::WebStack>::attributes(required_string(
            "ID of the service plan hosting the app",
        ));
        attributes.insert("resource_group_name".to_owned(), RESOURCE_GROUP_NAME.clone());
        attributes.insert("location".to_owned(), LOCATION.clone());
        let mut blocks = SiteArgs::<O::WebStack>::blocks();
        blocks.insert("sticky_settings".to_owned(), StickySettingsState::block());
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes,
                blocks,
                description: Description::plain(format!("{} web app", O::NAME)),
                deprecated: false,
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        config
            .site
            .validate(diags, &managed_attributes::<O::WebStack>());
    }

    fn plan<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior: Option<&Self::State<'a>>,
        config: &Self::State<'a>,
        planned: &mut Self::State<'a>,
    ) {
        planned
            .site
            .plan(prior.map(|prior| &prior.site), &config.site, Self::defaults());
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
        let name = known(&planned.site.name).context("the name of the web app is unknown")?;
        let resource_group =
            known(&planned.resource_group_name).context("the resource group is unknown")?;
        let id = WebAppId::new(subscription_id, resource_group, &name);
        let path = id.to_string();

        ensure_absent(&self.arm, &path, WEB_API_VERSION, O::WEB_APP).await?;
        check_name_available(&self.arm, &name).await?;
        let plan_id = known(&planned.site.service_plan_id)
            .context("the service plan of the web app is unknown")?;
        let always_on = planned
            .site
            .site_config
            .as_ref_option()
            .map_or(false, |config| known_bool(&config.always_on, false));
        check_plan::<O, _>(&self.arm, &plan_id, always_on).await?;

        let mut site = Site {
            location: known(&planned.location),
            kind: Some(O::WEB_KIND.to_owned()),
            properties: SiteProperties {
                reserved: Some(O::RESERVED),
                ..Default::default()
            },
            ..Default::default()
        };
        planned.site.expand(&mut site);
        tracing::debug!(id = path, "creating web app");
        created.record(&id);
        ops::create_site(&self.arm, &path, site, &planned.site.desired()).await?;
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
        prior: Self::State<'a>,
        planned: Self::State<'a>,
    ) -> Result<Self::State<'a>> {
        let id = state_id(&prior.site)?;
        let path = id.to_string();
        let existing = ops::fetch(&self.arm, &path)
            .await?
            .ok_or_else(|| anyhow!("{id} does not exist anymore"))?;

        if prior.site.service_plan_id != planned.site.service_plan_id {
            if let Some(plan_id) = known(&planned.site.service_plan_id) {
                check_plan::<O, _>(&self.arm, &plan_id, false).await?;
            }
        }

        let mut site = existing.site.clone();
        planned.site.expand(&mut site);
        ops::update_site(
            &self.arm,
            &path,
            site,
            &planned.site.desired(),
            &existing,
            <O::WebStack as Stack>::MANAGED_SETTINGS,
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
        Ok(WebAppState {
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
    use std::borrow::Cow;

    use serde_json::json;
    use tf_provider::value::Value;

    use super::*;
    use crate::arm::fake::{FakeArm, SUBSCRIPTION_ID};
    use crate::arm::Method;
    use crate::resource::tests::{apply_create, apply_update, destroy, read};
    use crate::resource::AzureResource;
    use crate::site::state::{
        ApplicationLogsState, CorsState, HttpLogsState, IpRestrictionState, LogsState,
        SiteConfigState, StorageAccountState,
    };
    use crate::utils::string_list;
    use crate::site::{Linux, LinuxWebStack, Windows};

    fn plan_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/serverFarms/plan")
    }

    fn site_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/sites/my-app")
    }

    fn fake() -> FakeArm {
        let arm = FakeArm::default();
        arm.seed(
            &plan_id(),
            json!({ "kind": "linux", "sku": { "tier": "PremiumV3" }, "properties": { "reserved": true } }),
        );
        arm
    }

    fn config() -> WebAppState<'static, LinuxWebStack> {
        WebAppState {
            resource_group_name: "rg".into(),
            location: "westeurope".into(),
            sticky_settings: Value::Null,
            site: SiteArgs {
                name: "my-app".into(),
                service_plan_id: string(Some(plan_id())),
                app_settings: Value::Value(
                    [(Cow::from("FOO"), ValueString::from("bar"))]
                        .into_iter()
                        .collect(),
                ),
                site_config: Value::Value(SiteConfigState {
                    application_stack: Value::Value(LinuxWebStack {
                        node_version: "20-lts".into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn create_then_read() {
        let arm = fake();
        let resource = AzureResource(WebApp::<Linux, _>::new(arm.clone()));
        let (diags, state) = apply_create(&resource, config()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let state = state.unwrap();

        assert_eq!(state.site.id, string(Some(site_id())));
        assert_eq!(state.site.kind, ValueString::from("app,linux"));
        assert_eq!(state.site.app_settings, config().site.app_settings);
        assert_eq!(state.site.enabled, Value::Value(true));
        let site_config = state.site.site_config.as_ref_option().unwrap();
        assert_eq!(
            site_config.application_stack,
            config().site.site_config.as_ref_option().unwrap().application_stack
        );
        assert_eq!(site_config.always_on, Value::Value(true));

        let body = arm.last_body(Method::Put, &site_id()).unwrap();
        assert_eq!(body["properties"]["siteConfig"]["linuxFxVersion"], "NODE|20-lts");
        assert_eq!(body["properties"]["reserved"], true);

        let (diags, refreshed) = read(&resource, state.clone()).await;
        assert!(diags.errors.is_empty());
        assert_eq!(refreshed, Some(Value::Value(state)));
    }

    #[tokio::test]
    async fn existing_site_must_be_imported() {
        let arm = fake();
        arm.seed(&site_id(), json!({ "name": "my-app", "kind": "app,linux" }));
        let resource = AzureResource(WebApp::<Linux, _>::new(arm));
        let (diags, state) = apply_create(&resource, config()).await;
        assert!(state.is_none());
        assert!(format!("{diags:?}").contains("needs to be imported"));
    }

    #[tokio::test]
    async fn plan_of_the_wrong_os() {
        let arm = fake();
        let resource = AzureResource(WebApp::<Windows, _>::new(arm.clone()));
        let mut config = WebAppState::<crate::site::WindowsWebStack> {
            resource_group_name: "rg".into(),
            location: "westeurope".into(),
            sticky_settings: Value::Null,
            site: SiteArgs {
                name: "my-app".into(),
                service_plan_id: string(Some(plan_id())),
                site_config: Value::Value(Default::default()),
                ..Default::default()
            },
        };
        config.site.https_only = Value::Value(true);
        let (diags, state) = apply_create(&resource, config).await;
        assert!(state.is_none());
        assert!(format!("{diags:?}").contains("cannot host Windows apps"));
        assert_eq!(arm.resource(&site_id()), None);
    }

    #[tokio::test]
    async fn deleted_site_is_removed_from_state() {
        let arm = fake();
        let resource = AzureResource(WebApp::<Linux, _>::new(arm.clone()));
        let (_, state) = apply_create(&resource, config()).await;
        arm.remove(&site_id());

        let (diags, refreshed) = read(&resource, state.unwrap()).await;
        assert!(diags.errors.is_empty());
        assert_eq!(refreshed, Some(Value::Null));
    }

    #[tokio::test]
    async fn update_sends_only_changed_settings() {
        let arm = fake();
        let resource = AzureResource(WebApp::<Linux, _>::new(arm.clone()));
        let (_, state) = apply_create(&resource, config()).await;
        let state = state.unwrap();
        let app_settings = format!("{}/config/appsettings", site_id());
        assert_eq!(arm.count(Method::Put, &site_id()), 1);
        assert_eq!(arm.count(Method::Put, &app_settings), 1);

        let mut config = config();
        config.site.app_settings = Value::Value(
            [(Cow::from("FOO"), ValueString::from("baz"))]
                .into_iter()
                .collect(),
        );
        let (diags, replace, updated) = apply_update(&resource, state, config).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert!(replace.is_empty());
        let updated = updated.unwrap();
        assert_eq!(
            updated.site.app_settings,
            Value::Value(
                [(Cow::from("FOO"), ValueString::from("baz"))]
                    .into_iter()
                    .collect()
            )
        );
        assert_eq!(arm.count(Method::Put, &site_id()), 1);
        assert_eq!(arm.count(Method::Put, &format!("{}/config/web", site_id())), 0);
        assert_eq!(arm.count(Method::Put, &app_settings), 2);
        assert_eq!(
            arm.last_body(Method::Put, &app_settings),
            Some(json!({ "properties": { "FOO": "baz" } }))
        );
    }

    #[tokio::test]
    async fn restrictions_logs_mounts_and_sticky_settings() {
        let arm = fake();
        let resource = AzureResource(WebApp::<Linux, _>::new(arm.clone()));
        let mut config = config();
        config.sticky_settings = Value::Value(StickySettingsState {
            app_setting_names: string_list(["FOO".to_owned()]),
            ..Default::default()
        });
        let site_config = config.site.site_config.as_mut_option().unwrap();
        site_config.ip_restriction = Value::Value(vec![
            Value::Value(IpRestrictionState {
                name: "office".into(),
                ip_address: "10.0.0.0/24".into(),
                priority: Value::Value(100),
                ..Default::default()
            }),
            Value::Value(IpRestrictionState {
                service_tag: "AzureFrontDoor.Backend".into(),
                action: "Deny".into(),
                ..Default::default()
            }),
        ]);
        site_config.cors = Value::Value(CorsState {
            allowed_origins: Value::Value(
                [ValueString::from("https://example.com")].into_iter().collect(),
            ),
            ..Default::default()
        });
        config.site.logs = Value::Value(LogsState {
            detailed_error_messages: Value::Value(true),
            application_logs: Value::Value(ApplicationLogsState {
                file_system_level: "Warning".into(),
            }),
            http_logs: Value::Value(HttpLogsState {
                retention_in_days: Value::Value(7),
                retention_in_mb: Value::Value(35),
            }),
            ..Default::default()
        });
        config.site.storage_account = Value::Value(
            [Value::Value(StorageAccountState {
                name: "media".into(),
                kind: "AzureFiles".into(),
                account_name: "account".into(),
                share_name: "share".into(),
                access_key: "key".into(),
                mount_path: "/media".into(),
            })]
            .into_iter()
            .collect(),
        );

        let (diags, state) = apply_create(&resource, config.clone()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let state = state.unwrap();

        let site = arm.last_body(Method::Put, &site_id()).unwrap();
        let restrictions = &site["properties"]["siteConfig"]["ipSecurityRestrictions"];
        assert_eq!(
            restrictions[0],
            json!({ "ipAddress": "10.0.0.0/24", "tag": "Default", "action": "Allow", "priority": 100, "name": "office" })
        );
        assert_eq!(restrictions[1]["tag"], "ServiceTag");
        assert_eq!(restrictions[1]["ipAddress"], "AzureFrontDoor.Backend");
        assert_eq!(restrictions[1]["priority"], 65000);
        assert_eq!(
            site["properties"]["siteConfig"]["cors"],
            json!({ "allowedOrigins": ["https://example.com"], "supportCredentials": false })
        );
        let logs = arm
            .last_body(Method::Put, &format!("{}/config/logs", site_id()))
            .unwrap();
        assert_eq!(logs["properties"]["applicationLogs"]["fileSystem"]["level"], "Warning");
        assert_eq!(logs["properties"]["detailedErrorMessages"]["enabled"], true);
        assert_eq!(
            logs["properties"]["httpLogs"]["fileSystem"],
            json!({ "retentionInMb": 35, "retentionInDays": 7, "enabled": true })
        );
        let mounts = arm
            .last_body(Method::Put, &format!("{}/config/azurestorageaccounts", site_id()))
            .unwrap();
        assert_eq!(mounts["properties"]["media"]["type"], "AzureFiles");
        assert_eq!(mounts["properties"]["media"]["mountPath"], "/media");
        let sticky = arm
            .last_body(Method::Put, &format!("{}/config/slotConfigNames", site_id()))
            .unwrap();
        assert_eq!(sticky["properties"]["appSettingNames"], json!(["FOO"]));

        let site_config = state.site.site_config.as_ref_option().unwrap();
        let restrictions = site_config.ip_restriction.as_ref_option().unwrap();
        assert_eq!(
            restrictions[1],
            Value::Value(IpRestrictionState {
                action: "Deny".into(),
                service_tag: "AzureFrontDoor.Backend".into(),
                priority: Value::Value(65000),
                ..Default::default()
            })
        );
        let cors = site_config.cors.as_ref_option().unwrap();
        assert_eq!(
            cors.allowed_origins,
            Value::Value([ValueString::from("https://example.com")].into_iter().collect())
        );
        assert_eq!(cors.support_credentials, Value::Value(false));
        assert_eq!(state.site.storage_account, config.site.storage_account);
        assert_eq!(state.sticky_settings, config.sticky_settings);
        let logs = state.site.logs.as_ref_option().unwrap();
        assert_eq!(logs.failed_request_tracing, Value::Value(false));
        assert_eq!(logs.http_logs, config.site.logs.as_ref_option().unwrap().http_logs);

        let (diags, refreshed) = read(&resource, state.clone()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(refreshed, Some(Value::Value(state.clone())));

        // removing the blocks clears them remotely
        let (diags, _, updated) = apply_update(&resource, state, self::config()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let updated = updated.unwrap();
        let config_web = arm
            .last_body(Method::Put, &format!("{}/config/web", site_id()))
            .unwrap();
        assert_eq!(config_web["properties"]["ipSecurityRestrictions"], json!([]));
        assert_eq!(config_web["properties"]["cors"]["allowedOrigins"], json!([]));
        assert_eq!(
            arm.last_body(Method::Put, &format!("{}/config/azurestorageaccounts", site_id())),
            Some(json!({ "properties": {} }))
        );
        let site_config = updated.site.site_config.as_ref_option().unwrap();
        assert_eq!(site_config.ip_restriction, Value::Null);
        assert_eq!(site_config.cors, Value::Null);
        assert_eq!(updated.site.logs, Value::Null);
        assert_eq!(updated.site.storage_account, Value::Null);
        assert_eq!(updated.sticky_settings, Value::Null);
    }

    #[tokio::test]
    async fn renaming_replaces_the_site() {
        let arm = fake();
        let resource = AzureResource(WebApp::<Linux, _>::new(arm));
        let (_, state) = apply_create(&resource, config()).await;
        let mut config = config();
        config.site.name = "other-app".into();
        let (_, replace, _) = apply_update(&resource, state.unwrap(), config).await;
        assert_eq!(replace, vec![AttributePath::new("name")]);
    }

    #[tokio::test]
    async fn delete_and_import() {
        let arm = fake();
        let resource = AzureResource(WebApp::<Linux, _>::new(arm.clone()));
        let (_, state) = apply_create(&resource, config()).await;
        let state = state.unwrap();

        let mut diags = Diagnostics::default();
        let imported = tf_provider::Resource::import(&resource, &mut diags, site_id()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let (imported, _) = imported.unwrap();
        let imported = imported.as_option().unwrap();
        assert_eq!(imported.site.name, ValueString::from("my-app"));
        assert_eq!(imported.resource_group_name, ValueString::from("rg"));

        let windows = AzureResource(WebApp::<Windows, _>::new(arm.clone()));
        let mut diags = Diagnostics::default();
        assert!(tf_provider::Resource::import(&windows, &mut diags, site_id())
            .await
            .is_none());

        let (diags, deleted) = destroy(&resource, state).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(deleted, Some(()));
        assert_eq!(arm.resource(&site_id()), None);
    }
}
