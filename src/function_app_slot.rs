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

//! `linux_function_app_slot` and `windows_function_app_slot` resources

use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::arm::models::{Site, SiteProperties, WEB_API_VERSION};
use crate::arm::{Arm, ArmConnection, ArmExt};
use crate::attributes::{defaulted, required_string};
use crate::function_app::{
    function_managed_attributes, is_function_app, managed_settings, FunctionArgs,
};
use crate::ids::{WebAppId, WebAppSlotId};
use crate::locks::lock_by_id;
use crate::resource::{ensure_absent, ArmResource, Created};
use crate::site::ops::{self, check_plan};
use crate::site::state::SiteDefaults;
use crate::site::{SiteArgs, SiteOs, Stack};
use crate::timeouts::{timeout_for, Operation};
use crate::utils::{force_new, known, known_bool, string};
use crate::validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(bound(deserialize = ""))]
pub struct FunctionAppSlotState<'a, K: Stack> {
    #[serde(borrow = "'a")]
    pub function_app_id: ValueString<'a>,
    #[serde(flatten)]
    pub function: FunctionArgs<'a>,
    #[serde(flatten)]
    pub site: SiteArgs<'a, K>,
}

/// Deployment slot of a function app, serialized with its parent like web app slots
#[derive(Debug, Clone, Default)]
pub struct FunctionAppSlot<O, A = ArmConnection> {
    arm: A,
    os: PhantomData<O>,
}

impl<O: SiteOs, A: Arm> FunctionAppSlot<O, A> {
    pub fn new(arm: A) -> Self {
        Self {
            arm,
            os: PhantomData,
        }
    }

    async fn refresh<'a>(
        &self,
        mut state: FunctionAppSlotState<'a, O::FunctionStack>,
        id: &WebAppSlotId,
    ) -> Result<Option<FunctionAppSlotState<'a, O::FunctionStack>>> {
        let Some(remote) = ops::fetch(&self.arm, &id.to_string()).await? else {
            return Ok(None);
        };
        if !is_function_app::<O>(&remote.site) {
            return Err(anyhow!("{id} is not a {} function app slot", O::NAME));
        }

        state.function_app_id = string(Some(id.site_id().to_string()));
        state
            .function
            .flatten(&remote.site, &remote.settings.app_settings);
        state
            .site
            .flatten(&remote, &managed_settings::<O::FunctionStack>());
        state.site.name = string(Some(id.slot_name.clone()));
        Ok(Some(state))
    }
}

fn state_id(state: &SiteArgs<'_, impl Stack>) -> Result<WebAppSlotId> {
    let id = known(&state.id).ok_or_else(|| anyhow!("the ID of the slot is unknown"))?;
    Ok(WebAppSlotId::parse(&id)?)
}

#[async_trait]
impl<O: SiteOs, A: Arm> ArmResource for FunctionAppSlot<O, A> {
    type State<'a> = FunctionAppSlotState<'a, O::FunctionStack>;

    fn type_name(&self) -> &'static str {
        O::FUNCTION_APP_SLOT
    }

    fn schema(&self) -> Schema {
        let mut attributes = SiteArgs::<O::FunctionStack>::attributes(defaulted(
            AttributeType::String,
            "ID of the service plan hosting the slot, defaults to the plan of the parent app",
        ));
        attributes.insert(
            "function_app_id".to_owned(),
            required_string("ID of the parent function app, changing it forces a new resource"),
        );
        attributes.extend(FunctionArgs::attributes());
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes,
                blocks: SiteArgs::<O::FunctionStack>::blocks(),
                description: Description::plain(format!(
                    "Deployment slot of a {} function app",
                    O::NAME
                )),
                deprecated: false,
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        validate::id(
            diags,
            AttributePath::new("function_app_id"),
            &config.function_app_id,
            WebAppId::parse,
        );
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
        if config.site.service_plan_id.is_null() {
            planned.site.service_plan_id = match prior {
                Some(prior) => prior.site.service_plan_id.clone(),
                None => Value::Unknown,
            };
        }
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
            "function_app_id",
            &prior.function_app_id,
            &planned.function_app_id,
        );
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
        let parent_id =
            known(&planned.function_app_id).context("the parent function app is unknown")?;
        let parent_id = WebAppId::parse(&parent_id)?;
        let name = known(&planned.site.name).context("the name of the slot is unknown")?;
        let id = parent_id.slot(&name);
        let path = id.to_string();

        let _lock = lock_by_id(&parent_id).await;
        ensure_absent(&self.arm, &path, WEB_API_VERSION, O::FUNCTION_APP_SLOT).await?;
        let parent: Site = self
            .arm
            .get(&parent_id.to_string(), WEB_API_VERSION)
            .await
            .with_context(|| format!("reading the parent function app {parent_id}"))?;
        if !is_function_app::<O>(&parent) {
            return Err(anyhow!("{parent_id} is not a {} function app", O::NAME));
        }

        let plan_id = known(&planned.site.service_plan_id)
            .or_else(|| parent.properties.server_farm_id.clone())
            .context("the service plan of the slot is unknown")?;
        let always_on = planned
            .site
            .site_config
            .as_ref_option()
            .map_or(false, |config| known_bool(&config.always_on, false));
        let plan = check_plan::<O, _>(&self.arm, &plan_id, always_on).await?;

        let mut site = Site {
            location: parent.location.clone(),
            kind: Some(O::FUNCTION_KIND.to_owned()),
            properties: SiteProperties {
                reserved: Some(O::RESERVED),
                ..Default::default()
            },
            ..Default::default()
        };
        planned.site.expand(&mut site);
        planned.function.expand(&mut site);
        site.properties.server_farm_id = Some(plan_id);

        let suffix = self.arm.environment().await?.storage_suffix();
        let share = planned.function.content_share(
            &plan,
            &format!("{}-{name}", parent_id.site_name),
            None,
        );
        let mut desired = planned.site.desired();
        desired
            .settings
            .app_settings
            .extend(planned.function.storage_settings(suffix, share));
        tracing::debug!(id = path, "creating function app slot");
        created.record(&id);
        ops::create_site(&self.arm, &path, site, &desired).await?;

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
        let _lock = lock_by_id(&id.site_id()).await;
        let existing = ops::fetch(&self.arm, &path)
            .await?
            .ok_or_else(|| anyhow!("{id} does not exist anymore"))?;

        let plan_id = known(&planned.site.service_plan_id)
            .or_else(|| existing.site.properties.server_farm_id.clone())
            .context("the service plan of the slot is unknown")?;
        let plan = check_plan::<O, _>(&self.arm, &plan_id, false).await?;

        let mut site = existing.site.clone();
        planned.site.expand(&mut site);
        planned.function.expand(&mut site);

        let suffix = self.arm.environment().await?.storage_suffix();
        let share = planned.function.content_share(
            &plan,
            &format!("{}-{}", id.site_name, id.slot_name),
            Some(&existing.settings.app_settings),
        );
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

        self.refresh(planned, &id)
            .await?
            .ok_or_else(|| anyhow!("{id} was not found after its update"))
    }

    async fn delete<'a>(&self, state: Self::State<'a>) -> Result<()> {
        let id = state_id(&state.site)?;
        let _lock = lock_by_id(&id.site_id()).await;
        ops::delete_site(&self.arm, &id.to_string()).await?;
        Ok(())
    }

    fn import<'a>(&self, id: String) -> Result<Self::State<'a>> {
        let id = WebAppSlotId::parse(&id)?;
        Ok(FunctionAppSlotState {
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
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::arm::fake::{FakeArm, SUBSCRIPTION_ID};
    use crate::arm::Method;
    use crate::locks::lock_by_name;
    use crate::resource::tests::{apply_create, apply_update, destroy, read};
    use crate::resource::AzureResource;
    use crate::site::state::SiteConfigState;
    use crate::site::{Linux, LinuxFunctionStack, Windows, WindowsFunctionStack};

    fn plan_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/serverFarms/elastic")
    }

    fn parent_id(name: &str) -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/sites/{name}")
    }

    fn fake(parent: &str, kind: &str) -> FakeArm {
        let arm = FakeArm::default();
        arm.seed(
            &plan_id(),
            json!({
                "kind": "elastic,linux",
                "sku": { "name": "EP1", "tier": "ElasticPremium" },
                "properties": { "reserved": true }
            }),
        );
        arm.seed(
            &parent_id(parent),
            json!({
                "name": parent,
                "kind": kind,
                "location": "West Europe",
                "properties": { "serverFarmId": plan_id(), "reserved": true }
            }),
        );
        arm
    }

    fn config(parent: &str) -> FunctionAppSlotState<'static, LinuxFunctionStack> {
        FunctionAppSlotState {
            function_app_id: string(Some(parent_id(parent))),
            function: FunctionArgs {
                storage_account_name: "funcstore".into(),
                storage_account_access_key: "a2V5".into(),
                ..Default::default()
            },
            site: SiteArgs {
                name: "staging".into(),
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
        }
    }

    #[tokio::test]
    async fn slot_gets_the_storage_settings_and_the_parent_plan() {
        let arm = fake("parent-func", "functionapp,linux");
        let resource = AzureResource(FunctionAppSlot::<Linux, _>::new(arm.clone()));
        let (diags, state) = apply_create(&resource, config("parent-func")).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let state = state.unwrap();

        let slot_id = format!("{}/slots/staging", parent_id("parent-func"));
        assert_eq!(state.site.id, string(Some(slot_id.clone())));
        assert_eq!(state.site.name, ValueString::from("staging"));
        assert_eq!(state.site.kind, ValueString::from("functionapp,linux"));
        assert_eq!(state.site.service_plan_id, string(Some(plan_id())));
        assert_eq!(state.function_app_id, string(Some(parent_id("parent-func"))));
        assert_eq!(state.site.app_settings, config("parent-func").site.app_settings);
        assert_eq!(state.function.storage_account_name, ValueString::from("funcstore"));
        assert_eq!(state.function.storage_account_access_key, ValueString::from("a2V5"));
        assert_eq!(state.function.functions_extension_version, ValueString::from("~4"));

        let body = arm.last_body(Method::Put, &slot_id).unwrap();
        assert_eq!(body["location"], "West Europe");
        assert_eq!(body["kind"], "functionapp,linux");
        let app_settings = format!("{slot_id}/config/appsettings");
        let settings = arm.last_body(Method::Put, &app_settings).unwrap();
        let connection = "DefaultEndpointsProtocol=https;AccountName=funcstore;AccountKey=a2V5;EndpointSuffix=core.windows.net";
        assert_eq!(settings["properties"]["AzureWebJobsStorage"], connection);
        assert_eq!(settings["properties"]["FUNCTIONS_WORKER_RUNTIME"], "python");
        let share = settings["properties"]["WEBSITE_CONTENTSHARE"]
            .as_str()
            .unwrap()
            .to_owned();
        assert!(share.starts_with("parent-func-staging-"));

        let (diags, refreshed) = read(&resource, state.clone()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(refreshed, Some(Value::Value(state.clone())));

        let mut config = config("parent-func");
        config.function.functions_extension_version = "~3".into();
        let (diags, replace, updated) = apply_update(&resource, state, config).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert!(replace.is_empty());
        assert_eq!(
            updated.unwrap().function.functions_extension_version,
            ValueString::from("~3")
        );
        let settings = arm.last_body(Method::Put, &app_settings).unwrap();
        assert_eq!(settings["properties"]["FUNCTIONS_EXTENSION_VERSION"], "~3");
        assert_eq!(settings["properties"]["WEBSITE_CONTENTSHARE"], share.as_str());
    }

    #[tokio::test]
    async fn parent_must_be_a_function_app() {
        let arm = fake("parent-web", "app,linux");
        let resource = AzureResource(FunctionAppSlot::<Linux, _>::new(arm.clone()));
        let (diags, state) = apply_create(&resource, config("parent-web")).await;
        assert!(state.is_none());
        assert!(format!("{diags:?}").contains("is not a Linux function app"));
        assert_eq!(
            arm.count(Method::Put, &format!("{}/slots/staging", parent_id("parent-web"))),
            0
        );
    }

    #[tokio::test]
    async fn windows_slot_of_a_linux_app() {
        let arm = fake("parent-func", "functionapp,linux");
        let resource = AzureResource(FunctionAppSlot::<Windows, _>::new(arm));
        let config = FunctionAppSlotState::<WindowsFunctionStack> {
            function_app_id: string(Some(parent_id("parent-func"))),
            function: config("parent-func").function,
            site: SiteArgs {
                name: "staging".into(),
                site_config: Value::Value(Default::default()),
                ..Default::default()
            },
        };
        let (diags, state) = apply_create(&resource, config).await;
        assert!(state.is_none());
        assert!(format!("{diags:?}").contains("is not a Windows function app"));
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_waits_for_the_parent_lock() {
        let arm = fake("locked-func", "functionapp,linux");
        let resource = AzureResource(FunctionAppSlot::<Linux, _>::new(arm.clone()));
        let (_, state) = apply_create(&resource, config("locked-func")).await;
        let state = state.unwrap();
        let slot_id = format!("{}/slots/staging", parent_id("locked-func"));

        let guard = lock_by_name(&parent_id("locked-func")).await;
        let delete = tokio::spawn(async move {
            let (diags, deleted) = destroy(&resource, state).await;
            assert!(diags.errors.is_empty(), "{diags:?}");
            deleted.is_some()
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!delete.is_finished());
        assert!(arm.resource(&slot_id).is_some());

        drop(guard);
        assert!(delete.await.unwrap());
        assert_eq!(arm.resource(&slot_id), None);
    }
}
