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

//! `linux_web_app_slot` and `windows_web_app_slot` resources
//!
//! Slots live under their parent site: mutations are serialized on the parent ID,
//! and the location always follows the parent.

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
use crate::ids::{WebAppId, WebAppSlotId};
use crate::locks::lock_by_id;
use crate::resource::{ensure_absent, ArmResource, Created};
use crate::site::ops::{self, check_plan};
use crate::site::state::SiteDefaults;
use crate::site::{SiteArgs, SiteOs, Stack};
use crate::timeouts::{timeout_for, Operation};
use crate::utils::{force_new, known, known_bool, string};
use crate::validate;
use crate::web_app::managed_attributes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(bound(deserialize = ""))]
pub struct WebAppSlotState<'a, K: Stack> {
    #[serde(borrow = "'a")]
    pub app_service_id: ValueString<'a>,
    #[serde(flatten)]
    pub site: SiteArgs<'a, K>,
}

#[derive(Debug, Clone, Default)]
pub struct WebAppSlot<O, A = ArmConnection> {
    arm: A,
    os: PhantomData<O>,
}

impl<O: SiteOs, A: Arm> WebAppSlot<O, A> {
    pub fn new(arm: A) -> Self {
        Self {
            arm,
            os: PhantomData,
        }
    }

    async fn refresh<'a>(
        &self,
        mut state: WebAppSlotState<'a, O::WebStack>,
        id: &WebAppSlotId,
    ) -> Result<Option<WebAppSlotState<'a, O::WebStack>>> {
        let Some(remote) = ops::fetch(&self.arm, &id.to_string()).await? else {
            return Ok(None);
        };
        if !O::is_site(remote.site.kind.as_deref(), remote.site.properties.reserved) {
            return Err(anyhow!("{id} is not a {} web app slot", O::NAME));
        }

        state.app_service_id = string(Some(id.site_id().to_string()));
        state
            .site
            .flatten(&remote, <O::WebStack as Stack>::MANAGED_SETTINGS);
        // ARM names slots `{site}/{slot}`
        state.site.name = string(Some(id.slot_name.clone()));
        Ok(Some(state))
    }
}

fn state_id(state: &SiteArgs<'_, impl Stack>) -> Result<WebAppSlotId> {
    let id = known(&state.id).ok_or_else(|| anyhow!("the ID of the slot is unknown"))?;
    Ok(WebAppSlotId::parse(&id)?)
}

#[async_trait]
impl<O: SiteOs, A: Arm> ArmResource for WebAppSlot<O, A> {
    type State<'a> = WebAppSlotState<'a, O::WebStack>;

    fn type_name(&self) -> &'static str {
        O::WEB_APP_SLOT
    }

    fn schema(&self) -> Schema {
        let mut attributes = SiteArgs::<O::WebStack>::attributes(defaulted(
            AttributeType::String,
            "ID of the service plan hosting the slot, defaults to the plan of the parent app",
        ));
        attributes.insert(
            "app_service_id".to_owned(),
            required_string("ID of the parent web app, changing it forces a new resource"),
        );
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes,
                blocks: SiteArgs::<O::WebStack>::blocks(),
                description: Description::plain(format!(
                    "Deployment slot of a {} web app",
                    O::NAME
                )),
                deprecated: false,
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        validate::id(
            diags,
            AttributePath::new("app_service_id"),
            &config.app_service_id,
            WebAppId::parse,
        );
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
        let defaults = SiteDefaults {
            always_on: true,
            use_32_bit_worker: O::USE_32_BIT_WORKER,
        };
        planned
            .site
            .plan(prior.map(|prior| &prior.site), &config.site, defaults);
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
            "app_service_id",
            &prior.app_service_id,
            &planned.app_service_id,
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
        let parent_id = known(&planned.app_service_id).context("the parent web app is unknown")?;
        let parent_id = WebAppId::parse(&parent_id)?;
        let name = known(&planned.site.name).context("the name of the slot is unknown")?;
        let id = parent_id.slot(name);
        let path = id.to_string();

        let _lock = lock_by_id(&parent_id).await;
        ensure_absent(&self.arm, &path, WEB_API_VERSION, O::WEB_APP_SLOT).await?;
        let parent: Site = self
            .arm
            .get(&parent_id.to_string(), WEB_API_VERSION)
            .await
            .with_context(|| format!("reading the parent web app {parent_id}"))?;

        let plan_id = known(&planned.site.service_plan_id)
            .or_else(|| parent.properties.server_farm_id.clone())
            .context("the service plan of the slot is unknown")?;
        let always_on = planned
            .site
            .site_config
            .as_ref_option()
            .map_or(false, |config| known_bool(&config.always_on, false));
        check_plan::<O, _>(&self.arm, &plan_id, always_on).await?;

        let mut site = Site {
            location: parent.location.clone(),
            kind: Some(O::WEB_KIND.to_owned()),
            properties: SiteProperties {
                reserved: Some(O::RESERVED),
                ..Default::default()
            },
            ..Default::default()
        };
        planned.site.expand(&mut site);
        site.properties.server_farm_id = Some(plan_id);
        tracing::debug!(id = path, "creating web app slot");
        created.record(&id);
        ops::create_site(&self.arm, &path, site, &planned.site.desired()).await?;

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
        let _lock = lock_by_id(&id.site_id()).await;
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
        Ok(WebAppSlotState {
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
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::arm::fake::{FakeArm, SUBSCRIPTION_ID};
    use crate::arm::Method;
    use crate::locks::lock_by_name;
    use crate::resource::tests::{apply_create, read};
    use crate::resource::AzureResource;
    use crate::site::{Windows, WindowsWebStack};

    fn plan_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/serverFarms/winplan")
    }

    fn parent_id(name: &str) -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/sites/{name}")
    }

    fn fake(parent: &str) -> FakeArm {
        let arm = FakeArm::default();
        arm.seed(&plan_id(), json!({ "kind": "app", "sku": { "tier": "Standard" } }));
        arm.seed(
            &parent_id(parent),
            json!({
                "name": parent,
                "kind": "app",
                "location": "West Europe",
                "properties": { "serverFarmId": plan_id() }
            }),
        );
        arm
    }

    fn config(parent: &str) -> WebAppSlotState<'static, WindowsWebStack> {
        WebAppSlotState {
            app_service_id: string(Some(parent_id(parent))),
            site: SiteArgs {
                name: "staging".into(),
                site_config: Value::Value(crate::site::state::SiteConfigState {
                    application_stack: Value::Value(WindowsWebStack {
                        dotnet_version: "v8.0".into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn slot_follows_its_parent() {
        let arm = fake("parent-app");
        let resource = AzureResource(WebAppSlot::<Windows, _>::new(arm.clone()));
        let (diags, state) = apply_create(&resource, config("parent-app")).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let state = state.unwrap();

        let slot_id = format!("{}/slots/staging", parent_id("parent-app"));
        assert_eq!(state.site.id, string(Some(slot_id.clone())));
        assert_eq!(state.site.name, ValueString::from("staging"));
        assert_eq!(state.site.service_plan_id, string(Some(plan_id())));
        assert_eq!(state.app_service_id, string(Some(parent_id("parent-app"))));
        let stack = state
            .site
            .site_config
            .as_ref_option()
            .and_then(|config| config.application_stack.as_ref_option())
            .unwrap();
        assert_eq!(stack.current_stack, ValueString::from("dotnet"));
        assert_eq!(stack.dotnet_version, ValueString::from("v8.0"));

        let body = arm.last_body(Method::Put, &slot_id).unwrap();
        assert_eq!(body["location"], "West Europe");
        assert_eq!(
            arm.last_body(Method::Put, &format!("{slot_id}/config/metadata")),
            Some(json!({ "properties": { "CURRENT_STACK": "dotnet" } }))
        );

        arm.remove(&slot_id);
        let (_, refreshed) = read(&resource, state).await;
        assert_eq!(refreshed, Some(Value::Null));
    }

    #[tokio::test]
    async fn missing_parent() {
        let arm = fake("parent-app");
        let resource = AzureResource(WebAppSlot::<Windows, _>::new(arm));
        let (diags, state) = apply_create(&resource, config("missing-app")).await;
        assert!(state.is_none());
        assert!(format!("{diags:?}").contains("reading the parent web app"));
    }

    #[tokio::test(start_paused = true)]
    async fn creation_waits_for_the_parent_lock() {
        let arm = fake("locked-app");
        let resource = AzureResource(WebAppSlot::<Windows, _>::new(arm.clone()));
        let guard = lock_by_name(&parent_id("locked-app")).await;

        let create = tokio::spawn(async move {
            let (diags, state) = apply_create(&resource, config("locked-app")).await;
            assert!(diags.errors.is_empty(), "{diags:?}");
            state.is_some()
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!create.is_finished());
        assert_eq!(arm.count(Method::Put, &format!("{}/slots/staging", parent_id("locked-app"))), 0);

        drop(guard);
        assert!(create.await.unwrap());
    }
}
