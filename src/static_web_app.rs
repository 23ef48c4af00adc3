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

//! `static_web_app` resource

use std::borrow::Cow;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{serde_as_vec, Value, ValueBool, ValueMap, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::arm::models::{
    SkuDescription, StaticSite, StaticSiteSecrets, StringDictionary, WEB_API_VERSION,
};
use crate::arm::{Arm, ArmConnection, ArmExt};
use crate::attributes::{
    computed_string, defaulted, sensitive, string_map, ID, LOCATION, NAME, RESOURCE_GROUP_NAME,
    TAGS,
};
use crate::ids::StaticSiteId;
use crate::resource::{ensure_absent, ArmResource, Created};
use crate::timeouts::{timeout_for, Operation, TimeoutsState};
use crate::utils::{default_to, force_new, keep_empty, known, known_bool, known_map, location, string};
use crate::validate;

const SKUS: &[&str] = &["Free", "Standard"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StaticWebAppState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub resource_group_name: ValueString<'a>,
    pub location: ValueString<'a>,
    pub sku_tier: ValueString<'a>,
    pub sku_size: ValueString<'a>,
    pub app_settings: ValueMap<'a, ValueString<'a>>,
    pub configuration_file_changes_enabled: ValueBool,
    pub preview_environments_enabled: ValueBool,
    pub public_network_access_enabled: ValueBool,
    pub tags: ValueMap<'a, ValueString<'a>>,
    pub default_host_name: ValueString<'a>,
    pub api_key: ValueString<'a>,
    #[serde(with = "serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

fn enabled(value: &ValueBool) -> String {
    if known_bool(value, true) {
        "Enabled"
    } else {
        "Disabled"
    }
    .to_owned()
}

impl<'a> StaticWebAppState<'a> {
    /// Copy the arguments into the static site payload
    fn expand(&self, site: &mut StaticSite) {
        site.sku = Some(SkuDescription {
            name: known(&self.sku_size),
            tier: known(&self.sku_tier),
        });
        site.tags = Some(known_map(&self.tags));
        let properties = &mut site.properties;
        properties.allow_config_file_updates =
            Some(known_bool(&self.configuration_file_changes_enabled, true));
        properties.staging_environment_policy = Some(enabled(&self.preview_environments_enabled));
        properties.public_network_access = Some(enabled(&self.public_network_access_enabled));
    }

    fn flatten(&mut self, id: &StaticSiteId, site: &StaticSite) {
        let sku = site.sku.clone().unwrap_or_default();
        let properties = &site.properties;

        self.id = string(Some(id.to_string()));
        self.name = string(Some(id.static_site_name.clone()));
        self.resource_group_name = string(Some(id.resource_group_name.clone()));
        self.location = location(&self.location, site.location.as_deref());
        self.sku_tier = string(Some(sku.tier.unwrap_or_else(|| "Free".to_owned())));
        self.sku_size = string(Some(sku.name.unwrap_or_else(|| "Free".to_owned())));
        self.configuration_file_changes_enabled =
            Value::Value(properties.allow_config_file_updates.unwrap_or(true));
        self.preview_environments_enabled = Value::Value(
            properties.staging_environment_policy.as_deref() != Some("Disabled"),
        );
        self.public_network_access_enabled =
            Value::Value(properties.public_network_access.as_deref() != Some("Disabled"));
        self.tags = keep_empty(
            self.tags.is_value(),
            site.tags.as_ref().unwrap_or(&Default::default()),
        );
        self.default_host_name = string(properties.default_hostname.clone());
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticWebApp<A = ArmConnection> {
    arm: A,
}

impl<A: Arm> StaticWebApp<A> {
    pub fn new(arm: A) -> Self {
        Self { arm }
    }

    async fn put_app_settings(&self, path: &str, settings: StringDictionary) -> Result<()> {
        let _: StringDictionary = self
            .arm
            .put(
                &format!("{path}/config/appsettings"),
                WEB_API_VERSION,
                &settings,
            )
            .await
            .context("writing the app settings")?;
        Ok(())
    }

    async fn refresh<'a>(
        &self,
        mut state: StaticWebAppState<'a>,
        id: &StaticSiteId,
    ) -> Result<Option<StaticWebAppState<'a>>> {
        let path = id.to_string();
        let Some(site) = self.arm.get_optional::<StaticSite>(&path, WEB_API_VERSION).await? else {
            return Ok(None);
        };
        let app_settings_path = format!("{path}/listAppSettings");
        let secrets_path = format!("{path}/listSecrets");
        let (app_settings, secrets) = futures::try_join!(
            self.arm
                .list::<StringDictionary>(&app_settings_path, WEB_API_VERSION),
            self.arm.list::<StaticSiteSecrets>(&secrets_path, WEB_API_VERSION),
        )?;

        state.flatten(id, &site);
        state.app_settings = keep_empty(state.app_settings.is_value(), &app_settings.properties);
        state.api_key = string(secrets.properties.get("apiKey").cloned());
        Ok(Some(state))
    }
}

fn state_id(state: &StaticWebAppState<'_>) -> Result<StaticSiteId> {
    let id = known(&state.id).ok_or_else(|| anyhow!("the ID of the static web app is unknown"))?;
    Ok(StaticSiteId::parse(&id)?)
}

#[async_trait]
impl<A: Arm> ArmResource for StaticWebApp<A> {
    type State<'a> = StaticWebAppState<'a>;

    fn type_name(&self) -> &'static str {
        "static_web_app"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => ID.clone(),
                    "name" => NAME.clone(),
                    "resource_group_name" => RESOURCE_GROUP_NAME.clone(),
                    "location" => LOCATION.clone(),
                    "sku_tier" => defaulted(AttributeType::String, "`Free` or `Standard`, defaults to `Free`"),
                    "sku_size" => defaulted(AttributeType::String, "`Free` or `Standard`, defaults to `Free`"),
                    "app_settings" => string_map("App settings of the static web app"),
                    "configuration_file_changes_enabled" => defaulted(
                        AttributeType::Bool,
                        "Whether `staticwebapp.config.json` may change the configuration, defaults to `true`",
                    ),
                    "preview_environments_enabled" => defaulted(
                        AttributeType::Bool,
                        "Whether pull requests get preview environments, defaults to `true`",
                    ),
                    "public_network_access_enabled" => defaulted(
                        AttributeType::Bool,
                        "Whether the static web app is reachable from the internet, defaults to `true`",
                    ),
                    "tags" => TAGS.clone(),
                    "default_host_name" => computed_string("Default hostname of the static web app"),
                    "api_key" => sensitive(computed_string("Deployment token of the static web app")),
                },
                blocks: map! {
                    "timeouts" => TimeoutsState::block(),
                },
                description: Description::plain("Static web app"),
                deprecated: false,
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        validate::static_site_name(diags, AttributePath::new("name"), &config.name);
        validate::one_of(diags, AttributePath::new("sku_tier"), &config.sku_tier, SKUS);
        validate::one_of(diags, AttributePath::new("sku_size"), &config.sku_size, SKUS);
        validate::app_settings(diags, AttributePath::new("app_settings"), &config.app_settings, &[]);
        if let Value::Value(timeouts) = &config.timeouts {
            timeouts.validate(diags, AttributePath::new("timeouts").index(0));
        }
    }

    fn plan<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior: Option<&Self::State<'a>>,
        config: &Self::State<'a>,
        planned: &mut Self::State<'a>,
    ) {
        default_to(&mut planned.sku_tier, &config.sku_tier, Cow::Borrowed("Free"));
        default_to(&mut planned.sku_size, &config.sku_size, Cow::Borrowed("Free"));
        default_to(
            &mut planned.configuration_file_changes_enabled,
            &config.configuration_file_changes_enabled,
            true,
        );
        default_to(
            &mut planned.preview_environments_enabled,
            &config.preview_environments_enabled,
            true,
        );
        default_to(
            &mut planned.public_network_access_enabled,
            &config.public_network_access_enabled,
            true,
        );
        match prior {
            None => {
                planned.id = Value::Unknown;
                planned.default_host_name = Value::Unknown;
                planned.api_key = Value::Unknown;
            }
            Some(prior) => {
                planned.id = prior.id.clone();
                planned.default_host_name = prior.default_host_name.clone();
                planned.api_key = prior.api_key.clone();
            }
        }
    }

    fn requires_replace<'a>(
        &self,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
    ) -> Vec<AttributePath> {
        let mut replace = Vec::new();
        force_new(&mut replace, "name", &prior.name, &planned.name);
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
        timeout_for(&state.timeouts, operation)
    }

    fn id<'a>(&self, state: &Self::State<'a>) -> String {
        known(&state.id).unwrap_or_default()
    }

    async fn create<'a>(
        &self,
        planned: Self::State<'a>,
        created: &Created,
    ) -> Result<Self::State<'a>> {
        let subscription_id = self.arm.subscription_id().await?;
        let name = known(&planned.name).context("the name of the static web app is unknown")?;
        let resource_group =
            known(&planned.resource_group_name).context("the resource group is unknown")?;
        let id = StaticSiteId::new(subscription_id, resource_group, name);
        let path = id.to_string();

        ensure_absent(&self.arm, &path, WEB_API_VERSION, "static_web_app").await?;
        let mut site = StaticSite {
            location: known(&planned.location),
            ..Default::default()
        };
        planned.expand(&mut site);
        tracing::debug!(id = path, "creating static web app");
        created.record(&id);
        let _: StaticSite = self
            .arm
            .put(&path, WEB_API_VERSION, &site)
            .await
            .context("creating the static web app")?;

        let app_settings = known_map(&planned.app_settings);
        if !app_settings.is_empty() {
            self.put_app_settings(&path, StringDictionary { properties: app_settings })
                .await?;
        }

        self.refresh(planned, &id)
            .await?
            .ok_or_else(|| anyhow!("{id} was not found after its creation"))
    }

    async fn read<'a>(&self, state: Self::State<'a>) -> Result<Option<Self::State<'a>>> {
        let id = state_id(&state)?;
        self.refresh(state, &id).await
    }

    async fn update<'a>(
        &self,
        prior: Self::State<'a>,
        planned: Self::State<'a>,
    ) -> Result<Self::State<'a>> {
        let id = state_id(&prior)?;
        let path = id.to_string();
        let existing: StaticSite = self
            .arm
            .get(&path, WEB_API_VERSION)
            .await
            .with_context(|| format!("reading {id}"))?;

        let mut site = existing.clone();
        planned.expand(&mut site);
        if site != existing {
            tracing::debug!(id = path, "updating static web app");
            let _: StaticSite = self
                .arm
                .put(&path, WEB_API_VERSION, &site)
                .await
                .context("updating the static web app")?;
        }

        let app_settings = known_map(&planned.app_settings);
        if app_settings != known_map(&prior.app_settings) {
            self.put_app_settings(&path, StringDictionary { properties: app_settings })
                .await?;
        }

        self.refresh(planned, &id)
            .await?
            .ok_or_else(|| anyhow!("{id} was not found after its update"))
    }

    async fn delete<'a>(&self, state: Self::State<'a>) -> Result<()> {
        let id = state_id(&state)?;
        self.arm.delete(&id.to_string(), WEB_API_VERSION, &[]).await?;
        Ok(())
    }

    fn import<'a>(&self, id: String) -> Result<Self::State<'a>> {
        let id = StaticSiteId::parse(&id)?;
        Ok(StaticWebAppState {
            id: string(Some(id.to_string())),
            ..Default::default()
        })
    }
}
