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

//! `source_control` resource
//!
//! Either an external repository (`sourcecontrols/web`) or the local Git repository of the app,
//! which is only a `scmType` of the site config.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{serde_as_vec, Value, ValueBool, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::arm::models::{
    SiteConfigResource, SiteSourceControl, SiteSourceControlProperties, WEB_API_VERSION,
};
use crate::arm::{Arm, ArmConnection, ArmExt};
use crate::attributes::{
    attribute, computed_string, defaulted, optional_string, required_string, ID,
};
use crate::error::requires_import;
use crate::ids::{AppId, SourceControlId};
use crate::locks::lock_by_id;
use crate::poll::StateChangeConf;
use crate::resource::{ArmResource, Created};
use crate::site::ops::put_config;
use crate::timeouts::{timeout_for, Operation, TimeoutsState};
use crate::utils::{default_to, force_new, known, known_bool, string};
use crate::validate;

const LOCAL_GIT: &str = "LocalGit";
const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SourceControlState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub app_id: ValueString<'a>,
    pub repo_url: ValueString<'a>,
    pub branch: ValueString<'a>,
    pub use_manual_integration: ValueBool,
    pub use_mercurial: ValueBool,
    pub rollback_enabled: ValueBool,
    pub use_local_git: ValueBool,
    pub scm_type: ValueString<'a>,
    pub uses_github_action: ValueBool,
    #[serde(with = "serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

impl<'a> SourceControlState<'a> {
    fn local_git(&self) -> bool {
        known_bool(&self.use_local_git, false)
    }

    fn expand(&self) -> SiteSourceControl {
        SiteSourceControl {
            id: None,
            properties: SiteSourceControlProperties {
                repo_url: known(&self.repo_url),
                branch: known(&self.branch),
                is_manual_integration: Some(known_bool(&self.use_manual_integration, false)),
                is_mercurial: Some(known_bool(&self.use_mercurial, false)),
                deployment_rollback_enabled: Some(known_bool(&self.rollback_enabled, false)),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceControl<A = ArmConnection> {
    arm: A,
}

impl<A: Arm> SourceControl<A> {
    pub fn new(arm: A) -> Self {
        Self { arm }
    }

    async fn scm_type(&self, app: &AppId) -> Result<Option<String>> {
        let config: SiteConfigResource = self
            .arm
            .get(&format!("{app}/config/web"), WEB_API_VERSION)
            .await
            .with_context(|| format!("reading the site config of {app}"))?;
        Ok(config.properties.scm_type)
    }

    async fn set_scm_type(&self, app: &AppId, scm_type: &str) -> Result<()> {
        let mut config: SiteConfigResource = self
            .arm
            .get(&format!("{app}/config/web"), WEB_API_VERSION)
            .await
            .with_context(|| format!("reading the site config of {app}"))?;
        config.properties.scm_type = Some(scm_type.to_owned());
        put_config(&self.arm, &app.to_string(), &config.properties)
            .await
            .with_context(|| format!("setting the SCM type of {app} to {scm_type}"))?;
        Ok(())
    }

    /// Write the repository settings and wait for the initial deployment to be set up
    async fn put(&self, id: &SourceControlId, state: &SourceControlState<'_>, timeout: Duration) -> Result<()> {
        let path = id.to_string();
        let _: serde_json::Value = self
            .arm
            .put(&path, WEB_API_VERSION, &state.expand())
            .await
            .with_context(|| format!("writing the source control of {}", id.app))?;

        let arm = &self.arm;
        let path = path.as_str();
        StateChangeConf::new(
            ["Pending", "InProgress", "Creating", "Updating"],
            ["Succeeded"],
            timeout,
        )
        .with_poll_interval(POLL_INTERVAL)
        .wait_for_state(move || async move {
            let remote: Option<SiteSourceControl> = arm.get_optional(path, WEB_API_VERSION).await?;
            Ok(remote.map(|remote| {
                let state = remote
                    .properties
                    .provisioning_state
                    .unwrap_or_else(|| "Succeeded".to_owned());
                ((), state)
            }))
        })
        .await
        .with_context(|| format!("waiting for the source control of {}", id.app))?;
        Ok(())
    }

    async fn refresh<'a>(
        &self,
        mut state: SourceControlState<'a>,
        id: &SourceControlId,
    ) -> Result<Option<SourceControlState<'a>>> {
        let Some(remote) = self
            .arm
            .get_optional::<SiteSourceControl>(&id.to_string(), WEB_API_VERSION)
            .await?
        else {
            return Ok(None);
        };
        let scm_type = self.scm_type(&id.app).await?.unwrap_or_default();
        let properties = remote.properties;
        let repo_url = properties.repo_url.filter(|url| !url.is_empty());
        let local_git = scm_type.eq_ignore_ascii_case(LOCAL_GIT);
        if repo_url.is_none() && !local_git {
            return Ok(None);
        }

        state.id = string(Some(id.to_string()));
        state.app_id = string(Some(id.app.to_string()));
        state.use_local_git = Value::Value(local_git);
        if local_git {
            state.repo_url = Value::Null;
            state.branch = Value::Null;
        } else {
            state.repo_url = string(repo_url);
            state.branch = string(properties.branch);
        }
        state.use_manual_integration =
            Value::Value(properties.is_manual_integration.unwrap_or(false));
        state.use_mercurial = Value::Value(properties.is_mercurial.unwrap_or(false));
        state.rollback_enabled =
            Value::Value(properties.deployment_rollback_enabled.unwrap_or(false));
        state.uses_github_action = Value::Value(properties.is_git_hub_action.unwrap_or(false));
        state.scm_type = string(Some(scm_type));
        Ok(Some(state))
    }
}

fn state_id(state: &SourceControlState<'_>) -> Result<SourceControlId> {
    let id = known(&state.id).ok_or_else(|| anyhow!("the ID of the source control is unknown"))?;
    Ok(SourceControlId::parse(&id)?)
}

#[async_trait]
impl<A: Arm> ArmResource for SourceControl<A> {
    type State<'a> = SourceControlState<'a>;

    fn type_name(&self) -> &'static str {
        "source_control"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => ID.clone(),
                    "app_id" => required_string("ID of the app or slot, changing it forces a new resource"),
                    "repo_url" => optional_string("URL of the repository"),
                    "branch" => optional_string("Branch to deploy"),
                    "use_manual_integration" => defaulted(AttributeType::Bool, "Whether deployments are only triggered manually, defaults to `false`"),
                    "use_mercurial" => defaulted(AttributeType::Bool, "Whether the repository is a Mercurial one, defaults to `false`"),
                    "rollback_enabled" => defaulted(AttributeType::Bool, "Whether failed deployments are rolled back, defaults to `false`"),
                    "use_local_git" => defaulted(
                        AttributeType::Bool,
                        "Whether the app deploys from its local Git repository, changing it forces a new resource",
                    ),
                    "scm_type" => computed_string("SCM type of the app"),
                    "uses_github_action" => attribute(
                        AttributeType::Bool,
                        AttributeConstraint::Computed,
                        "Whether deployments go through a GitHub Action",
                    ),
                },
                blocks: map! {
                    "timeouts" => TimeoutsState::block(),
                },
                description: Description::plain("Deployment source of an App Service app"),
                deprecated: false,
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        validate::id(diags, AttributePath::new("app_id"), &config.app_id, AppId::parse);
        validate::branch(diags, AttributePath::new("branch"), &config.branch);
        match config.use_local_git {
            Value::Value(true) => {
                for (name, value) in [("repo_url", &config.repo_url), ("branch", &config.branch)] {
                    if !value.is_null() {
                        diags.error_short(
                            format!("`{name}` cannot be set with `use_local_git`"),
                            AttributePath::new(name),
                        );
                    }
                }
            }
            Value::Value(false) | Value::Null => {
                if config.repo_url.is_null() {
                    diags.error_short(
                        "`repo_url` is required unless `use_local_git` is set",
                        AttributePath::new("repo_url"),
                    );
                }
            }
            Value::Unknown => (),
        }
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
        default_to(&mut planned.use_manual_integration, &config.use_manual_integration, false);
        default_to(&mut planned.use_mercurial, &config.use_mercurial, false);
        default_to(&mut planned.rollback_enabled, &config.rollback_enabled, false);
        default_to(&mut planned.use_local_git, &config.use_local_git, false);
        match prior {
            None => {
                planned.id = Value::Unknown;
                planned.scm_type = Value::Unknown;
                planned.uses_github_action = Value::Unknown;
            }
            Some(prior) => {
                planned.id = prior.id.clone();
                planned.uses_github_action = prior.uses_github_action.clone();
                planned.scm_type = if prior.use_manual_integration == planned.use_manual_integration
                    && prior.repo_url == planned.repo_url
                {
                    prior.scm_type.clone()
                } else {
                    Value::Unknown
                };
            }
        }
    }

    fn requires_replace<'a>(
        &self,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
    ) -> Vec<AttributePath> {
        let mut replace = Vec::new();
        force_new(&mut replace, "app_id", &prior.app_id, &planned.app_id);
        force_new(&mut replace, "use_local_git", &prior.use_local_git, &planned.use_local_git);
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
        let app_id = known(&planned.app_id).context("`app_id` is unknown")?;
        let id = SourceControlId::new(AppId::parse(&app_id)?);
        let _lock = lock_by_id(&id.app.site_id()).await;

        // ARM answers with an empty repository when nothing is configured
        if self.refresh(SourceControlState::default(), &id).await?.is_some() {
            return Err(requires_import("appservice_source_control", &id));
        }

        created.record(&id);
        if planned.local_git() {
            tracing::debug!(app = %id.app, "enabling local Git");
            self.set_scm_type(&id.app, LOCAL_GIT).await?;
        } else {
            tracing::debug!(app = %id.app, "configuring source control");
            self.put(&id, &planned, timeout_for(&planned.timeouts, Operation::Create))
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
        let _lock = lock_by_id(&id.app.site_id()).await;
        if !planned.local_git() {
            tracing::debug!(app = %id.app, "updating source control");
            self.put(&id, &planned, timeout_for(&planned.timeouts, Operation::Update))
                .await?;
        }

        self.refresh(planned, &id)
            .await?
            .ok_or_else(|| anyhow!("{id} was not found after its update"))
    }

    async fn delete<'a>(&self, state: Self::State<'a>) -> Result<()> {
        let id = state_id(&state)?;
        let _lock = lock_by_id(&id.app.site_id()).await;
        if !state.local_git() {
            self.arm
                .delete(&id.to_string(), WEB_API_VERSION, &[])
                .await
                .with_context(|| format!("removing the source control of {}", id.app))?;
        }
        self.set_scm_type(&id.app, "None").await
    }

    fn import<'a>(&self, id: String) -> Result<Self::State<'a>> {
        let id = SourceControlId::parse(&id)?;
        Ok(SourceControlState {
            id: string(Some(id.to_string())),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::arm::fake::{FakeArm, SUBSCRIPTION_ID};
    use crate::arm::{ArmResponse, Method};
    use crate::hybrid_connection::{AppHybridConnection, HybridConnectionState, WebAppReference};
    use crate::resource::tests::{apply_create, destroy, read};
    use crate::resource::AzureResource;

    fn app_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/sites/scm-app")
    }

    fn source_control_id() -> String {
        format!("{}/sourcecontrols/web", app_id())
    }

    fn fake() -> FakeArm {
        let arm = FakeArm::default();
        arm.seed(
            &app_id(),
            json!({ "kind": "app", "properties": { "siteConfig": { "scmType": "None" } } }),
        );
        arm
    }

    fn config() -> SourceControlState<'static> {
        SourceControlState {
            app_id: string(Some(app_id())),
            repo_url: "https://github.com/org/repo".into(),
            branch: "main".into(),
            use_manual_integration: Value::Value(true),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn external_repository() {
        let arm = fake();
        let resource = AzureResource(SourceControl::new(arm.clone()));
        let remote = |provisioning_state: &str| {
            ArmResponse::ok(json!({
                "properties": {
                    "repoUrl": "https://github.com/org/repo",
                    "branch": "main",
                    "isManualIntegration": true,
                    "provisioningState": provisioning_state,
                }
            }))
        };
        arm.respond_sequence(
            Method::Get,
            &source_control_id(),
            vec![
                ArmResponse::ok(json!({ "properties": { "repoUrl": "" } })),
                remote("InProgress"),
                remote("Succeeded"),
            ],
        );

        let (diags, state) = apply_create(&resource, config()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let state = state.unwrap();
        assert_eq!(state.id, string(Some(source_control_id())));
        assert_eq!(state.use_local_git, Value::Value(false));
        assert_eq!(state.branch, ValueString::from("main"));
        assert_eq!(state.scm_type, ValueString::from("None"));
        assert_eq!(
            arm.last_body(Method::Put, &source_control_id()).unwrap()["properties"]["isManualIntegration"],
            true
        );

        let (diags, deleted) = destroy(&resource, state).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(deleted, Some(()));
        assert_eq!(arm.count(Method::Delete, &source_control_id()), 1);
        assert_eq!(
            arm.last_body(Method::Put, &format!("{}/config/web", app_id())).unwrap()["properties"]["scmType"],
            "None"
        );
    }

    #[tokio::test]
    async fn local_git() {
        let arm = fake();
        arm.respond(
            Method::Get,
            &source_control_id(),
            ArmResponse::ok(json!({ "properties": { "repoUrl": "" } })),
        );
        let resource = AzureResource(SourceControl::new(arm.clone()));
        let config = SourceControlState {
            app_id: string(Some(app_id())),
            use_local_git: Value::Value(true),
            ..Default::default()
        };
        let (diags, state) = apply_create(&resource, config).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let state = state.unwrap();
        assert_eq!(state.scm_type, ValueString::from("LocalGit"));
        assert_eq!(state.use_local_git, Value::Value(true));
        assert_eq!(arm.count(Method::Put, &source_control_id()), 0);

        // switched back to another deployment method out of band
        arm.seed(
            &format!("{}/config/web", app_id()),
            json!({ "properties": { "scmType": "None" } }),
        );
        let (diags, refreshed) = read(&resource, state).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(refreshed, Some(Value::Null));
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_of_the_same_app_do_not_interleave() {
        let arm = fake();
        arm.set_latency(Duration::from_secs(1));
        arm.respond(
            Method::Get,
            &source_control_id(),
            ArmResponse::ok(json!({ "properties": { "repoUrl": "" } })),
        );
        let namespace_id = format!(
            "/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/relays/providers/Microsoft.Relay/namespaces/my-ns"
        );
        arm.seed(
            &namespace_id,
            json!({ "properties": { "serviceBusEndpoint": "https://my-ns.servicebus.windows.net:443/" } }),
        );
        arm.respond(
            Method::Post,
            &format!("{namespace_id}/authorizationRules/RootManageSharedAccessKey/listKeys"),
            ArmResponse::ok(json!({ "primaryKey": "root-key", "keyName": "RootManageSharedAccessKey" })),
        );

        let source_control = AzureResource(SourceControl::new(arm.clone()));
        let hybrid_connection =
            AzureResource(AppHybridConnection::<WebAppReference, _>::new(arm.clone()));
        let local_git = SourceControlState {
            app_id: string(Some(app_id())),
            use_local_git: Value::Value(true),
            ..Default::default()
        };
        let connection = HybridConnectionState {
            app: WebAppReference {
                web_app_id: string(Some(app_id())),
            },
            relay_id: string(Some(format!("{namespace_id}/hybridConnections/my-relay"))),
            hostname: "db.internal".into(),
            port: Value::Value(5432),
            ..Default::default()
        };

        let ((diags, local_git), (connection_diags, connection)) = tokio::join!(
            apply_create(&source_control, local_git),
            apply_create(&hybrid_connection, connection),
        );
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert!(connection_diags.errors.is_empty(), "{connection_diags:?}");
        assert!(local_git.is_some());
        assert!(connection.is_some());

        // each request belongs to the hybrid connection or to the source control
        let requests = arm.requests();
        let mut owners = requests
            .iter()
            .map(|request| {
                let path = request.path.to_ascii_lowercase();
                path.contains("hybridconnection") || path.contains("microsoft.relay")
            })
            .collect::<Vec<_>>();
        owners.dedup();
        assert_eq!(owners.len(), 2, "{requests:#?}");
    }

    #[test]
    fn repository_arguments() {
        let resource = SourceControl::<FakeArm>::default();
        let mut diags = Diagnostics::default();
        resource.validate(
            &mut diags,
            &SourceControlState {
                app_id: string(Some(app_id())),
                use_local_git: Value::Value(true),
                branch: "main".into(),
                ..Default::default()
            },
        );
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        resource.validate(
            &mut diags,
            &SourceControlState {
                app_id: string(Some(app_id())),
                ..Default::default()
            },
        );
        assert_eq!(diags.errors.len(), 1);
    }
}
