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

//! `web_app_hybrid_connection` and `function_app_hybrid_connection` resources
//!
//! Both resources attach an Azure Relay hybrid connection to a site or a slot,
//! they only differ by the name of the attribute pointing to the app.

use std::borrow::Cow;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{serde_as_vec, Value, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::arm::models::{
    HybridConnection, HybridConnectionProperties, RelayAccessKeys, RelayNamespace,
    RELAY_API_VERSION, WEB_API_VERSION,
};
use crate::arm::{Arm, ArmConnection, ArmExt};
use crate::attributes::{attribute, computed_string, defaulted, required_string, sensitive, ID};
use crate::ids::{AppId, HybridConnectionId, RelayHybridConnectionId, RelayNamespaceId};
use crate::locks::lock_by_id;
use crate::resource::{ensure_absent, ArmResource, Created};
use crate::timeouts::{timeout_for, Operation, TimeoutsState};
use crate::utils::{default_to, force_new, known, known_number, string};
use crate::validate;

const DEFAULT_SEND_KEY_NAME: &str = "RootManageSharedAccessKey";

/// Attribute holding the ID of the app the hybrid connection is attached to
pub trait AppReference:
    Serialize + DeserializeOwned + Send + Sync + Clone + Debug + Default + PartialEq + 'static
{
    const TYPE_NAME: &'static str;
    const ATTRIBUTE: &'static str;

    fn app_id(&self) -> &ValueString<'static>;
    fn from_app_id(app_id: ValueString<'static>) -> Self;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WebAppReference {
    pub web_app_id: ValueString<'static>,
}

impl AppReference for WebAppReference {
    const TYPE_NAME: &'static str = "web_app_hybrid_connection";
    const ATTRIBUTE: &'static str = "web_app_id";

    fn app_id(&self) -> &ValueString<'static> {
        &self.web_app_id
    }

    fn from_app_id(web_app_id: ValueString<'static>) -> Self {
        Self { web_app_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FunctionAppReference {
    pub function_app_id: ValueString<'static>,
}

impl AppReference for FunctionAppReference {
    const TYPE_NAME: &'static str = "function_app_hybrid_connection";
    const ATTRIBUTE: &'static str = "function_app_id";

    fn app_id(&self) -> &ValueString<'static> {
        &self.function_app_id
    }

    fn from_app_id(function_app_id: ValueString<'static>) -> Self {
        Self { function_app_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(bound(deserialize = ""))]
pub struct HybridConnectionState<'a, R: AppReference> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    #[serde(flatten)]
    pub app: R,
    pub relay_id: ValueString<'a>,
    pub hostname: ValueString<'a>,
    pub port: ValueNumber,
    pub send_key_name: ValueString<'a>,
    pub namespace_name: ValueString<'a>,
    pub relay_name: ValueString<'a>,
    pub service_bus_namespace: ValueString<'a>,
    pub service_bus_suffix: ValueString<'a>,
    pub send_key_value: ValueString<'a>,
    #[serde(with = "serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

/// Suffix of the Service Bus endpoint of a namespace (eg: `.servicebus.windows.net`)
fn service_bus_suffix(endpoint: &str, namespace: &str) -> Option<String> {
    let host = endpoint
        .trim_start_matches("https://")
        .trim_end_matches('/')
        .split(':')
        .next()?;
    let suffix = host.get(namespace.len()..)?;
    if host[..namespace.len()].eq_ignore_ascii_case(namespace) && suffix.starts_with('.') {
        Some(suffix.to_owned())
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppHybridConnection<R, A = ArmConnection> {
    arm: A,
    reference: PhantomData<R>,
}

impl<R: AppReference, A: Arm> AppHybridConnection<R, A> {
    pub fn new(arm: A) -> Self {
        Self {
            arm,
            reference: PhantomData,
        }
    }

    /// Primary key of the `key_name` authorization rule of the relay namespace
    async fn send_key(&self, relay: &RelayHybridConnectionId, key_name: &str) -> Result<String> {
        let namespace = RelayNamespaceId::new(
            &relay.subscription_id,
            &relay.resource_group_name,
            &relay.namespace_name,
        );
        let keys: RelayAccessKeys = self
            .arm
            .list(
                &format!("{namespace}/authorizationRules/{key_name}/listKeys"),
                RELAY_API_VERSION,
            )
            .await
            .with_context(|| format!("listing the keys of the {key_name:?} rule of {namespace}"))?;
        keys.primary_key
            .ok_or_else(|| anyhow!("the {key_name:?} rule of {namespace} has no primary key"))
    }

    async fn properties(
        &self,
        state: &HybridConnectionState<'_, R>,
        relay: &RelayHybridConnectionId,
        send_key_value: String,
    ) -> Result<HybridConnectionProperties> {
        let namespace_id = RelayNamespaceId::new(
            &relay.subscription_id,
            &relay.resource_group_name,
            &relay.namespace_name,
        );
        let namespace: RelayNamespace = self
            .arm
            .get(&namespace_id.to_string(), RELAY_API_VERSION)
            .await
            .with_context(|| format!("reading the relay namespace {namespace_id}"))?;
        let suffix = namespace
            .properties
            .service_bus_endpoint
            .as_deref()
            .and_then(|endpoint| service_bus_suffix(endpoint, &relay.namespace_name))
            .ok_or_else(|| anyhow!("cannot find the Service Bus suffix of {namespace_id}"))?;

        Ok(HybridConnectionProperties {
            service_bus_namespace: Some(relay.namespace_name.clone()),
            relay_name: Some(relay.hybrid_connection_name.clone()),
            relay_arm_uri: Some(relay.to_string()),
            hostname: known(&state.hostname),
            port: known_number(&state.port),
            send_key_name: known(&state.send_key_name),
            send_key_value: Some(send_key_value),
            service_bus_suffix: Some(suffix),
        })
    }

    async fn put(&self, id: &HybridConnectionId, properties: HybridConnectionProperties) -> Result<()> {
        let body = HybridConnection {
            id: None,
            properties,
        };
        let _: HybridConnection = self
            .arm
            .put(&id.to_string(), WEB_API_VERSION, &body)
            .await
            .with_context(|| format!("writing the hybrid connection {id}"))?;
        Ok(())
    }

    async fn refresh<'a>(
        &self,
        mut state: HybridConnectionState<'a, R>,
        id: &HybridConnectionId,
    ) -> Result<Option<HybridConnectionState<'a, R>>> {
        let Some(remote) = self
            .arm
            .get_optional::<HybridConnection>(&id.to_string(), WEB_API_VERSION)
            .await?
        else {
            return Ok(None);
        };
        let properties = remote.properties;

        state.id = string(Some(id.to_string()));
        state.app = R::from_app_id(string(Some(id.app.to_string())));
        if let Some(relay_id) = properties.relay_arm_uri {
            state.relay_id = string(Some(
                RelayHybridConnectionId::parse(&relay_id)
                    .map(|relay| relay.to_string())
                    .unwrap_or(relay_id),
            ));
        }
        state.hostname = string(properties.hostname);
        state.port = properties.port.into();
        state.send_key_name = string(properties.send_key_name);
        state.namespace_name = string(Some(id.namespace_name.clone()));
        state.relay_name = string(Some(id.relay_name.clone()));
        state.service_bus_namespace = string(properties.service_bus_namespace);
        state.service_bus_suffix = string(properties.service_bus_suffix);
        if properties.send_key_value.is_some() {
            state.send_key_value = string(properties.send_key_value);
        }
        Ok(Some(state))
    }
}

fn parse_ids<R: AppReference>(
    state: &HybridConnectionState<'_, R>,
) -> Result<(HybridConnectionId, RelayHybridConnectionId)> {
    let app_id = known(state.app.app_id())
        .ok_or_else(|| anyhow!("`{}` is unknown", R::ATTRIBUTE))?;
    let relay_id = known(&state.relay_id).ok_or_else(|| anyhow!("`relay_id` is unknown"))?;
    let relay = RelayHybridConnectionId::parse(&relay_id)?;
    let id = HybridConnectionId::new(
        AppId::parse(&app_id)?,
        &relay.namespace_name,
        &relay.hybrid_connection_name,
    );
    Ok((id, relay))
}

#[async_trait]
impl<R: AppReference, A: Arm> ArmResource for AppHybridConnection<R, A> {
    type State<'a> = HybridConnectionState<'a, R>;

    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => ID.clone(),
                    R::ATTRIBUTE => required_string("ID of the app or slot, changing it forces a new resource"),
                    "relay_id" => required_string("ID of the Azure Relay hybrid connection, changing it forces a new resource"),
                    "hostname" => required_string("Hostname of the endpoint reached through the relay"),
                    "port" => attribute(
                        AttributeType::Number,
                        AttributeConstraint::Required,
                        "Port of the endpoint reached through the relay",
                    ),
                    "send_key_name" => defaulted(
                        AttributeType::String,
                        "Authorization rule of the relay namespace used to send, defaults to `RootManageSharedAccessKey`",
                    ),
                    "namespace_name" => computed_string("Name of the relay namespace"),
                    "relay_name" => computed_string("Name of the relay hybrid connection"),
                    "service_bus_namespace" => computed_string("Service Bus namespace of the relay"),
                    "service_bus_suffix" => computed_string("Suffix of the Service Bus endpoint"),
                    "send_key_value" => sensitive(computed_string("Primary key of the send authorization rule")),
                },
                blocks: map! {
                    "timeouts" => TimeoutsState::block(),
                },
                description: Description::plain("Azure Relay hybrid connection of an App Service app"),
                deprecated: false,
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        validate::id(
            diags,
            AttributePath::new(R::ATTRIBUTE),
            config.app.app_id(),
            AppId::parse,
        );
        validate::id(
            diags,
            AttributePath::new("relay_id"),
            &config.relay_id,
            RelayHybridConnectionId::parse,
        );
        validate::hostname(diags, AttributePath::new("hostname"), &config.hostname);
        validate::port(diags, AttributePath::new("port"), &config.port);
        validate::relay_key_name(diags, AttributePath::new("send_key_name"), &config.send_key_name);
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
        default_to(
            &mut planned.send_key_name,
            &config.send_key_name,
            Cow::Borrowed(DEFAULT_SEND_KEY_NAME),
        );
        match prior {
            None => {
                planned.id = Value::Unknown;
                planned.namespace_name = Value::Unknown;
                planned.relay_name = Value::Unknown;
                planned.service_bus_namespace = Value::Unknown;
                planned.service_bus_suffix = Value::Unknown;
                planned.send_key_value = Value::Unknown;
            }
            Some(prior) => {
                planned.id = prior.id.clone();
                planned.namespace_name = prior.namespace_name.clone();
                planned.relay_name = prior.relay_name.clone();
                planned.service_bus_namespace = prior.service_bus_namespace.clone();
                planned.service_bus_suffix = prior.service_bus_suffix.clone();
                planned.send_key_value = if prior.send_key_name == planned.send_key_name {
                    prior.send_key_value.clone()
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
        force_new(&mut replace, R::ATTRIBUTE, prior.app.app_id(), planned.app.app_id());
        force_new(&mut replace, "relay_id", &prior.relay_id, &planned.relay_id);
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
        let (id, relay) = parse_ids(&planned)?;
        let path = id.to_string();
        let _lock = lock_by_id(&id.app.site_id()).await;

        ensure_absent(&self.arm, &path, WEB_API_VERSION, R::TYPE_NAME).await?;
        let key_name = known(&planned.send_key_name)
            .unwrap_or_else(|| DEFAULT_SEND_KEY_NAME.to_owned());
        let key = self.send_key(&relay, &key_name).await?;
        let properties = self.properties(&planned, &relay, key).await?;
        tracing::debug!(id = path, "creating hybrid connection");
        created.record(&id);
        self.put(&id, properties).await?;

        self.refresh(planned, &id)
            .await?
            .ok_or_else(|| anyhow!("{id} was not found after its creation"))
    }

    async fn read<'a>(&self, state: Self::State<'a>) -> Result<Option<Self::State<'a>>> {
        let id = known(&state.id).ok_or_else(|| anyhow!("the ID of the hybrid connection is unknown"))?;
        let id = HybridConnectionId::parse(&id)?;
        self.refresh(state, &id).await
    }

    async fn update<'a>(
        &self,
        prior: Self::State<'a>,
        planned: Self::State<'a>,
    ) -> Result<Self::State<'a>> {
        let (id, relay) = parse_ids(&planned)?;
        let _lock = lock_by_id(&id.app.site_id()).await;

        let key = match (
            prior.send_key_name == planned.send_key_name,
            known(&prior.send_key_value),
        ) {
            (true, Some(key)) => key,
            _ => {
                let key_name = known(&planned.send_key_name)
                    .unwrap_or_else(|| DEFAULT_SEND_KEY_NAME.to_owned());
                self.send_key(&relay, &key_name).await?
            }
        };
        let properties = self.properties(&planned, &relay, key).await?;
        tracing::debug!(id = %id, "updating hybrid connection");
        self.put(&id, properties).await?;

        self.refresh(planned, &id)
            .await?
            .ok_or_else(|| anyhow!("{id} was not found after its update"))
    }

    async fn delete<'a>(&self, state: Self::State<'a>) -> Result<()> {
        let id = known(&state.id).ok_or_else(|| anyhow!("the ID of the hybrid connection is unknown"))?;
        let id = HybridConnectionId::parse(&id)?;
        let _lock = lock_by_id(&id.app.site_id()).await;
        self.arm.delete(&id.to_string(), WEB_API_VERSION, &[]).await?;
        Ok(())
    }

    fn import<'a>(&self, id: String) -> Result<Self::State<'a>> {
        let id = HybridConnectionId::parse(&id)?;
        Ok(HybridConnectionState {
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
    use crate::resource::tests::{apply_create, apply_update, read};
    use crate::resource::AzureResource;

    fn app_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/sites/my-app/slots/staging")
    }

    fn namespace_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/relays/providers/Microsoft.Relay/namespaces/my-ns")
    }

    fn relay_id() -> String {
        format!("{}/hybridConnections/my-relay", namespace_id())
    }

    fn connection_id() -> String {
        format!("{}/hybridConnectionNamespaces/my-ns/relays/my-relay", app_id())
    }

    fn fake() -> FakeArm {
        let arm = FakeArm::default();
        arm.seed(
            &namespace_id(),
            json!({ "properties": { "serviceBusEndpoint": "https://my-ns.servicebus.windows.net:443/" } }),
        );
        for (rule, key) in [("RootManageSharedAccessKey", "root-key"), ("send", "send-key")] {
            arm.respond(
                Method::Post,
                &format!("{}/authorizationRules/{rule}/listKeys", namespace_id()),
                ArmResponse::ok(json!({ "primaryKey": key, "keyName": rule })),
            );
        }
        arm
    }

    fn config() -> HybridConnectionState<'static, WebAppReference> {
        HybridConnectionState {
            app: WebAppReference {
                web_app_id: string(Some(app_id())),
            },
            relay_id: string(Some(relay_id())),
            hostname: "db.internal".into(),
            port: Value::Value(5432),
            ..Default::default()
        }
    }

    #[test]
    fn suffix() {
        assert_eq!(
            service_bus_suffix("https://my-ns.servicebus.windows.net:443/", "my-ns").as_deref(),
            Some(".servicebus.windows.net")
        );
        assert_eq!(service_bus_suffix("https://other.servicebus.windows.net/", "my-ns"), None);
        assert_eq!(service_bus_suffix("https://my", "my-ns"), None);
    }

    #[tokio::test]
    async fn lifecycle() {
        let arm = fake();
        let resource = AzureResource(AppHybridConnection::<WebAppReference, _>::new(arm.clone()));
        let (diags, state) = apply_create(&resource, config()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let state = state.unwrap();

        assert_eq!(state.id, string(Some(connection_id())));
        assert_eq!(state.send_key_name, ValueString::from("RootManageSharedAccessKey"));
        assert_eq!(state.send_key_value, ValueString::from("root-key"));
        assert_eq!(state.service_bus_suffix, ValueString::from(".servicebus.windows.net"));
        assert_eq!(state.namespace_name, ValueString::from("my-ns"));
        let body = arm.last_body(Method::Put, &connection_id()).unwrap();
        assert_eq!(body["properties"]["relayArmUri"], relay_id());
        assert_eq!(body["properties"]["port"], 5432);

        let (diags, refreshed) = read(&resource, state.clone()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(refreshed, Some(Value::Value(state.clone())));

        let mut config = config();
        config.send_key_name = "send".into();
        let (diags, replace, updated) = apply_update(&resource, state, config).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert!(replace.is_empty());
        let updated = updated.unwrap();
        assert_eq!(updated.send_key_value, ValueString::from("send-key"));

        let (diags, created_again) = apply_create(&resource, self::config()).await;
        assert!(created_again.is_none());
        assert!(format!("{diags:?}").contains("needs to be imported"));

        arm.remove(&connection_id());
        let (diags, refreshed) = read(&resource, updated).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(refreshed, Some(Value::Null));
    }

    #[tokio::test]
    async fn function_apps_share_the_implementation() {
        let arm = fake();
        let resource = AzureResource(AppHybridConnection::<FunctionAppReference, _>::new(arm.clone()));
        let schema = resource.0.schema();
        assert!(schema.block.attributes.contains_key("function_app_id"));
        assert!(!schema.block.attributes.contains_key("web_app_id"));

        let config = HybridConnectionState {
            app: FunctionAppReference {
                function_app_id: string(Some(app_id())),
            },
            relay_id: string(Some(relay_id())),
            hostname: "db.internal".into(),
            port: Value::Value(5432),
            ..Default::default()
        };
        let (diags, state) = apply_create(&resource, config).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.unwrap().app.function_app_id, string(Some(app_id())));
    }
}
