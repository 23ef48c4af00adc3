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

//! Glue between the Terraform resource protocol and the ARM resources
//!
//! Resources implement [`ArmResource`] with plain `Result`s;
//! [`AzureResource`] turns them into a [`Resource`]: it applies the per-operation timeouts,
//! reports errors as diagnostics and removes resources that no longer exist from the state.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::arm::{Arm, ArmExt};
use crate::error::requires_import;
use crate::timeouts::Operation;

#[async_trait]
pub trait ArmResource: Send + Sync + 'static {
    type State<'a>: Serialize + Deserialize<'a> + Send + Sync + Clone + Debug;

    /// Resource type name, without the provider prefix
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>);

    /// Fill the planned state: defaults, and computed values that are known in advance
    fn plan<'a>(
        &self,
        diags: &mut Diagnostics,
        prior: Option<&Self::State<'a>>,
        config: &Self::State<'a>,
        planned: &mut Self::State<'a>,
    );

    /// Attributes whose change requires the resource to be replaced
    fn requires_replace<'a>(
        &self,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
    ) -> Vec<AttributePath>;

    fn timeout<'a>(&self, state: &Self::State<'a>, operation: Operation) -> Duration;

    /// ARM ID recorded in the state, used for logging
    fn id<'a>(&self, state: &Self::State<'a>) -> String;

    /// Create the resource, recording its ID in `created` before the request that creates it
    async fn create<'a>(&self, planned: Self::State<'a>, created: &Created)
        -> Result<Self::State<'a>>;

    /// Refresh the state, `None` when the resource does not exist anymore
    async fn read<'a>(&self, state: Self::State<'a>) -> Result<Option<Self::State<'a>>>;

    async fn update<'a>(
        &self,
        prior: Self::State<'a>,
        planned: Self::State<'a>,
    ) -> Result<Self::State<'a>>;

    async fn delete<'a>(&self, state: Self::State<'a>) -> Result<()>;

    /// Minimal state pointing to the resource `id`, completed by a read
    fn import<'a>(&self, id: String) -> Result<Self::State<'a>>;
}

/// ID of a resource that may exist remotely while its creation has not completed
#[derive(Debug, Default)]
pub struct Created(Mutex<Option<String>>);

impl Created {
    pub fn record(&self, id: &impl Display) {
        let mut created = match self.0.lock() {
            Ok(created) => created,
            Err(poisoned) => poisoned.into_inner(),
        };
        *created = Some(id.to_string());
    }

    pub fn id(&self) -> Option<String> {
        match self.0.lock() {
            Ok(created) => created.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Run `future` under the timeout of `operation`
pub async fn with_timeout<T>(
    operation: Operation,
    timeout: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "{operation} did not complete within {}s",
            timeout.as_secs()
        )),
    }
}

/// Fail with the import error when the resource at `path` already exists
pub async fn ensure_absent<A: Arm>(
    arm: &A,
    path: &str,
    api_version: &'static str,
    type_name: &str,
) -> Result<()> {
    let existing: Option<serde_json::Value> = arm.get_optional(path, api_version).await?;
    match existing {
        Some(_) => Err(requires_import(&format!("appservice_{type_name}"), path)),
        None => Ok(()),
    }
}

/// [`Resource`] implementation for an [`ArmResource`]
///
/// The whole state is wrapped in a [`Value`]: a null state tells Terraform the resource is gone.
#[derive(Debug, Clone, Default)]
pub struct AzureResource<R>(pub R);

impl<R: ArmResource> AzureResource<R> {
    fn report(&self, diags: &mut Diagnostics, operation: Operation, id: &str, err: anyhow::Error) {
        tracing::error!(id, %operation, "{err:#}");
        let detail = if id.is_empty() {
            format!("{err:#}")
        } else {
            format!("{id}: {err:#}")
        };
        diags.root_error(
            format!("Failed to {operation} {}", self.0.type_name()),
            detail,
        );
    }

    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        state: R::State<'a>,
    ) -> Option<Value<R::State<'a>>> {
        let id = self.0.id(&state);
        let timeout = self.0.timeout(&state, Operation::Read);
        match with_timeout(Operation::Read, timeout, self.0.read(state)).await {
            Ok(Some(state)) => Some(Value::Value(state)),
            Ok(None) => {
                tracing::warn!(id, "{} not found, removing from state", self.0.type_name());
                Some(Value::Null)
            }
            Err(err) => {
                self.report(diags, Operation::Read, &id, err);
                None
            }
        }
    }
}

#[async_trait]
impl<R: ArmResource> Resource for AzureResource<R> {
    type State<'a> = Value<R::State<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(self.0.schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            self.0.validate(diags, config);
        }
        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        match state {
            Value::Value(state) => Some((self.refresh(diags, state).await?, private_state)),
            state => Some((state, private_state)),
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let (Value::Value(mut planned), Value::Value(config)) = (proposed_state, config_state)
        else {
            return Some((Value::Null, Default::default()));
        };
        self.0.plan(diags, None, &config, &mut planned);
        if diags.errors.is_empty() {
            Some((Value::Value(planned), Default::default()))
        } else {
            None
        }
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        match (prior_state, proposed_state, config_state) {
            (Value::Value(prior), Value::Value(mut planned), Value::Value(config)) => {
                self.0.plan(diags, Some(&prior), &config, &mut planned);
                let replace = self.0.requires_replace(&prior, &planned);
                if diags.errors.is_empty() {
                    Some((Value::Value(planned), prior_private_state, replace))
                } else {
                    None
                }
            }
            (_, proposed_state, _) => Some((proposed_state, prior_private_state, Vec::new())),
        }
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Value::Value(planned) = planned_state else {
            diags.root_error_short("Cannot create a resource from a null state");
            return None;
        };
        let timeout = self.0.timeout(&planned, Operation::Create);
        let created = Created::default();
        match with_timeout(Operation::Create, timeout, self.0.create(planned, &created)).await {
            Ok(state) => {
                tracing::info!(id = self.0.id(&state), "{} created", self.0.type_name());
                Some((Value::Value(state), planned_private_state))
            }
            Err(err) => {
                let Some(id) = created.id() else {
                    self.report(diags, Operation::Create, "", err);
                    return None;
                };
                self.report(diags, Operation::Create, &id, err);
                // Partially created: kept in the state so that Terraform taints it
                match self.0.import(id) {
                    Ok(state) => Some((Value::Value(state), planned_private_state)),
                    Err(err) => {
                        diags.root_error_short(format!("{err:#}"));
                        None
                    }
                }
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let (Value::Value(prior), Value::Value(planned)) = (prior_state, planned_state) else {
            diags.root_error_short("Cannot update a resource from a null state");
            return None;
        };
        let id = self.0.id(&prior);
        let timeout = self.0.timeout(&planned, Operation::Update);
        match with_timeout(Operation::Update, timeout, self.0.update(prior, planned)).await {
            Ok(state) => {
                tracing::info!(id, "{} updated", self.0.type_name());
                Some((Value::Value(state), planned_private_state))
            }
            Err(err) => {
                self.report(diags, Operation::Update, &id, err);
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let Value::Value(prior) = prior_state else {
            return Some(());
        };
        let id = self.0.id(&prior);
        let timeout = self.0.timeout(&prior, Operation::Delete);
        match with_timeout(Operation::Delete, timeout, self.0.delete(prior)).await {
            Ok(()) => {
                tracing::info!(id, "{} deleted", self.0.type_name());
                Some(())
            }
            Err(err) => {
                self.report(diags, Operation::Delete, &id, err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = match self.0.import(id.clone()) {
            Ok(state) => state,
            Err(err) => {
                diags.root_error(format!("Cannot import {id:?}"), format!("{err:#}"));
                return None;
            }
        };
        match self.refresh(diags, state).await? {
            Value::Value(state) => Some((Value::Value(state), Default::default())),
            _ => {
                diags.root_error(
                    format!("Cannot import {id:?}"),
                    format!("The {} does not exist", self.0.type_name()),
                );
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Run the planning and apply steps Terraform goes through for a creation
    pub(crate) async fn apply_create<'a, R: ArmResource>(
        resource: &AzureResource<R>,
        config: R::State<'a>,
    ) -> (Diagnostics, Option<R::State<'a>>) {
        let mut diags = Diagnostics::default();
        let Some(()) = resource.validate(&mut diags, Value::Value(config.clone())).await else {
            return (diags, None);
        };
        let Some((planned, _)) = resource
            .plan_create(
                &mut diags,
                Value::Value(config.clone()),
                Value::Value(config.clone()),
                Default::default(),
            )
            .await
        else {
            return (diags, None);
        };
        let created = resource
            .create(
                &mut diags,
                planned,
                Value::Value(config),
                Default::default(),
                Default::default(),
            )
            .await;
        (diags, created.and_then(|(state, _)| state.as_option()))
    }

    pub(crate) async fn apply_update<'a, R: ArmResource>(
        resource: &AzureResource<R>,
        prior: R::State<'a>,
        config: R::State<'a>,
    ) -> (Diagnostics, Vec<AttributePath>, Option<R::State<'a>>) {
        let mut diags = Diagnostics::default();
        let Some((planned, _, replace)) = resource
            .plan_update(
                &mut diags,
                Value::Value(prior.clone()),
                Value::Value(config.clone()),
                Value::Value(config.clone()),
                Default::default(),
                Default::default(),
            )
            .await
        else {
            return (diags, Vec::new(), None);
        };
        if !replace.is_empty() {
            return (diags, replace, None);
        }
        let updated = resource
            .update(
                &mut diags,
                Value::Value(prior),
                planned,
                Value::Value(config),
                Default::default(),
                Default::default(),
            )
            .await;
        (diags, replace, updated.and_then(|(state, _)| state.as_option()))
    }

    pub(crate) async fn read<'a, R: ArmResource>(
        resource: &AzureResource<R>,
        state: R::State<'a>,
    ) -> (Diagnostics, Option<Value<R::State<'a>>>) {
        let mut diags = Diagnostics::default();
        let read = Resource::read(
            resource,
            &mut diags,
            Value::Value(state),
            Default::default(),
            Default::default(),
        )
        .await;
        (diags, read.map(|(state, _)| state))
    }

    pub(crate) async fn destroy<'a, R: ArmResource>(
        resource: &AzureResource<R>,
        state: R::State<'a>,
    ) -> (Diagnostics, Option<()>) {
        let mut diags = Diagnostics::default();
        let destroyed = Resource::destroy(
            resource,
            &mut diags,
            Value::Value(state),
            Default::default(),
            Default::default(),
        )
        .await;
        (diags, destroyed)
    }
}
