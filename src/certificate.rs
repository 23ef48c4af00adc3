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

//! `certificate` resource

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, PrimitiveDateTime};
use tf_provider::schema::{Block, Description, Schema};
use tf_provider::value::{serde_as_vec, Value, ValueList, ValueMap, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::arm::models::{Certificate, CertificateProperties, WEB_API_VERSION};
use crate::arm::{Arm, ArmConnection, ArmExt};
use crate::attributes::{
    computed_string, computed_string_list, optional_string, sensitive, ID, LOCATION, NAME,
    RESOURCE_GROUP_NAME, TAGS,
};
use crate::ids::{CertificateId, KeyVaultId, KeyVaultSecretId, ServicePlanId};
use crate::resource::{ensure_absent, ArmResource, Created};
use crate::timeouts::{timeout_for, Operation, TimeoutsState};
use crate::utils::{force_new, keep_empty, known, known_map, location, string, string_list};
use crate::validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CertificateState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub resource_group_name: ValueString<'a>,
    pub location: ValueString<'a>,
    pub pfx_blob: ValueString<'a>,
    pub password: ValueString<'a>,
    pub key_vault_id: ValueString<'a>,
    pub key_vault_secret_id: ValueString<'a>,
    pub app_service_plan_id: ValueString<'a>,
    pub tags: ValueMap<'a, ValueString<'a>>,
    pub friendly_name: ValueString<'a>,
    pub subject_name: ValueString<'a>,
    pub host_names: ValueList<ValueString<'a>>,
    pub issuer: ValueString<'a>,
    pub issue_date: ValueString<'a>,
    pub expiration_date: ValueString<'a>,
    pub thumbprint: ValueString<'a>,
    pub hosting_environment_profile_id: ValueString<'a>,
    #[serde(with = "serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

/// Format an ARM date as RFC 3339, dates without offset being UTC
fn rfc3339(date: &str) -> String {
    if let Ok(date) = OffsetDateTime::parse(date, &Rfc3339) {
        return date.format(&Rfc3339).unwrap_or_else(|_| date.to_string());
    }
    let Ok(format) = time::format_description::parse_borrowed::<2>(
        "[year]-[month]-[day]T[hour]:[minute]:[second]",
    ) else {
        return date.to_owned();
    };
    // ARM may append fractional seconds
    let trimmed = date.split('.').next().unwrap_or(date);
    match PrimitiveDateTime::parse(trimmed, &format) {
        Ok(parsed) => parsed
            .assume_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| date.to_owned()),
        Err(_) => date.to_owned(),
    }
}

/// The vault name is the first label of the vault host
fn vault_name(secret: &KeyVaultSecretId) -> &str {
    let host = secret
        .vault_base_url
        .trim_start_matches("https://");
    host.split(['.', ':']).next().unwrap_or(host)
}

impl<'a> CertificateState<'a> {
    fn validate_source(&self, diags: &mut Diagnostics) {
        match (self.pfx_blob.is_null(), self.key_vault_secret_id.is_null()) {
            (true, true) => diags.root_error_short(
                "One of `pfx_blob` or `key_vault_secret_id` must be set",
            ),
            (false, false) => diags.root_error_short(
                "`pfx_blob` and `key_vault_secret_id` are mutually exclusive",
            ),
            _ => (),
        }
        if !self.password.is_null() && !self.key_vault_secret_id.is_null() {
            diags.error_short(
                "`password` can only be used with `pfx_blob`",
                AttributePath::new("password"),
            );
        }
        if self.key_vault_id.is_null() != self.key_vault_secret_id.is_null() {
            diags.root_error_short("`key_vault_id` and `key_vault_secret_id` must be set together");
        }

        validate::base64(diags, AttributePath::new("pfx_blob"), &self.pfx_blob);
        validate::id(diags, AttributePath::new("key_vault_id"), &self.key_vault_id, KeyVaultId::parse);
        validate::id(
            diags,
            AttributePath::new("key_vault_secret_id"),
            &self.key_vault_secret_id,
            KeyVaultSecretId::parse,
        );
        validate::id(
            diags,
            AttributePath::new("app_service_plan_id"),
            &self.app_service_plan_id,
            ServicePlanId::parse,
        );

        if let (Some(vault), Some(secret)) = (known(&self.key_vault_id), known(&self.key_vault_secret_id)) {
            if let (Ok(vault), Ok(secret)) = (KeyVaultId::parse(&vault), KeyVaultSecretId::parse(&secret)) {
                if !vault_name(&secret).eq_ignore_ascii_case(&vault.vault_name) {
                    diags.error(
                        "Key Vault mismatch",
                        format!(
                            "The secret {secret} is not stored in the Key Vault {}",
                            vault.vault_name
                        ),
                        AttributePath::new("key_vault_secret_id"),
                    );
                }
            }
        }
    }

    fn expand(&self) -> Result<Certificate> {
        let key_vault_secret_name = known(&self.key_vault_secret_id)
            .map(|secret| KeyVaultSecretId::parse(&secret).map(|secret| secret.name))
            .transpose()?;
        Ok(Certificate {
            id: None,
            location: known(&self.location),
            tags: Some(known_map(&self.tags)),
            properties: CertificateProperties {
                pfx_blob: known(&self.pfx_blob),
                password: known(&self.password),
                key_vault_id: known(&self.key_vault_id),
                key_vault_secret_name,
                server_farm_id: known(&self.app_service_plan_id),
                ..Default::default()
            },
        })
    }

    fn flatten(&mut self, id: &CertificateId, certificate: Certificate) {
        let properties = certificate.properties;
        self.id = string(Some(id.to_string()));
        self.name = string(Some(id.certificate_name.clone()));
        self.resource_group_name = string(Some(id.resource_group_name.clone()));
        self.location = location(&self.location, certificate.location.as_deref());
        self.tags = keep_empty(
            self.tags.is_value(),
            certificate.tags.as_ref().unwrap_or(&Default::default()),
        );
        if properties.key_vault_id.is_some() {
            self.key_vault_id = string(properties.key_vault_id);
        }
        if properties.server_farm_id.is_some() || self.app_service_plan_id.is_unknown() {
            self.app_service_plan_id = string(properties.server_farm_id);
        }
        self.friendly_name = string(properties.friendly_name);
        self.subject_name = string(properties.subject_name);
        self.host_names = string_list(properties.host_names.unwrap_or_default());
        self.issuer = string(properties.issuer);
        self.issue_date = string(properties.issue_date.as_deref().map(rfc3339));
        self.expiration_date = string(properties.expiration_date.as_deref().map(rfc3339));
        self.thumbprint = string(properties.thumbprint);
        self.hosting_environment_profile_id =
            string(properties.hosting_environment_profile.and_then(|profile| profile.id));
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppServiceCertificate<A = ArmConnection> {
    arm: A,
}

impl<A: Arm> AppServiceCertificate<A> {
    pub fn new(arm: A) -> Self {
        Self { arm }
    }

    async fn refresh<'a>(
        &self,
        mut state: CertificateState<'a>,
        id: &CertificateId,
    ) -> Result<Option<CertificateState<'a>>> {
        let Some(certificate) = self
            .arm
            .get_optional::<Certificate>(&id.to_string(), WEB_API_VERSION)
            .await?
        else {
            return Ok(None);
        };
        state.flatten(id, certificate);
        Ok(Some(state))
    }
}

fn state_id(state: &CertificateState<'_>) -> Result<CertificateId> {
    let id = known(&state.id).ok_or_else(|| anyhow!("the ID of the certificate is unknown"))?;
    Ok(CertificateId::parse(&id)?)
}

#[async_trait]
impl<A: Arm> ArmResource for AppServiceCertificate<A> {
    type State<'a> = CertificateState<'a>;

    fn type_name(&self) -> &'static str {
        "certificate"
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
                    "pfx_blob" => sensitive(optional_string("Base64 encoded PFX content, changing it forces a new resource")),
                    "password" => sensitive(optional_string("Password of the PFX content, changing it forces a new resource")),
                    "key_vault_id" => optional_string("ID of the Key Vault holding the certificate, changing it forces a new resource"),
                    "key_vault_secret_id" => optional_string("Secret URL of the certificate in Key Vault, changing it forces a new resource"),
                    "app_service_plan_id" => optional_string("App Service Plan the certificate is bound to, changing it forces a new resource"),
                    "tags" => TAGS.clone(),
                    "friendly_name" => computed_string("Friendly name of the certificate"),
                    "subject_name" => computed_string("Subject of the certificate"),
                    "host_names" => computed_string_list("Hostnames covered by the certificate"),
                    "issuer" => computed_string("Issuer of the certificate"),
                    "issue_date" => computed_string("Start of validity, RFC 3339"),
                    "expiration_date" => computed_string("End of validity, RFC 3339"),
                    "thumbprint" => computed_string("Thumbprint of the certificate"),
                    "hosting_environment_profile_id" => computed_string("App Service Environment of the certificate"),
                },
                blocks: map! {
                    "timeouts" => TimeoutsState::block(),
                },
                description: Description::plain("App Service certificate, from a PFX file or a Key Vault secret"),
                deprecated: false,
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        config.validate_source(diags);
        if let Value::Value(timeouts) = &config.timeouts {
            timeouts.validate(diags, AttributePath::new("timeouts").index(0));
        }
    }

    fn plan<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior: Option<&Self::State<'a>>,
        _config: &Self::State<'a>,
        planned: &mut Self::State<'a>,
    ) {
        match prior {
            None => {
                planned.id = Value::Unknown;
                planned.friendly_name = Value::Unknown;
                planned.subject_name = Value::Unknown;
                planned.host_names = Value::Unknown;
                planned.issuer = Value::Unknown;
                planned.issue_date = Value::Unknown;
                planned.expiration_date = Value::Unknown;
                planned.thumbprint = Value::Unknown;
                planned.hosting_environment_profile_id = Value::Unknown;
            }
            Some(prior) => {
                planned.id = prior.id.clone();
                planned.friendly_name = prior.friendly_name.clone();
                planned.subject_name = prior.subject_name.clone();
                planned.host_names = prior.host_names.clone();
                planned.issuer = prior.issuer.clone();
                planned.issue_date = prior.issue_date.clone();
                planned.expiration_date = prior.expiration_date.clone();
                planned.thumbprint = prior.thumbprint.clone();
                planned.hosting_environment_profile_id =
                    prior.hosting_environment_profile_id.clone();
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
        force_new(&mut replace, "pfx_blob", &prior.pfx_blob, &planned.pfx_blob);
        force_new(&mut replace, "password", &prior.password, &planned.password);
        force_new(&mut replace, "key_vault_id", &prior.key_vault_id, &planned.key_vault_id);
        force_new(
            &mut replace,
            "key_vault_secret_id",
            &prior.key_vault_secret_id,
            &planned.key_vault_secret_id,
        );
        force_new(
            &mut replace,
            "app_service_plan_id",
            &prior.app_service_plan_id,
            &planned.app_service_plan_id,
        );
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
        let name = known(&planned.name).context("the name of the certificate is unknown")?;
        let resource_group =
            known(&planned.resource_group_name).context("the resource group is unknown")?;
        let id = CertificateId::new(subscription_id, resource_group, name);
        let path = id.to_string();

        ensure_absent(&self.arm, &path, WEB_API_VERSION, "certificate").await?;
        tracing::debug!(id = path, "creating certificate");
        created.record(&id);
        let _: Certificate = self
            .arm
            .put(&path, WEB_API_VERSION, &planned.expand()?)
            .await
            .with_context(|| format!("creating the certificate {id}"))?;

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
        if prior.tags != planned.tags {
            tracing::debug!(id = %id, "updating certificate tags");
            let _: Certificate = self
                .arm
                .patch(
                    &id.to_string(),
                    WEB_API_VERSION,
                    &serde_json::json!({ "tags": known_map(&planned.tags) }),
                )
                .await
                .with_context(|| format!("updating the tags of {id}"))?;
        }

        self.refresh(planned, &id)
            .await?
            .ok_or_else(|| anyhow!("{id} was not found after its update"))
    }

    async fn delete<'a>(&self, state: Self::State<'a>) -> Result<()> {
        let id = state_id(&state)?;
        self.arm
            .delete(&id.to_string(), WEB_API_VERSION, &[])
            .await
            .with_context(|| format!("deleting the certificate {id}"))?;
        Ok(())
    }

    fn import<'a>(&self, id: String) -> Result<Self::State<'a>> {
        let id = CertificateId::parse(&id)?;
        Ok(CertificateState {
            id: string(Some(id.to_string())),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::arm::fake::{FakeArm, SUBSCRIPTION_ID};
    use crate::arm::Method;
    use crate::resource::tests::{apply_create, apply_update};
    use crate::resource::AzureResource;

    fn certificate_id() -> String {
        format!("/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.Web/certificates/www")
    }

    fn config() -> CertificateState<'static> {
        CertificateState {
            name: "www".into(),
            resource_group_name: "rg".into(),
            location: "westeurope".into(),
            pfx_blob: "cGZ4".into(),
            password: "secret".into(),
            ..Default::default()
        }
    }

    #[test]
    fn dates() {
        assert_eq!(rfc3339("2024-03-01T12:30:00+01:00"), "2024-03-01T12:30:00+01:00");
        assert_eq!(rfc3339("2024-03-01T12:30:00"), "2024-03-01T12:30:00Z");
        assert_eq!(rfc3339("2024-03-01T12:30:00.123"), "2024-03-01T12:30:00Z");
        assert_eq!(rfc3339("soon"), "soon");
    }

    #[test]
    fn certificate_source() {
        let resource = AppServiceCertificate::<FakeArm>::default();
        let vault = format!(
            "/subscriptions/{SUBSCRIPTION_ID}/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/certs"
        );

        let mut diags = Diagnostics::default();
        resource.validate(&mut diags, &config());
        assert!(diags.errors.is_empty(), "{diags:?}");

        let mut diags = Diagnostics::default();
        resource.validate(
            &mut diags,
            &CertificateState {
                pfx_blob: Value::Null,
                password: Value::Null,
                ..config()
            },
        );
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        resource.validate(
            &mut diags,
            &CertificateState {
                pfx_blob: Value::Null,
                password: Value::Null,
                key_vault_id: string(Some(vault.clone())),
                key_vault_secret_id: "https://certs.vault.azure.net/secrets/www".into(),
                ..config()
            },
        );
        assert!(diags.errors.is_empty(), "{diags:?}");

        let mut diags = Diagnostics::default();
        resource.validate(
            &mut diags,
            &CertificateState {
                pfx_blob: Value::Null,
                password: Value::Null,
                key_vault_id: string(Some(vault)),
                key_vault_secret_id: "https://other.vault.azure.net/secrets/www".into(),
                ..config()
            },
        );
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        resource.validate(
            &mut diags,
            &CertificateState {
                pfx_blob: Value::Null,
                password: Value::Null,
                key_vault_secret_id: "https://certs.vault.azure.net/secrets/www".into(),
                ..config()
            },
        );
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn only_tags_are_updated_in_place() {
        let arm = FakeArm::default();
        let resource = AzureResource(AppServiceCertificate::new(arm.clone()));
        let (diags, state) = apply_create(&resource, config()).await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let state = state.unwrap();
        assert_eq!(state.id, string(Some(certificate_id())));
        assert_eq!(state.pfx_blob, ValueString::from("cGZ4"));
        assert_eq!(
            arm.last_body(Method::Put, &certificate_id()).unwrap()["properties"]["password"],
            "secret"
        );

        arm.seed(
            &certificate_id(),
            json!({
                "location": "West Europe",
                "tags": {},
                "properties": {
                    "thumbprint": "ABCDEF",
                    "expirationDate": "2025-01-01T00:00:00",
                },
            }),
        );
        let tags = BTreeMap::from([("env".to_owned(), "prod".to_owned())]);
        let (diags, replace, updated) = apply_update(
            &resource,
            state.clone(),
            CertificateState {
                tags: keep_empty(true, &tags),
                ..config()
            },
        )
        .await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert!(replace.is_empty());
        let updated = updated.unwrap();
        assert_eq!(updated.location, ValueString::from("westeurope"));
        assert_eq!(updated.thumbprint, ValueString::from("ABCDEF"));
        assert_eq!(updated.expiration_date, ValueString::from("2025-01-01T00:00:00Z"));
        assert_eq!(arm.resource(&certificate_id()).unwrap()["tags"]["env"], "prod");

        let (_, replace, _) = apply_update(
            &resource,
            state,
            CertificateState {
                pfx_blob: "b3RoZXI=".into(),
                ..config()
            },
        )
        .await;
        assert_eq!(replace, vec![AttributePath::new("pfx_blob")]);
    }
}
