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

//! Remote operations on sites and slots

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};

use super::settings::{merge_app_settings, preserved_settings};
use super::{SiteOs, SiteSettings};
use crate::arm::models::{
    AppServicePlan, AzureStorageInfoValue, AzureStoragePropertyDictionary,
    ConnStringValueTypePair, ConnectionStringDictionary, CsmPublishingCredentialsPoliciesEntity,
    CsmPublishingCredentialsPoliciesProperties, ResourceNameAvailability,
    ResourceNameAvailabilityRequest, Site, SiteConfig, SiteConfigResource, SiteLogsConfig,
    SiteLogsConfigProperties, SlotConfigNames, SlotConfigNamesResource, StringDictionary, User,
    UserProperties, WEB_API_VERSION,
};
use crate::arm::{Arm, ArmExt};
use crate::error::ArmError;

/// Everything the provider reads about a site or a slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteSite {
    pub site: Site,
    pub settings: SiteSettings,
    pub connection_strings: BTreeMap<String, ConnStringValueTypePair>,
    pub logs: SiteLogsConfigProperties,
    /// Mounted storage, keyed by mount name
    pub storage_accounts: BTreeMap<String, AzureStorageInfoValue>,
    pub credentials: UserProperties,
    pub ftp_basic_auth: bool,
    pub scm_basic_auth: bool,
}

/// Remote configuration described by a state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredSite {
    /// Site config, metadata and the app settings derived from other attributes
    pub settings: SiteSettings,
    pub user_app_settings: BTreeMap<String, String>,
    pub connection_strings: BTreeMap<String, ConnStringValueTypePair>,
    pub logs: SiteLogsConfigProperties,
    pub storage_accounts: BTreeMap<String, AzureStorageInfoValue>,
    pub ftp_basic_auth: bool,
    pub scm_basic_auth: bool,
}

async fn basic_auth<A: Arm>(arm: &A, id: &str, policy: &str) -> Result<bool, ArmError> {
    let policy: Option<CsmPublishingCredentialsPoliciesEntity> = arm
        .get_optional(
            &format!("{id}/basicPublishingCredentialsPolicies/{policy}"),
            WEB_API_VERSION,
        )
        .await?;
    Ok(policy.map_or(true, |policy| policy.properties.allow))
}

/// Read a site with its configuration, `None` when it does not exist
pub async fn fetch<A: Arm>(arm: &A, id: &str) -> Result<Option<RemoteSite>, ArmError> {
    let Some(site) = arm.get_optional::<Site>(id, WEB_API_VERSION).await? else {
        return Ok(None);
    };

    let config_path = format!("{id}/config/web");
    let app_settings_path = format!("{id}/config/appsettings/list");
    let connection_strings_path = format!("{id}/config/connectionstrings/list");
    let metadata_path = format!("{id}/config/metadata/list");
    let credentials_path = format!("{id}/config/publishingcredentials/list");
    let logs_path = format!("{id}/config/logs");
    let storage_path = format!("{id}/config/azurestorageaccounts/list");
    let (config, app_settings, connection_strings, metadata, credentials, ftp, scm) = futures::try_join!(
        arm.get::<SiteConfigResource>(&config_path, WEB_API_VERSION),
        arm.list::<StringDictionary>(&app_settings_path, WEB_API_VERSION),
        arm.list::<ConnectionStringDictionary>(&connection_strings_path, WEB_API_VERSION),
        arm.list::<StringDictionary>(&metadata_path, WEB_API_VERSION),
        arm.list::<User>(&credentials_path, WEB_API_VERSION),
        basic_auth(arm, id, "ftp"),
        basic_auth(arm, id, "scm"),
    )?;
    let (logs, storage_accounts) = futures::try_join!(
        arm.get_optional::<SiteLogsConfig>(&logs_path, WEB_API_VERSION),
        arm.list::<AzureStoragePropertyDictionary>(&storage_path, WEB_API_VERSION),
    )?;

    Ok(Some(RemoteSite {
        site,
        settings: SiteSettings {
            config: config.properties,
            app_settings: app_settings.properties,
            metadata: metadata.properties,
        },
        connection_strings: connection_strings.properties,
        logs: logs.unwrap_or_default().properties,
        storage_accounts: storage_accounts.properties,
        credentials: credentials.properties,
        ftp_basic_auth: ftp,
        scm_basic_auth: scm,
    }))
}

pub async fn put_site<A: Arm>(arm: &A, id: &str, site: &Site) -> Result<Site, ArmError> {
    arm.put(id, WEB_API_VERSION, site).await
}

pub async fn put_config<A: Arm>(arm: &A, id: &str, config: &SiteConfig) -> Result<(), ArmError> {
    let body = SiteConfigResource {
        properties: config.clone(),
    };
    let _: serde_json::Value = arm
        .put(&format!("{id}/config/web"), WEB_API_VERSION, &body)
        .await?;
    Ok(())
}

async fn put_dictionary<A: Arm>(
    arm: &A,
    id: &str,
    name: &str,
    properties: &BTreeMap<String, String>,
) -> Result<(), ArmError> {
    let body = StringDictionary {
        properties: properties.clone(),
    };
    let _: serde_json::Value = arm
        .put(&format!("{id}/config/{name}"), WEB_API_VERSION, &body)
        .await?;
    Ok(())
}

pub async fn put_app_settings<A: Arm>(
    arm: &A,
    id: &str,
    app_settings: &BTreeMap<String, String>,
) -> Result<(), ArmError> {
    put_dictionary(arm, id, "appsettings", app_settings).await
}

pub async fn put_metadata<A: Arm>(
    arm: &A,
    id: &str,
    metadata: &BTreeMap<String, String>,
) -> Result<(), ArmError> {
    put_dictionary(arm, id, "metadata", metadata).await
}

pub async fn put_connection_strings<A: Arm>(
    arm: &A,
    id: &str,
    connection_strings: &BTreeMap<String, ConnStringValueTypePair>,
) -> Result<(), ArmError> {
    let body = ConnectionStringDictionary {
        properties: connection_strings.clone(),
    };
    let _: serde_json::Value = arm
        .put(
            &format!("{id}/config/connectionstrings"),
            WEB_API_VERSION,
            &body,
        )
        .await?;
    Ok(())
}

pub async fn put_logs<A: Arm>(
    arm: &A,
    id: &str,
    logs: &SiteLogsConfigProperties,
) -> Result<(), ArmError> {
    let body = SiteLogsConfig {
        properties: logs.clone(),
    };
    let _: serde_json::Value = arm
        .put(&format!("{id}/config/logs"), WEB_API_VERSION, &body)
        .await?;
    Ok(())
}

pub async fn put_storage_accounts<A: Arm>(
    arm: &A,
    id: &str,
    storage_accounts: &BTreeMap<String, AzureStorageInfoValue>,
) -> Result<(), ArmError> {
    let body = AzureStoragePropertyDictionary {
        properties: storage_accounts.clone(),
    };
    let _: serde_json::Value = arm
        .put(
            &format!("{id}/config/azurestorageaccounts"),
            WEB_API_VERSION,
            &body,
        )
        .await?;
    Ok(())
}

/// Names of the settings that stay with the production slot, only defined on sites
pub async fn fetch_slot_config_names<A: Arm>(arm: &A, id: &str) -> Result<SlotConfigNames, ArmError> {
    let names: Option<SlotConfigNamesResource> = arm
        .get_optional(&format!("{id}/config/slotConfigNames"), WEB_API_VERSION)
        .await?;
    Ok(names.unwrap_or_default().properties)
}

pub async fn put_slot_config_names<A: Arm>(
    arm: &A,
    id: &str,
    names: &SlotConfigNames,
) -> Result<(), ArmError> {
    let body = SlotConfigNamesResource {
        properties: names.clone(),
    };
    let _: serde_json::Value = arm
        .put(&format!("{id}/config/slotConfigNames"), WEB_API_VERSION, &body)
        .await?;
    Ok(())
}

/// Allow or forbid basic authentication on the `ftp` or `scm` publishing endpoint
pub async fn put_basic_auth<A: Arm>(
    arm: &A,
    id: &str,
    policy: &str,
    allow: bool,
) -> Result<(), ArmError> {
    let body = CsmPublishingCredentialsPoliciesEntity {
        properties: CsmPublishingCredentialsPoliciesProperties { allow },
    };
    let _: serde_json::Value = arm
        .put(
            &format!("{id}/basicPublishingCredentialsPolicies/{policy}"),
            WEB_API_VERSION,
            &body,
        )
        .await?;
    Ok(())
}

/// Check a site name is free, the name being part of a public hostname
pub async fn check_name_available<A: Arm>(arm: &A, name: &str) -> Result<()> {
    let subscription_id = arm.subscription_id().await?;
    let request = ResourceNameAvailabilityRequest {
        name: name.to_owned(),
        kind: "Microsoft.Web/sites".to_owned(),
    };
    let availability: ResourceNameAvailability = arm
        .post(
            &format!("/subscriptions/{subscription_id}/providers/Microsoft.Web/checknameavailability"),
            WEB_API_VERSION,
            &request,
        )
        .await
        .context("checking the availability of the name")?;
    if availability.name_available {
        Ok(())
    } else {
        Err(anyhow!(
            "the site name {name:?} is not available: {}",
            availability.message.unwrap_or_default()
        ))
    }
}

/// Check the plan can host an app of the OS `O`
pub async fn check_plan<O: SiteOs, A: Arm>(
    arm: &A,
    plan_id: &str,
    always_on: bool,
) -> Result<AppServicePlan> {
    let plan: AppServicePlan = arm
        .get(plan_id, WEB_API_VERSION)
        .await
        .with_context(|| format!("reading the service plan {plan_id}"))?;
    if !O::hosts(&plan) {
        return Err(anyhow!(
            "the service plan {plan_id} cannot host {} apps",
            O::NAME
        ));
    }
    let tier = plan
        .sku
        .as_ref()
        .and_then(|sku| sku.tier.as_deref())
        .unwrap_or_default();
    if always_on && (tier.eq_ignore_ascii_case("Free") || tier.eq_ignore_ascii_case("Shared")) {
        return Err(anyhow!(
            "`always_on` cannot be enabled on a {tier} service plan"
        ));
    }
    Ok(plan)
}

/// Whether the plan bills per execution and stores the app content on a file share
pub fn is_elastic_or_consumption(plan: &AppServicePlan) -> bool {
    let tier = plan
        .sku
        .as_ref()
        .and_then(|sku| sku.tier.as_deref())
        .unwrap_or_default();
    tier.eq_ignore_ascii_case("Dynamic") || tier.eq_ignore_ascii_case("ElasticPremium")
}

/// Create the site, then its configuration sub-resources
pub async fn create_site<A: Arm>(
    arm: &A,
    id: &str,
    mut site: Site,
    desired: &DesiredSite,
) -> Result<()> {
    site.properties.site_config = Some(desired.settings.config.clone());
    put_site(arm, id, &site).await.context("creating the site")?;

    let app_settings = merge_app_settings(
        &desired.user_app_settings,
        desired.settings.app_settings.clone(),
    );
    if !app_settings.is_empty() {
        put_app_settings(arm, id, &app_settings)
            .await
            .context("writing the app settings")?;
    }
    if !desired.connection_strings.is_empty() {
        put_connection_strings(arm, id, &desired.connection_strings)
            .await
            .context("writing the connection strings")?;
    }
    if !desired.settings.metadata.is_empty() {
        put_metadata(arm, id, &desired.settings.metadata)
            .await
            .context("writing the metadata")?;
    }
    if desired.logs.normalized() != SiteLogsConfigProperties::default() {
        put_logs(arm, id, &desired.logs)
            .await
            .context("writing the logs configuration")?;
    }
    if !desired.storage_accounts.is_empty() {
        put_storage_accounts(arm, id, &desired.storage_accounts)
            .await
            .context("writing the storage mounts")?;
    }
    for (policy, allow) in [("ftp", desired.ftp_basic_auth), ("scm", desired.scm_basic_auth)] {
        if !allow {
            put_basic_auth(arm, id, policy, allow)
                .await
                .with_context(|| format!("writing the {policy} basic authentication policy"))?;
        }
    }
    Ok(())
}

/// Fields of `top` that are set, written over `base`
fn overlay<T: Serialize + DeserializeOwned>(base: &T, top: &T) -> Result<T, ArmError> {
    let mut merged = serde_json::to_value(base)?;
    if let (serde_json::Value::Object(merged), serde_json::Value::Object(top)) =
        (&mut merged, serde_json::to_value(top)?)
    {
        merged.extend(top);
    }
    Ok(serde_json::from_value(merged)?)
}

/// Write the sub-resources that differ from `existing`
///
/// `site` is the existing site with the planned arguments copied in,
/// `managed` lists the app settings owned by the provider.
pub async fn update_site<A: Arm>(
    arm: &A,
    id: &str,
    mut site: Site,
    desired: &DesiredSite,
    existing: &RemoteSite,
    managed: &[&str],
) -> Result<()> {
    let mut current = existing.site.clone();
    current.properties.site_config = None;
    site.properties.site_config = None;
    if site != current {
        tracing::debug!(id, "updating site");
        put_site(arm, id, &site).await.context("updating the site")?;
    }

    let config = overlay(&existing.settings.config, &desired.settings.config)?;
    if config != existing.settings.config {
        tracing::debug!(id, "updating site config");
        put_config(arm, id, &config)
            .await
            .context("updating the site config")?;
    }

    let mut provider_settings = preserved_settings(&existing.settings.app_settings, managed);
    provider_settings.extend(desired.settings.app_settings.clone());
    let app_settings = merge_app_settings(&desired.user_app_settings, provider_settings);
    if app_settings != existing.settings.app_settings {
        tracing::debug!(id, "updating app settings");
        put_app_settings(arm, id, &app_settings)
            .await
            .context("updating the app settings")?;
    }

    if desired.connection_strings != existing.connection_strings {
        tracing::debug!(id, "updating connection strings");
        put_connection_strings(arm, id, &desired.connection_strings)
            .await
            .context("updating the connection strings")?;
    }

    let mut metadata = existing.settings.metadata.clone();
    metadata.extend(desired.settings.metadata.clone());
    if metadata != existing.settings.metadata {
        put_metadata(arm, id, &metadata)
            .await
            .context("updating the metadata")?;
    }

    if desired.logs.normalized() != existing.logs.normalized() {
        tracing::debug!(id, "updating logs configuration");
        put_logs(arm, id, &desired.logs)
            .await
            .context("updating the logs configuration")?;
    }

    if desired.storage_accounts != existing.storage_accounts {
        tracing::debug!(id, "updating storage mounts");
        put_storage_accounts(arm, id, &desired.storage_accounts)
            .await
            .context("updating the storage mounts")?;
    }

    for (policy, allow, current) in [
        ("ftp", desired.ftp_basic_auth, existing.ftp_basic_auth),
        ("scm", desired.scm_basic_auth, existing.scm_basic_auth),
    ] {
        if allow != current {
            put_basic_auth(arm, id, policy, allow)
                .await
                .with_context(|| format!("updating the {policy} basic authentication policy"))?;
        }
    }
    Ok(())
}

pub async fn delete_site<A: Arm>(arm: &A, id: &str) -> Result<(), ArmError> {
    arm.delete(
        id,
        WEB_API_VERSION,
        &[("deleteMetrics", "true"), ("deleteEmptyServerFarm", "false")],
    )
    .await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::arm::fake::{FakeArm, SUBSCRIPTION_ID};
    use crate::arm::{ArmResponse, Method};
    use crate::site::{Linux, Windows};

    const SITE: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.Web/sites/app";

    #[tokio::test]
    async fn fetch_collects_the_sub_resources() {
        let arm = FakeArm::default();
        assert_eq!(fetch(&arm, SITE).await.unwrap(), None);

        arm.seed(
            SITE,
            json!({
                "name": "app",
                "properties": { "siteConfig": { "alwaysOn": true } }
            }),
        );
        arm.seed(
            &format!("{SITE}/config/appsettings"),
            json!({ "properties": { "FOO": "bar" } }),
        );
        arm.seed(
            &format!("{SITE}/config/publishingcredentials"),
            json!({ "properties": { "publishingUserName": "$app", "publishingPassword": "pwd" } }),
        );
        arm.seed(
            &format!("{SITE}/basicPublishingCredentialsPolicies/ftp"),
            json!({ "properties": { "allow": false } }),
        );

        let remote = fetch(&arm, SITE).await.unwrap().unwrap();
        assert_eq!(remote.settings.config.always_on, Some(true));
        assert_eq!(remote.settings.app_settings["FOO"], "bar");
        assert!(remote.connection_strings.is_empty());
        assert_eq!(remote.credentials.publishing_password.as_deref(), Some("pwd"));
        assert!(!remote.ftp_basic_auth);
        assert!(remote.scm_basic_auth);
    }

    #[tokio::test]
    async fn name_availability() {
        let arm = FakeArm::default();
        check_name_available(&arm, "app").await.unwrap();

        arm.respond(
            Method::Post,
            &format!("/subscriptions/{SUBSCRIPTION_ID}/providers/Microsoft.Web/checknameavailability"),
            ArmResponse::ok(json!({ "nameAvailable": false, "message": "taken" })),
        );
        let err = check_name_available(&arm, "app").await.unwrap_err();
        assert!(err.to_string().contains("taken"));
    }

    #[tokio::test]
    async fn plan_checks() {
        let arm = FakeArm::default();
        let plan = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Web/serverFarms/plan";
        arm.seed(
            plan,
            json!({ "kind": "linux", "sku": { "tier": "Free" }, "properties": { "reserved": true } }),
        );
        check_plan::<Linux, _>(&arm, plan, false).await.unwrap();
        assert!(check_plan::<Linux, _>(&arm, plan, true).await.is_err());
        assert!(check_plan::<Windows, _>(&arm, plan, false).await.is_err());
    }

    #[tokio::test]
    async fn update_only_writes_changes() {
        let arm = FakeArm::default();
        arm.seed(SITE, json!({ "name": "app", "properties": {} }));
        let existing = fetch(&arm, SITE).await.unwrap().unwrap();

        let mut desired = DesiredSite {
            ftp_basic_auth: true,
            scm_basic_auth: true,
            ..Default::default()
        };
        update_site(&arm, SITE, existing.site.clone(), &desired, &existing, &[])
            .await
            .unwrap();
        assert_eq!(arm.count(Method::Put, SITE), 0);
        assert_eq!(arm.count(Method::Put, &format!("{SITE}/config/appsettings")), 0);
        assert_eq!(arm.count(Method::Put, &format!("{SITE}/config/web")), 0);

        desired.user_app_settings.insert("FOO".to_owned(), "bar".to_owned());
        desired.scm_basic_auth = false;
        update_site(&arm, SITE, existing.site.clone(), &desired, &existing, &[])
            .await
            .unwrap();
        assert_eq!(
            arm.last_body(Method::Put, &format!("{SITE}/config/appsettings")),
            Some(json!({ "properties": { "FOO": "bar" } }))
        );
        assert_eq!(
            arm.count(Method::Put, &format!("{SITE}/basicPublishingCredentialsPolicies/scm")),
            1
        );
        assert_eq!(
            arm.count(Method::Put, &format!("{SITE}/basicPublishingCredentialsPolicies/ftp")),
            0
        );
    }

    #[tokio::test]
    async fn delete_keeps_the_plan() {
        let arm = FakeArm::default();
        arm.seed(SITE, json!({ "name": "app" }));
        delete_site(&arm, SITE).await.unwrap();
        let request = arm.requests().pop().unwrap();
        assert_eq!(request.method, Method::Delete);
        assert!(request
            .query
            .contains(&("deleteEmptyServerFarm".to_owned(), "false".to_owned())));
        assert_eq!(arm.resource(SITE), None);
        // already gone
        delete_site(&arm, SITE).await.unwrap();
    }
}
