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

//! Azure Resource Manager identifiers
//!
//! Every typed ID is parsed from the hierarchical `/key/value/...` form.
//! Keys are matched case-insensitively (ARM is not consistent in the casing it returns),
//! while [`Display`] always produces the canonical casing.

use std::fmt::Display;
use std::str::FromStr;

use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("parsing {input:?} as {kind}: expected an ID in the format {format:?}")]
    Format {
        kind: &'static str,
        input: String,
        format: &'static str,
    },
    #[error("parsing {input:?} as {kind}: the value following {segment:?} cannot be empty")]
    EmptySegment {
        kind: &'static str,
        input: String,
        segment: &'static str,
    },
}

/// Match `input` against the `keys` and collect the value that follows each key.
///
/// A key may span multiple path components (eg: `providers/Microsoft.Web/sites`).
pub fn parse_segments(
    kind: &'static str,
    format: &'static str,
    input: &str,
    keys: &[&'static str],
) -> Result<Vec<String>, IdError> {
    let format_error = || IdError::Format {
        kind,
        input: input.to_owned(),
        format,
    };

    let mut parts = input.strip_prefix('/').ok_or_else(format_error)?.split('/');
    let mut values = Vec::with_capacity(keys.len());

    for key in keys {
        for key_part in key.split('/') {
            match parts.next() {
                Some(part) if part.eq_ignore_ascii_case(key_part) => (),
                _ => return Err(format_error()),
            }
        }
        match parts.next() {
            Some("") => {
                return Err(IdError::EmptySegment {
                    kind,
                    input: input.to_owned(),
                    segment: key,
                })
            }
            Some(value) => values.push(value.to_owned()),
            None => return Err(format_error()),
        }
    }

    if parts.next().is_some() {
        return Err(format_error());
    }

    Ok(values)
}

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident { $($key:literal => $field:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            $(pub $field: String),+
        }

        impl $name {
            pub const FORMAT: &'static str =
                concat!($("/", $key, "/{", stringify!($field), "}"),+);

            pub fn new($($field: impl Into<String>),+) -> Self {
                Self {
                    $($field: $field.into()),+
                }
            }

            pub fn parse(input: &str) -> Result<Self, IdError> {
                let mut values =
                    parse_segments(stringify!($name), Self::FORMAT, input, &[$($key),+])?
                        .into_iter();
                Ok(Self {
                    $($field: values.next().unwrap_or_default()),+
                })
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                $(write!(f, "/{}/{}", $key, self.$field)?;)+
                Ok(())
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

resource_id! {
    ResourceGroupId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
    }
}

resource_id! {
    /// App Service Plan (a.k.a. server farm)
    ServicePlanId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Web/serverFarms" => server_farm_name,
    }
}

resource_id! {
    /// Web app or function app
    WebAppId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Web/sites" => site_name,
    }
}

resource_id! {
    WebAppSlotId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Web/sites" => site_name,
        "slots" => slot_name,
    }
}

resource_id! {
    SiteHybridConnectionId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Web/sites" => site_name,
        "hybridConnectionNamespaces" => namespace_name,
        "relays" => relay_name,
    }
}

resource_id! {
    SlotHybridConnectionId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Web/sites" => site_name,
        "slots" => slot_name,
        "hybridConnectionNamespaces" => namespace_name,
        "relays" => relay_name,
    }
}

resource_id! {
    RelayNamespaceId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Relay/namespaces" => namespace_name,
    }
}

resource_id! {
    /// Hybrid connection defined on an Azure Relay namespace
    RelayHybridConnectionId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Relay/namespaces" => namespace_name,
        "hybridConnections" => hybrid_connection_name,
    }
}

resource_id! {
    CertificateId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Web/certificates" => certificate_name,
    }
}

resource_id! {
    StaticSiteId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Web/staticSites" => static_site_name,
    }
}

resource_id! {
    KeyVaultId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.KeyVault/vaults" => vault_name,
    }
}

resource_id! {
    UserAssignedIdentityId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.ManagedIdentity/userAssignedIdentities" => identity_name,
    }
}

resource_id! {
    SubnetId {
        "subscriptions" => subscription_id,
        "resourceGroups" => resource_group_name,
        "providers/Microsoft.Network/virtualNetworks" => virtual_network_name,
        "subnets" => subnet_name,
    }
}

impl ServicePlanId {
    pub fn resource_group_id(&self) -> ResourceGroupId {
        ResourceGroupId::new(&self.subscription_id, &self.resource_group_name)
    }
}

impl WebAppId {
    pub fn slot(&self, slot_name: impl Into<String>) -> WebAppSlotId {
        WebAppSlotId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.site_name,
            slot_name,
        )
    }
}

impl WebAppSlotId {
    pub fn site_id(&self) -> WebAppId {
        WebAppId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.site_name,
        )
    }
}

/// Either a site or one of its deployment slots
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AppId {
    Site(WebAppId),
    Slot(WebAppSlotId),
}

impl AppId {
    pub const FORMAT: &'static str = "/subscriptions/{subscription_id}/resourceGroups/{resource_group_name}/providers/Microsoft.Web/sites/{site_name}[/slots/{slot_name}]";

    pub fn parse(input: &str) -> Result<Self, IdError> {
        if let Ok(slot) = WebAppSlotId::parse(input) {
            return Ok(AppId::Slot(slot));
        }
        match WebAppId::parse(input) {
            Ok(site) => Ok(AppId::Site(site)),
            Err(IdError::Format { .. }) => Err(IdError::Format {
                kind: "AppId",
                input: input.to_owned(),
                format: Self::FORMAT,
            }),
            Err(err) => Err(err),
        }
    }

    /// Site owning the app (the app itself when it is not a slot)
    pub fn site_id(&self) -> WebAppId {
        match self {
            AppId::Site(site) => site.clone(),
            AppId::Slot(slot) => slot.site_id(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        match self {
            AppId::Site(site) => &site.subscription_id,
            AppId::Slot(slot) => &slot.subscription_id,
        }
    }
}

impl Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppId::Site(site) => site.fmt(f),
            AppId::Slot(slot) => slot.fmt(f),
        }
    }
}

impl FromStr for AppId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Hybrid connection attached to a site or a slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HybridConnectionId {
    pub app: AppId,
    pub namespace_name: String,
    pub relay_name: String,
}

impl HybridConnectionId {
    pub const FORMAT: &'static str = "/subscriptions/{subscription_id}/resourceGroups/{resource_group_name}/providers/Microsoft.Web/sites/{site_name}[/slots/{slot_name}]/hybridConnectionNamespaces/{namespace_name}/relays/{relay_name}";

    pub fn new(app: AppId, namespace_name: impl Into<String>, relay_name: impl Into<String>) -> Self {
        Self {
            app,
            namespace_name: namespace_name.into(),
            relay_name: relay_name.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, IdError> {
        if let Ok(id) = SlotHybridConnectionId::parse(input) {
            let app = WebAppSlotId::new(
                id.subscription_id,
                id.resource_group_name,
                id.site_name,
                id.slot_name,
            );
            return Ok(Self::new(AppId::Slot(app), id.namespace_name, id.relay_name));
        }
        match SiteHybridConnectionId::parse(input) {
            Ok(id) => {
                let app = WebAppId::new(id.subscription_id, id.resource_group_name, id.site_name);
                Ok(Self::new(AppId::Site(app), id.namespace_name, id.relay_name))
            }
            Err(IdError::Format { .. }) => Err(IdError::Format {
                kind: "HybridConnectionId",
                input: input.to_owned(),
                format: Self::FORMAT,
            }),
            Err(err) => Err(err),
        }
    }
}

impl Display for HybridConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/hybridConnectionNamespaces/{}/relays/{}",
            self.app, self.namespace_name, self.relay_name
        )
    }
}

impl FromStr for HybridConnectionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Source control configuration of a site or a slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceControlId {
    pub app: AppId,
}

impl SourceControlId {
    const SUFFIX: &'static str = "/sourcecontrols/web";
    pub const FORMAT: &'static str = "/subscriptions/{subscription_id}/resourceGroups/{resource_group_name}/providers/Microsoft.Web/sites/{site_name}[/slots/{slot_name}]/sourcecontrols/web";

    pub fn new(app: AppId) -> Self {
        Self { app }
    }

    pub fn parse(input: &str) -> Result<Self, IdError> {
        let split = input.len().checked_sub(Self::SUFFIX.len());
        match split.and_then(|split| input.get(split..).map(|suffix| (split, suffix))) {
            Some((split, suffix)) if suffix.eq_ignore_ascii_case(Self::SUFFIX) => {
                let app = AppId::parse(&input[..split]).map_err(|err| match err {
                    IdError::Format { .. } => IdError::Format {
                        kind: "SourceControlId",
                        input: input.to_owned(),
                        format: Self::FORMAT,
                    },
                    err => err,
                })?;
                Ok(Self { app })
            }
            _ => Err(IdError::Format {
                kind: "SourceControlId",
                input: input.to_owned(),
                format: Self::FORMAT,
            }),
        }
    }
}

impl Display for SourceControlId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.app, Self::SUFFIX)
    }
}

impl FromStr for SourceControlId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Data-plane URL of a Key Vault secret, with or without version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyVaultSecretId {
    pub vault_base_url: String,
    pub name: String,
    pub version: Option<String>,
}

impl KeyVaultSecretId {
    pub const FORMAT: &'static str = "https://{vault_name}.{domain}/secrets/{name}[/{version}]";

    pub fn parse(input: &str) -> Result<Self, IdError> {
        let format_error = || IdError::Format {
            kind: "KeyVaultSecretId",
            input: input.to_owned(),
            format: Self::FORMAT,
        };
        let url = Url::parse(input).map_err(|_| format_error())?;
        if url.scheme() != "https" {
            return Err(format_error());
        }
        let host = url.host_str().ok_or_else(format_error)?;
        let vault_base_url = match url.port() {
            Some(port) => format!("https://{host}:{port}"),
            None => format!("https://{host}"),
        };

        let segments = url
            .path_segments()
            .ok_or_else(format_error)?
            .collect::<Vec<_>>();
        let (name, version) = match segments.as_slice() {
            ["secrets", name] | ["secrets", name, ""] => (*name, None),
            ["secrets", name, version] => (*name, Some(version.to_string())),
            _ => return Err(format_error()),
        };

        if name.is_empty() {
            return Err(IdError::EmptySegment {
                kind: "KeyVaultSecretId",
                input: input.to_owned(),
                segment: "secrets",
            });
        }

        Ok(Self {
            vault_base_url,
            name: name.to_string(),
            version,
        })
    }

    pub fn is_versionless(&self) -> bool {
        self.version.is_none()
    }
}

impl Display for KeyVaultSecretId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/secrets/{}", self.vault_base_url, self.name)?;
        if let Some(version) = &self.version {
            write!(f, "/{version}")?;
        }
        Ok(())
    }
}

impl FromStr for KeyVaultSecretId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
