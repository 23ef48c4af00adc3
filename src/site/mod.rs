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

//! Building blocks shared by web apps, slots and function apps

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};
use tf_provider::schema::Block;
use tf_provider::{AttributePath, Diagnostics};

use crate::arm::models::{AppServicePlan, SiteConfig};

pub mod ops;
pub mod settings;
pub mod stack;
pub mod state;

pub use stack::{LinuxFunctionStack, LinuxWebStack, WindowsFunctionStack, WindowsWebStack};
pub use state::SiteArgs;

/// Site configuration as stored remotely, spread over several ARM endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteSettings {
    /// `config/web`
    pub config: SiteConfig,
    /// `config/appsettings`
    pub app_settings: BTreeMap<String, String>,
    /// `config/metadata`
    pub metadata: BTreeMap<String, String>,
}

/// Runtime selection of an app (`application_stack` block)
pub trait Stack:
    Serialize + DeserializeOwned + Clone + Default + PartialEq + Debug + Send + Sync + 'static
{
    /// App settings owned by the stack, hidden from `app_settings`
    const MANAGED_SETTINGS: &'static [&'static str];

    fn block() -> Block;

    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);

    /// Fill the defaults of the planned stack
    fn normalize(&mut self) {}

    /// Write the stack into the remote configuration
    fn expand(&self, settings: &mut SiteSettings);

    /// Read the stack back, `None` when no stack is configured
    fn flatten(settings: &SiteSettings) -> Option<Self>;
}

/// Operating system of the App Service plan hosting an app
pub trait SiteOs: Send + Sync + Clone + Copy + Debug + Default + PartialEq + 'static {
    const NAME: &'static str;
    /// `reserved` flag of the sites and plans
    const RESERVED: bool;
    const USE_32_BIT_WORKER: bool;
    const WEB_KIND: &'static str;
    const FUNCTION_KIND: &'static str;
    const WEB_APP: &'static str;
    const WEB_APP_SLOT: &'static str;
    const FUNCTION_APP: &'static str;
    const FUNCTION_APP_SLOT: &'static str;

    type WebStack: Stack;
    type FunctionStack: Stack;

    fn hosts(plan: &AppServicePlan) -> bool {
        let linux = plan.properties.reserved.unwrap_or(false)
            || plan
                .kind
                .as_deref()
                .map_or(false, |kind| kind.to_ascii_lowercase().contains("linux"));
        linux == Self::RESERVED
    }

    fn is_site(kind: Option<&str>, reserved: Option<bool>) -> bool {
        let linux = reserved.unwrap_or(false)
            || kind.map_or(false, |kind| kind.to_ascii_lowercase().contains("linux"));
        linux == Self::RESERVED
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Linux;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Windows;

impl SiteOs for Linux {
    const NAME: &'static str = "Linux";
    const RESERVED: bool = true;
    const USE_32_BIT_WORKER: bool = false;
    const WEB_KIND: &'static str = "app,linux";
    const FUNCTION_KIND: &'static str = "functionapp,linux";
    const WEB_APP: &'static str = "linux_web_app";
    const WEB_APP_SLOT: &'static str = "linux_web_app_slot";
    const FUNCTION_APP: &'static str = "linux_function_app";
    const FUNCTION_APP_SLOT: &'static str = "linux_function_app_slot";

    type WebStack = LinuxWebStack;
    type FunctionStack = LinuxFunctionStack;
}

impl SiteOs for Windows {
    const NAME: &'static str = "Windows";
    const RESERVED: bool = false;
    const USE_32_BIT_WORKER: bool = true;
    const WEB_KIND: &'static str = "app";
    const FUNCTION_KIND: &'static str = "functionapp";
    const WEB_APP: &'static str = "windows_web_app";
    const WEB_APP_SLOT: &'static str = "windows_web_app_slot";
    const FUNCTION_APP: &'static str = "windows_function_app";
    const FUNCTION_APP_SLOT: &'static str = "windows_function_app_slot";

    type WebStack = WindowsWebStack;
    type FunctionStack = WindowsFunctionStack;
}

#[cfg(test)]
mod tests {
    use crate::arm::models::AppServicePlanProperties;

    use super::*;

    #[test]
    fn plan_os() {
        let linux = AppServicePlan {
            kind: Some("linux".to_owned()),
            properties: AppServicePlanProperties {
                reserved: Some(true),
            },
            ..Default::default()
        };
        let windows = AppServicePlan {
            kind: Some("app".to_owned()),
            ..Default::default()
        };
        assert!(Linux::hosts(&linux));
        assert!(!Linux::hosts(&windows));
        assert!(Windows::hosts(&windows));
        assert!(!Windows::hosts(&linux));

        assert!(Linux::is_site(Some("app,linux"), None));
        assert!(Windows::is_site(Some("app"), Some(false)));
        assert!(!Windows::is_site(Some("functionapp,linux"), Some(true)));
    }
}
