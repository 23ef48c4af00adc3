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

//! `application_stack` blocks
//!
//! Linux apps select their runtime with `linuxFxVersion` (`STACK|VERSION`),
//! Windows apps with dedicated site config fields and the `CURRENT_STACK` metadata.
//! Function apps also carry the runtime in `FUNCTIONS_WORKER_RUNTIME`.

use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description};
use tf_provider::value::{Value, ValueBool, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use super::{SiteSettings, Stack};
use crate::attributes::{defaulted, optional_string, sensitive};
use crate::utils::{known, string};

pub const DOCKER_REGISTRY_SERVER_URL: &str = "DOCKER_REGISTRY_SERVER_URL";
pub const DOCKER_REGISTRY_SERVER_USERNAME: &str = "DOCKER_REGISTRY_SERVER_USERNAME";
pub const DOCKER_REGISTRY_SERVER_PASSWORD: &str = "DOCKER_REGISTRY_SERVER_PASSWORD";
pub const WEBSITE_NODE_DEFAULT_VERSION: &str = "WEBSITE_NODE_DEFAULT_VERSION";
pub const FUNCTIONS_WORKER_RUNTIME: &str = "FUNCTIONS_WORKER_RUNTIME";
pub const CURRENT_STACK: &str = "CURRENT_STACK";

/// Report an error when more than one runtime is selected
fn at_most_one(diags: &mut Diagnostics, attr_path: &AttributePath, fields: &[(&str, bool)]) {
    let set: Vec<&str> = fields
        .iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| *name)
        .collect();
    if set.len() > 1 {
        diags.error(
            "Conflicting application stacks",
            format!("Only one of {set:?} can be set"),
            attr_path.clone(),
        );
    }
}

fn is_true(value: &ValueBool) -> bool {
    matches!(value, Value::Value(true))
}

/// Split a `STACK|VERSION` fx version
fn split_fx(fx: Option<&str>) -> Option<(String, &str)> {
    let (kind, version) = fx?.split_once('|')?;
    Some((kind.to_ascii_uppercase(), version))
}

/// Host part of a registry URL, as it appears in the docker image reference
fn registry_host(url: &str) -> &str {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LinuxWebStack {
    pub docker_image_name: ValueString<'static>,
    pub docker_registry_url: ValueString<'static>,
    pub docker_registry_username: ValueString<'static>,
    pub docker_registry_password: ValueString<'static>,
    pub dotnet_version: ValueString<'static>,
    pub go_version: ValueString<'static>,
    pub java_version: ValueString<'static>,
    pub node_version: ValueString<'static>,
    pub php_version: ValueString<'static>,
    pub python_version: ValueString<'static>,
}

impl Stack for LinuxWebStack {
    const MANAGED_SETTINGS: &'static [&'static str] = &[
        DOCKER_REGISTRY_SERVER_URL,
        DOCKER_REGISTRY_SERVER_USERNAME,
        DOCKER_REGISTRY_SERVER_PASSWORD,
    ];

    fn block() -> Block {
        Block {
            attributes: map! {
                "docker_image_name" => optional_string("Docker image and tag, without the registry (eg: `nginx:latest`)"),
                "docker_registry_url" => optional_string("URL of the docker registry (eg: `https://myregistry.azurecr.io`)"),
                "docker_registry_username" => optional_string("User name of the docker registry"),
                "docker_registry_password" => sensitive(optional_string("Password of the docker registry")),
                "dotnet_version" => optional_string(".NET version (eg: `8.0`)"),
                "go_version" => optional_string("Go version (eg: `1.19`)"),
                "java_version" => optional_string("Java version (eg: `17-java17`)"),
                "node_version" => optional_string("Node.js version (eg: `20-lts`)"),
                "php_version" => optional_string("PHP version (eg: `8.2`)"),
                "python_version" => optional_string("Python version (eg: `3.12`)"),
            },
            description: Description::plain("Runtime of the app, at most one runtime can be selected"),
            ..Default::default()
        }
    }

    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        at_most_one(
            diags,
            &attr_path,
            &[
                ("docker_image_name", !self.docker_image_name.is_null()),
                ("dotnet_version", !self.dotnet_version.is_null()),
                ("go_version", !self.go_version.is_null()),
                ("java_version", !self.java_version.is_null()),
                ("node_version", !self.node_version.is_null()),
                ("php_version", !self.php_version.is_null()),
                ("python_version", !self.python_version.is_null()),
            ],
        );
        if self.docker_image_name.is_null() {
            for (name, value) in [
                ("docker_registry_url", &self.docker_registry_url),
                ("docker_registry_username", &self.docker_registry_username),
                ("docker_registry_password", &self.docker_registry_password),
            ] {
                if !value.is_null() {
                    diags.error(
                        "Missing docker image",
                        format!("`{name}` requires `docker_image_name`"),
                        attr_path.clone().attribute(name),
                    );
                }
            }
        }
    }

    fn expand(&self, settings: &mut SiteSettings) {
        let fx = if let Some(image) = known(&self.docker_image_name) {
            let url = known(&self.docker_registry_url);
            for (key, value) in [
                (DOCKER_REGISTRY_SERVER_URL, url.clone()),
                (DOCKER_REGISTRY_SERVER_USERNAME, known(&self.docker_registry_username)),
                (DOCKER_REGISTRY_SERVER_PASSWORD, known(&self.docker_registry_password)),
            ] {
                if let Some(value) = value {
                    settings.app_settings.insert(key.to_owned(), value);
                }
            }
            match url.as_deref().map(registry_host) {
                Some(host) if !host.is_empty() => format!("DOCKER|{host}/{image}"),
                _ => format!("DOCKER|{image}"),
            }
        } else if let Some(version) = known(&self.dotnet_version) {
            format!("DOTNETCORE|{version}")
        } else if let Some(version) = known(&self.go_version) {
            format!("GO|{version}")
        } else if let Some(version) = known(&self.java_version) {
            format!("JAVA|{version}")
        } else if let Some(version) = known(&self.node_version) {
            format!("NODE|{version}")
        } else if let Some(version) = known(&self.php_version) {
            format!("PHP|{version}")
        } else if let Some(version) = known(&self.python_version) {
            format!("PYTHON|{version}")
        } else {
            String::new()
        };
        settings.config.linux_fx_version = Some(fx);
    }

    fn flatten(settings: &SiteSettings) -> Option<Self> {
        let (kind, version) = split_fx(settings.config.linux_fx_version.as_deref())?;
        let mut stack = Self::default();
        match kind.as_str() {
            "DOCKER" => {
                let url = settings.app_settings.get(DOCKER_REGISTRY_SERVER_URL);
                let image = url
                    .map(|url| registry_host(url))
                    .filter(|host| !host.is_empty())
                    .and_then(|host| version.strip_prefix(&format!("{host}/")))
                    .unwrap_or(version);
                stack.docker_image_name = string(Some(image));
                stack.docker_registry_url = string(url.cloned());
                stack.docker_registry_username =
                    string(settings.app_settings.get(DOCKER_REGISTRY_SERVER_USERNAME).cloned());
                stack.docker_registry_password =
                    string(settings.app_settings.get(DOCKER_REGISTRY_SERVER_PASSWORD).cloned());
            }
            "DOTNETCORE" | "DOTNET" => stack.dotnet_version = string(Some(version)),
            "GO" => stack.go_version = string(Some(version)),
            "JAVA" => stack.java_version = string(Some(version)),
            "NODE" => stack.node_version = string(Some(version)),
            "PHP" => stack.php_version = string(Some(version)),
            "PYTHON" => stack.python_version = string(Some(version)),
            _ => return None,
        }
        Some(stack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WindowsWebStack {
    pub current_stack: ValueString<'static>,
    pub dotnet_version: ValueString<'static>,
    pub java_version: ValueString<'static>,
    pub node_version: ValueString<'static>,
    pub php_version: ValueString<'static>,
    pub python: ValueBool,
}

impl WindowsWebStack {
    /// Stack selected by the configured runtime
    fn inferred_stack(&self) -> Option<&'static str> {
        if self.dotnet_version.is_value() {
            Some("dotnet")
        } else if self.java_version.is_value() {
            Some("java")
        } else if self.node_version.is_value() {
            Some("node")
        } else if self.php_version.is_value() {
            Some("php")
        } else if is_true(&self.python) {
            Some("python")
        } else {
            None
        }
    }
}

impl Stack for WindowsWebStack {
    const MANAGED_SETTINGS: &'static [&'static str] = &[WEBSITE_NODE_DEFAULT_VERSION];

    fn block() -> Block {
        Block {
            attributes: map! {
                "current_stack" => defaulted(AttributeType::String, "Stack shown in the portal: `dotnet`, `dotnetcore`, `java`, `node`, `php` or `python`"),
                "dotnet_version" => optional_string(".NET version (eg: `v8.0`)"),
                "java_version" => optional_string("Java version (eg: `17`)"),
                "node_version" => optional_string("Node.js version (eg: `~20`)"),
                "php_version" => optional_string("PHP version (eg: `8.2`)"),
                "python" => defaulted(AttributeType::Bool, "Whether the app runs Python, defaults to `false`"),
            },
            description: Description::plain("Runtime of the app"),
            ..Default::default()
        }
    }

    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        crate::validate::one_of(
            diags,
            attr_path.clone().attribute("current_stack"),
            &self.current_stack,
            &["dotnet", "dotnetcore", "java", "node", "php", "python"],
        );
        at_most_one(
            diags,
            &attr_path,
            &[
                ("java_version", !self.java_version.is_null()),
                ("node_version", !self.node_version.is_null()),
                ("php_version", !self.php_version.is_null()),
                ("python", is_true(&self.python)),
            ],
        );
    }

    fn normalize(&mut self) {
        if self.python.is_null() {
            self.python = Value::Value(false);
        }
        if self.current_stack.is_null() {
            self.current_stack = string(self.inferred_stack());
        }
    }

    fn expand(&self, settings: &mut SiteSettings) {
        if let Some(stack) = known(&self.current_stack).or(self.inferred_stack().map(str::to_owned)) {
            settings.metadata.insert(CURRENT_STACK.to_owned(), stack);
        }
        if let Some(version) = known(&self.dotnet_version) {
            settings.config.net_framework_version = Some(version);
        }
        if let Some(version) = known(&self.java_version) {
            settings.config.java_version = Some(version);
        }
        if let Some(version) = known(&self.php_version) {
            settings.config.php_version = Some(version);
        }
        if let Some(version) = known(&self.node_version) {
            settings
                .app_settings
                .insert(WEBSITE_NODE_DEFAULT_VERSION.to_owned(), version);
        }
    }

    fn flatten(settings: &SiteSettings) -> Option<Self> {
        let current_stack = settings.metadata.get(CURRENT_STACK)?;
        let config = &settings.config;
        Some(Self {
            current_stack: string(Some(current_stack.clone())),
            dotnet_version: string(
                config
                    .net_framework_version
                    .clone()
                    .filter(|_| current_stack.starts_with("dotnet")),
            ),
            java_version: string(config.java_version.clone().filter(|_| current_stack == "java")),
            node_version: string(
                settings
                    .app_settings
                    .get(WEBSITE_NODE_DEFAULT_VERSION)
                    .cloned()
                    .filter(|_| current_stack == "node"),
            ),
            php_version: string(
                config
                    .php_version
                    .clone()
                    .filter(|version| current_stack == "php" && version != "Off"),
            ),
            python: Value::Value(current_stack == "python"),
        })
    }
}

/// Value of `FUNCTIONS_WORKER_RUNTIME`
fn worker_runtime(use_custom: &ValueBool, isolated: &ValueBool, set: &[(&'static str, bool)]) -> Option<&'static str> {
    if is_true(use_custom) {
        return Some("custom");
    }
    let runtime = set.iter().find(|(_, set)| *set).map(|(runtime, _)| *runtime)?;
    if runtime == "dotnet" && is_true(isolated) {
        Some("dotnet-isolated")
    } else {
        Some(runtime)
    }
}

fn function_block(mut block: Block) -> Block {
    block.attributes.insert(
        "use_dotnet_isolated_runtime".to_owned(),
        defaulted(AttributeType::Bool, "Whether .NET runs in an isolated worker process, defaults to `false`"),
    );
    block.attributes.insert(
        "use_custom_runtime".to_owned(),
        defaulted(AttributeType::Bool, "Whether the app uses a custom handler, defaults to `false`"),
    );
    block.description = Description::plain("Runtime of the function app, at most one runtime can be selected");
    block
}

fn normalize_function_flags(isolated: &mut ValueBool, custom: &mut ValueBool) {
    for flag in [isolated, custom] {
        if flag.is_null() {
            *flag = Value::Value(false);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LinuxFunctionStack {
    pub dotnet_version: ValueString<'static>,
    pub use_dotnet_isolated_runtime: ValueBool,
    pub java_version: ValueString<'static>,
    pub node_version: ValueString<'static>,
    pub python_version: ValueString<'static>,
    pub powershell_core_version: ValueString<'static>,
    pub use_custom_runtime: ValueBool,
}

impl LinuxFunctionStack {
    fn runtimes(&self) -> [(&'static str, bool); 5] {
        [
            ("dotnet", !self.dotnet_version.is_null()),
            ("java", !self.java_version.is_null()),
            ("node", !self.node_version.is_null()),
            ("python", !self.python_version.is_null()),
            ("powershell", !self.powershell_core_version.is_null()),
        ]
    }
}

impl Stack for LinuxFunctionStack {
    const MANAGED_SETTINGS: &'static [&'static str] = &[FUNCTIONS_WORKER_RUNTIME];

    fn block() -> Block {
        function_block(Block {
            attributes: map! {
                "dotnet_version" => optional_string(".NET version (eg: `8.0`)"),
                "java_version" => optional_string("Java version (eg: `17`)"),
                "node_version" => optional_string("Node.js version (eg: `20`)"),
                "python_version" => optional_string("Python version (eg: `3.11`)"),
                "powershell_core_version" => optional_string("PowerShell Core version (eg: `7.2`)"),
            },
            ..Default::default()
        })
    }

    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        let mut runtimes = self.runtimes().to_vec();
        runtimes.push(("use_custom_runtime", is_true(&self.use_custom_runtime)));
        at_most_one(diags, &attr_path, &runtimes);
    }

    fn normalize(&mut self) {
        normalize_function_flags(
            &mut self.use_dotnet_isolated_runtime,
            &mut self.use_custom_runtime,
        );
    }

    fn expand(&self, settings: &mut SiteSettings) {
        let runtime = worker_runtime(
            &self.use_custom_runtime,
            &self.use_dotnet_isolated_runtime,
            &self.runtimes(),
        );
        let version = [
            &self.dotnet_version,
            &self.java_version,
            &self.node_version,
            &self.python_version,
            &self.powershell_core_version,
        ]
        .into_iter()
        .find_map(known);
        let fx = match (runtime, version) {
            (Some("custom"), _) | (None, _) | (_, None) => String::new(),
            (Some(runtime), Some(version)) => {
                format!("{}|{version}", runtime.to_ascii_uppercase())
            }
        };
        settings.config.linux_fx_version = Some(fx);
        if let Some(runtime) = runtime {
            settings
                .app_settings
                .insert(FUNCTIONS_WORKER_RUNTIME.to_owned(), runtime.to_owned());
        }
    }

    fn flatten(settings: &SiteSettings) -> Option<Self> {
        let runtime = settings.app_settings.get(FUNCTIONS_WORKER_RUNTIME)?;
        let version = split_fx(settings.config.linux_fx_version.as_deref())
            .map(|(_, version)| version.to_owned());
        let mut stack = Self {
            use_dotnet_isolated_runtime: Value::Value(runtime == "dotnet-isolated"),
            use_custom_runtime: Value::Value(runtime == "custom"),
            ..Default::default()
        };
        match runtime.as_str() {
            "dotnet" | "dotnet-isolated" => stack.dotnet_version = string(version),
            "java" => stack.java_version = string(version),
            "node" => stack.node_version = string(version),
            "python" => stack.python_version = string(version),
            "powershell" => stack.powershell_core_version = string(version),
            _ => (),
        }
        Some(stack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WindowsFunctionStack {
    pub dotnet_version: ValueString<'static>,
    pub use_dotnet_isolated_runtime: ValueBool,
    pub java_version: ValueString<'static>,
    pub node_version: ValueString<'static>,
    pub powershell_core_version: ValueString<'static>,
    pub use_custom_runtime: ValueBool,
}

impl WindowsFunctionStack {
    fn runtimes(&self) -> [(&'static str, bool); 4] {
        [
            ("dotnet", !self.dotnet_version.is_null()),
            ("java", !self.java_version.is_null()),
            ("node", !self.node_version.is_null()),
            ("powershell", !self.powershell_core_version.is_null()),
        ]
    }
}

impl Stack for WindowsFunctionStack {
    const MANAGED_SETTINGS: &'static [&'static str] =
        &[FUNCTIONS_WORKER_RUNTIME, WEBSITE_NODE_DEFAULT_VERSION];

    fn block() -> Block {
        function_block(Block {
            attributes: map! {
                "dotnet_version" => optional_string(".NET version (eg: `v8.0`)"),
                "java_version" => optional_string("Java version (eg: `17`)"),
                "node_version" => optional_string("Node.js version (eg: `~20`)"),
                "powershell_core_version" => optional_string("PowerShell Core version (eg: `7.2`)"),
            },
            ..Default::default()
        })
    }

    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        let mut runtimes = self.runtimes().to_vec();
        runtimes.push(("use_custom_runtime", is_true(&self.use_custom_runtime)));
        at_most_one(diags, &attr_path, &runtimes);
    }

    fn normalize(&mut self) {
        normalize_function_flags(
            &mut self.use_dotnet_isolated_runtime,
            &mut self.use_custom_runtime,
        );
    }

    fn expand(&self, settings: &mut SiteSettings) {
        let runtime = worker_runtime(
            &self.use_custom_runtime,
            &self.use_dotnet_isolated_runtime,
            &self.runtimes(),
        );
        if let Some(runtime) = runtime {
            settings
                .app_settings
                .insert(FUNCTIONS_WORKER_RUNTIME.to_owned(), runtime.to_owned());
        }
        if let Some(version) = known(&self.dotnet_version) {
            settings.config.net_framework_version = Some(version);
        }
        if let Some(version) = known(&self.java_version) {
            settings.config.java_version = Some(version);
        }
        if let Some(version) = known(&self.powershell_core_version) {
            settings.config.power_shell_version = Some(version);
        }
        if let Some(version) = known(&self.node_version) {
            settings
                .app_settings
                .insert(WEBSITE_NODE_DEFAULT_VERSION.to_owned(), version);
        }
    }

    fn flatten(settings: &SiteSettings) -> Option<Self> {
        let runtime = settings.app_settings.get(FUNCTIONS_WORKER_RUNTIME)?;
        let config = &settings.config;
        let mut stack = Self {
            use_dotnet_isolated_runtime: Value::Value(runtime == "dotnet-isolated"),
            use_custom_runtime: Value::Value(runtime == "custom"),
            ..Default::default()
        };
        match runtime.as_str() {
            "dotnet" | "dotnet-isolated" => {
                stack.dotnet_version = string(config.net_framework_version.clone())
            }
            "java" => stack.java_version = string(config.java_version.clone()),
            "node" => {
                stack.node_version =
                    string(settings.app_settings.get(WEBSITE_NODE_DEFAULT_VERSION).cloned())
            }
            "powershell" => stack.powershell_core_version = string(config.power_shell_version.clone()),
            _ => (),
        }
        Some(stack)
    }
}
