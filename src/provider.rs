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

use async_trait::async_trait;
use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{map, AttributePath, Diagnostics, Provider};

use crate::arm::ArmConnection;
use crate::certificate::AppServiceCertificate;
use crate::config::ProviderConfig;
use crate::function_app::FunctionApp;
use crate::function_app_slot::FunctionAppSlot;
use crate::hybrid_connection::{AppHybridConnection, FunctionAppReference, WebAppReference};
use crate::resource::AzureResource;
use crate::site::{Linux, Windows};
use crate::source_control::SourceControl;
use crate::static_web_app::StaticWebApp;
use crate::utils::{WithSchema, WithValidate};
use crate::web_app::WebApp;
use crate::web_app_slot::WebAppSlot;

/// Every resource shares the connection, which is only usable once the provider is configured
#[derive(Debug, Default, Clone)]
pub struct AppServiceProvider {
    connection: ArmConnection,
}

#[async_trait]
impl Provider for AppServiceProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProviderConfig::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        config.validate(diags, AttributePath::default());
        Some(())
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        tracing::debug!(terraform_version, "configuring provider");
        let settings = match config.resolve(|name| std::env::var(name).ok()) {
            Ok(settings) => settings,
            Err(err) => {
                diags.root_error("Invalid provider configuration", format!("{err:#}"));
                return None;
            }
        };
        if let Err(err) = self.connection.configure(settings).await {
            diags.root_error("Failed to connect to Azure", err.to_string());
            return None;
        }
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<std::collections::HashMap<String, Box<dyn tf_provider::DynamicResource>>>
    {
        let arm = &self.connection;
        Some(map! {
            "linux_web_app" => AzureResource(WebApp::<Linux>::new(arm.clone())),
            "windows_web_app" => AzureResource(WebApp::<Windows>::new(arm.clone())),
            "linux_web_app_slot" => AzureResource(WebAppSlot::<Linux>::new(arm.clone())),
            "windows_web_app_slot" => AzureResource(WebAppSlot::<Windows>::new(arm.clone())),
            "linux_function_app" => AzureResource(FunctionApp::<Linux>::new(arm.clone())),
            "windows_function_app" => AzureResource(FunctionApp::<Windows>::new(arm.clone())),
            "linux_function_app_slot" => AzureResource(FunctionAppSlot::<Linux>::new(arm.clone())),
            "windows_function_app_slot" => AzureResource(FunctionAppSlot::<Windows>::new(arm.clone())),
            "static_web_app" => AzureResource(StaticWebApp::new(arm.clone())),
            "web_app_hybrid_connection" => AzureResource(AppHybridConnection::<WebAppReference>::new(arm.clone())),
            "function_app_hybrid_connection" => AzureResource(AppHybridConnection::<FunctionAppReference>::new(arm.clone())),
            "source_control" => AzureResource(SourceControl::new(arm.clone())),
            "certificate" => AzureResource(AppServiceCertificate::new(arm.clone())),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<
        std::collections::HashMap<String, Box<dyn tf_provider::DynamicDataSource>>,
    > {
        Some(map! {})
    }
}

#[cfg(test)]
mod tests {
    use tf_provider::value::Value;

    use super::*;

    #[test]
    fn resources_are_registered_under_their_type_names() {
        let provider = AppServiceProvider::default();
        let mut diags = Diagnostics::default();
        let resources = provider.get_resources(&mut diags).unwrap();
        let mut names = resources.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "certificate",
                "function_app_hybrid_connection",
                "linux_function_app",
                "linux_function_app_slot",
                "linux_web_app",
                "linux_web_app_slot",
                "source_control",
                "static_web_app",
                "web_app_hybrid_connection",
                "windows_function_app",
                "windows_function_app_slot",
                "windows_web_app",
                "windows_web_app_slot",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_environment_is_rejected() {
        let provider = AppServiceProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            environment: Value::Value("mars".into()),
            ..Default::default()
        };
        assert_eq!(provider.validate(&mut diags, config).await, Some(()));
        assert_eq!(diags.errors.len(), 1);
    }
}
