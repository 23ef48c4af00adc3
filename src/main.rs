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

use anyhow::Result;
use provider::AppServiceProvider;
use tf_provider::serve;

mod arm;
mod attributes;
mod certificate;
mod config;
mod error;
mod function_app;
mod function_app_slot;
mod hybrid_connection;
mod ids;
mod locks;
mod poll;
mod provider;
mod resource;
mod site;
mod source_control;
mod static_web_app;
mod timeouts;
mod utils;
mod validate;
mod web_app;
mod web_app_slot;

#[tokio::main]
async fn main() -> Result<()> {
    serve("appservice", AppServiceProvider::default()).await
}
