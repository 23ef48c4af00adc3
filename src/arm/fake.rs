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

//! In-memory Resource Manager used by the resource tests
//!
//! Resources are stored by path (case-insensitively):
//! `PUT` stores the body, `PATCH` merges it, `GET` returns it and `DELETE` removes it with its children.
//! `POST {path}/list` returns what was stored at `{path}`, and an empty dictionary for unwritten `config/*`
//! (`POST {site}/listAppSettings` reads `{site}/config/appsettings`).
//! Scripted responses registered with [`FakeArm::respond`] take precedence.
//! Requests are logged when received and answered after their latency, so that concurrent callers interleave.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{classify, Arm, ArmRequest, ArmResponse, Method};
use crate::config::Environment;
use crate::error::ArmError;

pub const SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<String, Value>,
    scripted: HashMap<(Method, String), VecDeque<ArmResponse>>,
    requests: Vec<ArmRequest>,
    latency: Duration,
    delays: HashMap<(Method, String), Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeArm {
    state: Arc<Mutex<State>>,
}

fn key(path: &str) -> String {
    path.to_ascii_lowercase()
}

fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (k, v) in patch {
                match target.get_mut(k) {
                    Some(existing) if v.is_object() => merge(existing, v),
                    _ => {
                        target.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

impl FakeArm {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Store a resource as if it had been created out of band
    pub fn seed(&self, path: &str, mut body: Value) {
        if let Value::Object(object) = &mut body {
            object
                .entry("id")
                .or_insert_with(|| Value::String(path.to_owned()));
        }
        self.lock().resources.insert(key(path), body);
    }

    pub fn resource(&self, path: &str) -> Option<Value> {
        self.lock().resources.get(&key(path)).cloned()
    }

    pub fn remove(&self, path: &str) {
        let prefix = key(path);
        self.lock()
            .resources
            .retain(|k, _| k != &prefix && !k.starts_with(&format!("{prefix}/")));
    }

    /// Answer every `method path` request with `response`
    pub fn respond(&self, method: Method, path: &str, response: ArmResponse) {
        self.lock()
            .scripted
            .insert((method, key(path)), VecDeque::from([response]));
    }

    /// Answer successive `method path` requests with `responses`, the last one being repeated
    pub fn respond_sequence(&self, method: Method, path: &str, responses: Vec<ArmResponse>) {
        self.lock()
            .scripted
            .insert((method, key(path)), responses.into());
    }

    /// Delay every answer by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Delay the answers to `method path` by `delay`, instead of the common latency
    pub fn delay(&self, method: Method, path: &str, delay: Duration) {
        self.lock().delays.insert((method, key(path)), delay);
    }

    pub fn requests(&self) -> Vec<ArmRequest> {
        self.lock().requests.clone()
    }

    /// Number of `method path` requests received
    pub fn count(&self, method: Method, path: &str) -> usize {
        let path = key(path);
        self.lock()
            .requests
            .iter()
            .filter(|request| request.method == method && key(&request.path) == path)
            .count()
    }

    /// Body of the last `method path` request
    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        let path = key(path);
        self.lock()
            .requests
            .iter()
            .rev()
            .find(|request| request.method == method && key(&request.path) == path)
            .and_then(|request| request.body.clone())
    }

    fn handle(state: &mut State, request: &ArmRequest) -> Result<ArmResponse, ArmError> {
        let path = key(&request.path);
        if let Some(responses) = state.scripted.get_mut(&(request.method, path.clone())) {
            let response = if responses.len() > 1 {
                responses.pop_front()
            } else {
                responses.front().cloned()
            };
            if let Some(response) = response {
                if !(200..300).contains(&response.status) {
                    return Err(classify(&request.path, response.status, &response.body));
                }
                return Ok(response);
            }
        }

        let not_found = || classify(&request.path, 404, &Value::Null);
        match request.method {
            Method::Get => {
                if let Some(stored) = state.resources.get(&path) {
                    return Ok(ArmResponse::ok(stored.clone()));
                }
                // ARM serves `config/web` from the site itself until it is written
                let site = path
                    .strip_suffix("/config/web")
                    .and_then(|site| state.resources.get(site))
                    .ok_or_else(not_found)?;
                let config = site
                    .pointer("/properties/siteConfig")
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                Ok(ArmResponse::ok(json!({ "properties": config })))
            }
            Method::Put => {
                let mut body = request.body.clone().unwrap_or_else(|| json!({}));
                if let Value::Object(object) = &mut body {
                    object.insert("id".to_owned(), Value::String(request.path.clone()));
                    if let Some(name) = request.path.rsplit('/').next() {
                        object
                            .entry("name")
                            .or_insert_with(|| Value::String(name.to_owned()));
                    }
                }
                state.resources.insert(path, body.clone());
                Ok(ArmResponse::ok(body))
            }
            Method::Patch => {
                let existing = state.resources.get_mut(&path).ok_or_else(not_found)?;
                if let Some(body) = &request.body {
                    merge(existing, body);
                }
                Ok(ArmResponse::ok(existing.clone()))
            }
            Method::Post => {
                if let Some(parent) = path.strip_suffix("/list") {
                    if let Some(stored) = state.resources.get(parent) {
                        return Ok(ArmResponse::ok(stored.clone()));
                    }
                    if parent.contains("/config/") {
                        return Ok(ArmResponse::ok(json!({"properties": {}})));
                    }
                }
                if let Some(site) = path.strip_suffix("/listappsettings") {
                    let stored = state.resources.get(&format!("{site}/config/appsettings"));
                    return Ok(ArmResponse::ok(
                        stored.cloned().unwrap_or_else(|| json!({"properties": {}})),
                    ));
                }
                if path.ends_with("/providers/microsoft.web/checknameavailability") {
                    return Ok(ArmResponse::ok(json!({"nameAvailable": true})));
                }
                Err(not_found())
            }
            Method::Delete => {
                if state.resources.remove(&path).is_none() {
                    return Err(not_found());
                }
                let prefix = format!("{path}/");
                state.resources.retain(|k, _| !k.starts_with(&prefix));
                Ok(ArmResponse {
                    status: 200,
                    ..Default::default()
                })
            }
        }
    }
}

#[async_trait]
impl Arm for FakeArm {
    async fn subscription_id(&self) -> Result<String, ArmError> {
        Ok(SUBSCRIPTION_ID.to_owned())
    }

    async fn environment(&self) -> Result<Environment, ArmError> {
        Ok(Environment::Public)
    }

    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError> {
        let delay = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            state
                .delays
                .get(&(request.method, key(&request.path)))
                .copied()
                .unwrap_or(state.latency)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Self::handle(&mut self.lock(), &request)
    }
}
