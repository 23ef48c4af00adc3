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

//! Attribute validators
//!
//! Validators only look at known values: null and unknown values are accepted silently.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tf_provider::value::{Value, ValueMap, ValueNumber, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::ids::IdError;

/// App Service names end up in `{name}.azurewebsites.net`
pub fn web_app_name(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueString) {
    if let Value::Value(name) = value {
        if let Err(reason) = check_dns_label(name, 2, 60) {
            diags.error(
                "Invalid name",
                format!("{name:?} {reason}"),
                attr_path,
            );
        }
    }
}

pub fn static_site_name(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueString) {
    if let Value::Value(name) = value {
        if let Err(reason) = check_dns_label(name, 1, 40) {
            diags.error(
                "Invalid name",
                format!("{name:?} {reason}"),
                attr_path,
            );
        }
    }
}

fn check_dns_label(name: &str, min: usize, max: usize) -> Result<(), String> {
    if name.len() < min || name.len() > max {
        return Err(format!("must be between {min} and {max} characters long"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err("may only contain alphanumeric characters and hyphens".to_owned());
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err("cannot start or end with a hyphen".to_owned());
    }
    Ok(())
}

pub fn hostname(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueString) {
    if let Value::Value(host) = value {
        let valid = !host.is_empty()
            && host.len() <= 253
            && host.split('.').all(|label| check_dns_label(label, 1, 63).is_ok());
        if !valid {
            diags.error(
                "Invalid hostname",
                format!("{host:?} is not a valid hostname (expected eg: `db.internal.example.com`)"),
                attr_path,
            );
        }
    }
}

pub fn port(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueNumber) {
    if let Value::Value(port) = value {
        if !(1..=65535).contains(port) {
            diags.error(
                "Invalid port",
                format!("Port must be between 1 and 65535, but was {port}."),
                attr_path,
            );
        }
    }
}

/// User app settings cannot be empty nor collide with the settings managed by other attributes
pub fn app_settings(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueMap<'_, ValueString<'_>>,
    managed: &[(&str, &str)],
) {
    if let Value::Value(settings) = value {
        for name in settings.keys() {
            if name.trim().is_empty() {
                diags.error_short("App setting names cannot be empty", attr_path.clone());
                continue;
            }
            if let Some((key, attribute)) = managed
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
            {
                diags.error(
                    format!("App setting `{key}` is managed by the provider"),
                    format!("Use the `{attribute}` attribute instead of setting `{key}` directly."),
                    attr_path.clone().key(name.to_string()),
                );
            }
        }
    }
}

/// Shared access policy names of Azure Relay
pub fn relay_key_name(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueString) {
    if let Value::Value(name) = value {
        let valid = !name.is_empty()
            && name.len() <= 256
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            diags.error(
                "Invalid key name",
                format!("{name:?} must be 1 to 256 characters among letters, digits, `-`, `_` and `.`"),
                attr_path,
            );
        }
    }
}

pub fn base64(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueString) {
    if let Value::Value(content) = value {
        if let Err(err) = STANDARD.decode(content.as_bytes()) {
            diags.error("Invalid base64 content", format!("{err}"), attr_path);
        }
    }
}

/// Git branch name
pub fn branch(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueString) {
    if let Value::Value(branch) = value {
        if branch.is_empty() || branch.chars().any(char::is_whitespace) || branch.contains("..") {
            diags.error(
                "Invalid branch",
                format!("{branch:?} is not a valid branch name"),
                attr_path,
            );
        }
    }
}

pub fn one_of(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueString,
    allowed: &[&str],
) {
    if let Value::Value(value) = value {
        if !allowed.contains(&&**value) {
            diags.error(
                "Invalid value",
                format!("{value:?} must be one of {allowed:?}"),
                attr_path,
            );
        }
    }
}

pub fn not_empty(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueString) {
    if let Value::Value(value) = value {
        if value.trim().is_empty() {
            diags.error_short("Value cannot be empty", attr_path);
        }
    }
}

/// Check an attribute holds a well-formed ID of the given kind
pub fn id<T>(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueString,
    parse: impl FnOnce(&str) -> Result<T, IdError>,
) {
    if let Value::Value(id) = value {
        if let Err(err) = parse(&**id) {
            diags.error("Invalid ID", format!("{err}"), attr_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::collections::BTreeMap;

    use crate::ids::WebAppId;

    use super::*;

    fn check(f: impl FnOnce(&mut Diagnostics, AttributePath, &ValueString), value: &str) -> usize {
        let mut diags = Diagnostics::default();
        f(&mut diags, AttributePath::new("attr"), &Value::from(value));
        diags.errors.len()
    }

    #[test]
    fn names() {
        assert_eq!(check(web_app_name, "my-app-01"), 0);
        assert_eq!(check(web_app_name, "a"), 1);
        assert_eq!(check(web_app_name, "-app"), 1);
        assert_eq!(check(web_app_name, "app_name"), 1);
        assert_eq!(check(web_app_name, &"a".repeat(61)), 1);
        assert_eq!(check(static_site_name, "s"), 0);
        assert_eq!(check(static_site_name, &"a".repeat(41)), 1);
    }

    #[test]
    fn unknown_and_null_are_accepted() {
        let mut diags = Diagnostics::default();
        web_app_name(&mut diags, AttributePath::new("name"), &Value::Unknown);
        web_app_name(&mut diags, AttributePath::new("name"), &Value::Null);
        port(&mut diags, AttributePath::new("port"), &Value::Unknown);
        assert!(diags.errors.is_empty());
    }

    #[test]
    fn hostnames_and_ports() {
        assert_eq!(check(hostname, "db.internal.example.com"), 0);
        assert_eq!(check(hostname, "https://example.com"), 1);
        assert_eq!(check(hostname, ""), 1);

        let mut diags = Diagnostics::default();
        port(&mut diags, AttributePath::new("port"), &Value::Value(443));
        port(&mut diags, AttributePath::new("port"), &Value::Value(0));
        port(&mut diags, AttributePath::new("port"), &Value::Value(70000));
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn settings() {
        let settings: BTreeMap<Cow<str>, ValueString> = [
            (Cow::from("FOO"), Value::from("bar")),
            (Cow::from("website_healthcheck_maxpingfailures"), Value::from("5")),
            (Cow::from(" "), Value::from("x")),
        ]
        .into_iter()
        .collect();
        let mut diags = Diagnostics::default();
        app_settings(
            &mut diags,
            AttributePath::new("app_settings"),
            &Value::Value(settings),
            &[(
                "WEBSITE_HEALTHCHECK_MAXPINGFAILURES",
                "site_config.health_check_eviction_time_in_min",
            )],
        );
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn misc() {
        assert_eq!(check(relay_key_name, "RootManageSharedAccessKey"), 0);
        assert_eq!(check(relay_key_name, "bad key"), 1);
        assert_eq!(check(base64, "aGVsbG8="), 0);
        assert_eq!(check(base64, "not base64!"), 1);
        assert_eq!(check(branch, "main"), 0);
        assert_eq!(check(branch, "feature branch"), 1);
        assert_eq!(
            check(|d, p, v| one_of(d, p, v, &["Free", "Standard"]), "Premium"),
            1
        );
        assert_eq!(
            check(|d, p, v| id(d, p, v, WebAppId::parse), "/subscriptions/x"),
            1
        );
    }
}
