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

use std::borrow::Cow;
use std::collections::BTreeMap;

use tf_provider::schema::{Block, Schema};
use tf_provider::value::{Value, ValueBool, ValueList, ValueMap, ValueNumber, ValueString};
use tf_provider::{AttributePath, Diagnostics};

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithBlock {
    fn block() -> Block;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

impl<T: WithValidate> WithValidate for Value<T> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(value) = self {
            value.validate(diags, attr_path);
        }
    }
}

/// Known string value, `None` when null or unknown
pub(crate) fn known(value: &ValueString<'_>) -> Option<String> {
    value.as_deref_option().map(str::to_owned)
}

pub(crate) fn known_bool(value: &ValueBool, default: bool) -> bool {
    match value {
        Value::Value(value) => *value,
        _ => default,
    }
}

pub(crate) fn known_number(value: &ValueNumber) -> Option<i64> {
    match value {
        Value::Value(value) => Some(*value),
        _ => None,
    }
}

/// String state value from an optional remote value
pub(crate) fn string<'a>(value: Option<impl Into<String>>) -> ValueString<'a> {
    value.map(|value| Cow::Owned(value.into())).into()
}

pub(crate) fn string_map<'a>(map: &BTreeMap<String, String>) -> ValueMap<'a, ValueString<'a>> {
    Value::Value(
        map.iter()
            .map(|(k, v)| (Cow::Owned(k.clone()), Value::Value(Cow::Owned(v.clone()))))
            .collect(),
    )
}

/// Remote map, null when empty unless the prior state held a map
pub(crate) fn keep_empty<'a>(prior: bool, map: &BTreeMap<String, String>) -> ValueMap<'a, ValueString<'a>> {
    if map.is_empty() && !prior {
        Value::Null
    } else {
        string_map(map)
    }
}

/// Known entries of a map, unknown entries are dropped
pub(crate) fn known_map(map: &ValueMap<'_, ValueString<'_>>) -> BTreeMap<String, String> {
    map.as_ref_option()
        .into_iter()
        .flatten()
        .filter_map(|(k, v)| Some((k.to_string(), v.as_deref_option()?.to_owned())))
        .collect()
}

pub(crate) fn string_list<'a>(items: impl IntoIterator<Item = String>) -> ValueList<ValueString<'a>> {
    Value::Value(items.into_iter().map(|item| Value::Value(Cow::Owned(item))).collect())
}

/// Location as ARM compares it (`West Europe` and `westeurope` are the same region)
pub(crate) fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_ascii_lowercase()
}

/// Remote location, keeping the spelling of the prior state when it designates the same region
pub(crate) fn location<'a>(prior: &ValueString<'a>, remote: Option<&str>) -> ValueString<'a> {
    match (prior.as_deref_option(), remote) {
        (Some(prior_location), Some(remote))
            if normalize_location(prior_location) == normalize_location(remote) =>
        {
            prior.clone()
        }
        (_, remote) => string(remote),
    }
}

/// Apply a default when the configuration leaves the attribute unset
pub(crate) fn default_to<T>(planned: &mut Value<T>, config: &Value<T>, default: T) {
    if config.is_null() {
        *planned = Value::Value(default);
    }
}

/// Mark `path` for replacement when the attribute changed
pub(crate) fn force_new<T: PartialEq>(
    replace: &mut Vec<AttributePath>,
    path: &str,
    prior: &Value<T>,
    planned: &Value<T>,
) {
    if prior != planned {
        replace.push(AttributePath::new(path.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_configuration() {
        let mut planned: ValueBool = Value::Value(true);
        default_to(&mut planned, &Value::Null, false);
        assert_eq!(planned, Value::Value(false));

        let mut planned: ValueBool = Value::Value(true);
        default_to(&mut planned, &Value::Value(true), false);
        assert_eq!(planned, Value::Value(true));
    }

    #[test]
    fn maps() {
        let map: BTreeMap<String, String> = [("a".to_owned(), "1".to_owned())].into();
        let value = string_map(&map);
        assert_eq!(known_map(&value), map);
        assert!(known_map(&Value::Unknown).is_empty());
    }

    #[test]
    fn locations() {
        let prior = ValueString::from("westeurope");
        assert_eq!(location(&prior, Some("West Europe")), prior);
        assert_eq!(location(&prior, Some("North Europe")), ValueString::from("North Europe"));
        assert_eq!(location(&Value::Null, None), Value::Null);
    }

    #[test]
    fn replacement() {
        let mut replace = Vec::new();
        force_new(&mut replace, "name", &ValueString::from("a"), &ValueString::from("a"));
        force_new(&mut replace, "location", &ValueString::from("a"), &ValueString::from("b"));
        assert_eq!(replace, vec![AttributePath::new("location")]);
    }
}
