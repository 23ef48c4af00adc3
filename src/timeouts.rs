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

use std::fmt::Display;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock,
};
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn default_timeout(self) -> Duration {
        match self {
            Operation::Read => Duration::from_secs(5 * 60),
            _ => Duration::from_secs(30 * 60),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// Optional `timeouts` block shared by all the resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimeoutsState<'a> {
    #[serde(borrow = "'a")]
    pub create: ValueString<'a>,
    pub read: ValueString<'a>,
    pub update: ValueString<'a>,
    pub delete: ValueString<'a>,
}

impl<'a> TimeoutsState<'a> {
    pub fn block() -> NestedBlock {
        let attribute = |operation: Operation| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(format!(
                "Timeout of the {operation} operation (eg: `30m`, `1h30m`), defaults to `{}`",
                format_duration(operation.default_timeout())
            )),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        };
        NestedBlock::Optional(Block {
            attributes: map! {
                "create" => attribute(Operation::Create),
                "read" => attribute(Operation::Read),
                "update" => attribute(Operation::Update),
                "delete" => attribute(Operation::Delete),
            },
            description: Description::plain("Per-operation timeouts"),
            ..Default::default()
        })
    }

    fn get(&self, operation: Operation) -> &ValueString<'a> {
        match operation {
            Operation::Create => &self.create,
            Operation::Read => &self.read,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }

    pub fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        for operation in [
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Delete,
        ] {
            if let Value::Value(duration) = self.get(operation) {
                if let Err(err) = parse_duration(duration) {
                    diags.error(
                        "Invalid timeout",
                        format!("{err}"),
                        attr_path.clone().attribute(operation.to_string()),
                    );
                }
            }
        }
    }
}

/// Deadline of `operation`, falling back to its default when unset or invalid
pub fn timeout_for(timeouts: &Value<TimeoutsState<'_>>, operation: Operation) -> Duration {
    timeouts
        .as_ref_option()
        .and_then(|timeouts| timeouts.get(operation).as_deref_option())
        .and_then(|duration| parse_duration(duration).ok())
        .unwrap_or_else(|| operation.default_timeout())
}

/// Parse a duration written as a sequence of decimal numbers with unit suffixes,
/// such as `300ms`, `1.5h` or `2h45m`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || anyhow!("invalid duration {input:?}");
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err(invalid());
    }

    let mut rest = input;
    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| anyhow!("missing unit in duration {input:?}"))?;
        if number_len == 0 {
            return Err(invalid());
        }
        let number: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            unit => return Err(anyhow!("unknown unit {unit:?} in duration {input:?}")),
        };
        rest = &rest[unit_len..];
        nanos += number * scale;
    }

    Ok(Duration::from_nanos(nanos.round() as u64))
}

fn format_duration(duration: Duration) -> String {
    let minutes = duration.as_secs() / 60;
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h{m}m"),
    }
}
