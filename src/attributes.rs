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

//! Attributes shared across the resource schemas

use lazy_static::lazy_static;
use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Description};

pub fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

pub fn required_string(description: &str) -> Attribute {
    attribute(AttributeType::String, AttributeConstraint::Required, description)
}

pub fn optional_string(description: &str) -> Attribute {
    attribute(AttributeType::String, AttributeConstraint::Optional, description)
}

pub fn computed_string(description: &str) -> Attribute {
    attribute(AttributeType::String, AttributeConstraint::Computed, description)
}

pub fn sensitive(attribute: Attribute) -> Attribute {
    Attribute {
        sensitive: true,
        ..attribute
    }
}

/// Optional attribute whose default is filled in during planning
pub fn defaulted(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::OptionalComputed, description)
}

pub fn string_map(description: &str) -> Attribute {
    attribute(
        AttributeType::Map(AttributeType::String.into()),
        AttributeConstraint::Optional,
        description,
    )
}

pub fn computed_string_list(description: &str) -> Attribute {
    attribute(
        AttributeType::List(AttributeType::String.into()),
        AttributeConstraint::Computed,
        description,
    )
}

lazy_static! {
    pub static ref ID: Attribute = computed_string("ARM ID of the resource");
    pub static ref NAME: Attribute = required_string("Name of the resource, changing it forces a new resource");
    pub static ref RESOURCE_GROUP_NAME: Attribute =
        required_string("Resource group of the resource, changing it forces a new resource");
    pub static ref LOCATION: Attribute =
        required_string("Azure region of the resource, changing it forces a new resource");
    pub static ref TAGS: Attribute = string_map("Tags assigned to the resource");
}
