//! Selection text generation from the registry.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::error::{SchemaError, SchemaResult};
use crate::query::PAGE_INFO_SELECTION;
use crate::registry::{FieldDescriptor, FieldKind, ID_FIELD, Registry, TypeInfo};

/// Default limit on nested Object/Node expansion.
pub const DEFAULT_MAX_DEPTH: usize = 6;

bitflags! {
    /// Coarse policy choosing which field categories a selection includes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldSet: u8 {
        /// The `id` field.
        const ID = 0b0000_0001;
        /// The type's label field.
        const LABEL = 0b0000_0010;
        /// Every connection field.
        const CONNECTIONS = 0b0000_0100;
        /// Every Node-kind field.
        const NODES = 0b0000_1000;
        /// Every field that is not ignored.
        const ALL = 0b0001_0000;
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        Self::ID | Self::LABEL
    }
}

/// What a connection's edges select on each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionNodes {
    /// `edges{node{id}}`.
    #[default]
    Id,
    /// `edges{node{<label field>}}`.
    Label,
}

/// Per-field adjustments to a selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldOverride {
    /// Field set for the nested selection; Node fields otherwise inherit the
    /// caller's set and Object fields select everything.
    pub field_set: Option<FieldSet>,
    /// Options for the nested selection.
    pub options: FieldOptions,
    /// Node selection for connection fields.
    pub connection_nodes: ConnectionNodes,
}

impl FieldOverride {
    #[must_use]
    pub fn with_field_set(field_set: FieldSet) -> Self {
        Self {
            field_set: Some(field_set),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_connection_nodes(connection_nodes: ConnectionNodes) -> Self {
        Self {
            connection_nodes,
            ..Self::default()
        }
    }
}

/// Caller field options: extra fields plus per-field overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldOptions {
    pub extra_fields: Vec<String>,
    pub overrides: BTreeMap<String, FieldOverride>,
}

impl FieldOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn extra_field(mut self, name: impl Into<String>) -> Self {
        self.extra_fields.push(name.into());
        self
    }

    #[must_use]
    pub fn override_field(mut self, name: impl Into<String>, field: FieldOverride) -> Self {
        self.overrides.insert(name.into(), field);
        self
    }

    /// Connection node selection configured for `field`.
    #[must_use]
    pub fn connection_nodes(&self, field: &str) -> ConnectionNodes {
        self.overrides
            .get(field)
            .map(|o| o.connection_nodes)
            .unwrap_or_default()
    }
}

/// Turns `(type, field set, options)` into selection text.
///
/// Output only ever contains registry names, so it can be spliced into a
/// document verbatim. Identical inputs give identical text.
#[derive(Debug, Clone, Copy)]
pub struct FieldSelector<'a> {
    registry: &'a Registry,
    max_depth: usize,
}

impl<'a> FieldSelector<'a> {
    #[must_use]
    pub const fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Selection text for `type_name`.
    pub fn select(
        &self,
        type_name: &str,
        field_set: FieldSet,
        options: &FieldOptions,
    ) -> SchemaResult<String> {
        self.select_at(type_name, field_set, options, type_name, 0)
    }

    fn select_at(
        &self,
        type_name: &str,
        field_set: FieldSet,
        options: &FieldOptions,
        path: &str,
        depth: usize,
    ) -> SchemaResult<String> {
        let info = self.registry.get(type_name)?;
        validate_options(info, options)?;

        let mut parts = Vec::new();
        for field in info.fields() {
            if !includes(info, field, field_set, options) {
                continue;
            }
            let field_override = options.overrides.get(&field.name);
            let part = match &field.kind {
                FieldKind::Scalar(_) => Some(field.name.clone()),
                FieldKind::Object(target) => {
                    let nested_set = field_override
                        .and_then(|o| o.field_set)
                        .unwrap_or(FieldSet::ALL);
                    self.nested(field, target, nested_set, field_override, path, depth)?
                }
                FieldKind::Node(target) => {
                    let nested_set = field_override
                        .and_then(|o| o.field_set)
                        .unwrap_or(field_set);
                    let nested =
                        self.nested(field, target, nested_set, field_override, path, depth)?;
                    Some(nested.unwrap_or_else(|| format!("{}{{{ID_FIELD}}}", field.name)))
                }
                FieldKind::Connection(target) => {
                    let nodes = field_override.map(|o| o.connection_nodes).unwrap_or_default();
                    Some(format!(
                        "{}{{{}}}",
                        field.name,
                        self.connection_selection(target, nodes)?
                    ))
                }
            };
            if let Some(part) = part {
                parts.push(part);
            }
        }
        Ok(parts.join(" "))
    }

    fn nested(
        &self,
        field: &FieldDescriptor,
        target: &str,
        field_set: FieldSet,
        field_override: Option<&FieldOverride>,
        path: &str,
        depth: usize,
    ) -> SchemaResult<Option<String>> {
        let path = format!("{path}.{}", field.name);
        if depth + 1 > self.max_depth {
            return Err(SchemaError::DepthExceeded {
                path,
                max: self.max_depth,
            });
        }
        let empty = FieldOptions::default();
        let options = field_override.map_or(&empty, |o| &o.options);
        let inner = self.select_at(target, field_set, options, &path, depth + 1)?;
        Ok((!inner.is_empty()).then(|| format!("{}{{{inner}}}", field.name)))
    }

    /// The fixed connection envelope for a node type:
    /// `pageInfo{hasNextPage endCursor} edges{node{...}}`.
    pub fn connection_selection(
        &self,
        target: &str,
        nodes: ConnectionNodes,
    ) -> SchemaResult<String> {
        Ok(format!(
            "{PAGE_INFO_SELECTION} edges{{node{{{}}}}}",
            self.connection_node_selection(target, nodes)?
        ))
    }

    /// What each connection node selects: `id`, or the target's label field.
    pub fn connection_node_selection(
        &self,
        target: &str,
        nodes: ConnectionNodes,
    ) -> SchemaResult<String> {
        let info = self.registry.get(target)?;
        match nodes {
            ConnectionNodes::Id => Ok(ID_FIELD.to_string()),
            ConnectionNodes::Label => info.require_label().map(str::to_string),
        }
    }
}

fn includes(info: &TypeInfo, field: &FieldDescriptor, field_set: FieldSet, options: &FieldOptions) -> bool {
    if field.ignored {
        return false;
    }
    if field_set.contains(FieldSet::ALL) {
        return true;
    }
    (field_set.contains(FieldSet::ID) && field.name == ID_FIELD)
        || (field_set.contains(FieldSet::LABEL) && info.label_field() == Some(field.name.as_str()))
        || (field_set.contains(FieldSet::CONNECTIONS)
            && matches!(field.kind, FieldKind::Connection(_)))
        || (field_set.contains(FieldSet::NODES) && matches!(field.kind, FieldKind::Node(_)))
        || options.extra_fields.iter().any(|extra| *extra == field.name)
}

fn validate_options(info: &TypeInfo, options: &FieldOptions) -> SchemaResult<()> {
    for name in options.extra_fields.iter().chain(options.overrides.keys()) {
        info.require_field(name)?;
    }
    Ok(())
}
