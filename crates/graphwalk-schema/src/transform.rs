//! Per-type record normalization.
//!
//! Each type gets a fixed list of [`TransformRule`]s at preprocess time. At
//! transform time the rules are visited in three passes, each gated by a flag
//! in [`TransformOptions`]:
//!
//! 1. enum codes to labels and datetime coercion, on still-nested values;
//! 2. node projection (`<field>Id` / `<field>Label`), Node fields only;
//! 3. object flattening into camelCase compound keys, Object fields only.
//!
//! Flattening runs last because it removes the source field.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SchemaResult;
use crate::registry::{EnumLabels, FieldKind, Registry, ScalarKind};

/// A fetched record: one JSON object.
pub type Record = Map<String, Value>;

/// Replacement serializer for one field while flattening.
pub type FlattenHook = fn(&Value) -> Value;

/// One normalization rule for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformRule {
    /// Replace enum codes with display labels.
    EnumMap { field: String, labels: EnumLabels },
    /// Normalize an ISO-8601 datetime string to UTC RFC 3339.
    DateCoerce { field: String },
    /// Project a nested node onto `<field>Id` and `<field>Label`.
    NodeProject {
        field: String,
        label_field: Option<String>,
    },
    /// Lower an object's scalars onto the parent.
    ObjectFlatten {
        field: String,
        nested: Box<RecordTransform>,
    },
}

/// Independently gated normalization switches.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    pub map_enum_to_display: bool,
    pub map_date_fields: bool,
    pub map_node_to_id: bool,
    pub map_node_to_label: bool,
    pub flatten_object_fields: bool,
    /// Per-field serializers used instead of recursing while flattening.
    pub flatten_overrides: BTreeMap<String, FlattenHook>,
}

impl TransformOptions {
    /// Every switch on, with the default flatten hooks.
    #[must_use]
    pub fn all() -> Self {
        Self {
            map_enum_to_display: true,
            map_date_fields: true,
            map_node_to_id: true,
            map_node_to_label: true,
            flatten_object_fields: true,
            flatten_overrides: default_flatten_overrides(),
        }
    }

    /// Register a flatten hook for a field name.
    #[must_use]
    pub fn with_flatten_override(mut self, field: impl Into<String>, hook: FlattenHook) -> Self {
        self.flatten_overrides.insert(field.into(), hook);
        self
    }

    /// Returns `true` when no pass would run.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        !(self.map_enum_to_display
            || self.map_date_fields
            || self.map_node_to_id
            || self.map_node_to_label
            || self.flatten_object_fields)
    }
}

/// Hooks shipped with the catalog: port range lists render as compact strings.
#[must_use]
pub fn default_flatten_overrides() -> BTreeMap<String, FlattenHook> {
    let mut hooks: BTreeMap<String, FlattenHook> = BTreeMap::new();
    hooks.insert("ports".to_string(), port_ranges_to_string);
    hooks
}

/// Render `[{start, end}, ...]` as `"80, 443, 8000-8999"`.
///
/// Values that are not a list pass through unchanged.
#[must_use]
pub fn port_ranges_to_string(value: &Value) -> Value {
    let Some(ranges) = value.as_array() else {
        return value.clone();
    };
    let rendered: Vec<String> = ranges
        .iter()
        .filter_map(|range| {
            let start = range.get("start")?.as_i64()?;
            let end = range.get("end").and_then(Value::as_i64).unwrap_or(start);
            Some(if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            })
        })
        .collect();
    Value::String(rendered.join(", "))
}

/// The pure normalization function of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTransform {
    type_name: String,
    rules: Vec<TransformRule>,
}

impl RecordTransform {
    /// Derive the rule set of `type_name` from the registry.
    pub fn build(registry: &Registry, type_name: &str) -> SchemaResult<Self> {
        let mut stack = Vec::new();
        Self::build_inner(registry, type_name, &mut stack)
    }

    fn build_inner(
        registry: &Registry,
        type_name: &str,
        stack: &mut Vec<String>,
    ) -> SchemaResult<Self> {
        let info = registry.get(type_name)?;
        stack.push(type_name.to_string());

        let mut rules = Vec::new();
        for field in info.fields() {
            match &field.kind {
                FieldKind::Scalar(ScalarKind::Enum(labels)) => rules.push(TransformRule::EnumMap {
                    field: field.name.clone(),
                    labels: labels.clone(),
                }),
                FieldKind::Scalar(ScalarKind::DateTime) => rules.push(TransformRule::DateCoerce {
                    field: field.name.clone(),
                }),
                FieldKind::Scalar(_) | FieldKind::Connection(_) => {}
                FieldKind::Node(target) => rules.push(TransformRule::NodeProject {
                    field: field.name.clone(),
                    label_field: registry.get(target)?.label_field().map(str::to_string),
                }),
                FieldKind::Object(target) => {
                    if stack.iter().any(|seen| seen == target) {
                        debug!(type_name, field = %field.name, "recursive object type left nested");
                        continue;
                    }
                    let nested = Self::build_inner(registry, target, stack)?;
                    rules.push(TransformRule::ObjectFlatten {
                        field: field.name.clone(),
                        nested: Box::new(nested),
                    });
                }
            }
        }

        stack.pop();
        Ok(Self {
            type_name: type_name.to_string(),
            rules,
        })
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn rules(&self) -> &[TransformRule] {
        &self.rules
    }

    /// Apply every enabled pass to a record.
    #[must_use]
    pub fn apply(&self, mut record: Record, options: &TransformOptions) -> Record {
        if options.is_noop() {
            return record;
        }
        self.map_scalars(&mut record, options);
        if options.map_node_to_id || options.map_node_to_label {
            self.project_nodes(&mut record, options);
        }
        if options.flatten_object_fields {
            self.flatten_objects(&mut record, options);
        }
        record
    }

    fn map_scalars(&self, record: &mut Record, options: &TransformOptions) {
        for rule in &self.rules {
            match rule {
                TransformRule::EnumMap { field, labels } if options.map_enum_to_display => {
                    if let Some(value) = record.get_mut(field) {
                        map_enum_value(value, labels);
                    }
                }
                TransformRule::DateCoerce { field } if options.map_date_fields => {
                    if let Some(value) = record.get_mut(field) {
                        coerce_datetime(value);
                    }
                }
                TransformRule::ObjectFlatten { field, nested } => match record.get_mut(field) {
                    Some(Value::Object(inner)) if !options.flatten_object_fields => {
                        nested.map_scalars(inner, options);
                    }
                    Some(Value::Array(items)) => nested.map_scalars_each(items, options),
                    _ => {}
                },
                _ => {}
            }
        }
    }

    /// List-valued object fields are never flattened, only their elements
    /// get the scalar pass.
    fn map_scalars_each(&self, items: &mut [Value], options: &TransformOptions) {
        for item in items {
            if let Value::Object(inner) = item {
                self.map_scalars(inner, options);
            }
        }
    }

    fn project_nodes(&self, record: &mut Record, options: &TransformOptions) {
        for rule in &self.rules {
            let TransformRule::NodeProject { field, label_field } = rule else {
                continue;
            };
            let Some(Value::Object(node)) = record.get(field) else {
                continue;
            };

            let id = options
                .map_node_to_id
                .then(|| node.get("id").cloned())
                .flatten();
            let label = options
                .map_node_to_label
                .then(|| label_field.as_ref().and_then(|name| node.get(name).cloned()))
                .flatten();

            if id.is_none() && label.is_none() {
                continue;
            }
            if let Some(id) = id {
                record.insert(format!("{field}Id"), id);
            }
            if let Some(label) = label {
                record.insert(format!("{field}Label"), label);
            }
            record.remove(field);
        }
    }

    fn flatten_objects(&self, record: &mut Record, options: &TransformOptions) {
        for rule in &self.rules {
            let TransformRule::ObjectFlatten { field, nested } = rule else {
                continue;
            };
            if let Some(hook) = options.flatten_overrides.get(field) {
                if let Some(value) = record.get_mut(field) {
                    let replaced = hook(value);
                    *value = replaced;
                }
                continue;
            }
            let Some(Value::Object(_)) = record.get(field) else {
                continue;
            };
            if let Some(Value::Object(mut inner)) = record.remove(field) {
                nested.map_scalars(&mut inner, options);
                nested.flatten_into(field, inner, record, options);
            }
        }
    }

    fn flatten_into(&self, prefix: &str, inner: Record, target: &mut Record, options: &TransformOptions) {
        for (key, value) in inner {
            let compound = camel_join(prefix, &key);
            if let Some(hook) = options.flatten_overrides.get(&key) {
                target.insert(compound, hook(&value));
                continue;
            }
            let nested = self.rules.iter().find_map(|rule| match rule {
                TransformRule::ObjectFlatten { field, nested } if *field == key => Some(nested),
                _ => None,
            });
            match (nested, value) {
                (Some(nested), Value::Object(mut deeper)) => {
                    nested.map_scalars(&mut deeper, options);
                    nested.flatten_into(&compound, deeper, target, options);
                }
                (Some(nested), Value::Array(mut items)) => {
                    nested.map_scalars_each(&mut items, options);
                    target.insert(compound, Value::Array(items));
                }
                (_, value) => {
                    target.insert(compound, value);
                }
            }
        }
    }
}

fn map_enum_value(value: &mut Value, labels: &EnumLabels) {
    match value {
        Value::String(code) => {
            if let Some(label) = labels.label(code) {
                *value = Value::String(label.to_string());
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| map_enum_value(item, labels)),
        _ => {}
    }
}

fn coerce_datetime(value: &mut Value) {
    let Value::String(raw) = value else {
        return;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => {
            *value = Value::String(
                parsed
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            );
        }
        Err(err) => debug!(value = %raw, error = %err, "leaving unparseable datetime as-is"),
    }
}

/// Parse a (possibly already coerced) datetime field of a record.
#[must_use]
pub fn record_datetime(record: &Record, field: &str) -> Option<DateTime<Utc>> {
    let raw = record.get(field)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn camel_join(prefix: &str, key: &str) -> String {
    let mut chars = key.chars();
    let mut joined = String::with_capacity(prefix.len() + key.len());
    joined.push_str(prefix);
    if let Some(first) = chars.next() {
        joined.push(first.to_ascii_uppercase());
        joined.push_str(chars.as_str());
    }
    joined
}
