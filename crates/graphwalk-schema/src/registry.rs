//! Type descriptors and the preprocessed, immutable registry.
//!
//! Descriptors are plain declarations. [`RegistryBuilder::preprocess`] turns
//! them into a [`Registry`] exactly once: it injects the synthetic `id` field
//! on node types, builds the per-type indices, defaults the root query names,
//! checks every type reference and builds one [`RecordTransform`] per type.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::error::{SchemaError, SchemaResult};
use crate::transform::RecordTransform;

/// Name of the identity field every node type carries.
pub const ID_FIELD: &str = "id";

/// Ordered enum code to display label map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumLabels(Vec<(String, String)>);

impl EnumLabels {
    /// Create from `(code, label)` pairs, keeping their order.
    pub fn new<I, C, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(code, label)| (code.into(), label.into()))
                .collect(),
        )
    }

    /// Display label for a code.
    #[must_use]
    pub fn label(&self, code: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(candidate, _)| candidate == code)
            .map(|(_, label)| label.as_str())
    }
}

/// Scalar field flavours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Integer,
    Boolean,
    DateTime,
    Enum(EnumLabels),
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Leaf value.
    Scalar(ScalarKind),
    /// Embedded composite without identity, by type name.
    Object(String),
    /// Reference to an identified node, by type name.
    Node(String),
    /// Paginated one-to-many edge list, by node type name.
    Connection(String),
}

impl FieldKind {
    /// Referenced type name for non-scalar kinds.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Scalar(_) => None,
            Self::Object(target) | Self::Node(target) | Self::Connection(target) => Some(target),
        }
    }
}

/// A single field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    /// Human-readable display field of its type.
    pub is_label: bool,
    /// Never emitted in generated selections.
    pub ignored: bool,
    /// The field holds a list of `kind` values.
    pub list: bool,
}

impl FieldDescriptor {
    /// Create a field of an arbitrary kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_label: false,
            ignored: false,
            list: false,
        }
    }

    /// The synthetic identity field.
    #[must_use]
    pub fn id() -> Self {
        Self::string(ID_FIELD)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarKind::String))
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarKind::Integer))
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarKind::Boolean))
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarKind::DateTime))
    }

    pub fn enumeration(name: impl Into<String>, labels: EnumLabels) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarKind::Enum(labels)))
    }

    pub fn object(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Object(type_name.into()))
    }

    pub fn node(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Node(type_name.into()))
    }

    pub fn connection(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Connection(type_name.into()))
    }

    /// Mark as the type's label field.
    #[must_use]
    pub const fn label(mut self) -> Self {
        self.is_label = true;
        self
    }

    /// Exclude from every generated selection.
    #[must_use]
    pub const fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    /// Mark as list-valued.
    #[must_use]
    pub const fn list(mut self) -> Self {
        self.list = true;
        self
    }
}

/// Static declaration of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub is_node: bool,
    pub fields: Vec<FieldDescriptor>,
    pub query_node_field: Option<String>,
    pub query_connection_field: Option<String>,
    pub node_query_name: Option<String>,
    /// Input type accepted by the root connection's `filter` argument.
    pub filter_input: Option<String>,
}

impl TypeDescriptor {
    fn new(name: impl Into<String>, is_node: bool) -> Self {
        Self {
            name: name.into(),
            is_node,
            fields: Vec::new(),
            query_node_field: None,
            query_connection_field: None,
            node_query_name: None,
            filter_input: None,
        }
    }

    /// Declare a node type.
    pub fn node(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    /// Declare an object type.
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn query_node_field(mut self, name: impl Into<String>) -> Self {
        self.query_node_field = Some(name.into());
        self
    }

    #[must_use]
    pub fn query_connection_field(mut self, name: impl Into<String>) -> Self {
        self.query_connection_field = Some(name.into());
        self
    }

    #[must_use]
    pub fn node_query_name(mut self, name: impl Into<String>) -> Self {
        self.node_query_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn filter_input(mut self, name: impl Into<String>) -> Self {
        self.filter_input = Some(name.into());
        self
    }
}

/// Root query names of a node type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeQueries {
    /// Root field fetching one node by id, e.g. `resource`.
    pub node_field: String,
    /// Root field listing all nodes, e.g. `resources`.
    pub connection_field: String,
    /// Operation name used for single-node queries, e.g. `QueryResource`.
    pub query_name: String,
}

/// A preprocessed type with its derived indices.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    name: String,
    is_node: bool,
    fields: Vec<FieldDescriptor>,
    fields_by_name: HashMap<String, usize>,
    label_field: Option<String>,
    date_time_fields: Vec<String>,
    enum_fields: Vec<String>,
    node_fields: Vec<String>,
    object_fields: Vec<String>,
    connection_fields: Vec<String>,
    queries: Option<NodeQueries>,
    filter_input: Option<String>,
}

impl TypeInfo {
    fn from_descriptor(descriptor: TypeDescriptor) -> SchemaResult<Self> {
        let TypeDescriptor {
            name,
            is_node,
            mut fields,
            query_node_field,
            query_connection_field,
            node_query_name,
            filter_input,
        } = descriptor;

        ensure_name(&name)?;

        if is_node {
            match fields.iter().position(|field| field.name == ID_FIELD) {
                Some(0) => {}
                Some(index) => {
                    let id = fields.remove(index);
                    fields.insert(0, id);
                }
                None => fields.insert(0, FieldDescriptor::id()),
            }
        }

        let mut info = Self {
            name,
            is_node,
            fields: Vec::with_capacity(fields.len()),
            fields_by_name: HashMap::with_capacity(fields.len()),
            label_field: None,
            date_time_fields: Vec::new(),
            enum_fields: Vec::new(),
            node_fields: Vec::new(),
            object_fields: Vec::new(),
            connection_fields: Vec::new(),
            queries: None,
            filter_input,
        };

        let mut labels = Vec::new();
        for field in fields {
            ensure_name(&field.name)?;
            if info.fields_by_name.contains_key(&field.name) {
                return Err(SchemaError::DuplicateField {
                    type_name: info.name.clone(),
                    field: field.name,
                });
            }
            let name = field.name.clone();
            match &field.kind {
                FieldKind::Scalar(ScalarKind::DateTime) => info.date_time_fields.push(name.clone()),
                FieldKind::Scalar(ScalarKind::Enum(_)) => info.enum_fields.push(name.clone()),
                FieldKind::Scalar(_) => {}
                FieldKind::Object(_) => info.object_fields.push(name.clone()),
                FieldKind::Node(_) => info.node_fields.push(name.clone()),
                FieldKind::Connection(_) => info.connection_fields.push(name.clone()),
            }
            if field.is_label {
                labels.push(name.clone());
            }
            info.fields_by_name.insert(name, info.fields.len());
            info.fields.push(field);
        }

        match labels.len() {
            1 => info.label_field = labels.pop(),
            0 if is_node => warn!(type_name = %info.name, "node type has no label field"),
            0 => {}
            count => warn!(
                type_name = %info.name,
                count,
                fields = ?labels,
                "type has more than one label field, label defaults disabled"
            ),
        }

        if is_node {
            let node_field = query_node_field.unwrap_or_else(|| lower_camel(&info.name));
            let connection_field = query_connection_field.unwrap_or_else(|| format!("{node_field}s"));
            let query_name = node_query_name.unwrap_or_else(|| format!("Query{}", info.name));
            ensure_name(&node_field)?;
            ensure_name(&connection_field)?;
            ensure_name(&query_name)?;
            info.queries = Some(NodeQueries {
                node_field,
                connection_field,
                query_name,
            });
        }

        if let Some(filter) = &info.filter_input {
            ensure_name(filter)?;
        }

        Ok(info)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_node(&self) -> bool {
        self.is_node
    }

    /// Fields in declaration order; node types start with `id`.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields_by_name.get(name).map(|&index| &self.fields[index])
    }

    /// Like [`TypeInfo::field`] but an unknown name is an error.
    pub fn require_field(&self, name: &str) -> SchemaResult<&FieldDescriptor> {
        self.field(name).ok_or_else(|| SchemaError::UnknownField {
            type_name: self.name.clone(),
            field: name.to_string(),
        })
    }

    /// The unique label field, if exactly one was declared.
    #[must_use]
    pub fn label_field(&self) -> Option<&str> {
        self.label_field.as_deref()
    }

    /// The label field, or an error when the type has none.
    pub fn require_label(&self) -> SchemaResult<&str> {
        self.label_field()
            .ok_or_else(|| SchemaError::MissingLabel(self.name.clone()))
    }

    #[must_use]
    pub fn date_time_fields(&self) -> &[String] {
        &self.date_time_fields
    }

    #[must_use]
    pub fn enum_fields(&self) -> &[String] {
        &self.enum_fields
    }

    #[must_use]
    pub fn node_fields(&self) -> &[String] {
        &self.node_fields
    }

    #[must_use]
    pub fn object_fields(&self) -> &[String] {
        &self.object_fields
    }

    #[must_use]
    pub fn connection_fields(&self) -> &[String] {
        &self.connection_fields
    }

    /// Root query names; `None` for object types.
    #[must_use]
    pub const fn queries(&self) -> Option<&NodeQueries> {
        self.queries.as_ref()
    }

    /// Root query names, or an error for object types.
    pub fn require_queries(&self) -> SchemaResult<&NodeQueries> {
        self.queries
            .as_ref()
            .ok_or_else(|| SchemaError::NotANode(self.name.clone()))
    }

    #[must_use]
    pub fn filter_input(&self) -> Option<&str> {
        self.filter_input.as_deref()
    }
}

/// Collects descriptors before the single preprocessing pass.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<TypeDescriptor>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load static descriptors.
    #[must_use]
    pub fn register(mut self, descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Derive every index and transform. Runs once; the result is immutable.
    pub fn preprocess(self) -> SchemaResult<Registry> {
        let mut types = BTreeMap::new();
        for descriptor in self.descriptors {
            let info = TypeInfo::from_descriptor(descriptor)?;
            if types.contains_key(&info.name) {
                return Err(SchemaError::DuplicateType(info.name));
            }
            types.insert(info.name.clone(), info);
        }

        for info in types.values() {
            for field in &info.fields {
                if let Some(target) = field.kind.target() {
                    let resolved = types.get(target).ok_or_else(|| SchemaError::DanglingReference {
                        type_name: info.name.clone(),
                        field: field.name.clone(),
                        target: target.to_string(),
                    })?;
                    if matches!(field.kind, FieldKind::Node(_) | FieldKind::Connection(_))
                        && !resolved.is_node
                    {
                        return Err(SchemaError::NotANode(target.to_string()));
                    }
                }
            }
        }

        let mut registry = Registry {
            types,
            transforms: BTreeMap::new(),
        };
        let mut transforms = BTreeMap::new();
        for name in registry.types.keys() {
            transforms.insert(name.clone(), RecordTransform::build(&registry, name)?);
        }
        registry.transforms = transforms;

        debug!(types = registry.types.len(), "schema registry preprocessed");
        Ok(registry)
    }
}

/// Immutable, preprocessed type table shared by every component.
#[derive(Debug, Clone)]
pub struct Registry {
    types: BTreeMap<String, TypeInfo>,
    transforms: BTreeMap<String, RecordTransform>,
}

impl Registry {
    /// Shorthand for `RegistryBuilder::new().register(descriptors).preprocess()`.
    pub fn build(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> SchemaResult<Self> {
        RegistryBuilder::new().register(descriptors).preprocess()
    }

    /// Look up a type.
    pub fn get(&self, name: &str) -> SchemaResult<&TypeInfo> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// All types, ordered by name.
    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    /// The record transform built for a type at preprocess time.
    pub fn record_transform(&self, name: &str) -> SchemaResult<&RecordTransform> {
        self.transforms
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }
}

/// Returns `true` for `[_A-Za-z][_0-9A-Za-z]*`.
#[must_use]
pub fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

pub(crate) fn ensure_name(name: &str) -> SchemaResult<()> {
    if is_graphql_name(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidName(name.to_string()))
    }
}

fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_lowercase().to_string() + chars.as_str()
    })
}
