//! Declarative description of an entity's editable shape.
//!
//! A [`FormSchema`] is built once per entity and shared behind an `Arc`;
//! [`Record`]s are the mutable, schema-bound instances the board edits.

pub mod entities;

use crate::error::{BoardError, SchemaError};
use crate::render::CustomRenderer;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Values above this maximum length render as long text.
pub const LONG_TEXT_THRESHOLD: usize = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    LongText,
    Date,
    DateTime,
    SingleSelect,
    MultiChecklist,
    RepeatableList,
    Numeric,
    Custom,
}

impl FieldKind {
    /// Kinds whose value is a serialized list rather than plain text.
    pub fn is_list(self) -> bool {
        matches!(self, FieldKind::MultiChecklist | FieldKind::RepeatableList)
    }

    fn needs_options(self) -> bool {
        matches!(self, FieldKind::SingleSelect | FieldKind::MultiChecklist)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Update,
    /// Placeholder toolbar action with no backing operation.
    Cat,
}

/// Actions the board knows how to submit.
pub const ACTIONS: [Action; 2] = [Action::Insert, Action::Update];

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Cat => "cat",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct FieldSchema {
    pub name: String,
    pub required: bool,
    pub max_length: Option<usize>,
    pub kind: FieldKind,
    pub options: Vec<String>,
    pub nullable: bool,
    pub disabled: bool,
    /// Checklist options travel to and from the backend as positions.
    pub indexed: bool,
    pub custom: Option<Arc<dyn CustomRenderer>>,
}

impl fmt::Debug for FieldSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSchema")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("max_length", &self.max_length)
            .field("kind", &self.kind)
            .field("options", &self.options)
            .field("nullable", &self.nullable)
            .field("disabled", &self.disabled)
            .field("indexed", &self.indexed)
            .field("custom", &self.custom.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            required: false,
            max_length: None,
            kind,
            options: Vec::new(),
            nullable: false,
            disabled: false,
            indexed: false,
            custom: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn long_text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::LongText)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn date_time(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Numeric)
    }

    pub fn select<S: AsRef<str>>(name: impl Into<String>, options: &[S]) -> Self {
        Self::new(name, FieldKind::SingleSelect).options(options)
    }

    pub fn checklist<S: AsRef<str>>(name: impl Into<String>, options: &[S]) -> Self {
        Self::new(name, FieldKind::MultiChecklist).options(options)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::RepeatableList)
    }

    pub fn custom(name: impl Into<String>, renderer: Arc<dyn CustomRenderer>) -> Self {
        let mut f = Self::new(name, FieldKind::Custom);
        f.custom = Some(renderer);
        f
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn options<S: AsRef<str>>(mut self, options: &[S]) -> Self {
        self.options = options.iter().map(|o| o.as_ref().to_string()).collect();
        self
    }

    fn stores_positions(&self) -> bool {
        self.indexed && self.kind == FieldKind::MultiChecklist
    }

    /// Backend value to form value: positions (`[0,3]`) become option
    /// labels. Items that are not a known position are kept as they are.
    pub fn decode_stored(&self, value: &str) -> String {
        let items = parse_list(value);
        if !self.stores_positions() || items.is_empty() {
            return value.to_string();
        }
        let labels: Vec<String> = items
            .into_iter()
            .map(|item| {
                item.parse::<usize>()
                    .ok()
                    .and_then(|i| self.options.get(i).cloned())
                    .unwrap_or(item)
            })
            .collect();
        encode_list(&labels)
    }

    /// Form value to backend value; inverse of [`FieldSchema::decode_stored`].
    pub fn encode_stored(&self, value: &str) -> String {
        let items = parse_list(value);
        if !self.stores_positions() || items.is_empty() {
            return value.to_string();
        }
        let positions: Vec<usize> = items
            .iter()
            .filter_map(|item| self.options.iter().position(|o| o == item))
            .collect();
        serde_json::to_string(&positions).unwrap_or_default()
    }

    /// Human label derived from the field name ("first_name" -> "First name").
    pub fn label(&self) -> String {
        humanize(&self.name)
    }
}

pub fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug)]
pub struct FormSchema {
    entity: String,
    fields: Vec<FieldSchema>,
    groups: Vec<usize>,
}

impl FormSchema {
    /// Builds a schema, failing fast on configuration mistakes.
    ///
    /// `groups` are cut-points partitioning `fields` into sections; `None`
    /// puts every field into a single section.
    pub fn new(
        entity: impl Into<String>,
        fields: Vec<FieldSchema>,
        groups: Option<Vec<usize>>,
    ) -> Result<Self, SchemaError> {
        let entity = entity.into();
        if entity.trim().is_empty() {
            return Err(SchemaError::EmptyEntityName);
        }
        let mut seen = HashSet::new();
        for f in &fields {
            if !seen.insert(f.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    entity,
                    field: f.name.clone(),
                });
            }
            if f.kind.needs_options() && f.options.is_empty() {
                return Err(SchemaError::MissingOptions {
                    entity,
                    field: f.name.clone(),
                });
            }
            if f.kind == FieldKind::Custom && f.custom.is_none() {
                return Err(SchemaError::MissingRenderer {
                    entity,
                    field: f.name.clone(),
                });
            }
        }
        let groups = groups.unwrap_or_else(|| vec![fields.len()]);
        if groups.is_empty() || groups.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SchemaError::UnorderedGroups { entity, groups });
        }
        let last = groups[groups.len() - 1];
        if last < fields.len() {
            return Err(SchemaError::GroupsDoNotCover {
                entity,
                last,
                fields: fields.len(),
            });
        }
        Ok(Self {
            entity,
            fields,
            groups,
        })
    }

    pub fn entity_name(&self) -> &str {
        &self.entity
    }

    /// Lowercased entity name used in routes.
    pub fn route_name(&self) -> String {
        self.entity.to_lowercase()
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn groups(&self) -> &[usize] {
        &self.groups
    }

    /// Section index of the field at `position`: the index of the first
    /// cut-point strictly greater than it.
    pub fn group_index_for(&self, position: usize) -> Option<usize> {
        self.groups.iter().position(|&cut| cut > position)
    }

    /// New record with every field either copied from `initial` or empty.
    /// The action stays unset until the caller assigns one.
    pub fn create_record(self: &Arc<Self>, initial: Option<&HashMap<String, String>>) -> Record {
        let values: IndexMap<String, String> = self
            .fields
            .iter()
            .map(|f| {
                let v = initial
                    .and_then(|m| m.get(&f.name))
                    .cloned()
                    .unwrap_or_default();
                (f.name.clone(), v)
            })
            .collect();
        Record {
            schema: Arc::clone(self),
            initial: values.clone(),
            values,
            action: None,
            identity: None,
        }
    }
}

/// Decodes a serialized list value. Anything that is not a JSON array
/// decodes to an empty list.
pub fn parse_list(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Inverse of [`parse_list`]; an empty list encodes to an empty string.
pub fn encode_list<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let owned: Vec<&str> = items.iter().map(|s| s.as_ref()).collect();
    serde_json::to_string(&owned).unwrap_or_default()
}

#[derive(Clone, Debug)]
pub struct Record {
    schema: Arc<FormSchema>,
    values: IndexMap<String, String>,
    initial: IndexMap<String, String>,
    action: Option<Action>,
    identity: Option<String>,
}

impl Record {
    pub fn schema(&self) -> &Arc<FormSchema> {
        &self.schema
    }

    pub fn action(&self) -> Option<Action> {
        self.action
    }

    pub(crate) fn set_action(&mut self, action: Action) {
        self.action = Some(action);
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn values(&self) -> &IndexMap<String, String> {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> Result<(), BoardError> {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(BoardError::UnknownField(name.to_string())),
        }
    }

    pub fn list_value(&self, name: &str) -> Vec<String> {
        self.value(name).map(parse_list).unwrap_or_default()
    }

    pub fn is_blank(&self) -> bool {
        self.schema.fields.iter().all(|f| {
            let v = self.values.get(&f.name).map(|s| s.as_str()).unwrap_or("");
            if f.kind.is_list() {
                parse_list(v).is_empty()
            } else {
                v.is_empty()
            }
        })
    }

    /// True when every value still equals the value the record was created with.
    /// List fields compare as sets.
    pub fn is_pristine(&self) -> bool {
        self.schema.fields.iter().all(|f| {
            let cur = self.values.get(&f.name).map(|s| s.as_str()).unwrap_or("");
            let init = self.initial.get(&f.name).map(|s| s.as_str()).unwrap_or("");
            if f.kind.is_list() {
                let a: BTreeSet<String> = parse_list(cur).into_iter().collect();
                let b: BTreeSet<String> = parse_list(init).into_iter().collect();
                a == b
            } else {
                cur == init
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<FormSchema> {
        Arc::new(
            FormSchema::new(
                "Thing",
                vec![
                    FieldSchema::text("a").required().max_length(10),
                    FieldSchema::text("b"),
                    FieldSchema::list("tags"),
                    FieldSchema::select("kind", &["x", "y"]),
                ],
                Some(vec![2, 4]),
            )
            .unwrap(),
        )
    }

    #[test]
    fn create_record_defaults_every_field_to_empty() {
        let s = schema();
        let r = s.create_record(None);
        assert_eq!(r.values().len(), s.fields().len());
        assert!(r.values().values().all(|v| v.is_empty()));
        assert!(r.action().is_none());
        assert!(r.identity().is_none());
    }

    #[test]
    fn create_record_copies_seed_values_and_ignores_unknown_keys() {
        let s = schema();
        let mut seed = HashMap::new();
        seed.insert("a".to_string(), "hello".to_string());
        seed.insert("nope".to_string(), "ignored".to_string());
        let r = s.create_record(Some(&seed));
        assert_eq!(r.value("a"), Some("hello"));
        assert_eq!(r.value("b"), Some(""));
        assert!(r.value("nope").is_none());
    }

    #[test]
    fn group_index_scans_cut_points() {
        let s = schema();
        assert_eq!(s.group_index_for(0), Some(0));
        assert_eq!(s.group_index_for(1), Some(0));
        assert_eq!(s.group_index_for(2), Some(1));
        assert_eq!(s.group_index_for(3), Some(1));
        assert_eq!(s.group_index_for(4), None);
    }

    #[test]
    fn default_groups_hold_all_fields() {
        let s = FormSchema::new("T", vec![FieldSchema::text("a"), FieldSchema::text("b")], None)
            .unwrap();
        assert_eq!(s.groups(), &[2]);
        assert_eq!(s.group_index_for(1), Some(0));
    }

    #[test]
    fn rejects_groups_that_do_not_cover_fields() {
        let err = FormSchema::new(
            "T",
            vec![FieldSchema::text("a"), FieldSchema::text("b"), FieldSchema::text("c")],
            Some(vec![1, 2]),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::GroupsDoNotCover { last: 2, fields: 3, .. }));
    }

    #[test]
    fn rejects_unordered_groups_duplicates_and_missing_options() {
        let err = FormSchema::new(
            "T",
            vec![FieldSchema::text("a"), FieldSchema::text("b")],
            Some(vec![2, 1]),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnorderedGroups { .. }));

        let err = FormSchema::new("T", vec![FieldSchema::text("a"), FieldSchema::text("a")], None)
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));

        let empty: [&str; 0] = [];
        let err = FormSchema::new("T", vec![FieldSchema::select("s", &empty)], None).unwrap_err();
        assert!(matches!(err, SchemaError::MissingOptions { .. }));
    }

    #[test]
    fn list_codec_tolerates_garbage() {
        assert_eq!(parse_list(r#"["a","b"]"#), vec!["a", "b"]);
        assert_eq!(parse_list("[1, 2]"), vec!["1", "2"]);
        assert!(parse_list("not json").is_empty());
        assert!(parse_list(r#"{"a":1}"#).is_empty());
        assert!(parse_list("").is_empty());
        assert_eq!(encode_list::<&str>(&[]), "");
        assert_eq!(encode_list(&["x"]), r#"["x"]"#);
    }

    #[test]
    fn pristine_compares_lists_as_sets() {
        let s = schema();
        let mut seed = HashMap::new();
        seed.insert("tags".to_string(), r#"["a","b"]"#.to_string());
        let mut r = s.create_record(Some(&seed));
        assert!(r.is_pristine());
        r.set_value("tags", r#"["b","a"]"#).unwrap();
        assert!(r.is_pristine());
        r.set_value("b", "changed").unwrap();
        assert!(!r.is_pristine());
        assert!(r.set_value("missing", "x").is_err());
    }

    #[test]
    fn positional_checklist_translates_both_ways() {
        let f = FieldSchema::checklist("days", &["Sun", "Mon", "Tue"]).indexed();
        assert_eq!(f.decode_stored("[0,2]"), r#"["Sun","Tue"]"#);
        assert_eq!(f.encode_stored(r#"["Tue","Sun"]"#), "[2,0]");
        assert_eq!(f.decode_stored("[9]"), r#"["9"]"#);
        assert_eq!(f.decode_stored(""), "");
        let plain = FieldSchema::checklist("days", &["Sun", "Mon"]);
        assert_eq!(plain.decode_stored("[0]"), "[0]");
        assert_eq!(plain.encode_stored(r#"["Sun"]"#), r#"["Sun"]"#);
    }

    #[test]
    fn humanize_capitalizes_first_word() {
        assert_eq!(humanize("first_name"), "First name");
        assert_eq!(humanize(""), "");
    }
}
