//! Record -> structural UI description.
//!
//! Rendering is pure: it reads the record and its schema and never mutates
//! either. Drawing the tree onto a terminal lives in `widgets::form_view`.

use crate::schema::{
    encode_list, humanize, parse_list, Action, FieldKind, FieldSchema, Record,
    LONG_TEXT_THRESHOLD,
};
use indexmap::IndexMap;

/// Pluggable renderer for fields whose kind is `Custom`.
pub trait CustomRenderer: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, record: &Record, field: &str) -> RenderUnit;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Post => "POST",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitTarget {
    pub method: Method,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderUnit {
    TextInput {
        max_width: Option<usize>,
        placeholder: String,
        value: String,
    },
    DateInput {
        date_only: bool,
        value: String,
    },
    LongText {
        value: String,
    },
    SingleSelect {
        options: Vec<String>,
        nullable_option: bool,
        value: String,
    },
    MultiChecklist {
        options: Vec<String>,
        checked: Vec<String>,
    },
    RepeatableList {
        items: Vec<String>,
        add_control: bool,
        remove_control: bool,
    },
    Custom {
        renderer: String,
        body: Box<RenderUnit>,
    },
    /// Read-only lines, for custom renderers that only display.
    Static {
        lines: Vec<String>,
    },
    Disabled(Box<RenderUnit>),
}

impl RenderUnit {
    /// The value this unit currently displays, in record encoding.
    pub fn value_text(&self) -> Option<String> {
        match self {
            RenderUnit::TextInput { value, .. }
            | RenderUnit::DateInput { value, .. }
            | RenderUnit::LongText { value }
            | RenderUnit::SingleSelect { value, .. } => Some(value.clone()),
            RenderUnit::MultiChecklist { checked, .. } => Some(encode_list(checked)),
            RenderUnit::RepeatableList { items, .. } => Some(encode_list(items)),
            RenderUnit::Custom { body, .. } => body.value_text(),
            RenderUnit::Disabled(inner) => inner.value_text(),
            RenderUnit::Static { .. } => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, RenderUnit::Disabled(_))
    }

    /// Unwraps `Disabled` and `Custom` to the unit that is actually shown.
    pub fn innermost(&self) -> &RenderUnit {
        match self {
            RenderUnit::Disabled(inner) => inner.innermost(),
            RenderUnit::Custom { body, .. } => body.innermost(),
            other => other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRender {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub unit: RenderUnit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupBlock {
    pub index: usize,
    pub fields: Vec<FieldRender>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderTree {
    pub title: String,
    pub target: SubmitTarget,
    pub groups: Vec<GroupBlock>,
}

impl RenderTree {
    pub fn fields(&self) -> impl Iterator<Item = &FieldRender> {
        self.groups.iter().flat_map(|g| g.fields.iter())
    }

    pub fn field(&self, name: &str) -> Option<&FieldRender> {
        self.fields().find(|f| f.name == name)
    }

    /// Reads every displayed value back, in field order.
    pub fn read_back(&self) -> IndexMap<String, String> {
        self.fields()
            .filter_map(|f| f.unit.value_text().map(|v| (f.name.clone(), v)))
            .collect()
    }
}

pub fn title_for(action: Option<Action>, entity: &str) -> String {
    match action {
        Some(Action::Insert) | None => format!("Add New {entity}"),
        Some(Action::Update) => format!("Update {entity}"),
        Some(Action::Cat) => entity.to_string(),
    }
}

/// `{action}_{entity}` route, plus the object id as a query parameter for updates.
pub fn submit_target(action: Option<Action>, route: &str, identity: Option<&str>) -> SubmitTarget {
    let action = action.unwrap_or(Action::Insert);
    let mut path = format!("/{}_{}", action.as_str(), route);
    if action == Action::Update {
        if let Some(id) = identity {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("oid", id)
                .finish();
            path.push('?');
            path.push_str(&query);
        }
    }
    SubmitTarget {
        method: Method::Post,
        path,
    }
}

pub fn render(record: &Record) -> RenderTree {
    let schema = record.schema();
    let mut groups: Vec<GroupBlock> = (0..schema.groups().len())
        .map(|index| GroupBlock {
            index,
            fields: Vec::new(),
        })
        .collect();
    let last = groups.len().saturating_sub(1);
    for (pos, field) in schema.fields().iter().enumerate() {
        let gi = schema.group_index_for(pos).unwrap_or(last);
        let unit = unit_for(record, field);
        groups[gi].fields.push(FieldRender {
            name: field.name.clone(),
            label: humanize(&field.name),
            required: field.required,
            unit,
        });
    }
    RenderTree {
        title: title_for(record.action(), schema.entity_name()),
        target: submit_target(record.action(), &schema.route_name(), record.identity()),
        groups,
    }
}

// First match wins; a field with options and a long maximum is still a select.
fn unit_for(record: &Record, field: &FieldSchema) -> RenderUnit {
    let value = record.value(&field.name).unwrap_or("").to_string();
    let unit = if let Some(custom) = &field.custom {
        RenderUnit::Custom {
            renderer: custom.name().to_string(),
            body: Box::new(custom.render(record, &field.name)),
        }
    } else if matches!(field.kind, FieldKind::Date | FieldKind::DateTime) {
        RenderUnit::DateInput {
            date_only: field.kind == FieldKind::Date,
            value,
        }
    } else if field.kind == FieldKind::MultiChecklist && !field.options.is_empty() {
        let mut checked: Vec<String> = Vec::new();
        for item in parse_list(&value) {
            if !checked.contains(&item) {
                checked.push(item);
            }
        }
        RenderUnit::MultiChecklist {
            options: field.options.clone(),
            checked,
        }
    } else if !field.options.is_empty() {
        RenderUnit::SingleSelect {
            options: field.options.clone(),
            nullable_option: field.nullable,
            value,
        }
    } else if field.kind == FieldKind::RepeatableList {
        let items = parse_list(&value);
        let remove_control = !items.is_empty();
        RenderUnit::RepeatableList {
            items,
            add_control: true,
            remove_control,
        }
    } else if field.kind == FieldKind::LongText
        || field.max_length.is_some_and(|m| m > LONG_TEXT_THRESHOLD)
    {
        RenderUnit::LongText { value }
    } else {
        RenderUnit::TextInput {
            max_width: field.max_length,
            placeholder: field.name.clone(),
            value,
        }
    };
    if field.disabled {
        RenderUnit::Disabled(Box::new(unit))
    } else {
        unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::entities::{address, person};
    use crate::schema::FormSchema;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct Badge;

    impl CustomRenderer for Badge {
        fn name(&self) -> &str {
            "badge"
        }
        fn render(&self, record: &Record, field: &str) -> RenderUnit {
            RenderUnit::Static {
                lines: vec![format!("<{}>", record.value(field).unwrap_or(""))],
            }
        }
    }

    fn seeded(schema: FormSchema, pairs: &[(&str, &str)]) -> Record {
        let seed: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(schema).create_record(Some(&seed))
    }

    #[test]
    fn seeded_values_survive_render_and_read_back() {
        let rec = seeded(person().unwrap(), &[("first_name", "Mario"), ("last_name", "Mario")]);
        let tree = render(&rec);
        let back = tree.read_back();
        assert_eq!(back.get("first_name").map(String::as_str), Some("Mario"));
        assert_eq!(back.get("last_name").map(String::as_str), Some("Mario"));
        assert_eq!(back.len(), rec.schema().fields().len());
    }

    #[test]
    fn person_units_follow_selection_precedence() {
        let rec = seeded(person().unwrap(), &[("nicks", r#"["Jumpman"]"#)]);
        let tree = render(&rec);
        assert!(matches!(
            tree.field("first_name").unwrap().unit,
            RenderUnit::TextInput { max_width: Some(30), .. }
        ));
        assert!(matches!(
            tree.field("dob").unwrap().unit,
            RenderUnit::DateInput { date_only: true, .. }
        ));
        assert!(matches!(tree.field("sex").unwrap().unit, RenderUnit::SingleSelect { .. }));
        assert!(matches!(tree.field("notes").unwrap().unit, RenderUnit::LongText { .. }));
        match &tree.field("nicks").unwrap().unit {
            RenderUnit::RepeatableList {
                items,
                remove_control,
                ..
            } => {
                assert_eq!(items, &vec!["Jumpman".to_string()]);
                assert!(*remove_control);
            }
            other => panic!("unexpected unit {other:?}"),
        }
    }

    #[test]
    fn options_win_over_long_text_threshold() {
        let schema = FormSchema::new(
            "T",
            vec![FieldSchema::select("s", &["a", "b"]).max_length(1000).nullable()],
            None,
        )
        .unwrap();
        let tree = render(&Arc::new(schema).create_record(None));
        assert_eq!(
            tree.field("s").unwrap().unit,
            RenderUnit::SingleSelect {
                options: vec!["a".into(), "b".into()],
                nullable_option: true,
                value: String::new(),
            }
        );
    }

    #[test]
    fn checklist_tolerates_malformed_value() {
        let schema = FormSchema::new(
            "T",
            vec![FieldSchema::checklist("days", &["Mon", "Tue"])],
            None,
        )
        .unwrap();
        let rec = seeded(schema, &[("days", "Mon, Tue")]);
        match &render(&rec).field("days").unwrap().unit {
            RenderUnit::MultiChecklist { checked, .. } => assert!(checked.is_empty()),
            other => panic!("unexpected unit {other:?}"),
        }
    }

    #[test]
    fn custom_and_disabled_wrap_units() {
        let schema = FormSchema::new(
            "T",
            vec![
                FieldSchema::custom("pic", Arc::new(Badge)).max_length(10),
                FieldSchema::date("d").disabled(),
            ],
            None,
        )
        .unwrap();
        let rec = seeded(schema, &[("pic", "me"), ("d", "2020-01-01")]);
        let tree = render(&rec);
        match &tree.field("pic").unwrap().unit {
            RenderUnit::Custom { renderer, body } => {
                assert_eq!(renderer, "badge");
                assert_eq!(
                    **body,
                    RenderUnit::Static {
                        lines: vec!["<me>".into()]
                    }
                );
            }
            other => panic!("unexpected unit {other:?}"),
        }
        let d = &tree.field("d").unwrap().unit;
        assert!(d.is_disabled());
        assert_eq!(d.value_text().as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn title_and_target_derive_from_action() {
        let schema = Arc::new(address().unwrap());
        let mut rec = schema.create_record(None);
        let tree = render(&rec);
        assert_eq!(tree.title, "Add New Address");
        assert_eq!(tree.target.path, "/insert_address");

        rec = rec.with_identity("abc123");
        rec.set_action(Action::Update);
        let tree = render(&rec);
        assert_eq!(tree.title, "Update Address");
        assert_eq!(tree.target.method, Method::Post);
        assert_eq!(tree.target.path, "/update_address?oid=abc123");
    }

    #[test]
    fn fields_land_in_their_groups() {
        let rec = Arc::new(person().unwrap()).create_record(None);
        let tree = render(&rec);
        let sizes: Vec<usize> = tree.groups.iter().map(|g| g.fields.len()).collect();
        assert_eq!(sizes, vec![4, 2, 4, 1]);
    }

    #[test]
    fn identity_is_escaped_in_the_update_path() {
        let target = submit_target(Some(Action::Update), "person", Some("a b&c=d"));
        assert_eq!(target.path, "/update_person?oid=a+b%26c%3Dd");
        let target = submit_target(Some(Action::Insert), "person", Some("a b"));
        assert_eq!(target.path, "/insert_person");
    }
}
