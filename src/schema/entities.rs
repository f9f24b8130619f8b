use super::{FieldSchema, FormSchema};
use crate::error::SchemaError;
use std::collections::HashMap;
use std::sync::Arc;

/// Tables the dashboard can list, in default tab order.
pub const LISTED_ENTITIES: [&str; 5] = ["address", "person", "household", "group", "event"];

pub const SEX_OPTIONS: [&str; 3] = ["Undefined", "Male", "Female"];
pub const REOCCURRING_OPTIONS: [&str; 3] = ["Days", "Weeks", "Months"];
pub const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn person() -> Result<FormSchema, SchemaError> {
    FormSchema::new(
        "Person",
        vec![
            FieldSchema::text("first_name").required().max_length(30),
            FieldSchema::text("middle_name").max_length(30),
            FieldSchema::text("last_name").required().max_length(30),
            FieldSchema::list("nicks").max_length(30).nullable(),
            FieldSchema::date("dob").nullable(),
            FieldSchema::select("sex", &SEX_OPTIONS),
            FieldSchema::numeric("home_phone").max_length(25).nullable(),
            FieldSchema::numeric("work_phone").max_length(25).nullable(),
            FieldSchema::numeric("mobile_phone").max_length(25).nullable(),
            FieldSchema::numeric("emergency_contact").max_length(25),
            FieldSchema::text("notes").max_length(2048 * 4),
        ],
        Some(vec![4, 6, 10, 11]),
    )
}

pub fn address() -> Result<FormSchema, SchemaError> {
    FormSchema::new(
        "Address",
        vec![
            FieldSchema::text("line_one").required().max_length(100),
            FieldSchema::text("line_two").max_length(100),
            FieldSchema::text("line_three").max_length(100),
            FieldSchema::text("city").required().max_length(50),
            FieldSchema::text("region").required().max_length(50),
            FieldSchema::text("postal_code").max_length(15).nullable(),
            FieldSchema::text("county").max_length(50).nullable(),
            FieldSchema::text("country").max_length(50).nullable(),
        ],
        Some(vec![3, 5, 8]),
    )
}

pub fn group() -> Result<FormSchema, SchemaError> {
    FormSchema::new(
        "Group",
        vec![
            FieldSchema::text("group_name").required().max_length(50),
            FieldSchema::text("group_desc").max_length(2048),
        ],
        Some(vec![1, 2]),
    )
}

pub fn event() -> Result<FormSchema, SchemaError> {
    FormSchema::new(
        "Event",
        vec![
            FieldSchema::checklist("meeting_days", &WEEKDAYS).indexed(),
            FieldSchema::date_time("start_datetime").required(),
            FieldSchema::date_time("end_datetime").nullable(),
            FieldSchema::numeric("freq").required().max_length(3),
            FieldSchema::select("reoccuring", &REOCCURRING_OPTIONS).nullable(),
        ],
        Some(vec![1, 3, 5]),
    )
}

/// Entity route name -> schema. Entities without an entry have no
/// insert/update operator.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<FormSchema>>,
}

impl SchemaRegistry {
    pub fn standard() -> Result<Self, SchemaError> {
        let mut reg = Self::default();
        for schema in [person()?, address()?, group()?, event()?] {
            reg.register(schema);
        }
        Ok(reg)
    }

    pub fn register(&mut self, schema: FormSchema) {
        self.schemas.insert(schema.route_name(), Arc::new(schema));
    }

    pub fn get(&self, entity: &str) -> Option<&Arc<FormSchema>> {
        self.schemas.get(&entity.to_lowercase())
    }

    pub fn supports(&self, entity: &str) -> bool {
        self.get(entity).is_some()
    }
}
