//! Toolbar actions: turns "add / update / cat on the current table" into
//! board pushes, refusing tables that have no form.

use crate::board::{BoardHooks, FormController};
use crate::error::DispatchError;
use crate::schema::entities::SchemaRegistry;
use crate::schema::{Action, FormSchema};
use crate::services::transport::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Dispatcher {
    registry: SchemaRegistry,
    entity: String,
    selected: Option<Row>,
}

impl Dispatcher {
    pub fn new(registry: SchemaRegistry, entity: impl Into<String>) -> Self {
        Self {
            registry,
            entity: entity.into().to_lowercase(),
            selected: None,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Switches table; the selection does not carry over.
    pub fn set_entity(&mut self, entity: &str) {
        self.entity = entity.to_lowercase();
        self.selected = None;
    }

    pub fn select(&mut self, row: Option<Row>) {
        self.selected = row;
    }

    pub fn selected(&self) -> Option<&Row> {
        self.selected.as_ref()
    }

    /// Form schema of the current table, if it has one.
    pub fn schema(&self) -> Option<&Arc<FormSchema>> {
        self.registry.get(&self.entity)
    }

    pub fn supports_forms(&self) -> bool {
        self.has_form(&self.entity)
    }

    pub fn has_form(&self, entity: &str) -> bool {
        self.registry.supports(entity)
    }

    fn schema_for(&self, action: Action) -> Result<&Arc<FormSchema>, DispatchError> {
        self.registry.get(&self.entity).ok_or_else(|| {
            warn!(entity = %self.entity, %action, "no operator for table");
            DispatchError::Unsupported {
                entity: self.entity.clone(),
                action: action.as_str().to_string(),
            }
        })
    }

    pub fn open_insert<H: BoardHooks>(
        &self,
        board: &mut FormController<H>,
    ) -> Result<(), DispatchError> {
        let schema = self.schema_for(Action::Insert)?;
        board.push_record(Action::Insert, schema.create_record(None))?;
        Ok(())
    }

    /// Opens the selected row for editing, seeded with the values as they
    /// are displayed. Positional checklists are translated to labels.
    pub fn open_update<H: BoardHooks>(
        &self,
        board: &mut FormController<H>,
    ) -> Result<(), DispatchError> {
        let row = self.selected.as_ref().ok_or(DispatchError::NoSelection)?;
        let schema = self.schema_for(Action::Update)?;
        let seed: HashMap<String, String> = row
            .cells
            .iter()
            .map(|(k, v)| {
                let value = match schema.field(k) {
                    Some(field) => field.decode_stored(v),
                    None => v.clone(),
                };
                (k.clone(), value)
            })
            .collect();
        let mut record = schema.create_record(Some(&seed));
        if let Some(id) = &row.id {
            record = record.with_identity(id.clone());
        }
        debug!(entity = %self.entity, id = ?row.id, "open update");
        board.push_record(Action::Update, record)?;
        Ok(())
    }

    /// The cat button has no operation behind it on any table.
    pub fn open_cat<H: BoardHooks>(
        &self,
        _board: &mut FormController<H>,
    ) -> Result<(), DispatchError> {
        if self.selected.is_none() {
            return Err(DispatchError::NoSelection);
        }
        warn!(entity = %self.entity, "cat action requested");
        Err(DispatchError::Unsupported {
            entity: self.entity.clone(),
            action: Action::Cat.as_str().to_string(),
        })
    }
}
