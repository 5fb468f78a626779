//! Table/column metadata supplied by the application.
//!
//! The core never discovers metadata on its own: callers describe each table once
//! with [`EntityMapping::builder`] (or their own [`TableMapping`] impl) and hand it
//! to [`FragmentBuilder`](crate::FragmentBuilder) and [`Dao`](crate::Dao).

use crate::error::{OrmError, OrmResult};
use heck::ToShoutySnakeCase;
use std::collections::HashMap;
use std::fmt;

/// Where a field is being used; mappings can hide fields per scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldScene {
    Select,
    Insert,
    Update,
    Where,
}

/// Metadata for a database table.
pub trait TableMapping: Send + Sync + fmt::Debug {
    /// The database table name.
    fn table_name(&self) -> &str;

    /// Column for a field, if the field is known.
    fn column_name(&self, field: &str) -> Option<&str>;

    /// The primary key field, if any.
    fn primary_key(&self) -> Option<&str>;

    /// Fields visible in `scene`, in declaration order.
    fn fields(&self, scene: FieldScene) -> Vec<&str>;

    fn contains_field(&self, field: &str) -> bool {
        self.column_name(field).is_some()
    }

    /// Column for a field; unknown fields are an error.
    fn column_of(&self, field: &str) -> OrmResult<&str> {
        self.column_name(field)
            .ok_or_else(|| OrmError::unsupported_field(self.table_name(), field))
    }

    /// Primary key field and column; tables without one are an error.
    fn primary_key_column(&self) -> OrmResult<(&str, &str)> {
        let field = self.primary_key().ok_or_else(|| {
            OrmError::PrimaryKeyRequired(format!("table {} has no primary key", self.table_name()))
        })?;
        Ok((field, self.column_of(field)?))
    }
}

/// Column information for one field.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub field: String,
    pub column: String,
    hidden: Vec<FieldScene>,
}

impl FieldMapping {
    pub fn visible_in(&self, scene: FieldScene) -> bool {
        !self.hidden.contains(&scene)
    }
}

/// Statically declared [`TableMapping`].
#[derive(Debug, Clone)]
pub struct EntityMapping {
    table: String,
    fields: Vec<FieldMapping>,
    by_field: HashMap<String, usize>,
    primary_key: Option<String>,
}

impl EntityMapping {
    /// Start describing `table`.
    ///
    /// ```ignore
    /// let users = EntityMapping::builder("SYS_USER")
    ///     .primary_key("id")
    ///     .field("userName")                 // USER_NAME
    ///     .column("deptCode", "DEPT")        // explicit column
    ///     .field("dataState")
    ///     .hidden("password", &[FieldScene::Select])
    ///     .build()?;
    /// ```
    pub fn builder(table: impl Into<String>) -> EntityMappingBuilder {
        EntityMappingBuilder {
            table: table.into(),
            fields: Vec::new(),
            primary_key: None,
        }
    }

    pub fn field_mappings(&self) -> &[FieldMapping] {
        &self.fields
    }
}

impl TableMapping for EntityMapping {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn column_name(&self, field: &str) -> Option<&str> {
        self.by_field
            .get(field)
            .map(|&i| self.fields[i].column.as_str())
    }

    fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    fn fields(&self, scene: FieldScene) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.visible_in(scene))
            .map(|f| f.field.as_str())
            .collect()
    }
}

/// Builder for [`EntityMapping`].
#[must_use]
#[derive(Debug, Clone)]
pub struct EntityMappingBuilder {
    table: String,
    fields: Vec<FieldMapping>,
    primary_key: Option<String>,
}

impl EntityMappingBuilder {
    /// Add a field whose column is derived from its name (`userName` -> `USER_NAME`).
    pub fn field(self, field: &str) -> Self {
        let column = field.to_shouty_snake_case();
        self.column(field, &column)
    }

    /// Add a field with an explicit column name.
    pub fn column(mut self, field: &str, column: &str) -> Self {
        self.fields.push(FieldMapping {
            field: field.to_string(),
            column: column.to_string(),
            hidden: Vec::new(),
        });
        self
    }

    /// Add a field that is not visible in the given scenes.
    pub fn hidden(mut self, field: &str, scenes: &[FieldScene]) -> Self {
        self = self.field(field);
        if let Some(last) = self.fields.last_mut() {
            last.hidden.extend_from_slice(scenes);
        }
        self
    }

    /// Declare the primary key field; it is added with a derived column if missing.
    pub fn primary_key(mut self, field: &str) -> Self {
        if !self.fields.iter().any(|f| f.field == field) {
            self = self.field(field);
        }
        self.primary_key = Some(field.to_string());
        self
    }

    pub fn build(self) -> OrmResult<EntityMapping> {
        if self.table.trim().is_empty() {
            return Err(OrmError::invalid_config("table name must not be empty"));
        }
        let mut by_field = HashMap::with_capacity(self.fields.len());
        for (i, f) in self.fields.iter().enumerate() {
            if by_field.insert(f.field.clone(), i).is_some() {
                return Err(OrmError::invalid_config(format!(
                    "field '{}' declared twice on {}",
                    f.field, self.table
                )));
            }
        }
        Ok(EntityMapping {
            table: self.table,
            fields: self.fields,
            by_field,
            primary_key: self.primary_key,
        })
    }
}
