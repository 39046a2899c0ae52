//! DirectorySchema - static AttributeResolver with the task attributes.

use std::collections::HashMap;

use crate::domain::TaskField;
use crate::ports::{AttributeResolver, AttributeSyntax, AttributeType};

#[derive(Debug, Clone, Default)]
pub struct DirectorySchema {
    types: HashMap<String, AttributeType>,
}

impl DirectorySchema {
    /// No attribute types; every lookup falls back to the default descriptor.
    pub fn empty() -> Self {
        Self::default()
    }

    /// All task fields registered under their standard names.
    pub fn standard() -> Self {
        TaskField::ALL
            .into_iter()
            .fold(Self::empty(), |schema, field| {
                let syntax = if field.is_timestamp() {
                    AttributeSyntax::GeneralizedTime
                } else {
                    AttributeSyntax::DirectoryString
                };
                let single_valued = !matches!(
                    field,
                    TaskField::DependencyIds
                        | TaskField::NotifyOnCompletion
                        | TaskField::NotifyOnError
                        | TaskField::LogMessages
                );
                schema.with_type(AttributeType {
                    name: field.logical_name().to_string(),
                    syntax,
                    single_valued,
                })
            })
    }

    pub fn with_type(self, attribute_type: AttributeType) -> Self {
        let logical_name = attribute_type.name.clone();
        self.with_mapping(&logical_name, attribute_type)
    }

    /// Store `logical_name` under a differently named physical attribute.
    pub fn with_mapping(mut self, logical_name: &str, attribute_type: AttributeType) -> Self {
        self.types
            .insert(logical_name.to_ascii_lowercase(), attribute_type);
        self
    }
}

impl AttributeResolver for DirectorySchema {
    fn resolve(&self, logical_name: &str) -> Option<AttributeType> {
        self.types.get(&logical_name.to_ascii_lowercase()).cloned()
    }
}
