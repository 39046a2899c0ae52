//! AttributeResolver port - logical field name -> typed attribute.

/// How an attribute's values are interpreted by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSyntax {
    DirectoryString,
    GeneralizedTime,
}

/// Descriptor of a physical attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeType {
    pub name: String,
    pub syntax: AttributeSyntax,
    pub single_valued: bool,
}

impl AttributeType {
    /// Descriptor used when the schema does not know the field.
    pub fn default_for(logical_name: &str) -> Self {
        Self {
            name: logical_name.to_string(),
            syntax: AttributeSyntax::DirectoryString,
            single_valued: false,
        }
    }
}

pub trait AttributeResolver: Send + Sync {
    /// Look up `logical_name` (matched case-insensitively).
    fn resolve(&self, logical_name: &str) -> Option<AttributeType>;

    fn resolve_or_default(&self, logical_name: &str) -> AttributeType {
        self.resolve(&logical_name.to_ascii_lowercase())
            .unwrap_or_else(|| AttributeType::default_for(logical_name))
    }
}
