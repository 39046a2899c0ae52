//! Raw attribute-keyed record as exchanged with the record store.
//!
//! An entry is an ordered list of attributes. The same attribute name may
//! appear more than once with different option sets (e.g. language tags);
//! single-valued task fields reject that.

use serde::{Deserialize, Serialize};

use super::errors::InitializationError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    #[serde(default)]
    pub values: Vec<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
            values,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    attributes: Vec<Attribute>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to the option-less attribute `name`, creating it if needed.
    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.is_named(name) && a.options.is_empty())
        {
            Some(attr) => attr.values.push(value),
            None => self.attributes.push(Attribute::new(name, vec![value])),
        }
        self
    }

    pub fn with_values<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values
            .into_iter()
            .fold(self, |entry, value| entry.with_value(name, value))
    }

    /// Add a whole attribute instance as-is, options included.
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// All instances of `name` (case-insensitive), in entry order.
    pub fn attributes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Attribute> {
        self.attributes.iter().filter(move |a| a.is_named(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes_named(name).next().is_some()
    }

    /// The single value of `name`, or `None` when absent or empty.
    ///
    /// Fails on more than one attribute instance or more than one value.
    pub fn single_value(&self, name: &str) -> Result<Option<&str>, InitializationError> {
        let Some(attr) = self.only_instance(name)? else {
            return Ok(None);
        };
        match attr.values.as_slice() {
            [] => Ok(None),
            [value] => Ok(Some(value.as_str())),
            _ => Err(InitializationError::MultipleValues {
                attribute: name.to_string(),
            }),
        }
    }

    /// Every value of `name` in order; empty when absent.
    pub fn values(&self, name: &str) -> Result<Vec<String>, InitializationError> {
        Ok(self
            .only_instance(name)?
            .map(|attr| attr.values.clone())
            .unwrap_or_default())
    }

    fn only_instance(&self, name: &str) -> Result<Option<&Attribute>, InitializationError> {
        let mut instances = self.attributes.iter().filter(|a| a.is_named(name));
        let first = instances.next();
        if instances.next().is_some() {
            return Err(InitializationError::MultipleAttributes {
                attribute: name.to_string(),
            });
        }
        Ok(first)
    }

    /// Replace every instance of `name` with a single option-less attribute.
    /// An empty `values` removes the attribute.
    pub fn put_attribute(&mut self, name: &str, values: Vec<String>) {
        let position = self.attributes.iter().position(|a| a.is_named(name));
        self.attributes.retain(|a| !a.is_named(name));
        if values.is_empty() {
            return;
        }
        let attr = Attribute::new(name, values);
        match position {
            Some(index) => self.attributes.insert(index.min(self.attributes.len()), attr),
            None => self.attributes.push(attr),
        }
    }

    /// Append one value to `name`, keeping the attribute's position.
    pub fn add_value(&mut self, name: &str, value: String) {
        match self.attributes.iter_mut().find(|a| a.is_named(name)) {
            Some(attr) => attr.values.push(value),
            None => self.attributes.push(Attribute::new(name, vec![value])),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| !a.is_named(name));
        self.attributes.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_is_case_insensitive() {
        let entry = Entry::new().with_value("ds-task-id", "T1");

        assert_eq!(entry.single_value("DS-TASK-ID").unwrap(), Some("T1"));
        assert_eq!(entry.single_value("ds-task-state").unwrap(), None);
    }

    #[test]
    fn looked_up_value_outlives_the_name() {
        let entry = Entry::new().with_value("ds-task-id", "T1");

        let value = {
            let name = String::from("ds-task-id");
            entry.single_value(&name).unwrap()
        };
        assert_eq!(value, Some("T1"));
    }

    #[test]
    fn single_value_rejects_multiple_values() {
        let entry = Entry::new().with_values("ds-task-state", ["RUNNING", "UNSCHEDULED"]);

        let err = entry.single_value("ds-task-state").unwrap_err();
        assert!(matches!(err, InitializationError::MultipleValues { .. }));
    }

    #[test]
    fn multiple_instances_are_rejected_even_for_lists() {
        let entry = Entry::new()
            .with_value("ds-task-dependency-id", "A")
            .with_attribute(
                Attribute::new("ds-task-dependency-id", vec!["B".into()])
                    .with_options(vec!["lang-en".into()]),
            );

        assert!(matches!(
            entry.values("ds-task-dependency-id"),
            Err(InitializationError::MultipleAttributes { .. })
        ));
    }

    #[test]
    fn empty_attribute_reads_as_absent() {
        let entry = Entry::new().with_attribute(Attribute::new("ds-task-state", vec![]));

        assert_eq!(entry.single_value("ds-task-state").unwrap(), None);
        assert!(entry.values("ds-task-state").unwrap().is_empty());
    }

    #[test]
    fn put_attribute_replaces_in_place() {
        let mut entry = Entry::new()
            .with_value("a", "1")
            .with_value("b", "2")
            .with_value("c", "3");

        entry.put_attribute("B", vec!["20".into()]);
        let names: Vec<_> = entry.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "B", "c"]);
        assert_eq!(entry.single_value("b").unwrap(), Some("20"));

        entry.put_attribute("b", vec![]);
        assert!(!entry.contains("b"));
    }

    #[test]
    fn deserializes_without_options() {
        let entry: Entry = serde_json::from_str(
            r#"{"attributes":[{"name":"ds-task-id","values":["T1"]}]}"#,
        )
        .unwrap();

        assert_eq!(entry.single_value("ds-task-id").unwrap(), Some("T1"));
    }
}
