//! Schema registry: every argument schema an application declares, by name.

use std::collections::BTreeMap;

use autocli_core::naming::{COMMON_SCHEMA, schema_name_for_token};
use autocli_core::{ArgsSchema, validate_schema};

use crate::ConfigError;

/// Argument schemas indexed by name.
///
/// Every schema is validated when registered, so later lookups only ever
/// return well-formed definitions.
///
/// # Examples
///
/// ```
/// use autocli_core::{ArgsSchema, FieldSpec};
/// use autocli_dispatch::SchemaRegistry;
///
/// let mut registry = SchemaRegistry::new();
/// registry
///     .register(ArgsSchema::new("ShowFileArgs").with_field(FieldSpec::string("path")))
///     .unwrap();
///
/// assert!(registry.for_token("show-file").is_some());
/// assert!(registry.for_token("greet").is_none());
/// assert_eq!(registry.fallback().name, "CommonArgs");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, ArgsSchema>,
    common: Option<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a schema.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Schema`] when the definition is invalid,
    /// [`ConfigError::DuplicateSchema`] when the name is taken.
    pub fn register(&mut self, schema: ArgsSchema) -> Result<(), ConfigError> {
        if let Some(source) = validate_schema(&schema).into_iter().next() {
            return Err(ConfigError::Schema {
                schema: schema.name.clone(),
                source,
            });
        }
        if self.schemas.contains_key(&schema.name) {
            return Err(ConfigError::DuplicateSchema(schema.name));
        }
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Registers the shared schema used when nothing else applies.
    pub fn register_common(&mut self, schema: ArgsSchema) -> Result<(), ConfigError> {
        let name = schema.name.clone();
        self.register(schema)?;
        self.common = Some(name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArgsSchema> {
        self.schemas.get(name)
    }

    /// Looks up the schema named by convention after a subcommand token.
    pub fn for_token(&self, token: &str) -> Option<&ArgsSchema> {
        self.get(&schema_name_for_token(token))
    }

    /// The registered common schema, if any.
    pub fn common(&self) -> Option<&ArgsSchema> {
        self.common.as_deref().and_then(|name| self.get(name))
    }

    /// The common schema, or an empty built-in `CommonArgs`.
    pub fn fallback(&self) -> ArgsSchema {
        self.common()
            .cloned()
            .unwrap_or_else(|| ArgsSchema::new(COMMON_SCHEMA))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use autocli_core::{FieldSpec, SchemaError};

    use super::*;

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(ArgsSchema::new("GreetArgs")).unwrap();
        let err = registry.register(ArgsSchema::new("GreetArgs")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSchema(name) if name == "GreetArgs"));
    }

    #[test]
    fn test_invalid_schema_rejected_at_registration() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register(ArgsSchema::new("BadArgs").with_field(FieldSpec::boolean("help")))
            .unwrap_err();
        match err {
            ConfigError::Schema { schema, source } => {
                assert_eq!(schema, "BadArgs");
                assert_eq!(source, SchemaError::ReservedField("help".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_common_is_fallback() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_common(ArgsSchema::new("CommonArgs").with_field(FieldSpec::boolean("verbose")))
            .unwrap();
        assert_eq!(registry.fallback().field_names(), vec!["verbose"]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["CommonArgs"]);
    }

    #[test]
    fn test_token_lookup_uses_pascal_name() {
        let mut registry = SchemaRegistry::new();
        registry.register(ArgsSchema::new("ShowFileArgs")).unwrap();
        assert_eq!(registry.for_token("show-file").map(|s| s.name.as_str()), Some("ShowFileArgs"));
        assert!(registry.get("showfileargs").is_none());
    }
}
