use super::RegistryError;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    FilePath,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    File,
    Table,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    StringList,
    Bool,
    Integer,
}

#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub arg_type: ArgType,
    pub required: bool,
}

/// Declared shape of an operation's `arguments` map. Used by both the
/// Workflow Executor (trusted proposals) and the Chat Service's
/// `modified_workflow` validation pipeline (spec §9) to coerce untyped
/// JSON into checked values, rejecting unknown keys.
#[derive(Debug, Clone)]
pub struct ArgSchema {
    pub specs: &'static [ArgSpec],
}

impl ArgSchema {
    pub const fn new(specs: &'static [ArgSpec]) -> Self {
        Self { specs }
    }

    pub fn validate(
        &self,
        operation_id: &str,
        arguments: &BTreeMap<String, JsonValue>,
    ) -> Result<(), RegistryError> {
        for (key, value) in arguments {
            let spec = self
                .specs
                .iter()
                .find(|s| s.name == key)
                .ok_or_else(|| RegistryError::UnknownArgument {
                    operation_id: operation_id.to_string(),
                    key: key.clone(),
                })?;
            if !type_matches(spec.arg_type, value) {
                return Err(RegistryError::InvalidArgument {
                    operation_id: operation_id.to_string(),
                    key: key.clone(),
                    reason: format!("expected {:?}", spec.arg_type),
                });
            }
        }
        for spec in self.specs {
            if spec.required && !arguments.contains_key(spec.name) {
                return Err(RegistryError::InvalidArgument {
                    operation_id: operation_id.to_string(),
                    key: spec.name.to_string(),
                    reason: "required argument missing".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn type_matches(arg_type: ArgType, value: &JsonValue) -> bool {
    match arg_type {
        ArgType::String => value.is_string(),
        ArgType::StringList => value
            .as_array()
            .map(|items| items.iter().all(|item| item.is_string()))
            .unwrap_or(false),
        ArgType::Bool => value.is_boolean(),
        ArgType::Integer => value.is_i64() || value.is_u64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPECS: &[ArgSpec] = &[
        ArgSpec {
            name: "columns",
            arg_type: ArgType::StringList,
            required: true,
        },
        ArgSpec {
            name: "remove_duplicates",
            arg_type: ArgType::Bool,
            required: false,
        },
    ];

    #[test]
    fn accepts_valid_arguments() {
        let schema = ArgSchema::new(SPECS);
        let mut args = BTreeMap::new();
        args.insert("columns".to_string(), json!(["name", "email"]));
        assert!(schema.validate("excel/extract-columns-to-file", &args).is_ok());
    }

    #[test]
    fn rejects_unknown_keys() {
        let schema = ArgSchema::new(SPECS);
        let mut args = BTreeMap::new();
        args.insert("columns".to_string(), json!(["name"]));
        args.insert("bogus".to_string(), json!(true));
        let err = schema
            .validate("excel/extract-columns-to-file", &args)
            .expect_err("should reject unknown key");
        assert!(matches!(err, RegistryError::UnknownArgument { .. }));
    }

    #[test]
    fn rejects_missing_required_keys() {
        let schema = ArgSchema::new(SPECS);
        let args = BTreeMap::new();
        let err = schema
            .validate("excel/extract-columns-to-file", &args)
            .expect_err("should reject missing required arg");
        assert!(matches!(err, RegistryError::InvalidArgument { .. }));
    }
}
