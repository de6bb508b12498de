//! Typed parameter specifications and their JSON schema export.

use crate::llm::ToolMetadata;
use serde_json::{json, Map, Value};

/// Numeric-string pattern every Asana GID follows.
pub const GID_PATTERN: &str = r"^\d+$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    fn schema_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    pub allowed_values: Option<Vec<String>>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub pattern: Option<String>,
    pub min_length: Option<u64>,
    /// Filled into validated arguments when the caller omits the parameter.
    pub default: Option<Value>,
}

impl ParamSpec {
    fn new(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: false,
            allowed_values: None,
            minimum: None,
            maximum: None,
            pattern: None,
            min_length: None,
            default: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    /// A GID parameter: a non-empty numeric string.
    pub fn gid(name: &str, description: &str) -> Self {
        Self::string(name, description).pattern(GID_PATTERN)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.min_length = Some(1);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn property_schema(&self) -> Value {
        let mut property = Map::new();
        property.insert("type".to_string(), json!(self.param_type.schema_name()));
        property.insert("description".to_string(), json!(self.description));
        if let Some(values) = &self.allowed_values {
            property.insert("enum".to_string(), json!(values));
        }
        if let Some(minimum) = self.minimum {
            property.insert("minimum".to_string(), json!(minimum));
        }
        if let Some(maximum) = self.maximum {
            property.insert("maximum".to_string(), json!(maximum));
        }
        if let Some(pattern) = &self.pattern {
            property.insert("pattern".to_string(), json!(pattern));
        }
        if let Some(min_length) = self.min_length {
            property.insert("minLength".to_string(), json!(min_length));
        }
        if let Some(default) = &self.default {
            property.insert("default".to_string(), default.clone());
        }
        Value::Object(property)
    }
}

/// Name, description and parameters of one callable tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// JSON schema of the argument object.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.params {
            properties.insert(spec.name.clone(), spec.property_schema());
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    pub fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }

    /// Copies declared defaults into `arguments` for omitted parameters.
    pub fn apply_defaults(&self, arguments: &mut Value) {
        if let Value::Object(map) = arguments {
            for spec in &self.params {
                if let Some(default) = &spec.default {
                    map.entry(spec.name.clone()).or_insert_with(|| default.clone());
                }
            }
        }
    }
}
