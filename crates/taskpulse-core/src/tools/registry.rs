//! Tool registry: name lookup, deterministic schema export and argument validation.

use crate::core_types::ToolCall;
use crate::errors::AssistantError;
use crate::llm::ToolMetadata;
use crate::tools::{Tool, ToolDefinition};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

struct RegisteredTool {
    definition: ToolDefinition,
    metadata: ToolMetadata,
    schema: JSONSchema,
    tool: Arc<dyn Tool>,
}

/// A call that passed validation, with declared defaults filled in.
#[derive(Clone)]
pub struct ValidatedCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub tool: Arc<dyn Tool>,
}

impl std::fmt::Debug for ValidatedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedCall")
            .field("call_id", &self.call_id)
            .field("tool_name", &self.tool_name)
            .field("arguments", &self.arguments)
            .finish()
    }
}

/// Registered tools in registration order. Built once at startup and shared
/// read-only afterwards.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), AssistantError> {
        let definition = tool.definition();
        if self.index.contains_key(&definition.name) {
            return Err(AssistantError::DuplicateTool(definition.name));
        }

        let metadata = definition.metadata();
        let schema = JSONSchema::compile(&metadata.input_schema).map_err(|e| {
            AssistantError::ConfigError(format!(
                "Invalid parameter schema for tool '{}': {}",
                definition.name, e
            ))
        })?;

        log::debug!("Registered tool '{}'", definition.name);
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            definition,
            metadata,
            schema,
            tool,
        });
        Ok(())
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].tool.clone())
    }

    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i].definition)
    }

    /// Schemas in registration order, identical on every call.
    pub fn list(&self) -> Vec<ToolMetadata> {
        self.tools.iter().map(|t| t.metadata.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.definition.name.as_str()).collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Checks a call against its tool's schema, reporting every violation.
    pub fn validate(&self, call: &ToolCall) -> Result<ValidatedCall, AssistantError> {
        let entry = self
            .index
            .get(&call.name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| AssistantError::UnknownTool(call.name.clone()))?;

        if let Err(errors) = entry.schema.validate(&call.arguments) {
            let violations: Vec<String> = errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    let path = if path.is_empty() { "root".to_string() } else { path };
                    format!("{}: {}", path, error)
                })
                .collect();
            return Err(AssistantError::InvalidArguments {
                tool_name: call.name.clone(),
                violations,
            });
        }

        let mut arguments = call.arguments.clone();
        entry.definition.apply_defaults(&mut arguments);

        Ok(ValidatedCall {
            call_id: call.id.clone().unwrap_or_default(),
            tool_name: call.name.clone(),
            arguments,
            tool: entry.tool.clone(),
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
