//! Tool schema generation for the chat-completions `tools` array.

use delta_domain::interaction::ASK_HUMAN_TOOL;
use delta_domain::tool::ToolDefinition;

/// JSON schema for one configured tool: every parameter is a string and
/// all of them are required.
pub fn tool_schema(tool: &ToolDefinition) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for param in &tool.parameters {
        let mut prop = serde_json::Map::new();
        prop.insert("type".into(), serde_json::json!("string"));
        if let Some(desc) = &param.description {
            prop.insert("description".into(), serde_json::json!(desc));
        }
        properties.insert(param.name.clone(), serde_json::Value::Object(prop));
        required.push(serde_json::json!(param.name));
    }

    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description.clone().unwrap_or_else(|| format!(
                "Execute: {}", tool.command.join(" ")
            )),
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        }
    })
}

/// The built-in human-interaction tool. Only `prompt` is required.
pub fn ask_human_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": ASK_HUMAN_TOOL,
            "description": "Ask the human operator a question and wait for their reply. \
                            Use this when the task cannot proceed without human input.",
            "parameters": {
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The question to ask the human"
                    },
                    "input_type": {
                        "type": "string",
                        "enum": ["text", "password", "confirmation"],
                        "description": "Kind of answer expected (default: text)"
                    },
                    "sensitive": {
                        "type": "boolean",
                        "description": "Whether the answer should be hidden from logs"
                    }
                },
                "required": ["prompt"]
            }
        }
    })
}

/// Schemas for the full catalog: configured tools plus `ask_human`.
pub fn all_schemas(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
    let mut schemas: Vec<serde_json::Value> = tools.iter().map(tool_schema).collect();
    schemas.push(ask_human_schema());
    schemas
}
