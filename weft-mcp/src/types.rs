use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool as declared by a remote server's `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema", rename = "inputSchema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_decodes_wire_shape() {
        let json = serde_json::json!({
            "name": "echo",
            "description": "Echo text back",
            "inputSchema": {
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }
        });
        let tool: ToolDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(tool.name, "echo");
        assert_eq!(tool.input_schema["required"][0], "text");
    }

    #[test]
    fn test_descriptor_defaults() {
        let tool: ToolDescriptor =
            serde_json::from_value(serde_json::json!({ "name": "ping" })).unwrap();
        assert!(tool.description.is_empty());
        assert_eq!(tool.input_schema["type"], "object");
    }
}
