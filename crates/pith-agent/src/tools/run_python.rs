//! `run_python` sandbox vehicle, per §4.4.3.1: the tool name is unchanged
//! from spec, but the embedded language is Lua via `mlua`, sandboxed the
//! same way the extension registry's `lua_runtime` sandboxes plugin scripts.
//! No `os`/`io` library is loaded; the only filesystem access is through the
//! injected `read`/`write`/`edit` closures, each routed through the same
//! sandbox-check code path as the top-level tools of the same name.

use mlua::{Lua, LuaOptions, StdLib, Value as LuaValue};
use serde_json::Value as JsonValue;

use async_trait::async_trait;
use std::sync::Arc;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub fn run_sandboxed(builtin: &BuiltinTools, code: &str) -> Result<String, String> {
    let safe_libs = StdLib::STRING | StdLib::TABLE | StdLib::MATH;
    let lua = Lua::new_with(safe_libs, LuaOptions::default()).map_err(|e| format!("sandbox init error: {e}"))?;

    lua.scope(|scope| {
        let read_fn = scope.create_function(|_, path: String| {
            builtin.read(&path).map_err(mlua::Error::RuntimeError)
        })?;
        lua.globals().set("read", read_fn)?;

        let write_fn = scope.create_function(|_, (path, content): (String, String)| {
            builtin.write(&path, &content).map_err(mlua::Error::RuntimeError)
        })?;
        lua.globals().set("write", write_fn)?;

        let edit_fn = scope.create_function(|_, (path, old, new): (String, String, String)| {
            builtin.edit(&path, &old, &new).map_err(mlua::Error::RuntimeError)
        })?;
        lua.globals().set("edit", edit_fn)?;

        let value: LuaValue = lua.load(code).eval()?;
        Ok(lua_value_to_string(value))
    })
    .map_err(|e| format!("lua error: {e}"))
}

fn lua_value_to_string(value: LuaValue) -> String {
    match value {
        LuaValue::String(s) => s.to_str().unwrap_or_default().to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) => n.to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Nil => String::new(),
        other => format!("{other:?}"),
    }
}

pub struct RunPythonTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for RunPythonTool {
    fn name(&self) -> &str {
        "run_python"
    }

    fn description(&self) -> &str {
        "Execute a snippet of code in a sandboxed interpreter with read/write/edit callbacks. No filesystem or network access beyond those callbacks."
    }

    fn input_schema(&self) -> JsonValue {
        serde_json::json!({
            "type": "object",
            "properties": { "code": { "type": "string" } },
            "required": ["code"],
        })
    }

    async fn execute(&self, input: JsonValue) -> ToolResult {
        let Some(code) = input.get("code").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required field 'code'");
        };
        let builtin = self.builtin.clone();
        let code = code.to_string();
        let result = tokio::task::spawn_blocking(move || run_sandboxed(&builtin, &code))
            .await
            .unwrap_or_else(|e| Err(format!("interpreter task panicked: {e}")));
        match result {
            Ok(output) => ToolResult::success(self.builtin.truncate_output(output)),
            Err(e) => ToolResult::error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretBroker;
    use pith_extensions::ExtensionRegistry;
    use pith_mcp::McpRegistry;
    use pith_store::Store;
    use tempfile::TempDir;

    fn builtin(dir: &std::path::Path) -> BuiltinTools {
        BuiltinTools {
            store: Arc::new(Store::open_in_memory().unwrap()),
            workspace_root: dir.to_path_buf(),
            extensions: Arc::new(ExtensionRegistry::new("mcp")),
            mcp: Arc::new(McpRegistry::new("mcp")),
            secrets: Arc::new(SecretBroker::new()),
            remote_tool_prefix: "mcp".to_string(),
            tool_output_max_chars: 8_000,
        }
    }

    #[test]
    fn evaluates_pure_expression() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        assert_eq!(run_sandboxed(&tools, "return 1 + 2").unwrap(), "3");
    }

    #[test]
    fn write_callback_goes_through_sandbox() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        run_sandboxed(&tools, "return write('a.txt', 'hi')").unwrap();
        assert_eq!(tools.read("a.txt").unwrap(), "hi");
    }

    #[test]
    fn has_no_os_library() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        let err = run_sandboxed(&tools, "return os.time()").unwrap_err();
        assert!(err.contains("lua error"));
    }
}
