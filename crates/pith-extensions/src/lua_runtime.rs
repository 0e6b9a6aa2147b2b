use std::path::Path;

use mlua::{Lua, LuaOptions, StdLib, Value as LuaValue};

use pith_core::sandbox::{resolve_for_write, resolve_readable};

use crate::error::{ExtensionError, Result};

/// Every plugin VM gets strings, tables, math — no `os`, no `io`. Per §4.2.1,
/// plugins get no ambient filesystem or network access, only what's
/// explicitly injected. Mirrors `tools/run_python.rs`'s sandbox.
fn sandboxed_lua() -> Result<Lua> {
    let safe_libs = StdLib::STRING | StdLib::TABLE | StdLib::MATH;
    Lua::new_with(safe_libs, LuaOptions::default())
        .map_err(|e| ExtensionError::Channel(format!("sandbox init error: {e}")))
}

/// Run a tool plugin's `tool(args_json)` entry point in a fresh, sandboxed
/// Lua VM, with `read`/`write`/`edit` injected and routed through the same
/// workspace sandbox as the top-level tools of the same name.
pub fn call_tool_script(source: &str, args: &serde_json::Value, workspace_root: &Path) -> Result<String> {
    let lua = sandboxed_lua()?;

    let args_json = serde_json::to_string(args).unwrap_or_else(|_| "{}".to_string());
    let result = lua
        .scope(|scope| {
            let root = workspace_root.to_path_buf();
            let read_fn = scope.create_function(move |_, path: String| {
                resolve_readable(&root, &path)
                    .map_err(|e| mlua::Error::RuntimeError(e.to_string()))
                    .and_then(|p| std::fs::read_to_string(p).map_err(|e| mlua::Error::RuntimeError(e.to_string())))
            })?;
            lua.globals().set("read", read_fn)?;

            let root = workspace_root.to_path_buf();
            let write_fn = scope.create_function(move |_, (path, content): (String, String)| {
                let resolved = resolve_for_write(&root, &path).map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                std::fs::write(&resolved, &content).map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                Ok(format!("written {}", resolved.display()))
            })?;
            lua.globals().set("write", write_fn)?;

            let root = workspace_root.to_path_buf();
            let edit_fn = scope.create_function(move |_, (path, old, new): (String, String, String)| {
                let resolved = resolve_readable(&root, &path).map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                let content = std::fs::read_to_string(&resolved).map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                let Some(offset) = content.find(&old) else {
                    return Err(mlua::Error::RuntimeError("old content not found".to_string()));
                };
                let mut updated = String::with_capacity(content.len());
                updated.push_str(&content[..offset]);
                updated.push_str(&new);
                updated.push_str(&content[offset + old.len()..]);
                std::fs::write(&resolved, &updated).map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                Ok(format!("edited {}", resolved.display()))
            })?;
            lua.globals().set("edit", edit_fn)?;

            lua.load(source)
                .exec()
                .map_err(|e| mlua::Error::RuntimeError(format!("load error: {e}")))?;

            let present: bool = lua
                .globals()
                .get::<_, mlua::Value>("tool")
                .map(|v| !matches!(v, mlua::Value::Nil))
                .unwrap_or(false);
            if !present {
                return Err(mlua::Error::RuntimeError(MISSING_TOOL_ENTRY_POINT.to_string()));
            }

            let func: mlua::Function = lua.globals().get("tool")?;
            let value: LuaValue = func.call(args_json)?;
            Ok(lua_value_to_string(value))
        })
        .map_err(|e| match e {
            mlua::Error::RuntimeError(ref msg) if msg == MISSING_TOOL_ENTRY_POINT => {
                ExtensionError::MissingEntryPoint { name: "<tool>".to_string(), entry_point: "tool".to_string() }
            }
            other => ExtensionError::Channel(format!("runtime error: {other}")),
        })?;

    Ok(result)
}

const MISSING_TOOL_ENTRY_POINT: &str = "\u{0}pith:missing-tool-entry-point";

/// Verify a channel script defines all three required entry points without
/// running them (registration-time check, per §4.2 "missing any required
/// entry point is a fatal registration error").
pub fn verify_channel_entry_points(name: &str, source: &str) -> Result<()> {
    let lua = sandboxed_lua()?;
    lua.load(source)
        .exec()
        .map_err(|e| ExtensionError::Channel(format!("{name}: load error: {e}")))?;

    for entry_point in ["connect", "recv", "send"] {
        let present: bool = lua
            .globals()
            .get::<_, mlua::Value>(entry_point)
            .map(|v| !matches!(v, mlua::Value::Nil))
            .unwrap_or(false);
        if !present {
            return Err(ExtensionError::MissingEntryPoint {
                name: name.to_string(),
                entry_point: entry_point.to_string(),
            });
        }
    }
    Ok(())
}

/// Verify a tool script defines the `tool` entry point.
pub fn verify_tool_entry_point(name: &str, source: &str) -> Result<()> {
    let lua = sandboxed_lua()?;
    lua.load(source)
        .exec()
        .map_err(|e| ExtensionError::Channel(format!("{name}: load error: {e}")))?;
    let present: bool = lua
        .globals()
        .get::<_, mlua::Value>("tool")
        .map(|v| !matches!(v, mlua::Value::Nil))
        .unwrap_or(false);
    if present {
        Ok(())
    } else {
        Err(ExtensionError::MissingEntryPoint {
            name: name.to_string(),
            entry_point: "tool".to_string(),
        })
    }
}

/// A loaded channel plugin, held for the lifetime of the adapter task so
/// `connect`/`recv`/`send` share Lua state (e.g. a socket handle a plugin
/// author stashes in a local). Built with the `send` feature of `mlua` so it
/// can live inside a `tokio::spawn`ed task.
pub struct LuaChannelSession {
    lua: Lua,
}

impl LuaChannelSession {
    pub fn load(source: &str) -> Result<Self> {
        let lua = sandboxed_lua()?;
        lua.load(source)
            .exec()
            .map_err(|e| ExtensionError::Channel(format!("load error: {e}")))?;
        Ok(Self { lua })
    }

    pub fn connect(&self) -> Result<()> {
        let func: mlua::Function = self
            .lua
            .globals()
            .get("connect")
            .map_err(|_| ExtensionError::MissingEntryPoint {
                name: "<channel>".to_string(),
                entry_point: "connect".to_string(),
            })?;
        func.call(())
            .map_err(|e| ExtensionError::Channel(format!("connect failed: {e}")))
    }

    /// Blocks (from the Lua script's perspective) until the next inbound
    /// message; returns the decoded JSON record.
    pub fn recv(&self) -> Result<serde_json::Value> {
        let func: mlua::Function = self
            .lua
            .globals()
            .get("recv")
            .map_err(|_| ExtensionError::MissingEntryPoint {
                name: "<channel>".to_string(),
                entry_point: "recv".to_string(),
            })?;
        let table: mlua::Table = func
            .call(())
            .map_err(|e| ExtensionError::Channel(format!("recv failed: {e}")))?;
        lua_table_to_json(table)
    }

    pub fn send(&self, incoming: &serde_json::Value, text: &str) -> Result<()> {
        let func: mlua::Function = self
            .lua
            .globals()
            .get("send")
            .map_err(|_| ExtensionError::MissingEntryPoint {
                name: "<channel>".to_string(),
                entry_point: "send".to_string(),
            })?;
        let incoming_table = json_to_lua_table(&self.lua, incoming)
            .map_err(|e| ExtensionError::Channel(format!("argument encoding error: {e}")))?;
        func.call::<_, ()>((incoming_table, text.to_string()))
            .map_err(|e| ExtensionError::Channel(format!("send failed: {e}")))
    }
}

fn lua_table_to_json(table: mlua::Table) -> Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    for pair in table.pairs::<String, mlua::Value>() {
        let (key, value) = pair.map_err(|e| ExtensionError::Channel(e.to_string()))?;
        map.insert(key, lua_value_to_json(value));
    }
    Ok(serde_json::Value::Object(map))
}

fn lua_value_to_json(value: LuaValue) -> serde_json::Value {
    match value {
        LuaValue::String(s) => serde_json::Value::String(s.to_str().unwrap_or_default().to_string()),
        LuaValue::Integer(i) => serde_json::json!(i),
        LuaValue::Number(n) => serde_json::json!(n),
        LuaValue::Boolean(b) => serde_json::Value::Bool(b),
        _ => serde_json::Value::Null,
    }
}

fn json_to_lua_table<'l>(lua: &'l Lua, value: &serde_json::Value) -> mlua::Result<mlua::Table<'l>> {
    let table = lua.create_table()?;
    if let serde_json::Value::Object(map) = value {
        for (k, v) in map {
            match v {
                serde_json::Value::String(s) => table.set(k.as_str(), s.as_str())?,
                serde_json::Value::Number(n) => {
                    if let Some(f) = n.as_f64() {
                        table.set(k.as_str(), f)?
                    }
                }
                serde_json::Value::Bool(b) => table.set(k.as_str(), *b)?,
                _ => {}
            }
        }
    }
    Ok(table)
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn calls_simple_tool_script() {
        let dir = TempDir::new().unwrap();
        let source = r#"
            -- Echoes the `name` argument back, uppercased.
            function tool(args_json)
                return "called with " .. args_json
            end
        "#;
        let result = call_tool_script(source, &serde_json::json!({"x": 1}), dir.path()).unwrap();
        assert!(result.starts_with("called with"));
    }

    #[test]
    fn tool_script_has_no_os_library() {
        let dir = TempDir::new().unwrap();
        let source = "function tool(args_json) return os.time() end";
        let err = call_tool_script(source, &serde_json::json!({}), dir.path()).unwrap_err();
        assert!(matches!(err, ExtensionError::Channel(_)));
    }

    #[test]
    fn tool_script_can_write_and_read_back_through_sandbox() {
        let dir = TempDir::new().unwrap();
        let source = r#"
            function tool(args_json)
                write("note.txt", "hi from plugin")
                return read("note.txt")
            end
        "#;
        let result = call_tool_script(source, &serde_json::json!({}), dir.path()).unwrap();
        assert_eq!(result, "hi from plugin");
    }

    #[test]
    fn missing_tool_function_is_an_error() {
        let source = "x = 1";
        let err = verify_tool_entry_point("broken", source).unwrap_err();
        assert!(matches!(err, ExtensionError::MissingEntryPoint { .. }));
    }

    #[test]
    fn channel_requires_all_three_entry_points() {
        let source = "function connect() end\nfunction recv() end";
        let err = verify_channel_entry_points("half", source).unwrap_err();
        assert!(matches!(err, ExtensionError::MissingEntryPoint { .. }));
    }
}
