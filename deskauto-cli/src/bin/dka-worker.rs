//! JSON-RPC IPC worker for input markup operations.
//!
//! Reads line-delimited JSON requests from stdin, dispatches to deskauto_core,
//! writes JSON responses to stdout.  Logging goes to stderr.

use std::io::{self, BufRead, Write};

use clap::Parser;
use deskauto_core::input;
use deskauto_core::keys::{KeyTable, StandardKeys};
use deskauto_core::sequence::{self, normalize_key_name, CompileOptions};
use deskauto_core::sink::{send_markup, DeliveryMode};
use deskauto_core::window::{self, WindowQuery};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "dka-worker", about = "deskauto IPC worker process")]
struct Args {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Deserialize)]
struct Request {
    id: u64,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Serialize)]
struct Response {
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn json_str<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Single-character string parameter, e.g. a delimiter.
fn json_char(params: &serde_json::Value, key: &str, default: char) -> Result<char, String> {
    match json_str(params, key) {
        None => Ok(default),
        Some(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(format!("`{key}` must be a single character")),
            }
        }
    }
}

fn compile_options(params: &serde_json::Value) -> Result<CompileOptions, String> {
    let defaults = CompileOptions::default();
    Ok(CompileOptions {
        open: json_char(params, "open", defaults.open)?,
        close: json_char(params, "close", defaults.close)?,
        strict_modifiers: params
            .get("strict")
            .and_then(|v| v.as_bool())
            .unwrap_or(defaults.strict_modifiers),
    })
}

fn delivery_mode(params: &serde_json::Value) -> Result<DeliveryMode, String> {
    match json_str(params, "mode").unwrap_or("injected") {
        "injected" => Ok(DeliveryMode::Injected),
        "game" => Ok(DeliveryMode::game_style(
            params.get("delay_ms").and_then(|v| v.as_u64()),
        )),
        other => Err(format!("unknown delivery mode: {other}")),
    }
}

fn dispatch(method: &str, params: &serde_json::Value) -> Result<serde_json::Value, String> {
    match method {
        "compile" => {
            let text = json_str(params, "text").unwrap_or("");
            let events = sequence::compile_with(text, compile_options(params)?)
                .map_err(|e| e.to_string())?;
            serde_json::to_value(events).map_err(|e| e.to_string())
        }
        "send" => {
            let text = json_str(params, "text").unwrap_or("");
            let options = compile_options(params)?;
            let sink = input::injector(delivery_mode(params)?).map_err(|e| e.to_string())?;
            let count = send_markup(text, options, sink.as_ref()).map_err(|e| e.to_string())?;
            Ok(serde_json::Value::from(count))
        }
        "post" => {
            let text = json_str(params, "text").unwrap_or("");
            let options = compile_options(params)?;
            let hwnd = match params.get("hwnd").and_then(|v| v.as_i64()) {
                Some(hwnd) => hwnd as isize,
                None => {
                    let title = json_str(params, "window")
                        .ok_or_else(|| "`hwnd` or `window` is required".to_owned())?;
                    window::find_window(&WindowQuery::title(title))
                        .map_err(|e| e.to_string())?
                        .hwnd
                }
            };
            let sink = input::poster(hwnd).map_err(|e| e.to_string())?;
            let count = send_markup(text, options, sink.as_ref()).map_err(|e| e.to_string())?;
            Ok(serde_json::Value::from(count))
        }
        "list_windows" => {
            let query = WindowQuery {
                title: json_str(params, "title").map(str::to_owned),
                ..WindowQuery::default()
            };
            let windows = window::find_windows(&query).map_err(|e| e.to_string())?;
            serde_json::to_value(windows).map_err(|e| e.to_string())
        }
        "resolve_key" => {
            let name = json_str(params, "name").unwrap_or("");
            match StandardKeys.resolve(&normalize_key_name(name)) {
                Some(key) => serde_json::to_value(key).map_err(|e| e.to_string()),
                None => Ok(serde_json::Value::Null),
            }
        }
        "ping" => Ok(serde_json::Value::String("pong".to_owned())),
        _ => Err(format!("unknown method: {method}")),
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    log::info!("dka-worker: ready");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::error!("dka-worker: stdin read error: {e}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let req: Request = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                // Parse error -- use id=0 since we can't extract it.
                let resp = Response {
                    id: 0,
                    result: None,
                    error: Some(format!("invalid JSON: {e}")),
                };
                if let Ok(json) = serde_json::to_string(&resp) {
                    let _ = writeln!(stdout, "{json}");
                    let _ = stdout.flush();
                }
                continue;
            }
        };

        log::debug!("dka-worker: request {} `{}`", req.id, req.method);

        let resp = match dispatch(&req.method, &req.params) {
            Ok(result) => Response {
                id: req.id,
                result: Some(result),
                error: None,
            },
            Err(error) => {
                log::warn!("dka-worker: request {} failed: {error}", req.id);
                Response {
                    id: req.id,
                    result: None,
                    error: Some(error),
                }
            }
        };

        if let Ok(json) = serde_json::to_string(&resp) {
            let _ = writeln!(stdout, "{json}");
        } else {
            // Serialization failed -- send minimal error response.
            let _ = writeln!(
                stdout,
                r#"{{"id":{},"error":"response serialization failed"}}"#,
                req.id
            );
        }
        let _ = stdout.flush();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ping() {
        assert_eq!(dispatch("ping", &json!({})).unwrap(), json!("pong"));
    }

    #[test]
    fn test_unknown_method() {
        let err = dispatch("nope", &json!({})).unwrap_err();
        assert!(err.contains("unknown method"));
    }

    #[test]
    fn test_compile_returns_events() {
        let value = dispatch("compile", &json!({ "text": "a" })).unwrap();
        let events = value.as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["target"]["char"], json!("a"));
        assert_eq!(events[0]["state"], json!("down"));
    }

    #[test]
    fn test_compile_custom_delimiters() {
        let value = dispatch(
            "compile",
            &json!({ "text": "<Tab>[", "open": "<", "close": ">" }),
        )
        .unwrap();
        assert_eq!(value.as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_compile_error_is_reported() {
        let err = dispatch("compile", &json!({ "text": "[Enter" })).unwrap_err();
        assert!(err.contains("position 0"), "{err}");
    }

    #[test]
    fn test_bad_delimiter_param() {
        let err = dispatch("compile", &json!({ "text": "a", "open": "<<" })).unwrap_err();
        assert!(err.contains("single character"));
    }

    #[test]
    fn test_resolve_key() {
        let value = dispatch("resolve_key", &json!({ "name": "enter" })).unwrap();
        assert_eq!(value["vk"], json!(0x0D));
        let missing = dispatch("resolve_key", &json!({ "name": "NotAKey" })).unwrap();
        assert!(missing.is_null());
    }

    #[test]
    fn test_delivery_mode_param() {
        assert_eq!(
            delivery_mode(&json!({})).unwrap(),
            DeliveryMode::Injected
        );
        assert_eq!(
            delivery_mode(&json!({ "mode": "game", "delay_ms": 5 })).unwrap(),
            DeliveryMode::game_style(Some(5))
        );
        assert!(delivery_mode(&json!({ "mode": "turbo" })).is_err());
    }
}
