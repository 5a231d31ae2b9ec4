use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use plainipc::chat::ChatMessage;
use plainipc_peer::{IpcMessage, MessageValue, ObjectValue};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    type_name: Option<String>,
    payload_size: usize,
    payload: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_message(message: &IpcMessage, peer: &str, format: OutputFormat) {
    let type_name = message.type_identifier().map(ToString::to_string);
    let (size, preview) = describe(&message.value);

    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: message.kind.name(),
                type_name,
                payload_size: size,
                payload: preview,
                peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "TYPE", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    message.kind.name().to_string(),
                    type_name.unwrap_or_else(|| "-".to_string()),
                    size.to_string(),
                    peer.to_string(),
                    preview,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match type_name {
            Some(type_name) => println!(
                "kind={} type={type_name} size={size} peer={peer} payload={preview}",
                message.kind.name()
            ),
            None => println!(
                "kind={} size={size} peer={peer} payload={preview}",
                message.kind.name()
            ),
        },
        OutputFormat::Raw => match &message.value {
            MessageValue::Raw(data) => print_raw(data),
            MessageValue::String(text) => print_raw(text.as_bytes()),
            MessageValue::Object(_) => print_raw(preview.as_bytes()),
        },
    }
}

/// Print a call result, which is plain text in every format except json.
pub fn print_reply(method: &str, reply: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "method": method,
                "reply": reply,
                "timestamp": now_unix_seconds(),
            });
            println!("{out}");
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["METHOD", "REPLY"])
                .add_row(vec![method, reply]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{method}: {reply}"),
        OutputFormat::Raw => print_raw(reply.as_bytes()),
    }
}

pub fn print_history(history: &[ChatMessage], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "FROM", "TEXT"]);
            for (index, message) in history.iter().enumerate() {
                table.add_row(vec![
                    (index + 1).to_string(),
                    message.from.clone(),
                    message.text.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for message in history {
                println!("{}: {}", message.from, message.text);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn describe(value: &MessageValue) -> (usize, String) {
    match value {
        MessageValue::Raw(data) => (data.len(), payload_preview(data)),
        MessageValue::String(text) => (text.len(), text.clone()),
        MessageValue::Object(object) => {
            let preview = object_preview(object);
            (preview.len(), preview)
        }
    }
}

fn object_preview(object: &ObjectValue) -> String {
    if let Some(message) = object.downcast_ref::<ChatMessage>() {
        return serde_json::to_string(message).unwrap_or_default();
    }
    if let Some(text) = object.downcast_ref::<String>() {
        return text.clone();
    }
    if let Some(data) = object.downcast_ref::<Vec<u8>>() {
        return payload_preview(data);
    }
    format!("<{}>", object.type_identifier())
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
