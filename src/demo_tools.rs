//! A small offline tool catalog used by the CLI's demo mode and by the
//! literal scenarios the crate's test suite exercises end to end.

use crate::plan::{ToolCatalog, ToolDef, ToolHandler};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

struct GetWeather;

#[async_trait]
impl ToolHandler for GetWeather {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let city = args
            .get("city")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("missing `city`"))?;

        // Deterministic stand-in weather report, keyed loosely off the
        // city name's length so repeated demo runs stay varied but stable.
        let temp = 10 + (city.len() as i64 % 20);
        Ok(json!({
            "city": city,
            "temp": temp,
            "condition": "clear",
        }))
    }
}

struct SendEmail;

#[async_trait]
impl ToolHandler for SendEmail {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let to = args
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("missing `to`"))?;
        let body = args
            .get("body")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("missing `body`"))?;

        Ok(json!({
            "to": to,
            "delivered": true,
            "length": body.len(),
        }))
    }
}

/// Builds the `get_weather` / `send_email` demo catalog.
pub fn catalog() -> ToolCatalog {
    let mut catalog = ToolCatalog::new();

    catalog.register(ToolDef {
        name: "get_weather".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"],
        }),
        output_schema: json!({
            "type": "object",
            "properties": {
                "city": {"type": "string"},
                "temp": {"type": "number"},
                "condition": {"type": "string"},
            },
            "required": ["city", "temp", "condition"],
        }),
        handler: Arc::new(GetWeather),
    });

    catalog.register(ToolDef {
        name: "send_email".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "to": {"type": "string"},
                "body": {"type": "string"},
            },
            "required": ["to", "body"],
        }),
        output_schema: json!({
            "type": "object",
            "properties": {
                "to": {"type": "string"},
                "delivered": {"type": "boolean"},
                "length": {"type": "number"},
            },
            "required": ["to", "delivered", "length"],
        }),
        handler: Arc::new(SendEmail),
    });

    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_weather_requires_city() {
        let tools = catalog();
        let tool = tools.get("get_weather").unwrap();
        assert!(tool.handler.call(json!({})).await.is_err());
        assert!(tool.handler.call(json!({"city": "Paris"})).await.is_ok());
    }

    #[tokio::test]
    async fn send_email_reports_delivered() {
        let tools = catalog();
        let tool = tools.get("send_email").unwrap();
        let out = tool
            .handler
            .call(json!({"to": "a@example.com", "body": "hi"}))
            .await
            .unwrap();
        assert_eq!(out["delivered"], json!(true));
        assert_eq!(out["length"], json!(2));
    }
}
