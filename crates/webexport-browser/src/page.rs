//! Live page access through `Runtime.evaluate` on an attached session.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use webexport_core::{Error, Result};
use webexport_snapshot::PageContext;

use crate::cdp::CdpConnection;

pub struct CdpPage {
    conn: Arc<CdpConnection>,
    session_id: String,
}

impl CdpPage {
    pub fn new(conn: Arc<CdpConnection>, session_id: String) -> Self {
        Self { conn, session_id }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// False once the connection carrying the session has closed.
    pub fn is_live(&self) -> bool {
        !self.conn.is_closed()
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .conn
            .send(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
                Some(&self.session_id),
            )
            .await?;
        evaluation_value(result)
    }

    async fn evaluate_string(&self, expression: &str) -> Result<String> {
        match self.evaluate(expression).await? {
            Value::String(s) => Ok(s),
            other => Err(Error::Cdp(format!(
                "Expected a string from `{}`, got {}",
                expression, other
            ))),
        }
    }
}

/// Doctype (if any) followed by the root element's markup.
const DOCUMENT_MARKUP: &str = "(document.doctype ? new XMLSerializer().serializeToString(document.doctype) : '') \
     + document.documentElement.outerHTML";

/// Unwrap a `Runtime.evaluate` result, turning a thrown exception into an error.
pub fn evaluation_value(result: Value) -> Result<Value> {
    if let Some(exception) = result.get("exceptionDetails") {
        let msg = exception
            .get("exception")
            .and_then(|e| e.get("description"))
            .or_else(|| exception.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("JavaScript exception");
        return Err(Error::Cdp(format!("Page script failed: {}", msg)));
    }
    Ok(result
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null))
}

/// Expression listing the rule texts of the loaded stylesheet with `href`,
/// or `null` when it is absent or its rules are cross-origin.
fn stylesheet_rules_expression(href: &str) -> String {
    let href = Value::String(href.to_string());
    format!(
        r#"(() => {{
  for (const sheet of document.styleSheets) {{
    if (sheet.href !== {href}) continue;
    try {{
      return Array.from(sheet.cssRules, (rule) => rule.cssText);
    }} catch (e) {{
      return null;
    }}
  }}
  return null;
}})()"#,
        href = href
    )
}

#[async_trait]
impl PageContext for CdpPage {
    async fn document_html(&self) -> Result<String> {
        self.evaluate_string(DOCUMENT_MARKUP).await
    }

    async fn base_url(&self) -> Result<String> {
        self.evaluate_string("document.baseURI").await
    }

    async fn stylesheet_rules(&self, href: &str) -> Result<Option<Vec<String>>> {
        let value = self.evaluate(&stylesheet_rules_expression(href)).await?;
        if value.is_null() {
            return Ok(None);
        }
        let rules: Vec<String> = serde_json::from_value(value)?;
        Ok(Some(rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_value() {
        let value = evaluation_value(json!({
            "result": { "type": "string", "value": "https://example.com/" }
        }))
        .unwrap();
        assert_eq!(value, json!("https://example.com/"));

        let value = evaluation_value(json!({ "result": { "type": "object", "subtype": "null" } })).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_evaluation_exception() {
        let err = evaluation_value(json!({
            "result": { "type": "object" },
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": { "description": "TypeError: x is undefined" }
            }
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "CDP error: Page script failed: TypeError: x is undefined");
    }

    #[test]
    fn test_rules_expression_quotes_href() {
        let expr = stylesheet_rules_expression(r#"https://a.test/x".css"#);
        assert!(expr.contains(r#"sheet.href !== "https://a.test/x\".css""#));
    }
}
