//! Messages exchanged between the popup, the background controller and the
//! page agent bound to a tab. Field names match the extension wire format.

use serde::{Deserialize, Serialize};

/// Browser tab identifier, as handed out by the tab registry.
pub type TabId = i64;

/// Export the popup can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportAction {
    #[serde(rename = "convertToWord")]
    Word,
    #[serde(rename = "convertToPDF")]
    Pdf,
}

impl ExportAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Word => "convertToWord",
            Self::Pdf => "convertToPDF",
        }
    }
}

impl std::fmt::Display for ExportAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Popup → background export request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundRequest {
    pub action: ExportAction,
    #[serde(rename = "tabId")]
    pub tab_id: TabId,
}

/// Background → popup status reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    #[serde(default)]
    pub message: String,
    /// Non-fatal snapshot degradations (stylesheets or images left un-inlined).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Background → page agent request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum PageRequest {
    #[serde(rename = "convertToDocx")]
    ConvertToDocx,
    #[serde(rename = "revokeBlobUrl")]
    RevokeBlobUrl {
        #[serde(rename = "blobUrl")]
        blob_url: String,
    },
}

/// Page agent → background reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageReply {
    Blob {
        #[serde(rename = "blobUrl")]
        blob_url: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Error {
        error: String,
    },
    Ack {
        success: bool,
    },
}

/// A browser tab as seen by the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub title: String,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_background_request_wire_format() {
        let request: BackgroundRequest =
            serde_json::from_value(json!({ "action": "convertToPDF", "tabId": 42 })).unwrap();
        assert_eq!(request.action, ExportAction::Pdf);
        assert_eq!(request.tab_id, 42);

        let value = serde_json::to_value(BackgroundRequest {
            action: ExportAction::Word,
            tab_id: 7,
        })
        .unwrap();
        assert_eq!(value, json!({ "action": "convertToWord", "tabId": 7 }));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result: Result<BackgroundRequest, _> =
            serde_json::from_value(json!({ "action": "convertToRtf", "tabId": 1 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_page_request_wire_format() {
        assert_eq!(
            serde_json::to_value(PageRequest::ConvertToDocx).unwrap(),
            json!({ "action": "convertToDocx" })
        );
        let revoke: PageRequest = serde_json::from_value(
            json!({ "action": "revokeBlobUrl", "blobUrl": "blob:webexport/abc" }),
        )
        .unwrap();
        assert_eq!(
            revoke,
            PageRequest::RevokeBlobUrl {
                blob_url: "blob:webexport/abc".to_string()
            }
        );
    }

    #[test]
    fn test_page_reply_variants() {
        let blob: PageReply = serde_json::from_value(json!({ "blobUrl": "blob:x" })).unwrap();
        assert!(matches!(blob, PageReply::Blob { ref warnings, .. } if warnings.is_empty()));

        let error: PageReply = serde_json::from_value(json!({ "error": "boom" })).unwrap();
        assert_eq!(
            error,
            PageReply::Error {
                error: "boom".to_string()
            }
        );

        let ack: PageReply = serde_json::from_value(json!({ "success": true })).unwrap();
        assert_eq!(ack, PageReply::Ack { success: true });
    }

    #[test]
    fn test_status_reply_omits_empty_warnings() {
        let reply = StatusReply {
            message: "PDF downloaded.".to_string(),
            warnings: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({ "message": "PDF downloaded." })
        );
    }
}
