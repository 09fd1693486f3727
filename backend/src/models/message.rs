use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A chat message or file-transfer notice exchanged directly between peers.
///
/// The registry never stores these; they share the peer id vocabulary and
/// must serialize as `{from, to, content, timestamp, isFile}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Message {
    from: String,
    to: String,
    content: String,
    timestamp: String,
    #[serde(rename = "isFile", default)]
    is_file: bool,
}

impl Message {
    /// Plain text message
    pub fn text(
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            content: content.into(),
            timestamp: timestamp.into(),
            is_file: false,
        }
    }

    /// File-transfer notification; `content` carries the file name
    pub fn file(
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            is_file: true,
            ..Self::text(from, to, content, timestamp)
        }
    }

    pub fn sender(&self) -> &str {
        &self.from
    }

    pub fn recipient(&self) -> &str {
        &self.to
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn is_file(&self) -> bool {
        self.is_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let msg = Message::file("p1", "p2", "notes.txt", "2024-05-01T10:00:00Z");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["from"], "p1");
        assert_eq!(json["to"], "p2");
        assert_eq!(json["content"], "notes.txt");
        assert_eq!(json["isFile"], true);
        assert!(json.get("is_file").is_none());
    }

    #[test]
    fn test_is_file_defaults_to_false() {
        let msg: Message = serde_json::from_str(
            r#"{"from":"a","to":"b","content":"hi","timestamp":"12:00"}"#,
        )
        .unwrap();
        assert!(!msg.is_file());
        assert_eq!(msg, Message::text("a", "b", "hi", "12:00"));
    }
}
