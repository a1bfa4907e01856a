use serde::Serialize;

use ti_tokens::TokenRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message as the relay expects it: `{role, content}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiMessage {
    pub role: Role,
    pub content: String,
}

/// One entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        tokens: Vec<TokenRecord>,
    },
}

impl Message {
    pub fn role(&self) -> Role {
        match self {
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::User { content } | Message::Assistant { content, .. } => content,
        }
    }

    /// Token records of an assistant message; empty for user messages.
    pub fn tokens(&self) -> &[TokenRecord] {
        match self {
            Message::User { .. } => &[],
            Message::Assistant { tokens, .. } => tokens,
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Message::Assistant { .. })
    }
}

/// Append-only message history for one session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last message, if it is an assistant reply.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.is_assistant())
    }

    /// History in the shape sent to the relay.
    pub fn api_messages(&self) -> Vec<ApiMessage> {
        self.messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role(),
                content: m.content().to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assistant(content: &str) -> Message {
        Message::Assistant {
            content: content.to_string(),
            tokens: vec![TokenRecord {
                token: content.to_string(),
                probability: 0.9,
                alternatives: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_last_assistant() {
        let mut convo = Conversation::new();
        assert!(convo.last_assistant().is_none());

        convo.push(Message::User {
            content: "hi".into(),
        });
        assert!(convo.last_assistant().is_none());

        convo.push(assistant("hello"));
        assert_eq!(convo.last_assistant().map(Message::content), Some("hello"));

        convo.push(Message::User {
            content: "again".into(),
        });
        assert!(convo.last_assistant().is_none());
    }

    #[test]
    fn test_api_messages() {
        let mut convo = Conversation::new();
        convo.push(Message::User {
            content: "hi".into(),
        });
        convo.push(assistant("hello"));

        let api = serde_json::to_value(convo.api_messages()).unwrap();
        assert_eq!(
            api,
            serde_json::json!([
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "hello" }
            ])
        );
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_value(assistant("x")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["tokens"][0]["token"], "x");
        assert!(Message::User { content: "u".into() }.tokens().is_empty());
    }
}
