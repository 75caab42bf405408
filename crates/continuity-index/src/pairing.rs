use continuity_core::{Message, Role};

/// One paired (user, agent) turn prior to being assigned an id and embedded.
#[derive(Debug, Clone, Default)]
pub struct PairedExchange {
    pub user: Option<Message>,
    pub agent: Option<Message>,
}

impl PairedExchange {
    fn is_empty(&self) -> bool {
        self.user.is_none() && self.agent.is_none()
    }
}

/// Pair a time-ordered message stream into exchanges.
///
/// Each user message opens a pair, flushing any already-open pair with no
/// agent side. Each assistant message closes and flushes the current pair.
/// A trailing one-sided pair is flushed at the end. System/tool messages
/// never open or close a pair and are otherwise ignored.
pub fn pair_messages(messages: &[Message]) -> Vec<PairedExchange> {
    let mut exchanges = Vec::new();
    let mut current = PairedExchange::default();

    for msg in messages {
        match msg.role {
            Role::User => {
                if !current.is_empty() {
                    exchanges.push(std::mem::take(&mut current));
                }
                current.user = Some(msg.clone());
            }
            Role::Assistant => {
                current.agent = Some(msg.clone());
                exchanges.push(std::mem::take(&mut current));
            }
            Role::System | Role::Tool => continue,
        }
    }

    if !current.is_empty() {
        exchanges.push(current);
    }

    exchanges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, text: &str) -> Message {
        Message::new(role, text)
    }

    #[test]
    fn user_assistant_pair_closes_together() {
        let messages = vec![msg(Role::User, "hi"), msg(Role::Assistant, "hello")];
        let exchanges = pair_messages(&messages);
        assert_eq!(exchanges.len(), 1);
        assert!(exchanges[0].user.is_some());
        assert!(exchanges[0].agent.is_some());
    }

    #[test]
    fn back_to_back_user_messages_flush_an_orphan() {
        // U, U, A -> one user-only exchange, one full pair
        let messages =
            vec![msg(Role::User, "first"), msg(Role::User, "second"), msg(Role::Assistant, "reply")];
        let exchanges = pair_messages(&messages);
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].user.as_ref().unwrap().text(), "first");
        assert!(exchanges[0].agent.is_none());
        assert_eq!(exchanges[1].user.as_ref().unwrap().text(), "second");
        assert_eq!(exchanges[1].agent.as_ref().unwrap().text(), "reply");
    }

    #[test]
    fn trailing_user_message_is_flushed_without_agent() {
        let messages = vec![msg(Role::User, "hi"), msg(Role::Assistant, "hello"), msg(Role::User, "one more")];
        let exchanges = pair_messages(&messages);
        assert_eq!(exchanges.len(), 2);
        assert!(exchanges[1].agent.is_none());
    }

    #[test]
    fn system_and_tool_messages_are_ignored() {
        let messages = vec![
            msg(Role::System, "you are a helpful assistant"),
            msg(Role::User, "hi"),
            msg(Role::Tool, "tool output"),
            msg(Role::Assistant, "hello"),
        ];
        let exchanges = pair_messages(&messages);
        assert_eq!(exchanges.len(), 1);
    }
}
