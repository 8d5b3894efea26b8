//! Pool of recorded messages consumed by playback

use tracing::debug;

use crate::message::Message;

/// Grouping key of a recorded reply: its parent header's id and type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    /// Original request id; run specific, never used for lookup
    pub msg_id: Option<String>,
    /// Original request type
    pub msg_type: Option<String>,
}

impl CorrelationKey {
    /// Key of a recorded message
    pub fn of(message: &Message) -> Self {
        let parent = message.parent_header.as_ref();
        Self {
            msg_id: parent.map(|p| p.msg_id.clone()),
            msg_type: parent.map(|p| p.msg_type.clone()),
        }
    }

    fn matches(&self, message: &Message) -> bool {
        let parent = message.parent_header.as_ref();
        parent.map(|p| p.msg_id.as_str()) == self.msg_id.as_deref()
            && parent.map(|p| p.msg_type.as_str()) == self.msg_type.as_deref()
    }
}

/// Summary of one correlation group, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    /// Group key
    pub key: CorrelationKey,
    /// Number of recorded messages in the group
    pub count: usize,
}

/// Split the first group answering `msg_type` out of `pool`
///
/// Groups are keyed by the full parent header key, so two original requests
/// of the same type stay separate; the one recorded first is taken. Returns
/// `(remaining, group)`, both in original relative order. Messages without a
/// parent header never match.
#[must_use]
pub fn split_group(pool: Vec<Message>, msg_type: &str) -> (Vec<Message>, Vec<Message>) {
    let key = pool
        .iter()
        .map(CorrelationKey::of)
        .find(|key| key.msg_type.as_deref() == Some(msg_type));

    match key {
        Some(key) => {
            let (group, remaining): (Vec<_>, Vec<_>) =
                pool.into_iter().partition(|m| key.matches(m));
            (remaining, group)
        }
        None => (pool, Vec::new()),
    }
}

/// Finite pool of recorded messages, shrinking as groups are taken
#[derive(Debug, Default)]
pub struct RecordingPool {
    messages: Vec<Message>,
}

impl RecordingPool {
    /// Seed the pool from a full recording
    #[must_use]
    pub fn load(messages: impl IntoIterator<Item = Message>) -> Self {
        let messages: Vec<Message> = messages.into_iter().collect();
        debug!("Loaded recording pool: {} messages", messages.len());
        Self { messages }
    }

    /// Remove and return the first group answering `msg_type`
    ///
    /// Empty when no recorded group matches.
    pub fn take_group(&mut self, msg_type: &str) -> Vec<Message> {
        let pool = std::mem::take(&mut self.messages);
        let (remaining, group) = split_group(pool, msg_type);
        self.messages = remaining;
        group
    }

    /// Number of messages not yet consumed
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether every message has been consumed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Correlation groups in the order they would be matched
    #[must_use]
    pub fn groups(&self) -> Vec<GroupSummary> {
        let mut groups: Vec<GroupSummary> = Vec::new();

        for message in &self.messages {
            let key = CorrelationKey::of(message);
            match groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.count += 1,
                None => groups.push(GroupSummary { key, count: 1 }),
            }
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Content, Header};
    use proptest::prelude::*;

    fn reply(parent: &Header, msg_type: &str) -> Message {
        Message::reply_to(parent, Header::new(msg_type, "s"), Content::default())
    }

    #[test]
    fn test_take_group_removes_whole_group_in_order() {
        let execute = Header::new("execute_request", "s");
        let info = Header::new("kernel_info_request", "s");

        let busy = reply(&execute, "status");
        let info_reply = reply(&info, "kernel_info_reply");
        let execute_reply = reply(&execute, "execute_reply");
        let idle = reply(&execute, "status");

        let mut pool = RecordingPool::load(vec![
            busy.clone(),
            info_reply.clone(),
            execute_reply.clone(),
            idle.clone(),
        ]);

        let group = pool.take_group("execute_request");
        assert_eq!(group, vec![busy, execute_reply, idle]);
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.take_group("execute_request"), Vec::new());
        assert_eq!(pool.take_group("kernel_info_request"), vec![info_reply]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_same_type_groups_are_not_merged() {
        let first = Header::new("execute_request", "s");
        let second = Header::new("execute_request", "s");

        let mut pool = RecordingPool::load(vec![
            reply(&first, "execute_reply"),
            reply(&second, "execute_reply"),
            reply(&first, "status"),
        ]);

        let group = pool.take_group("execute_request");
        assert_eq!(group.len(), 2);
        assert!(group
            .iter()
            .all(|m| m.parent_header.as_ref().unwrap().msg_id == first.msg_id));

        let group = pool.take_group("execute_request");
        assert_eq!(group.len(), 1);
        assert_eq!(
            group[0].parent_header.as_ref().unwrap().msg_id,
            second.msg_id
        );
    }

    #[test]
    fn test_messages_without_parent_never_match() {
        let orphan = Message::new(Header::new("status", "s"), Content::default());
        let mut pool = RecordingPool::load(vec![orphan]);

        assert!(pool.take_group("status").is_empty());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_groups_summary() {
        let execute = Header::new("execute_request", "s");
        let pool = RecordingPool::load(vec![
            reply(&execute, "status"),
            Message::new(Header::new("status", "s"), Content::default()),
            reply(&execute, "status"),
        ]);

        let groups = pool.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.msg_type.as_deref(), Some("execute_request"));
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[1].key.msg_type, None);
    }

    const TYPES: [&str; 3] = ["execute_request", "kernel_info_request", "comm_open"];

    proptest! {
        #[test]
        fn prop_split_group_partitions_pool(
            parents in prop::collection::vec(0usize..6, 0..40),
            wanted in 0usize..3,
        ) {
            // Six original requests, two per type
            let requests: Vec<Header> = (0..6)
                .map(|i| Header::new(TYPES[i % 3], "s"))
                .collect();
            let pool: Vec<Message> = parents
                .iter()
                .map(|&p| reply(&requests[p], "status"))
                .collect();

            let (remaining, group) = split_group(pool.clone(), TYPES[wanted]);

            prop_assert_eq!(remaining.len() + group.len(), pool.len());

            // Order inside both halves follows the recording
            let position = |m: &Message| {
                pool.iter().position(|p| p.header.msg_id == m.header.msg_id)
            };
            let group_pos: Vec<_> = group.iter().map(position).collect();
            let remaining_pos: Vec<_> = remaining.iter().map(position).collect();
            prop_assert!(group_pos.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(remaining_pos.windows(2).all(|w| w[0] < w[1]));

            // A single original request, and the first recorded one
            let first = pool.iter().find(|m| {
                m.parent_header.as_ref().map(|p| p.msg_type.as_str()) == Some(TYPES[wanted])
            });
            match first {
                Some(first) => {
                    let key = CorrelationKey::of(first);
                    prop_assert!(group.iter().all(|m| CorrelationKey::of(m) == key));
                    prop_assert!(remaining.iter().all(|m| CorrelationKey::of(m) != key));
                }
                None => {
                    prop_assert!(group.is_empty());
                }
            }
        }
    }
}
