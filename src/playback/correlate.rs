//! Matching live requests to recorded replies
//!
//! Recorded ids never match the live run, so replies are found by their
//! parent's message type and then re-stamped to point at the live request.

use crate::message::{CommClose, CommMsg, Content, Message};
use crate::recording::RecordingPool;

/// Carry the live request's comm id over to a recorded comm event
///
/// Applies when the request opens or talks on a comm and the recorded reply
/// is a `comm_msg` or `comm_close`; any other reply content is returned as is.
pub fn rewrite_content(request: &Content, recorded: &Content) -> Content {
    let comm_id = match request {
        Content::CommOpen(open) => Some(&open.comm_id),
        Content::CommMsg(msg) => Some(&msg.comm_id),
        Content::CommClose(_) | Content::Opaque(_) => None,
    };

    match (comm_id, recorded) {
        (Some(comm_id), Content::CommClose(close)) => Content::CommClose(CommClose {
            comm_id: comm_id.clone(),
            data: close.data.clone(),
        }),
        (Some(comm_id), Content::CommMsg(msg)) => Content::CommMsg(CommMsg {
            comm_id: comm_id.clone(),
            data: msg.data.clone(),
        }),
        _ => recorded.clone(),
    }
}

/// Turn a recorded reply into a reply to `request`
///
/// Only the parent header's id and the comm id change.
#[must_use]
pub fn build_reply(request: &Message, recorded: Message) -> Message {
    let content = rewrite_content(&request.content, &recorded.content);

    Message {
        parent_header: recorded
            .parent_header
            .map(|parent| parent.with_msg_id(request.header.msg_id.clone())),
        content,
        ..recorded
    }
}

/// Consume the recorded group answering `request` and build its replies
///
/// Empty when the recording has nothing for this request type.
pub fn correlate(pool: &mut RecordingPool, request: &Message) -> Vec<Message> {
    pool.take_group(request.msg_type())
        .into_iter()
        .map(|recorded| build_reply(request, recorded))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CommOpen, Header, COMM_CLOSE, COMM_MSG, COMM_OPEN};
    use serde_json::json;

    fn comm_open(comm_id: &str) -> Content {
        Content::CommOpen(CommOpen {
            comm_id: comm_id.to_string(),
            target_name: "jupyter.widget".to_string(),
            data: json!({}),
        })
    }

    fn comm_close(comm_id: &str) -> Content {
        Content::CommClose(CommClose {
            comm_id: comm_id.to_string(),
            data: json!({ "reason": "done" }),
        })
    }

    #[test]
    fn test_comm_close_takes_live_comm_id() {
        let rewritten = rewrite_content(&comm_open("abc"), &comm_close("xyz"));

        assert_eq!(rewritten.comm_id(), Some("abc"));
        assert_eq!(rewritten.kind(), COMM_CLOSE);
        match rewritten {
            Content::CommClose(close) => assert_eq!(close.data, json!({ "reason": "done" })),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_comm_msg_request_rewrites_comm_msg_reply() {
        let request = Content::CommMsg(CommMsg {
            comm_id: "abc".to_string(),
            data: json!({ "method": "update" }),
        });
        let recorded = Content::CommMsg(CommMsg {
            comm_id: "xyz".to_string(),
            data: json!({ "state": 1 }),
        });

        let rewritten = rewrite_content(&request, &recorded);
        assert_eq!(
            rewritten,
            Content::CommMsg(CommMsg {
                comm_id: "abc".to_string(),
                data: json!({ "state": 1 }),
            })
        );
    }

    #[test]
    fn test_non_comm_request_keeps_recorded_content() {
        let request = Content::Opaque(json!({ "code": "x = 1" }));
        let recorded = comm_close("xyz");

        assert_eq!(rewrite_content(&request, &recorded), recorded);
    }

    #[test]
    fn test_comm_open_reply_is_not_rewritten() {
        let recorded = comm_open("xyz");
        assert_eq!(rewrite_content(&comm_open("abc"), &recorded), recorded);

        let opaque = Content::Opaque(json!({ "execution_state": "idle" }));
        assert_eq!(rewrite_content(&comm_open("abc"), &opaque), opaque);
    }

    #[test]
    fn test_build_reply_restamps_parent_id_only() {
        let original_request = Header::new(COMM_OPEN, "recorded-session");
        let recorded = Message::reply_to(
            &original_request,
            Header::new(COMM_MSG, "recorded-session"),
            Content::CommMsg(CommMsg {
                comm_id: "xyz".to_string(),
                data: json!({}),
            }),
        )
        .with_channel("iopub");

        let live = Message::new(Header::new(COMM_OPEN, "live-session"), comm_open("abc"));
        let reply = build_reply(&live, recorded.clone());

        assert_eq!(reply.header, recorded.header);
        assert_eq!(reply.channel, "iopub");
        assert_eq!(reply.content.comm_id(), Some("abc"));

        let parent = reply.parent_header.unwrap();
        assert_eq!(parent.msg_id, live.header.msg_id);
        assert_eq!(parent.msg_type, original_request.msg_type);
        assert_eq!(parent.session, "recorded-session");
        assert_eq!(parent.date, original_request.date);
    }

    #[test]
    fn test_correlate_consumes_group() {
        let original = Header::new("kernel_info_request", "s");
        let mut pool = RecordingPool::load(vec![Message::reply_to(
            &original,
            Header::new("kernel_info_reply", "s"),
            Content::default(),
        )]);

        let live = Message::new(Header::new("kernel_info_request", "s"), Content::default());
        let replies = correlate(&mut pool, &live);

        assert_eq!(replies.len(), 1);
        assert!(pool.is_empty());
        assert!(correlate(&mut pool, &live).is_empty());
    }
}
