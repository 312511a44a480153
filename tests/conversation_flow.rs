mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agent_chat::transport::mock::{frame, MockChatTransport};
use agent_chat::{
    AgentApiError, ChatError, Conversation, ConversationRefStore, CyclePhase,
    MemoryConversationRefStore, SendOutcome,
};
use serde_json::json;

use support::{
    assistant_message, assistant_with_tool_calls, page, tool_message, user_message,
};

#[tokio::test]
async fn hello_cycle_settles_to_the_authoritative_list() {
    let transport = MockChatTransport::new();
    transport.push_stream(vec![
        frame("chunk", &json!({"text": "Hi"})),
        frame("chunk", &json!({"text": " there"})),
        frame("complete", &json!({})),
    ]);
    transport.push_history(page(
        vec![
            user_message("m-1", "hello", "2026-08-25T10:00:00Z"),
            assistant_message("m-2", "Hi there", "2026-08-25T10:00:01Z"),
        ],
        false,
    ));

    let mut conversation = Conversation::new("conv-1", 50);
    let outcome = conversation
        .send(&transport, "hello", None)
        .await
        .expect("cycle should settle");

    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(conversation.phase(), CyclePhase::Idle);

    let held: Vec<(&str, &str)> = conversation
        .messages()
        .iter()
        .map(|message| (message.id.as_str(), message.content.as_str()))
        .collect();
    assert_eq!(held, vec![("m-1", "hello"), ("m-2", "Hi there")]);

    assert!(conversation.streaming_text().is_empty());
    assert!(conversation.ledger().is_empty());
    assert_eq!(
        transport.sent_messages(),
        vec![("conv-1".to_string(), "hello".to_string())]
    );
}

#[tokio::test]
async fn frames_split_across_transport_chunks_still_settle() {
    let transport = MockChatTransport::new();
    let wire = format!(
        "{}{}",
        frame("chunk", &json!({"text": "Hi there"})),
        frame("complete", &json!({}))
    );
    // Deliver the wire text in three uneven chunks that split a data line.
    let (a, rest) = wire.split_at(17);
    let (b, c) = rest.split_at(9);
    transport.push_stream(vec![a.to_string(), b.to_string(), c.to_string()]);
    transport.push_history(page(
        vec![
            user_message("m-1", "hello", "2026-08-25T10:00:00Z"),
            assistant_message("m-2", "Hi there", "2026-08-25T10:00:01Z"),
        ],
        false,
    ));

    let mut conversation = Conversation::new("conv-1", 50);
    let outcome = conversation
        .send(&transport, "hello", None)
        .await
        .expect("split frames should still settle");

    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(conversation.messages().len(), 2);
}

#[tokio::test]
async fn stream_error_event_rolls_back_the_optimistic_message() {
    let transport = MockChatTransport::new();
    transport.push_stream(vec![
        frame("chunk", &json!({"text": "partial"})),
        frame("error", &json!({"message": "agent crashed"})),
    ]);

    let mut conversation = Conversation::new("conv-1", 50);
    let error = conversation
        .send(&transport, "hello", None)
        .await
        .expect_err("stream error must fail the cycle");

    assert!(matches!(error, ChatError::Stream(message) if message == "agent crashed"));
    assert!(conversation.messages().is_empty());
    assert!(conversation.streaming_text().is_empty());
    assert!(conversation.ledger().is_empty());
    assert_eq!(conversation.phase(), CyclePhase::Idle);
}

#[tokio::test]
async fn zero_byte_stream_is_an_unexpected_end() {
    let transport = MockChatTransport::new();
    transport.push_stream(Vec::<String>::new());

    let mut conversation = Conversation::new("conv-1", 50);
    let error = conversation
        .send(&transport, "hello", None)
        .await
        .expect_err("empty stream must fail the cycle");

    assert!(matches!(
        error,
        ChatError::Api(AgentApiError::StreamEndedEarly)
    ));
    assert!(conversation.messages().is_empty());
    assert_eq!(conversation.phase(), CyclePhase::Idle);
}

#[tokio::test]
async fn truncated_stream_without_terminal_event_fails() {
    let transport = MockChatTransport::new();
    transport.push_stream(vec![frame("chunk", &json!({"text": "Hi"}))]);

    let mut conversation = Conversation::new("conv-1", 50);
    let error = conversation
        .send(&transport, "hello", None)
        .await
        .expect_err("truncated stream must fail the cycle");

    assert!(matches!(
        error,
        ChatError::Api(AgentApiError::StreamEndedEarly)
    ));
    assert!(conversation.messages().is_empty());
}

#[tokio::test]
async fn tool_result_preceding_its_call_is_a_protocol_error() {
    let transport = MockChatTransport::new();
    transport.push_stream(vec![
        frame("tool_result", &json!({"toolCallId": "t1", "output": {"hits": 3}})),
        frame("complete", &json!({})),
    ]);

    let mut conversation = Conversation::new("conv-1", 50);
    let error = conversation
        .send(&transport, "hello", None)
        .await
        .expect_err("orphan tool result must fail the cycle");

    assert!(matches!(error, ChatError::ResultWithoutCall { call_id } if call_id == "t1"));
    assert!(conversation.messages().is_empty());
    assert!(conversation.ledger().is_empty());
}

#[tokio::test]
async fn rejected_send_rolls_back_without_settling() {
    let transport = MockChatTransport::new();
    transport.push_stream_failure(AgentApiError::StreamFailed("503 from backend".to_string()));

    let mut conversation = Conversation::new("conv-1", 50);
    let error = conversation
        .send(&transport, "hello", None)
        .await
        .expect_err("open failure must fail the cycle");

    assert!(matches!(error, ChatError::Api(AgentApiError::StreamFailed(_))));
    assert!(conversation.messages().is_empty());
    assert!(transport.history_requests().is_empty());
}

#[tokio::test]
async fn settle_fetch_failure_fails_the_cycle() {
    let transport = MockChatTransport::new();
    transport.push_stream(vec![
        frame("chunk", &json!({"text": "Hi"})),
        frame("complete", &json!({})),
    ]);
    transport.push_history_failure(AgentApiError::StreamFailed("history offline".to_string()));

    let mut conversation = Conversation::new("conv-1", 50);
    let error = conversation
        .send(&transport, "hello", None)
        .await
        .expect_err("settle failure must fail the cycle");

    assert!(!error.is_cancellation());
    assert!(conversation.messages().is_empty());
    assert_eq!(conversation.phase(), CyclePhase::Idle);
}

#[tokio::test]
async fn cancellation_abandons_the_cycle_through_the_error_path() {
    let transport = MockChatTransport::new();
    transport.push_stream(vec![
        frame("chunk", &json!({"text": "Hi"})),
        frame("complete", &json!({})),
    ]);

    let signal = Arc::new(AtomicBool::new(false));
    signal.store(true, Ordering::Release);

    let mut conversation = Conversation::new("conv-1", 50);
    let error = conversation
        .send(&transport, "hello", Some(&signal))
        .await
        .expect_err("cancelled cycle must resolve as an error");

    assert!(error.is_cancellation());
    assert!(conversation.messages().is_empty());
    assert_eq!(conversation.phase(), CyclePhase::Idle);
}

#[tokio::test]
async fn persisted_tool_output_pairs_by_call_id_not_position() {
    let transport = MockChatTransport::new();
    transport.push_stream(vec![
        frame(
            "tool_call",
            &json!({"toolCallId": "t1", "toolName": "search", "input": {"q": "tables"}}),
        ),
        frame(
            "tool_result",
            &json!({"toolCallId": "t1", "output": {"success": false, "error": "timeout"}}),
        ),
        frame("complete", &json!({})),
    ]);
    // The persisted tool message is not adjacent to its assistant message.
    transport.push_history(page(
        vec![
            user_message("m-1", "find tables", "2026-08-25T10:00:00Z"),
            assistant_with_tool_calls(
                "m-2",
                "Searching...",
                vec![("t1", "search", json!({"q": "tables"}))],
                "2026-08-25T10:00:01Z",
            ),
            assistant_message("m-3", "No luck.", "2026-08-25T10:00:03Z"),
            tool_message(
                "m-4",
                "t1",
                "search",
                json!({"success": false, "error": "timeout"}),
                "2026-08-25T10:00:02Z",
            ),
        ],
        false,
    ));

    let mut conversation = Conversation::new("conv-1", 50);
    conversation
        .send(&transport, "find tables", None)
        .await
        .expect("cycle should settle");

    let results = conversation.tool_results_by_call_id();
    assert_eq!(results.len(), 1);
    assert_eq!(results.get("t1").map(|message| message.id.as_str()), Some("m-4"));

    let output = conversation
        .paired_tool_output("t1")
        .expect("output should pair by call id");
    assert_eq!(
        agent_chat::classify_tool_output(output),
        agent_chat::ToolOutcome::Failed("timeout".to_string())
    );

    // The ledger was cleared at settle; persisted messages are authoritative.
    assert!(conversation.ledger().is_empty());
}

#[tokio::test]
async fn first_successful_send_persists_a_resumable_reference() {
    let transport = MockChatTransport::new();
    transport.push_stream(vec![
        frame("chunk", &json!({"text": "Hi"})),
        frame("complete", &json!({})),
    ]);
    transport.push_history(page(
        vec![user_message("m-1", "hello", "2026-08-25T10:00:00Z")],
        false,
    ));

    let refs = MemoryConversationRefStore::new();
    let conversation_id =
        agent_chat::resolve_conversation_id(refs.load("summarizer").as_deref());
    assert!(conversation_id.starts_with("conv-"));

    let mut conversation = Conversation::new(conversation_id.clone(), 50);
    let outcome = conversation
        .send(&transport, "hello", None)
        .await
        .expect("cycle should settle");
    assert_eq!(outcome, SendOutcome::Sent);

    refs.save("summarizer", conversation.conversation_id())
        .expect("reference should persist");

    let resumed = agent_chat::resolve_conversation_id(refs.load("summarizer").as_deref());
    assert_eq!(resumed, conversation_id);
}
