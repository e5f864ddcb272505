use super::mocks::{message, MockChatRepo, StubModel};
use gemini_chat::models::internal::TurnRole;
use gemini_chat::orchestrator::{ChatError, ChatOrchestrator, EXIT_REPLY};
use gemini_chat::services::gemini_client::ChatModel;
use gemini_chat::storage::repository::RepositoryError;
use mockall::predicate::eq;
use std::sync::Arc;

fn orchestrator(repo: MockChatRepo, model: &Arc<StubModel>) -> ChatOrchestrator {
    let model: Arc<dyn ChatModel> = model.clone();
    ChatOrchestrator::new(Arc::new(repo), Some(model))
}

#[tokio::test]
async fn test_empty_message_rejected_without_writes() {
    let mut repo = MockChatRepo::new();
    repo.expect_session_messages().never();
    repo.expect_add_message().never();
    let model = Arc::new(StubModel::replying("unused"));

    let result = orchestrator(repo, &model).ask(1, 3, "   \n").await;

    assert!(matches!(result, Err(ChatError::EmptyMessage)));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_exit_ends_chat_without_model_call() {
    let mut repo = MockChatRepo::new();
    repo.expect_session_messages().never();
    repo.expect_add_message().never();
    let model = Arc::new(StubModel::replying("unused"));

    let reply = orchestrator(repo, &model).ask(1, 3, " EXIT ").await.unwrap();

    assert_eq!(reply.response, EXIT_REPLY);
    assert!(reply.stored.is_none());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_missing_model_reported() {
    let mut repo = MockChatRepo::new();
    repo.expect_add_message().never();

    let orchestrator = ChatOrchestrator::new(Arc::new(repo), None);
    let result = orchestrator.ask(1, 3, "Hello").await;

    assert!(!orchestrator.model_ready());
    assert!(matches!(result, Err(ChatError::ModelUnavailable)));
}

#[tokio::test]
async fn test_history_replayed_in_order_and_turn_saved() {
    let mut repo = MockChatRepo::new();
    repo.expect_session_messages()
        .with(eq(3))
        .times(1)
        .returning(|_| {
            Ok(vec![
                message(1, 3, "What is Rust?", "A systems language."),
                message(2, 3, "Who makes it?", "The Rust project."),
            ])
        });
    repo.expect_add_message()
        .withf(|m| m.session_id == 3 && m.user_id == 1 && m.message == "Explain in detail")
        .times(1)
        .returning(|m| Ok(message(3, m.session_id, &m.message, &m.response)));
    let model = Arc::new(StubModel::replying("Here is more detail."));

    let reply = orchestrator(repo, &model)
        .ask(1, 3, "  Explain in detail ")
        .await
        .unwrap();

    assert_eq!(reply.response, "Here is more detail.");
    assert_eq!(reply.stored.as_ref().map(|m| m.id), Some(3));

    let calls = model.calls.lock().unwrap();
    let (turns, sent) = &calls[0];
    assert_eq!(sent, "Explain in detail");
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0].role, TurnRole::User);
    assert_eq!(turns[0].text, "What is Rust?");
    assert_eq!(turns[1].role, TurnRole::Model);
    assert_eq!(turns[3].text, "The Rust project.");
}

#[tokio::test]
async fn test_model_failure_not_saved() {
    let mut repo = MockChatRepo::new();
    repo.expect_session_messages().returning(|_| Ok(vec![]));
    repo.expect_add_message().never();
    let model = Arc::new(StubModel::failing("quota exceeded"));

    let result = orchestrator(repo, &model).ask(1, 3, "Hello").await;

    match result {
        Err(err @ ChatError::Model(_)) => assert!(err.to_string().starts_with("Error: ")),
        other => panic!("expected model error, got {:?}", other),
    }
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_save_failure_still_returns_reply() {
    let mut repo = MockChatRepo::new();
    repo.expect_session_messages().returning(|_| Ok(vec![]));
    repo.expect_add_message()
        .times(1)
        .returning(|_| Err(RepositoryError::NotFound("chat session".to_string())));
    let model = Arc::new(StubModel::replying("Hi there!"));

    let reply = orchestrator(repo, &model).ask(1, 3, "Hello").await.unwrap();

    assert_eq!(reply.response, "Hi there!");
    assert!(reply.stored.is_none());
}

#[tokio::test]
async fn test_history_failure_skips_model() {
    let mut repo = MockChatRepo::new();
    repo.expect_session_messages()
        .returning(|_| Err(RepositoryError::NotFound("chat session".to_string())));
    repo.expect_add_message().never();
    let model = Arc::new(StubModel::replying("unused"));

    let result = orchestrator(repo, &model).ask(1, 3, "Hello").await;

    assert!(matches!(result, Err(ChatError::Repository(_))));
    assert_eq!(model.call_count(), 0);
}
