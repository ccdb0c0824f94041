mod common;

use branchcanvas::canvas::{CanvasNode, Forest, NodeRole, Position};
use branchcanvas::errors::CoreErrorKind;
use branchcanvas::services::conversation_service::{ERROR_PREFIX, IMAGE_ONLY_REPLY};
use branchcanvas::services::generation::{AspectRatio, GenerationResponse};
use branchcanvas::services::{MessageStore, NewNode, SendMessage};
use indexmap::IndexMap;

use common::{setup_context, PNG_DATA_URL, TEST_USER};

async fn append(
    store: &MessageStore,
    forest: &mut Forest,
    project_id: &str,
    text: &str,
    parent: Option<&CanvasNode>,
) -> CanvasNode {
    let draft = NewNode::new(project_id, NodeRole::User, text)
        .with_parent(parent.map(|p| p.id.clone()));
    let node = store.append(forest, draft).await.unwrap();
    forest.insert(node.clone()).unwrap();
    node
}

#[tokio::test]
async fn test_append_places_roots_and_branches() {
    let (context, _) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();
    let store = context.message_store();
    let mut forest = Forest::new();

    let root = append(store, &mut forest, &project.id, "root", None).await;
    assert_eq!(root.position, Position::new(100.0, 100.0));

    let first = append(store, &mut forest, &project.id, "first", Some(&root)).await;
    assert_eq!(first.position, Position::new(550.0, 100.0));

    let second = append(store, &mut forest, &project.id, "second", Some(&root)).await;
    assert_eq!(second.position, Position::new(550.0, 350.0));

    // a parentless node goes to the right of the rightmost one
    let loose = append(store, &mut forest, &project.id, "loose", None).await;
    assert_eq!(loose.position, Position::new(1000.0, 100.0));

    let stored = store.load_forest(&project.id).await.unwrap();
    let ids: Vec<&str> = stored.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec![root.id.as_str(), first.id.as_str(), second.id.as_str(), loose.id.as_str()]);
    assert!(stored.iter().zip(stored.iter().skip(1)).all(|(a, b)| a.created_at < b.created_at));
}

#[tokio::test]
async fn test_append_rejects_unknown_parent() {
    let (context, _) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();

    let draft = NewNode::new(&project.id, NodeRole::User, "orphan").with_parent(Some("ghost".into()));
    let err = context
        .message_store()
        .append(&Forest::new(), draft)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CoreErrorKind::Validation);
    assert!(context.message_store().load_forest(&project.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_leaves_children_as_orphans() {
    let (context, _) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();
    let store = context.message_store();
    let mut forest = Forest::new();

    let root = append(store, &mut forest, &project.id, "root", None).await;
    let child = append(store, &mut forest, &project.id, "child", Some(&root)).await;
    let grandchild = append(store, &mut forest, &project.id, "grandchild", Some(&child)).await;

    context.remove_node(&project.id, &child.id).await.unwrap();

    let stored = store.load_forest(&project.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    let orphan = stored.get(&grandchild.id).unwrap();
    assert_eq!(orphan.parent_id.as_deref(), Some(child.id.as_str()));

    let roots: Vec<&str> = stored.roots().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(roots, vec![root.id.as_str(), grandchild.id.as_str()]);

    let missing = context.remove_node(&project.id, &child.id).await.unwrap_err();
    assert_eq!(missing.kind(), CoreErrorKind::NotFound);
}

#[tokio::test]
async fn test_auto_layout_persists_tree_positions() {
    let (context, _) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();
    let store = context.message_store();
    let mut forest = Forest::new();

    let first_root = append(store, &mut forest, &project.id, "r1", None).await;
    let a = append(store, &mut forest, &project.id, "a", Some(&first_root)).await;
    let b = append(store, &mut forest, &project.id, "b", Some(&first_root)).await;
    let a1 = append(store, &mut forest, &project.id, "a1", Some(&a)).await;
    let a2 = append(store, &mut forest, &project.id, "a2", Some(&a)).await;
    let second_root = append(store, &mut forest, &project.id, "r2", None).await;

    // pick up the nodes appended behind the context's back
    context.bootstrap(Some(&project.id)).await.unwrap();
    let outcome = context.auto_layout(&project.id).await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.updated.len(), 6);

    let stored = store.load_forest(&project.id).await.unwrap();
    let pos = |id: &str| stored.get(id).unwrap().position;

    assert_eq!(pos(&first_root.id).x, 0.0);
    assert_eq!(pos(&second_root.id).x, 0.0);
    assert!(pos(&second_root.id).y - pos(&first_root.id).y >= 400.0);

    assert_eq!(pos(&a.id).x, 500.0);
    assert_eq!(pos(&a1.id).x, 1000.0);
    assert_eq!(pos(&a.id).y, (pos(&a1.id).y + pos(&a2.id).y) / 2.0);
    assert!(pos(&a2.id).y - pos(&a1.id).y >= 450.0);
    assert_eq!(pos(&first_root.id).y, (pos(&a.id).y + pos(&b.id).y) / 2.0);

    let local = context.forest(&project.id).await.unwrap();
    assert_eq!(local.get(&a2.id).unwrap().position, pos(&a2.id));
}

#[tokio::test]
async fn test_reposition_batch_reports_partial_failure() {
    let (context, _) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();
    let store = context.message_store();
    let mut forest = Forest::new();

    let node = append(store, &mut forest, &project.id, "only", None).await;

    let mut positions = IndexMap::new();
    positions.insert(node.id.clone(), Position::new(10.0, 20.0));
    positions.insert("missing".to_string(), Position::new(0.0, 0.0));

    let outcome = store.reposition_batch(&positions).await;
    assert!(!outcome.is_complete());
    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].node_id, "missing");

    let stored = store.get(&node.id).await.unwrap();
    assert_eq!(stored.position, Position::new(10.0, 20.0));
    assert!(stored.updated_at > node.updated_at);
}

#[tokio::test]
async fn test_send_message_stores_exchange_and_debits() {
    let (context, generator) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();
    generator.push_reply(Ok(GenerationResponse {
        text: None,
        image_url: Some(PNG_DATA_URL.to_string()),
    }));

    let prompt = "Lighthouse on a cliff at dusk painted in thick oil strokes with gulls";
    let message = SendMessage::new(&project.id, prompt).with_aspect_ratio(AspectRatio::Wide);
    let outcome = context.send_message(message, true).await.unwrap();

    assert!(!outcome.is_failure());
    assert_eq!(outcome.user_node.position, Position::new(100.0, 100.0));
    assert_eq!(outcome.reply.role, NodeRole::Model);
    assert_eq!(outcome.reply.text, IMAGE_ONLY_REPLY);
    assert_eq!(outcome.reply.parent_id.as_deref(), Some(outcome.user_node.id.as_str()));
    assert_eq!(outcome.reply.position, Position::new(550.0, 100.0));
    assert_eq!(outcome.reply.aspect_ratio.as_deref(), Some("16:9"));

    let summary = context.project_summary(&project.id).await.unwrap();
    assert_eq!(summary.title, "Lighthouse on a cliff at dusk painted in thick oil");
    assert_eq!(summary.node_count, 2);

    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].image_base64, None);

    let billing = context.billing_service();
    assert_eq!(billing.balance(TEST_USER).await.unwrap(), 0);
    let history = billing.history(TEST_USER).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, -5);
    assert_eq!(history[0].source, "Image Generation");
    assert!(history[0].metadata.as_deref().unwrap().contains(&project.id));

    let latest = context.latest_image().await.unwrap();
    assert_eq!(latest.id, outcome.reply.id);
}

#[tokio::test]
async fn test_follow_up_uses_last_node_and_context_image() {
    let (context, generator) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();

    let first = context
        .send_message(SendMessage::new(&project.id, "a red fox"), true)
        .await
        .unwrap();
    let second = context
        .send_message(SendMessage::new(&project.id, "make it winter"), true)
        .await
        .unwrap();

    assert_eq!(second.user_node.parent_id.as_deref(), Some(first.reply.id.as_str()));
    assert_eq!(second.user_node.position, Position::new(1000.0, 100.0));
    // context images are sent but not stored on the user node
    assert_eq!(second.user_node.image_url, None);

    let requests = generator.requests();
    let payload = PNG_DATA_URL.split_once(',').unwrap().1;
    assert_eq!(requests[1].image_base64.as_deref(), Some(payload));

    // only the first prompt names the project
    let summary = context.project_summary(&project.id).await.unwrap();
    assert_eq!(summary.title, "a red fox");
}

#[tokio::test]
async fn test_generation_failure_appends_error_node() {
    let (context, generator) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();
    generator.push_failure("quota exceeded");

    let outcome = context
        .send_message(SendMessage::new(&project.id, "a castle"), true)
        .await
        .unwrap();

    assert!(outcome.is_failure());
    assert_eq!(outcome.reply.role, NodeRole::Model);
    assert!(outcome.reply.text.starts_with(ERROR_PREFIX));
    assert!(outcome.reply.text.contains("quota exceeded"));
    assert_eq!(outcome.reply.parent_id.as_deref(), Some(outcome.user_node.id.as_str()));

    let local = context.forest(&project.id).await.unwrap();
    assert!(local.contains(&outcome.reply.id));

    let stored = context.message_store().load_forest(&project.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(context.billing_service().history(TEST_USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsaved_prompt_gets_error_node_under_effective_parent() {
    let (context, generator) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();
    let first = context
        .send_message(SendMessage::new(&project.id, "a lake"), false)
        .await
        .unwrap();

    // storage loses the project while the session still holds it
    context.project_service().delete(&project.id).await.unwrap();

    let outcome = context
        .send_message(SendMessage::new(&project.id, "hello"), false)
        .await
        .unwrap();

    assert!(outcome.is_failure());
    assert!(outcome.reply.text.starts_with(ERROR_PREFIX));
    assert_eq!(outcome.user_node.parent_id.as_deref(), Some(first.reply.id.as_str()));
    assert_eq!(outcome.reply.parent_id.as_deref(), Some(first.reply.id.as_str()));
    assert_eq!(outcome.reply.position, Position::new(1450.0, 100.0));
    assert_eq!(generator.requests().len(), 1);

    // optimistic nodes stay in the session
    let local = context.forest(&project.id).await.unwrap();
    assert!(local.contains(&outcome.user_node.id));
    assert!(local.contains(&outcome.reply.id));
    assert!(context.message_store().load_forest(&project.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_send_to_unknown_parent_is_rejected() {
    let (context, generator) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();

    let err = context
        .send_message(SendMessage::new(&project.id, "hello").with_parent("ghost"), false)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CoreErrorKind::Validation);
    assert!(generator.requests().is_empty());
}

#[tokio::test]
async fn test_regenerate_model_node_branches_from_grandparent() {
    let (context, generator) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();

    let first = context
        .send_message(SendMessage::new(&project.id, "a tree"), false)
        .await
        .unwrap();
    let second = context
        .send_message(SendMessage::new(&project.id, "add birds"), false)
        .await
        .unwrap();

    let regenerated = context.regenerate(&project.id, &second.reply.id).await.unwrap();

    assert_eq!(regenerated.user_node.text, "add birds");
    assert_eq!(regenerated.user_node.parent_id.as_deref(), Some(first.reply.id.as_str()));
    assert_eq!(regenerated.user_node.position, Position::new(1000.0, 350.0));
    assert_eq!(regenerated.reply.position, Position::new(1450.0, 350.0));

    let requests = generator.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].prompt, "add birds");
    assert_eq!(requests[2].aspect_ratio, Some(AspectRatio::Square));

    let forest = context.forest(&project.id).await.unwrap();
    assert_eq!(forest.sibling_count(&first.reply.id), 2);
}

#[tokio::test]
async fn test_regenerate_root_user_node_starts_new_root() {
    let (context, _) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();

    let first = context
        .send_message(SendMessage::new(&project.id, "a boat"), false)
        .await
        .unwrap();
    let regenerated = context.regenerate(&project.id, &first.user_node.id).await.unwrap();

    assert_eq!(regenerated.user_node.parent_id, None);
    assert_eq!(regenerated.user_node.text, "a boat");
    // rightmost node is the first reply at x = 550
    assert_eq!(regenerated.user_node.position, Position::new(1000.0, 100.0));
}

#[tokio::test]
async fn test_connections_follow_stored_nodes() {
    let (context, _) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();

    let outcome = context
        .send_message(SendMessage::new(&project.id, "a bridge"), false)
        .await
        .unwrap();

    let curves = context.connections(&project.id).await.unwrap();
    assert_eq!(curves.len(), 1);
    assert_eq!(curves[0].parent_id, outcome.user_node.id);
    assert_eq!(curves[0].svg_path(), "M 480 160 C 580 160, 450 160, 550 160");
}

#[tokio::test]
async fn test_bootstrap_and_delete_current_project() {
    let (context, _) = setup_context().await;

    let first = context.bootstrap(None).await.unwrap();
    assert!(first.is_current);
    assert_eq!(first.title, "New Project");

    let second = context.create_project(Some("Second")).await.unwrap();
    assert_eq!(context.current_project_id().await, Some(second.id.clone()));

    let next = context.delete_project(&second.id).await.unwrap();
    assert_eq!(next, Some(first.id.clone()));

    let replacement = context.delete_project(&first.id).await.unwrap().unwrap();
    assert_ne!(replacement, first.id);

    let projects = context.list_projects().await;
    assert_eq!(projects.len(), 1);
    assert!(projects[0].is_current);
    assert_eq!(context.project_service().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_deleting_project_cascades_to_nodes() {
    let (context, _) = setup_context().await;
    let project = context.bootstrap(None).await.unwrap();
    context
        .send_message(SendMessage::new(&project.id, "a kite"), false)
        .await
        .unwrap();

    context.delete_project(&project.id).await.unwrap();

    let err = context.project_service().get(&project.id).await.unwrap_err();
    assert_eq!(err.kind(), CoreErrorKind::NotFound);
    assert!(context
        .message_store()
        .load_forest(&project.id)
        .await
        .unwrap()
        .is_empty());
}
