#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use branchcanvas::database::migrations::Migrator;
use branchcanvas::errors::{GenerationError, GenerationResult};
use branchcanvas::services::generation::{GenerationRequest, GenerationResponse, ImageGenerator};
use branchcanvas::AppContext;
use branchcanvas_test_utils::TestDb;
use sea_orm::DatabaseConnection;

pub const TEST_USER: &str = "tester";
pub const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Create an in-memory SQLite database with all migrations applied
pub async fn setup_test_db() -> DatabaseConnection {
    TestDb::new_in_memory()
        .migrated::<Migrator>()
        .await
        .expect("Failed to set up migrated test database")
}

/// Generator answering from a queue; an empty queue yields an image reply.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<GenerationResult<GenerationResponse>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_reply(&self, reply: GenerationResult<GenerationResponse>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_failure(&self, message: &str) {
        self.push_reply(Err(GenerationError::Provider {
            status: 500,
            message: message.to_string(),
        }));
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> GenerationResult<GenerationResponse> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(GenerationResponse {
                    text: None,
                    image_url: Some(PNG_DATA_URL.to_string()),
                })
            })
    }
}

pub async fn setup_context() -> (AppContext, Arc<ScriptedGenerator>) {
    let db = setup_test_db().await;
    let generator = ScriptedGenerator::new();
    let context = AppContext::new(db, generator.clone(), TEST_USER);
    (context, generator)
}
