use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use email_service::{
    delivery::{DeliveryChannel, QueueActions},
    models::{message::InboundMessage, notification::NotificationRequest},
};
use serde_json::json;
use tokio::sync::Mutex;

pub const VALID_PAYLOAD: &str = r#"{"RecipientEmail":"user@example.com","RecipientName":"Jane","TemplateId":"welcome","Subject":"Hi","TemplateData":{}}"#;

pub fn payload_with(field: &str, value: serde_json::Value) -> Vec<u8> {
    let mut payload: serde_json::Value = serde_json::from_str(VALID_PAYLOAD).unwrap();
    payload[field] = value;
    serde_json::to_vec(&payload).unwrap()
}

pub fn payload_without(field: &str) -> Vec<u8> {
    let mut payload: serde_json::Value = serde_json::from_str(VALID_PAYLOAD).unwrap();
    payload.as_object_mut().unwrap().remove(field);
    serde_json::to_vec(&payload).unwrap()
}

pub fn password_reset_payload() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "RecipientEmail": "john.smith@clinic.example",
        "RecipientName": "John Smith",
        "TemplateId": "password-reset",
        "Subject": "Reset your password",
        "TemplateData": {
            "ResetLink": "https://clinic.example/reset?token=abc",
            "ExpiresIn": "30 minutes"
        }
    }))
    .unwrap()
}

pub fn message(id: &str, payload: impl Into<Vec<u8>>) -> InboundMessage {
    InboundMessage::new(id, 1, payload.into())
}

/// Channel that replays a script of results, then keeps succeeding.
pub struct ScriptedChannel {
    script: Mutex<VecDeque<Result<(), String>>>,
    calls: AtomicU32,
    sent: Mutex<Vec<NotificationRequest>>,
}

impl ScriptedChannel {
    pub fn succeeding() -> Arc<Self> {
        Self::with_script(vec![])
    }

    pub fn failing_times(failures: usize, message: &str) -> Arc<Self> {
        Self::with_script(vec![Err(message.to_string()); failures])
    }

    pub fn always_failing(message: &str) -> Arc<Self> {
        Self::failing_times(64, message)
    }

    pub fn with_script(script: Vec<Result<(), String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl DeliveryChannel for ScriptedChannel {
    async fn send(&self, request: &NotificationRequest) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.script.lock().await.pop_front() {
            Some(Err(message)) => Err(anyhow!(message)),
            _ => {
                self.sent.lock().await.push(request.clone());
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueAction {
    Acknowledged(String),
    DeadLettered(String, HashMap<String, String>),
    Requeued(String),
}

/// Records every queue action it is asked to perform.
#[derive(Default)]
pub struct RecordingQueue {
    actions: Mutex<Vec<QueueAction>>,
    fail_terminal_actions: bool,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Broker that refuses every ack and dead-letter.
    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            actions: Mutex::new(Vec::new()),
            fail_terminal_actions: true,
        })
    }

    pub async fn actions(&self) -> Vec<QueueAction> {
        self.actions.lock().await.clone()
    }

    pub async fn single_action(&self) -> QueueAction {
        let actions = self.actions().await;
        assert_eq!(actions.len(), 1, "Expected exactly one queue action, got {:?}", actions);
        actions[0].clone()
    }

    pub async fn dead_letter_error(&self) -> String {
        match self.single_action().await {
            QueueAction::DeadLettered(_, properties) => properties
                .get("Error")
                .cloned()
                .expect("dead-letter should carry an Error property"),
            other => panic!("Expected a dead-letter, got {:?}", other),
        }
    }
}

#[async_trait]
impl QueueActions for RecordingQueue {
    async fn acknowledge(&self, message: &InboundMessage) -> Result<(), Error> {
        if self.fail_terminal_actions {
            return Err(anyhow!("channel closed"));
        }

        self.actions
            .lock()
            .await
            .push(QueueAction::Acknowledged(message.message_id.clone()));
        Ok(())
    }

    async fn dead_letter(
        &self,
        message: &InboundMessage,
        properties: HashMap<String, String>,
    ) -> Result<(), Error> {
        if self.fail_terminal_actions {
            return Err(anyhow!("channel closed"));
        }

        self.actions.lock().await.push(QueueAction::DeadLettered(
            message.message_id.clone(),
            properties,
        ));
        Ok(())
    }

    async fn requeue(&self, message: &InboundMessage) -> Result<(), Error> {
        self.actions
            .lock()
            .await
            .push(QueueAction::Requeued(message.message_id.clone()));
        Ok(())
    }
}
