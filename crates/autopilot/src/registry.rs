//! Tool Connection Registry
//!
//! In-memory record of third-party app connections. Connections are created on first
//! use and lost when the process exits; there is no expiry or token refresh.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    gateway::{ProviderGateway, ToolExecution},
    AutopilotError, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ToolConnection {
    pub id: Uuid,
    pub app: String,
    pub entity_id: String,
    pub status: ConnectionStatus,
    pub auth_type: String,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ToolConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, ToolConnection>>>,
}

impl ToolConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or reuse a connection for `app`. Never fails.
    pub async fn authenticate(&self, app: &str, entity_id: &str) -> ToolConnection {
        let key = app.to_lowercase();
        let mut connections = self.connections.write().await;

        if let Some(existing) = connections.get(&key) {
            tracing::debug!("[REGISTRY] Reusing connection for {}", key);
            return existing.clone();
        }

        let connection = ToolConnection {
            id: Uuid::new_v4(),
            app: key.clone(),
            entity_id: entity_id.to_string(),
            status: ConnectionStatus::Connected,
            auth_type: auth_type_for(&key).to_string(),
            connected_at: Utc::now(),
        };
        connections.insert(key, connection.clone());

        tracing::info!(
            "[REGISTRY] Connected {} for entity {} ({})",
            connection.app,
            connection.entity_id,
            connection.auth_type
        );

        connection
    }

    /// Remove a connection. Returns whether one existed.
    pub async fn disconnect(&self, app: &str) -> bool {
        let removed = self
            .connections
            .write()
            .await
            .remove(&app.to_lowercase())
            .is_some();
        if removed {
            tracing::info!("[REGISTRY] Disconnected {}", app);
        }
        removed
    }

    pub async fn get(&self, app: &str) -> Option<ToolConnection> {
        self.connections.read().await.get(&app.to_lowercase()).cloned()
    }

    pub async fn is_connected(&self, app: &str) -> bool {
        self.get(app)
            .await
            .map(|c| c.status == ConnectionStatus::Connected)
            .unwrap_or(false)
    }

    pub async fn list(&self) -> Vec<ToolConnection> {
        let mut list: Vec<_> = self.connections.read().await.values().cloned().collect();
        list.sort_by(|a, b| a.app.cmp(&b.app));
        list
    }

    /// Run an action for `app`, authenticating first if no connection exists.
    ///
    /// Without a configured tool platform the action is simulated and succeeds.
    pub async fn execute_action(
        &self,
        app: &str,
        entity_id: &str,
        action: &str,
        params: serde_json::Value,
        gateway: &dyn ProviderGateway,
    ) -> Result<serde_json::Value> {
        let connection = match self.get(app).await {
            Some(connection) => connection,
            None => self.authenticate(app, entity_id).await,
        };

        if !gateway.tools_available() {
            tracing::debug!("[REGISTRY] Simulating {} on {}", action, connection.app);
            return Ok(serde_json::json!({
                "simulated": true,
                "app": connection.app,
                "action": action,
            }));
        }

        let request = ToolExecution {
            entity_id: connection.entity_id.clone(),
            action: action.to_string(),
            params,
        };

        gateway
            .execute_tool(&request)
            .await
            .into_result()
            .map_err(|message| AutopilotError::ToolActionFailed {
                app: connection.app,
                message,
            })
    }
}

fn auth_type_for(app: &str) -> &'static str {
    match app {
        "discord" | "webhook" => "api_key",
        "custom" | "generic" => "none",
        _ => "oauth2",
    }
}
