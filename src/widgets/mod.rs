//! Dashboard widget storage and refresh
//!
//! Widgets persist a declarative query config and cache the last produced
//! result set for display. Refresh re-executes the stored config through
//! the engine and swaps the cached data; on engine failure the previous
//! data stays untouched and the error propagates to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::WidgetQueryEngine;
use crate::error::EngineError;
use crate::models::{DataRow, QueryConfig};
use crate::Result;

/// How a widget obtains its data.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// Data was stored once at creation and never changes.
    #[default]
    Static,
    /// Data is recomputed from `query_config` on every refresh.
    Dynamic,
}

/// A user-owned dashboard widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Widget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Rendering kind: chart, table, metric.
    pub widget_type: String,
    /// Chart configuration; cached rows live under `customProps.data`.
    pub config: Value,
    pub data_mode: DataMode,
    pub query_config: Option<QueryConfig>,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Widget {
    pub fn new(
        user_id: Uuid,
        title: &str,
        widget_type: &str,
        config: Value,
        data_mode: DataMode,
        query_config: Option<QueryConfig>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            description: None,
            widget_type: widget_type.to_string(),
            config,
            data_mode,
            query_config,
            last_refreshed: (data_mode == DataMode::Dynamic).then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// The cached result rows, if any.
    pub fn cached_data(&self) -> Option<&Vec<Value>> {
        self.config
            .get("customProps")
            .and_then(|props| props.get("data"))
            .and_then(Value::as_array)
    }
}

/// Persistence boundary for widgets.
#[async_trait]
pub trait WidgetStore: Send + Sync {
    async fn create(&self, widget: Widget) -> Result<Widget>;

    /// Fetch a widget, ownership-checked: a widget belonging to another
    /// user resolves to `None`.
    async fn get(&self, widget_id: Uuid, user_id: Uuid) -> Result<Option<Widget>>;

    /// All widgets for a user, most recently updated first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Widget>>;

    /// Replace the cached data under `config.customProps.data` and stamp
    /// `last_refreshed`.
    async fn update_data(
        &self,
        widget_id: Uuid,
        user_id: Uuid,
        data: Vec<DataRow>,
        refreshed_at: DateTime<Utc>,
    ) -> Result<Option<Widget>>;

    async fn delete(&self, widget_id: Uuid, user_id: Uuid) -> Result<bool>;
}

/// In-memory widget store for development and tests.
pub struct InMemoryWidgetStore {
    widgets: Arc<RwLock<HashMap<Uuid, Widget>>>,
}

impl InMemoryWidgetStore {
    pub fn new() -> Self {
        Self {
            widgets: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryWidgetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WidgetStore for InMemoryWidgetStore {
    async fn create(&self, widget: Widget) -> Result<Widget> {
        let mut widgets = self.widgets.write().await;
        widgets.insert(widget.id, widget.clone());
        Ok(widget)
    }

    async fn get(&self, widget_id: Uuid, user_id: Uuid) -> Result<Option<Widget>> {
        let widgets = self.widgets.read().await;
        Ok(widgets
            .get(&widget_id)
            .filter(|widget| widget.user_id == user_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Widget>> {
        let widgets = self.widgets.read().await;

        let mut items: Vec<Widget> = widgets
            .values()
            .filter(|widget| widget.user_id == user_id)
            .cloned()
            .collect();

        items.sort_by_key(|widget| std::cmp::Reverse(widget.updated_at));
        Ok(items)
    }

    async fn update_data(
        &self,
        widget_id: Uuid,
        user_id: Uuid,
        data: Vec<DataRow>,
        refreshed_at: DateTime<Utc>,
    ) -> Result<Option<Widget>> {
        let mut widgets = self.widgets.write().await;

        let Some(widget) = widgets
            .get_mut(&widget_id)
            .filter(|widget| widget.user_id == user_id)
        else {
            return Ok(None);
        };

        // Rebuild the config value rather than patching in place, so a
        // persistent backend can rely on whole-column replacement.
        let mut config = widget.config.clone();
        if !config.is_object() {
            config = json!({});
        }
        let props = config
            .as_object_mut()
            .and_then(|obj| {
                // A non-object customProps cannot hold the rows; reset it.
                let needs_reset = !obj
                    .get("customProps")
                    .map(Value::is_object)
                    .unwrap_or(false);
                if needs_reset {
                    obj.insert("customProps".to_string(), json!({}));
                }
                obj.get_mut("customProps")
            })
            .and_then(Value::as_object_mut);

        if let Some(props) = props {
            props.insert(
                "data".to_string(),
                Value::Array(data.into_iter().map(Value::Object).collect()),
            );
        }

        widget.config = config;
        widget.last_refreshed = Some(refreshed_at);
        widget.updated_at = refreshed_at;

        Ok(Some(widget.clone()))
    }

    async fn delete(&self, widget_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut widgets = self.widgets.write().await;

        let owned = widgets
            .get(&widget_id)
            .map(|widget| widget.user_id == user_id)
            .unwrap_or(false);

        if owned {
            widgets.remove(&widget_id);
        }
        Ok(owned)
    }
}

/// Widget lifecycle operations wired to the query engine.
pub struct WidgetService {
    engine: WidgetQueryEngine,
    store: Arc<dyn WidgetStore>,
}

impl WidgetService {
    pub fn new(engine: WidgetQueryEngine, store: Arc<dyn WidgetStore>) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> &WidgetQueryEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn WidgetStore> {
        &self.store
    }

    /// Create a widget. Dynamic widgets get an immediate first refresh so
    /// the dashboard never renders an empty chart.
    pub async fn create(&self, widget: Widget) -> Result<Widget> {
        let widget = self.store.create(widget).await?;
        info!(widget_id = %widget.id, title = %widget.title, "Widget created");

        if widget.data_mode == DataMode::Dynamic {
            return self.refresh(widget.id, widget.user_id).await;
        }
        Ok(widget)
    }

    /// Re-execute the stored query config and cache the fresh rows.
    ///
    /// Static widgets are returned unchanged. A dynamic widget without a
    /// query config is a configuration error. Engine failures propagate
    /// and leave the cached data intact.
    pub async fn refresh(&self, widget_id: Uuid, user_id: Uuid) -> Result<Widget> {
        let widget = self
            .store
            .get(widget_id, user_id)
            .await?
            .ok_or_else(|| EngineError::WidgetNotFound(widget_id.to_string()))?;

        let config = match (widget.data_mode, &widget.query_config) {
            (DataMode::Static, _) => return Ok(widget),
            (DataMode::Dynamic, Some(config)) => config.clone(),
            (DataMode::Dynamic, None) => {
                return Err(EngineError::InvalidConfiguration(format!(
                    "dynamic widget {} has no query config",
                    widget.id
                )));
            }
        };

        let rows = self.engine.execute(&config, user_id).await?;
        debug!(widget_id = %widget_id, rows = rows.len(), "Widget refreshed");

        self.store
            .update_data(widget_id, user_id, rows, Utc::now())
            .await?
            .ok_or_else(|| EngineError::WidgetNotFound(widget_id.to_string()))
    }

    /// Delete a widget. A widget owned by another user is treated as not
    /// found, same as `refresh`.
    pub async fn delete(&self, widget_id: Uuid, user_id: Uuid) -> Result<()> {
        let deleted = self.store.delete(widget_id, user_id).await?;
        if !deleted {
            return Err(EngineError::WidgetNotFound(widget_id.to_string()));
        }

        info!(widget_id = %widget_id, "Widget deleted");
        Ok(())
    }
}
