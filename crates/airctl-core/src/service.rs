// ── Schedule service ──
//
// Domain operations over the correlator. Keeps a local snapshot of the last
// `list` result and refreshes it after every successful mutation. Nothing
// here retries automatically; a failed call is the caller's to repeat.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channels::ScheduleAction;
use crate::correlator::RequestCorrelator;
use crate::error::CoreError;
use crate::model::{ScheduleItem, SchedulerResponse, TriggerEvent};

const LIST_FAILED: &str = "failed to list schedules";
const SAVE_FAILED: &str = "failed to save schedule";
const DELETE_FAILED: &str = "failed to delete schedule";

/// Whether any schedule operation is waiting on the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServiceState {
    #[default]
    Idle,
    AwaitingResponse { outstanding: usize },
}

/// Counts over the current snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ScheduleSummary {
    pub total: usize,
    pub enabled: usize,
}

/// Schedule CRUD on top of a [`RequestCorrelator`].
///
/// Cheaply cloneable. [`start`](Self::start) spawns the trigger listener
/// that keeps [`last_trigger`](Self::last_trigger) current.
#[derive(Clone)]
pub struct ScheduleService {
    inner: Arc<Inner>,
}

struct Inner {
    correlator: RequestCorrelator,
    snapshot: watch::Sender<Arc<Vec<ScheduleItem>>>,
    state: watch::Sender<ServiceState>,
    last_trigger: watch::Sender<Option<String>>,
    cancel: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduleService {
    pub fn new(correlator: RequestCorrelator) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (state, _) = watch::channel(ServiceState::Idle);
        let (last_trigger, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                correlator,
                snapshot,
                state,
                last_trigger,
                cancel: CancellationToken::new(),
                listener: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the trigger listener. Must be called inside a tokio runtime.
    pub fn start(&self) {
        let mut listener = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if listener.is_some() {
            return;
        }

        let service = self.clone();
        let mut triggers = self.inner.correlator.triggers();
        let cancel = self.inner.cancel.clone();

        *listener = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = triggers.recv() => match event {
                        Ok(event) => service.record_trigger(&event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Trigger listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        }));
    }

    /// Stop the trigger listener.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        let handle = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Fetch every schedule and replace the local snapshot.
    ///
    /// A response without `data.schedules` is an empty list.
    pub async fn list(&self) -> Result<Arc<Vec<ScheduleItem>>, CoreError> {
        let response = self.call(ScheduleAction::List, Map::new(), LIST_FAILED).await?;
        let items = Arc::new(decode_schedules(response.data)?);

        tracing::debug!(count = items.len(), "Schedule snapshot refreshed");
        self.inner.snapshot.send_replace(Arc::clone(&items));
        Ok(items)
    }

    /// Create the item if it has no id, otherwise overwrite it. Refreshes on success.
    ///
    /// A blank id counts as no id: the item is created and the gateway
    /// assigns one.
    pub async fn save(&self, item: &ScheduleItem) -> Result<SchedulerResponse, CoreError> {
        let has_id = item.id.as_deref().is_some_and(|id| !id.trim().is_empty());
        let (action, item) = if has_id {
            (ScheduleAction::Update, item.clone())
        } else {
            let mut fresh = item.clone();
            fresh.id = None;
            (ScheduleAction::Create, fresh)
        };

        let schedule = serde_json::to_value(&item).map_err(|e| CoreError::ValidationFailed {
            message: e.to_string(),
        })?;
        let mut body = Map::new();
        body.insert("schedule".into(), schedule);

        let response = self.call(action, body, SAVE_FAILED).await?;
        self.refresh_after(action).await;
        Ok(response)
    }

    /// Overwrite the item with only `enabled` changed.
    pub async fn toggle(
        &self,
        item: &ScheduleItem,
        enabled: bool,
    ) -> Result<SchedulerResponse, CoreError> {
        if item.id.is_none() {
            return Err(CoreError::ValidationFailed {
                message: "cannot toggle a schedule that has not been created".into(),
            });
        }
        self.save(&item.clone().with_enabled(enabled)).await
    }

    /// Delete by id. Refreshes on success.
    pub async fn delete(&self, id: &str) -> Result<SchedulerResponse, CoreError> {
        if id.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "schedule id must not be empty".into(),
            });
        }

        let mut body = Map::new();
        body.insert("id".into(), Value::String(id.to_owned()));

        let response = self.call(ScheduleAction::Delete, body, DELETE_FAILED).await?;
        self.refresh_after(ScheduleAction::Delete).await;
        Ok(response)
    }

    async fn call(
        &self,
        action: ScheduleAction,
        body: Map<String, Value>,
        fallback: &str,
    ) -> Result<SchedulerResponse, CoreError> {
        let _in_flight = InFlight::begin(&self.inner.state);
        self.inner
            .correlator
            .send(action, body)
            .await?
            .into_result(action, fallback)
    }

    /// The mutation already succeeded; a failed refresh only leaves the snapshot stale.
    async fn refresh_after(&self, action: ScheduleAction) {
        if let Err(e) = self.list().await {
            tracing::warn!(%action, error = %e, "Refresh after mutation failed");
        }
    }

    // ── Snapshot ─────────────────────────────────────────────────────

    /// The last `list` result.
    pub fn schedules(&self) -> Arc<Vec<ScheduleItem>> {
        Arc::clone(&self.inner.snapshot.borrow())
    }

    /// Observe snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<ScheduleItem>>> {
        self.inner.snapshot.subscribe()
    }

    pub fn find(&self, id: &str) -> Option<ScheduleItem> {
        self.inner
            .snapshot
            .borrow()
            .iter()
            .find(|item| item.id.as_deref() == Some(id))
            .cloned()
    }

    pub fn summary(&self) -> ScheduleSummary {
        let items = self.inner.snapshot.borrow();
        ScheduleSummary {
            total: items.len(),
            enabled: items.iter().filter(|item| item.enabled).count(),
        }
    }

    // ── Triggers & state ─────────────────────────────────────────────

    /// Label of the most recently fired schedule.
    pub fn last_trigger(&self) -> Option<String> {
        self.inner.last_trigger.borrow().clone()
    }

    pub fn last_trigger_watch(&self) -> watch::Receiver<Option<String>> {
        self.inner.last_trigger.subscribe()
    }

    pub fn state(&self) -> ServiceState {
        *self.inner.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<ServiceState> {
        self.inner.state.subscribe()
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.inner.correlator
    }

    /// Display label for a fired schedule: its time and setting when known
    /// locally, else the raw id.
    pub fn trigger_label(&self, schedule_id: Option<&str>) -> String {
        match schedule_id {
            Some(id) => self
                .find(id)
                .map_or_else(|| format!("ID: {id}"), |item| item.label()),
            None => "ID: unknown".to_owned(),
        }
    }

    /// A trigger that names no schedule leaves the last label in place.
    fn record_trigger(&self, event: &TriggerEvent) {
        if event.schedule_id.is_none() {
            tracing::debug!("Trigger without schedule_id, last trigger unchanged");
            return;
        }
        let label = self.trigger_label(event.schedule_id.as_deref());
        tracing::info!(%label, "Last trigger updated");
        self.inner.last_trigger.send_replace(Some(label));
    }
}

/// Records that fail to decode are logged and skipped; only a `schedules`
/// value that isn't a list fails the whole call.
fn decode_schedules(data: Option<Value>) -> Result<Vec<ScheduleItem>, CoreError> {
    let raw = match data {
        Some(Value::Object(mut map)) => map.remove("schedules").unwrap_or(Value::Null),
        Some(list @ Value::Array(_)) => list,
        _ => Value::Null,
    };
    let records = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Array(records) => records,
        _ => {
            return Err(CoreError::Protocol {
                action: ScheduleAction::List,
                message: "schedules is not a list".into(),
            });
        }
    };

    let items = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let id = record.get("id").and_then(Value::as_str).map(str::to_owned);
            match serde_json::from_value::<ScheduleItem>(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(
                        index,
                        id = id.as_deref().unwrap_or("-"),
                        error = %e,
                        "Skipping undecodable schedule"
                    );
                    None
                }
            }
        })
        .collect();
    Ok(items)
}

/// Counts an outstanding operation for as long as it lives.
struct InFlight<'a> {
    state: &'a watch::Sender<ServiceState>,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a watch::Sender<ServiceState>) -> Self {
        state.send_modify(|s| {
            *s = match *s {
                ServiceState::Idle => ServiceState::AwaitingResponse { outstanding: 1 },
                ServiceState::AwaitingResponse { outstanding } => ServiceState::AwaitingResponse {
                    outstanding: outstanding + 1,
                },
            };
        });
        Self { state }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| {
            *s = match *s {
                ServiceState::AwaitingResponse { outstanding } if outstanding > 1 => {
                    ServiceState::AwaitingResponse {
                        outstanding: outstanding - 1,
                    }
                }
                _ => ServiceState::Idle,
            };
        });
    }
}
