// ── Connection & scheduling supervisor ──
//
// Owns the connection lifecycle state machine, the periodic refresh
// jobs, failure classification, and recovery. Each job is an
// independent self-rescheduling timer: the next timer is armed only
// after the current run has settled, so a job never overlaps itself.
// Entering steady state cancels every timer of the previous generation
// before arming new ones — no duplicate timer chains across reconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashSet;
use futures_util::future::join_all;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sentra_api::ApiClient;
use sentra_api::models::{BaseStationRecord, ElementsRoot};

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::events;
use crate::global;
use crate::ident::channel_id;
use crate::model::{BaseStation, Element, Endpoint};
use crate::projector;
use crate::tree::{ExternalWrite, StateTree, StateValue};
use crate::writer::{self, DiffWriter};

// ── EngineState ─────────────────────────────────────────────────────

/// Connection lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disconnected,
    CheckingMaintenance,
    /// Maintenance detected or the check failed; waiting out the fixed
    /// backoff before the next attempt.
    WaitingRetry,
    Authorizing,
    InitialSync,
    Steady,
    /// Authorization expired mid-steady; reconnecting without backoff.
    Reconnecting,
    /// Credentials were refused. Terminal.
    Terminated,
}

// ── Jobs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Elements,
    Events,
    Health,
}

impl Job {
    fn name(self) -> &'static str {
        match self {
            Self::Elements => "elements",
            Self::Events => "events",
            Self::Health => "health",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Reconnect {
    Immediate,
    Delayed,
}

// ── Engine ──────────────────────────────────────────────────────────

/// The synchronization engine. Cheaply cloneable; [`run()`](Engine::run)
/// drives the connection loop until shutdown or a fatal credentials
/// failure.
pub struct Engine<S: StateTree> {
    inner: Arc<EngineInner<S>>,
}

impl<S: StateTree> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<S: StateTree> {
    config: EngineConfig,
    api: ApiClient,
    tree: Arc<S>,
    diff: DiffWriter<S>,
    state: watch::Sender<EngineState>,
    /// Set while reconnecting/tearing down; prevents stray rescheduling
    /// across a reconnect boundary.
    stop_scheduling: AtomicBool,
    /// Process-wide token; cancelled on shutdown only.
    cancel: CancellationToken,
    /// Child token for the current connection generation — cancelled on
    /// every reconnect, replaced on entering steady state.
    generation: Mutex<CancellationToken>,
    reconnect_tx: mpsc::UnboundedSender<Reconnect>,
    reconnect_rx: Mutex<Option<mpsc::UnboundedReceiver<Reconnect>>>,
    /// Event cursor (epoch ms). Touched only by the event job.
    last_event_ts: AtomicI64,
    /// Base station used for write-back commands; captured once per
    /// connection generation.
    command_station: Mutex<Option<String>>,
    /// Channels whose schema has been declared.
    known_channels: DashSet<String>,
}

impl<S: StateTree> Engine<S> {
    pub fn new(config: EngineConfig, api: ApiClient, tree: Arc<S>) -> Self {
        let (state, _) = watch::channel(EngineState::Disconnected);
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let generation = cancel.child_token();
        let diff = DiffWriter::new(Arc::clone(&tree));

        Self {
            inner: Arc::new(EngineInner {
                config,
                api,
                tree,
                diff,
                state,
                stop_scheduling: AtomicBool::new(true),
                cancel,
                generation: Mutex::new(generation),
                reconnect_tx,
                reconnect_rx: Mutex::new(Some(reconnect_rx)),
                last_event_ts: AtomicI64::new(0),
                command_station: Mutex::new(None),
                known_channels: DashSet::new(),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn tree(&self) -> &Arc<S> {
        &self.inner.tree
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub(crate) fn diff(&self) -> &DiffWriter<S> {
        &self.inner.diff
    }

    /// Subscribe to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    /// Stop scheduling, cancel all timers, and end [`run()`](Self::run).
    pub async fn shutdown(&self) {
        self.stop_timers().await;
        self.inner.cancel.cancel();
        self.set_state(EngineState::Disconnected);
        info!("engine shut down");
    }

    // ── Main loop ────────────────────────────────────────────────────

    /// Drive the engine: declare and reset global states, start the
    /// write-back consumer, then run the connection sequence until
    /// shutdown. Returns an error only on the fatal credentials path.
    pub async fn run(&self) -> Result<(), CoreError> {
        let Some(mut reconnect_rx) = self.inner.reconnect_rx.lock().await.take() else {
            // run() was already called once; the engine is single-run.
            return Ok(());
        };

        if let Err(err) = projector::declare_globals(self.inner.tree.as_ref()).await {
            warn!(error = %err, "declaring global states failed");
        }
        if let Err(err) = writer::reset_globals(&self.inner.diff).await {
            warn!(error = %err, "resetting global states failed");
        }

        self.spawn_writeback();
        let _ = self.inner.reconnect_tx.send(Reconnect::Immediate);

        loop {
            tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => return Ok(()),
                request = reconnect_rx.recv() => {
                    let Some(request) = request else { return Ok(()) };
                    if matches!(request, Reconnect::Delayed) {
                        self.set_state(EngineState::WaitingRetry);
                        info!(
                            "retrying connection in {}s",
                            self.inner.config.retry_delay_seconds
                        );
                        tokio::select! {
                            biased;
                            () = self.inner.cancel.cancelled() => return Ok(()),
                            () = tokio::time::sleep(self.inner.config.retry_delay()) => {}
                        }
                    }
                    // Collapse requests that piled up while waiting.
                    while reconnect_rx.try_recv().is_ok() {}

                    if let Err(fatal) = self.setup_connection().await {
                        self.set_state(EngineState::Terminated);
                        self.inner.cancel.cancel();
                        return Err(fatal);
                    }
                }
            }
        }
    }

    // ── Connection sequence ──────────────────────────────────────────

    /// One pass of the connection sequence. Transient failures schedule
    /// a retry and return `Ok`; only refused credentials return `Err`.
    async fn setup_connection(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Ok(());
        }
        // Stop timers in case something is still scheduled while reconnecting.
        self.stop_timers().await;
        debug!("connecting to the security cloud");

        self.set_state(EngineState::CheckingMaintenance);
        match self.inner.api.is_maintenance().await {
            Ok(true) => {
                info!("cloud is under maintenance");
                self.write_global(global::MAINTENANCE, true).await;
                self.request_reconnect(Reconnect::Delayed);
                return Ok(());
            }
            Ok(false) => self.write_global(global::MAINTENANCE, false).await,
            Err(err) => {
                error!(error = %err, "unable to determine cloud maintenance status");
                self.request_reconnect(Reconnect::Delayed);
                return Ok(());
            }
        }

        self.set_state(EngineState::Authorizing);
        debug!("authorizing");
        if let Err(err) = self.inner.api.authorize().await {
            error!(error = %err, "error authorizing with the cloud");
            self.write_global(global::CONNECTION, false).await;
            return Err(CoreError::AuthorizationFailed(err));
        }
        self.write_global(global::CONNECTION, true).await;

        self.set_state(EngineState::InitialSync);
        self.inner
            .last_event_ts
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);

        match self.initial_sync().await {
            Ok(()) => {
                self.enter_steady().await;
                info!("connected to the cloud and initialized states");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "error during connection setup");
                self.request_reconnect(Reconnect::Delayed);
                Ok(())
            }
        }
    }

    /// Full projection of the remote inventory: base stations first,
    /// then elements and endpoints. Schema always precedes values.
    async fn initial_sync(&self) -> Result<(), CoreError> {
        debug!("loading basestation data");
        let stations = self.inner.api.get_base_stations().await?;
        *self.inner.command_station.lock().await = stations.first().map(|bs| bs.id.clone());
        join_all(stations.into_iter().map(|record| self.sync_base_station(record))).await;

        debug!("loading elements data");
        let root = self.inner.api.get_elements().await?;
        self.sync_elements(root).await;
        Ok(())
    }

    /// Declare and apply one base station. Failures are isolated to the
    /// entity and logged.
    pub(crate) async fn sync_base_station(&self, record: BaseStationRecord) {
        let bs = BaseStation::from(record);
        if let Err(err) = projector::declare_base_station(self.inner.tree.as_ref(), &bs).await {
            warn!(station = %bs.id, error = %err, "base station declaration failed");
            return;
        }
        if let Err(err) = writer::apply_base_station(&self.inner.diff, &bs).await {
            warn!(station = %bs.id, error = %err, "base station update failed");
        }
    }

    /// Sync every element and endpoint in the payload, concurrently,
    /// with per-entity failure isolation. First-seen channels are
    /// declared before their first value write.
    pub(crate) async fn sync_elements(&self, root: ElementsRoot) {
        let elements: Vec<Element> = root
            .bs01
            .into_iter()
            .flat_map(|group| group.subelements)
            .map(Element::from)
            .collect();
        join_all(elements.iter().map(|element| self.sync_element(element))).await;

        let endpoints: Vec<Endpoint> = root.gp02.into_iter().map(Endpoint::from).collect();
        join_all(endpoints.iter().map(|endpoint| self.sync_endpoint(endpoint))).await;
    }

    async fn sync_element(&self, element: &Element) {
        let channel = channel_id(&element.id, &element.tag);
        if self.inner.known_channels.insert(channel.clone()) {
            if let Err(err) =
                projector::declare_element(self.inner.tree.as_ref(), element).await
            {
                warn!(element = %element.id, error = %err, "element declaration failed");
                self.inner.known_channels.remove(&channel);
                return;
            }
        }
        if let Err(err) = writer::apply_element(&self.inner.diff, element).await {
            warn!(element = %element.id, error = %err, "element update failed");
        }
    }

    async fn sync_endpoint(&self, endpoint: &Endpoint) {
        let channel = format!("{}{}", crate::ident::ENDPOINT_PREFIX, endpoint.id);
        if self.inner.known_channels.insert(channel.clone()) {
            if let Err(err) =
                projector::declare_endpoint(self.inner.tree.as_ref(), endpoint).await
            {
                warn!(endpoint = %endpoint.id, error = %err, "endpoint declaration failed");
                self.inner.known_channels.remove(&channel);
                return;
            }
        }
        if let Err(err) = writer::apply_endpoint(&self.inner.diff, endpoint).await {
            warn!(endpoint = %endpoint.id, error = %err, "endpoint update failed");
        }
    }

    // ── Steady state & job scheduling ────────────────────────────────

    /// Cancel all outstanding timers from any prior generation, then arm
    /// the periodic jobs for a fresh generation.
    async fn enter_steady(&self) {
        self.stop_timers().await;
        let generation = self.inner.cancel.child_token();
        *self.inner.generation.lock().await = generation.clone();
        self.inner.stop_scheduling.store(false, Ordering::SeqCst);
        self.set_state(EngineState::Steady);

        debug!("starting timers for periodic refresh jobs");
        // The initial sync just loaded elements; schedule only.
        self.spawn_job(Job::Elements, self.inner.config.element_interval(), false, &generation);
        self.spawn_job(Job::Events, self.inner.config.event_interval(), true, &generation);
        self.spawn_job(Job::Health, self.inner.config.health_interval(), true, &generation);
    }

    /// Self-rescheduling timer: run the handler, let it settle, then arm
    /// the next tick. An interval of zero disables the job.
    fn spawn_job(
        &self,
        job: Job,
        interval: Duration,
        run_immediately: bool,
        generation: &CancellationToken,
    ) {
        if interval.is_zero() {
            return;
        }
        let engine = self.clone();
        let generation = generation.clone();
        tokio::spawn(async move {
            let mut skip_run = !run_immediately;
            loop {
                if skip_run {
                    skip_run = false;
                } else if let Err(err) = engine.run_job(job).await {
                    engine.handle_job_error(job, &err).await;
                }

                if engine.inner.stop_scheduling.load(Ordering::SeqCst)
                    || generation.is_cancelled()
                {
                    break;
                }
                tokio::select! {
                    biased;
                    () = generation.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
            }
        });
    }

    async fn run_job(&self, job: Job) -> Result<(), CoreError> {
        match job {
            Job::Elements => self.refresh_elements().await,
            Job::Events => self.refresh_events().await,
            Job::Health => self.refresh_health().await,
        }
    }

    async fn refresh_elements(&self) -> Result<(), CoreError> {
        debug!("updating elements");
        let root = self.inner.api.get_elements().await?;
        self.sync_elements(root).await;
        Ok(())
    }

    pub(crate) async fn refresh_events(&self) -> Result<(), CoreError> {
        debug!("updating events");
        let start = Utc::now().timestamp_millis();
        let since = self.inner.last_event_ts.load(Ordering::SeqCst);
        let page = self.inner.api.get_recent_events(since).await?;
        events::process_events(&self.inner.diff, &page.events).await?;
        // Advance the cursor only after the whole batch is applied.
        self.inner.last_event_ts.store(start, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh_health(&self) -> Result<(), CoreError> {
        debug!("updating system health");
        let health = self.inner.api.get_health().await?;
        self.inner
            .diff
            .set(global::SYSTEM_HEALTH, health.system_health)
            .await?;
        Ok(())
    }

    /// Classify a failed job run. An expired authorization reconnects
    /// immediately, bypassing backoff; everything else is transient —
    /// re-check maintenance, then retry the whole connection sequence
    /// after the fixed backoff.
    async fn handle_job_error(&self, job: Job, err: &CoreError) {
        if let CoreError::Api(api_err) = err {
            if api_err.is_authorization_expired() {
                info!(
                    job = job.name(),
                    "authorization expired, stopping timers and reconnecting"
                );
                self.set_state(EngineState::Reconnecting);
                self.stop_timers().await;
                self.request_reconnect(Reconnect::Immediate);
                return;
            }
        }

        error!(job = job.name(), error = %err, "scheduled job failed");
        match self.inner.api.is_maintenance().await {
            Ok(maintenance) => {
                self.write_global(global::MAINTENANCE, maintenance).await;
                if maintenance {
                    info!("cloud is under maintenance");
                }
            }
            Err(probe_err) => {
                error!(error = %probe_err, "unable to determine cloud maintenance status");
            }
        }
        self.stop_timers().await;
        self.request_reconnect(Reconnect::Delayed);
    }

    // ── Write-back path ──────────────────────────────────────────────

    /// Consume external writes on write-capable nodes for the lifetime
    /// of the engine and turn them into remote commands.
    fn spawn_writeback(&self) {
        let engine = self.clone();
        let mut rx = self.inner.tree.external_writes();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(write) => {
                            if let Err(err) = engine.handle_external_write(&write).await {
                                error!(node = %write.id, error = %err, "write-back failed");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "write-back receiver lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    /// Route one external write to the matching remote command, then
    /// schedule an accelerated event re-poll so the resulting state
    /// shows up quickly.
    async fn handle_external_write(&self, write: &ExternalWrite) -> Result<(), CoreError> {
        match write.id.as_str() {
            global::USER_ALARM => {
                let Some(station) = self.command_station().await else {
                    return Ok(());
                };
                let active = matches!(write.value, StateValue::Bool(true));
                info!(station = %station, active, "user alarm command");
                self.inner.api.set_user_alarm(&station, active).await?;
            }
            global::INTRUSION_MODE => {
                let Some(station) = self.command_station().await else {
                    return Ok(());
                };
                let mode = write.value.to_string();
                info!(station = %station, mode = %mode, "intrusion mode command");
                self.inner.api.set_intrusion_mode(&station, &mode).await?;
            }
            id => {
                let Some((channel, field)) = id.rsplit_once('.') else {
                    return Ok(());
                };
                let Some((base, endnode)) = element_command_target(channel) else {
                    debug!(node = id, "external write has no command target, ignoring");
                    return Ok(());
                };
                match field {
                    "relay" => {
                        let name = if matches!(write.value, StateValue::Bool(true)) {
                            "on"
                        } else {
                            "off"
                        };
                        info!(element = endnode, command = name, "relay command");
                        self.inner.api.send_element_command(base, endnode, name).await?;
                    }
                    "relayButton" => {
                        info!(element = endnode, "relay button command");
                        self.inner
                            .api
                            .send_element_command(base, endnode, "press")
                            .await?;
                    }
                    _ => {
                        debug!(node = id, "external write on non-command node, ignoring");
                        return Ok(());
                    }
                }
            }
        }
        self.schedule_event_repoll();
        Ok(())
    }

    /// One-shot accelerated event poll after a short fixed delay.
    fn schedule_event_repoll(&self) {
        let engine = self.clone();
        let delay = self.inner.config.writeback_poll_delay();
        tokio::spawn(async move {
            let generation = engine.inner.generation.lock().await.clone();
            tokio::select! {
                biased;
                () = generation.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            if engine.inner.stop_scheduling.load(Ordering::SeqCst) {
                return;
            }
            debug!("accelerated event poll after write-back");
            if let Err(err) = engine.refresh_events().await {
                engine.handle_job_error(Job::Events, &err).await;
            }
        });
    }

    async fn command_station(&self) -> Option<String> {
        let station = self.inner.command_station.lock().await.clone();
        if station.is_none() {
            warn!("no base station captured, dropping command");
        }
        station
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn stop_timers(&self) {
        self.inner.stop_scheduling.store(true, Ordering::SeqCst);
        self.inner.generation.lock().await.cancel();
    }

    fn request_reconnect(&self, kind: Reconnect) {
        let _ = self.inner.reconnect_tx.send(kind);
    }

    fn set_state(&self, state: EngineState) {
        debug!(?state, "engine state");
        let _ = self.inner.state.send(state);
    }

    async fn write_global(&self, id: &str, value: impl Into<StateValue> + Send) {
        if let Err(err) = self.inner.diff.set(id, value).await {
            warn!(node = id, error = %err, "global state write failed");
        }
    }
}

/// Derive the remote command target from a channel key:
/// `{base}.{tag}-{local}` → `(base, local)`.
fn element_command_target(channel: &str) -> Option<(&str, &str)> {
    let (base, rest) = channel.split_once('.')?;
    let (_tag, local) = rest.split_once('-')?;
    Some((base, local))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn command_target_from_channel_key() {
        assert_eq!(
            element_command_target("base01.um01-03ef"),
            Some(("base01", "03ef"))
        );
        assert_eq!(element_command_target("gp02-1c0000aa"), None);
        assert_eq!(element_command_target("info"), None);
    }
}
