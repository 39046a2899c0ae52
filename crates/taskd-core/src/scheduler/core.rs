//! Scheduler: live task set, admission loop, public API.
//!
//! # 設計原則
//! - Admission bookkeeping is single-writer: every change to the task set
//!   and every eligibility decision happens under `Shared::state`.
//! - Each dispatched task runs on its own tokio task; the runner never
//!   touches scheduler state until it hands back the final state.
//! - Lock order is always scheduler state, then record guard.
//! - A `GuardError` anywhere halts admission for good.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::dependency::{Admission, DependencyGraph, DependencyResolver, WaitReason};
use super::guard::{ConcurrencyGuard, MutationContext, MutationError, tolerate_store_failure};
use super::ordering::{OrderKey, OrderingPolicy};
use super::record::TaskRecord;
use super::runner::{Interrupt, RecordGuard, TaskRunner};
use crate::app::SchedulerConfig;
use crate::domain::log::codes;
use crate::domain::{
    Entry, GuardError, InitializationError, SchedulerError, Severity, TaskId, TaskState,
};
use crate::observability::TaskCounts;
use crate::ports::{Notification, Notifier};
use crate::typed::{HandlerRegistry, TaskHandler};

const SHUTDOWN_REASON: &str = "The task scheduler is shutting down";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Running,
    Retired,
}

struct TaskSlot {
    record: Arc<RecordGuard>,
    handler: Arc<dyn TaskHandler>,
    interrupt: watch::Sender<Option<Interrupt>>,
    /// Copy taken at submission. Ordering and notification fields never
    /// change afterwards, so admission reads them without the record lock.
    view: TaskRecord,
    /// Last state the scheduler knows of; what dependents are judged by.
    state: TaskState,
    phase: Phase,
}

impl TaskSlot {
    fn notification(&self, final_state: TaskState) -> Option<Notification> {
        Notification::for_outcome(
            self.view.task_id(),
            final_state,
            self.view.notify_on_completion(),
            self.view.notify_on_error(),
        )
    }
}

struct SchedulerState {
    tasks: HashMap<TaskId, TaskSlot>,
    graph: DependencyGraph,
    running: usize,
    accepting: bool,
    halted: Option<String>,
}

impl SchedulerState {
    fn pending_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|(_, slot)| slot.phase == Phase::Pending)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn admission(&self, id: &TaskId, now: i64) -> Admission {
        match self.tasks.get(id) {
            Some(slot) => DependencyResolver::admission(&slot.view, now, |dep| {
                self.tasks.get(dep).map(|s| s.state)
            }),
            None => Admission::Wait(WaitReason::Dependency),
        }
    }

    fn check_open(&self) -> Result<(), SchedulerError> {
        if let Some(reason) = &self.halted {
            return Err(SchedulerError::Halted(reason.clone()));
        }
        if !self.accepting {
            return Err(SchedulerError::Halted("scheduler is shut down".into()));
        }
        Ok(())
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    notify: Notify,
    /// Bumped on every retirement; waiters re-check on change.
    completions: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
    runner: TaskRunner,
    registry: HandlerRegistry,
    notifier: Arc<dyn Notifier>,
    config: SchedulerConfig,
}

/// Handle to a running scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
    admission: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Scheduler {
    /// Start the admission loop. Must be called inside a tokio runtime.
    pub(crate) fn start(
        registry: HandlerRegistry,
        mutation: MutationContext,
        notifier: Arc<dyn Notifier>,
        config: SchedulerConfig,
    ) -> Self {
        let (completions, _) = watch::channel(0);
        let (shutdown, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState {
                tasks: HashMap::new(),
                graph: DependencyGraph::new(),
                running: 0,
                accepting: true,
                halted: None,
            }),
            notify: Notify::new(),
            completions,
            shutdown,
            runner: TaskRunner::new(mutation),
            registry,
            notifier,
            config,
        });
        let handle = tokio::spawn(admission_loop(Arc::clone(&shared)));
        Self {
            shared,
            admission: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Register one task. See [`Scheduler::submit_batch`].
    pub async fn submit(&self, entry: Entry) -> Result<TaskId, SchedulerError> {
        let mut ids = self.submit_batch(vec![entry]).await?;
        ids.pop()
            .ok_or_else(|| SchedulerError::Halted("empty submission".into()))
    }

    /// Register a group of tasks atomically.
    ///
    /// Dependencies may name tasks already known to the scheduler or other
    /// members of the batch. Any invalid entry rejects the whole batch and
    /// nothing is registered.
    pub async fn submit_batch(&self, entries: Vec<Entry>) -> Result<Vec<TaskId>, SchedulerError> {
        let ctx = self.shared.runner.mutation_context();

        let mut prepared = Vec::with_capacity(entries.len());
        for entry in entries {
            let record = TaskRecord::from_entry(entry, ctx.resolver.as_ref())?;
            let handler = self
                .shared
                .registry
                .resolve(record.task_class(), record.task_id())?;
            handler
                .initialize(&record)
                .map_err(|source| InitializationError::TaskRejected {
                    task_id: record.task_id().clone(),
                    source,
                })?;
            prepared.push((record, handler));
        }

        let mut notifications = Vec::new();
        let ids = {
            let mut guard = self.shared.state.lock().await;
            let st = &mut *guard;
            st.check_open()?;

            let mut batch_ids = HashSet::new();
            for (record, _) in &prepared {
                let id = record.task_id();
                if st.tasks.contains_key(id) || !batch_ids.insert(id.clone()) {
                    return Err(InitializationError::DuplicateTaskId(id.clone()).into());
                }
            }
            for (record, _) in &prepared {
                let known = |dep: &TaskId| st.tasks.contains_key(dep) || batch_ids.contains(dep);
                if let Some(dep) = DependencyResolver::first_unknown(record.dependency_ids(), known)
                {
                    return Err(InitializationError::UnknownDependency {
                        task_id: record.task_id().clone(),
                        dependency: dep.clone(),
                    }
                    .into());
                }
            }

            let mut graph = st.graph.clone();
            for (record, _) in &prepared {
                graph.add_task(record.task_id(), record.dependency_ids());
            }
            if let Some(cycle) = graph.detect_cycle() {
                return Err(InitializationError::DependencyCycle { cycle }.into());
            }

            // メモリ上で全件を組み立ててから永続化し、全件書けたら登録する
            let timeout = self.shared.config.guard_timeout();
            let mut slots = Vec::with_capacity(prepared.len());
            for (record, handler) in prepared {
                let task_id = record.task_id().clone();
                let recovered_running = record.state() == TaskState::Running;
                let view = record.clone();
                let record_guard =
                    Arc::new(ConcurrencyGuard::new(task_id.clone(), record, timeout));

                let state = record_guard
                    .stage(ctx, |edit| {
                        if recovered_running {
                            edit.log(
                                Severity::MildWarning,
                                codes::RECOVERED_RUNNING,
                                "Task was running when the scheduler last stopped",
                            );
                            if edit.record().completion_time() > 0 {
                                edit.set_state(TaskState::StoppedByShutdown);
                            } else {
                                edit.mark_completed(TaskState::StoppedByShutdown);
                            }
                        }
                        edit.record().state()
                    })
                    .await?;

                let phase = if state.is_terminal() {
                    Phase::Retired
                } else {
                    Phase::Pending
                };
                let (interrupt, _) = watch::channel(None);
                let slot = TaskSlot {
                    record: record_guard,
                    handler,
                    interrupt,
                    view,
                    state,
                    phase,
                };
                if recovered_running {
                    info!(task_id = %task_id, "recovered running task marked stopped by shutdown");
                    notifications.extend(slot.notification(state));
                }
                slots.push((task_id, slot));
            }
            persist_batch(ctx, &slots).await?;

            st.graph = graph;
            let mut ids = Vec::with_capacity(slots.len());
            for (task_id, slot) in slots {
                debug!(task_id = %task_id, state = %slot.state, "task registered");
                ids.push(task_id.clone());
                st.tasks.insert(task_id, slot);
            }
            ids
        };

        self.shared.notify.notify_one();
        for notification in notifications {
            self.shared.deliver(notification).await;
        }
        Ok(ids)
    }

    /// Cancel a pending task or ask a running one to stop.
    ///
    /// Pending tasks end as CANCELED_BEFORE_STARTING right away. Running
    /// tasks get an interrupt request for STOPPED_BY_ADMINISTRATOR; the
    /// handler decides whether to honor it. Finished tasks are left alone.
    pub async fn cancel(&self, task_id: &TaskId, reason: &str) -> Result<(), SchedulerError> {
        let ctx = self.shared.runner.mutation_context();
        let notification = {
            let mut guard = self.shared.state.lock().await;
            let st = &mut *guard;
            if let Some(reason) = &st.halted {
                return Err(SchedulerError::Halted(reason.clone()));
            }
            let slot = st
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| SchedulerError::NotFound(task_id.clone()))?;

            match slot.phase {
                Phase::Retired => None,
                Phase::Pending => {
                    let text = format!("Task canceled before starting: {reason}");
                    let result = slot
                        .record
                        .mutate(ctx, |edit| {
                            edit.log(Severity::Informational, codes::CANCELED_BEFORE_STARTING, &text);
                            edit.mark_completed(TaskState::CanceledBeforeStarting);
                        })
                        .await;
                    if let Err(err) = tolerate_store_failure(task_id, result) {
                        drop(guard);
                        return Err(self.shared.fail(err).await);
                    }
                    slot.phase = Phase::Retired;
                    slot.state = TaskState::CanceledBeforeStarting;
                    info!(task_id = %task_id, reason, "pending task canceled");
                    let notification = slot.notification(TaskState::CanceledBeforeStarting);
                    self.shared.completions.send_modify(|n| *n += 1);
                    notification
                }
                Phase::Running => {
                    // runner は開始前にレコードのロック内で割り込みを確認する。
                    // 同じロック内で送れば、未開始のタスクは決して実行されない。
                    let text = format!("Interrupt requested: {reason}");
                    let interrupt = &slot.interrupt;
                    let result = slot
                        .record
                        .mutate(ctx, |edit| {
                            interrupt.send_replace(Some(Interrupt {
                                state: TaskState::StoppedByAdministrator,
                                reason: reason.to_string(),
                            }));
                            edit.log(Severity::Notice, codes::INTERRUPT_REQUESTED, &text)
                        })
                        .await;
                    if let Err(err) = tolerate_store_failure(task_id, result) {
                        drop(guard);
                        return Err(self.shared.fail(err).await);
                    }
                    info!(task_id = %task_id, reason, "interrupt requested");
                    None
                }
            }
        };

        self.shared.notify.notify_one();
        if let Some(notification) = notification {
            self.shared.deliver(notification).await;
        }
        Ok(())
    }

    /// Consistent snapshot of one task.
    pub async fn get(&self, task_id: &TaskId) -> Result<TaskRecord, SchedulerError> {
        let record = {
            let st = self.shared.state.lock().await;
            st.tasks
                .get(task_id)
                .map(|slot| Arc::clone(&slot.record))
                .ok_or_else(|| SchedulerError::NotFound(task_id.clone()))?
        };
        match record.snapshot().await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => Err(self.shared.fail(err).await),
        }
    }

    /// Snapshots of every known task, in ordering-policy order.
    pub async fn list(&self) -> Result<Vec<TaskRecord>, SchedulerError> {
        let records: Vec<Arc<RecordGuard>> = {
            let st = self.shared.state.lock().await;
            st.tasks.values().map(|slot| Arc::clone(&slot.record)).collect()
        };
        let mut snapshots = Vec::with_capacity(records.len());
        for record in records {
            match record.snapshot().await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(err) => return Err(self.shared.fail(err).await),
            }
        }
        OrderingPolicy::sort(&mut snapshots);
        Ok(snapshots)
    }

    pub async fn counts(&self) -> TaskCounts {
        let st = self.shared.state.lock().await;
        st.tasks.values().map(|slot| slot.state).collect()
    }

    /// Resolves with the final snapshot once the task is no longer pending
    /// or running.
    ///
    /// Fails with `Halted` if the scheduler stops before that can happen.
    pub async fn wait_for_completion(&self, task_id: &TaskId) -> Result<TaskRecord, SchedulerError> {
        let mut changes = self.shared.completions.subscribe();
        loop {
            {
                let st = self.shared.state.lock().await;
                let slot = st
                    .tasks
                    .get(task_id)
                    .ok_or_else(|| SchedulerError::NotFound(task_id.clone()))?;
                if slot.phase == Phase::Retired {
                    let record = Arc::clone(&slot.record);
                    drop(st);
                    return match record.snapshot().await {
                        Ok(snapshot) => Ok(snapshot),
                        Err(err) => Err(self.shared.fail(err).await),
                    };
                }
                if let Some(reason) = &st.halted {
                    return Err(SchedulerError::Halted(reason.clone()));
                }
                if !st.accepting && slot.phase == Phase::Pending {
                    return Err(SchedulerError::Halted(
                        "scheduler shut down before the task ran".into(),
                    ));
                }
            }
            if changes.changed().await.is_err() {
                return Err(SchedulerError::Halted("scheduler dropped".into()));
            }
        }
    }

    /// Load every persisted entry from the record store and register them
    /// as one batch.
    pub async fn recover(&self) -> Result<Vec<TaskId>, SchedulerError> {
        let store = &self.shared.runner.mutation_context().store;
        let mut entries = Vec::new();
        for task_id in store.ids().await? {
            match store.load(&task_id).await? {
                Some(entry) => entries.push(entry),
                None => debug!(task_id = %task_id, "listed entry vanished before load"),
            }
        }
        info!(count = entries.len(), "recovering persisted tasks");
        self.submit_batch(entries).await
    }

    pub async fn is_halted(&self) -> bool {
        self.shared.state.lock().await.halted.is_some()
    }

    /// Stop admitting and ask running tasks to stop. Returns immediately.
    pub async fn shutdown(&self) {
        let mut st = self.shared.state.lock().await;
        if !st.accepting {
            return;
        }
        st.accepting = false;
        self.shared.shutdown.send_replace(true);
        for (task_id, slot) in &st.tasks {
            if slot.phase == Phase::Running {
                debug!(task_id = %task_id, "requesting shutdown interrupt");
                slot.interrupt.send_replace(Some(Interrupt {
                    state: TaskState::StoppedByShutdown,
                    reason: SHUTDOWN_REASON.to_string(),
                }));
            }
        }
        drop(st);
        // 待機中の wait_for_completion を起こす
        self.shared.completions.send_modify(|n| *n += 1);
        info!("scheduler shutdown requested");
    }

    /// [`Scheduler::shutdown`], then wait for every running task to record
    /// its final state and for the admission loop to exit.
    pub async fn shutdown_and_join(&self) {
        self.shutdown().await;

        let mut changes = self.shared.completions.subscribe();
        loop {
            let running = self.shared.state.lock().await.running;
            if running == 0 {
                break;
            }
            debug!(running, "waiting for running tasks");
            if changes.changed().await.is_err() {
                break;
            }
        }

        if let Some(handle) = self.admission.lock().await.take()
            && let Err(err) = handle.await
        {
            error!(%err, "admission loop ended abnormally");
        }
        info!("scheduler stopped");
    }
}

impl Shared {
    fn ctx(&self) -> &MutationContext {
        self.runner.mutation_context()
    }

    /// One admission cycle. Returns the earliest future scheduled start
    /// among tasks waiting on their start time.
    async fn admit(self: &Arc<Self>) -> Result<Option<i64>, GuardError> {
        let mut notifications = Vec::new();
        let mut dispatch = Vec::new();

        let next_start = {
            let mut guard = self.state.lock().await;
            let st = &mut *guard;
            if st.halted.is_some() || !st.accepting {
                return Ok(None);
            }
            let now = self.ctx().clock.now_millis();

            // Resolving one blocked task can settle the fate of its own
            // dependents; after the first pass only those are re-checked.
            let mut candidates = st.pending_ids();
            loop {
                let blocked: Vec<(TaskId, Admission)> = candidates
                    .into_iter()
                    .filter(|id| st.tasks.get(id).is_some_and(|slot| slot.phase == Phase::Pending))
                    .map(|id| {
                        let admission = st.admission(&id, now);
                        (id, admission)
                    })
                    .filter(|(_, a)| matches!(a, Admission::Cancel { .. } | Admission::Disable { .. }))
                    .collect();
                if blocked.is_empty() {
                    break;
                }
                let mut dependents = BTreeSet::new();
                for (task_id, admission) in blocked {
                    notifications.extend(self.resolve_blocked(st, &task_id, admission).await?);
                    dependents.extend(st.graph.get_waiting_tasks(&task_id));
                }
                debug!(dependents = ?dependents, "re-evaluating dependents of blocked tasks");
                candidates = dependents.into_iter().collect();
            }

            let mut runnable: Vec<(OrderKey, TaskId)> = Vec::new();
            let mut waiting: Vec<(TaskId, TaskState)> = Vec::new();
            let mut next_start: Option<i64> = None;
            for task_id in st.pending_ids() {
                let Some(slot) = st.tasks.get(&task_id) else {
                    continue;
                };
                match st.admission(&task_id, now) {
                    Admission::Run => runnable.push((slot.view.order_key(), task_id)),
                    Admission::Wait(reason) => {
                        let target = match reason {
                            WaitReason::Dependency => TaskState::WaitingOnDependency,
                            WaitReason::StartTime => {
                                let at = slot.view.scheduled_start_time();
                                next_start = Some(next_start.map_or(at, |n| n.min(at)));
                                TaskState::WaitingOnStartTime
                            }
                        };
                        if slot.state != target {
                            waiting.push((task_id, target));
                        }
                    }
                    Admission::Cancel { .. } | Admission::Disable { .. } => {}
                }
            }

            for (task_id, target) in waiting {
                if let Some(slot) = st.tasks.get_mut(&task_id) {
                    let result = slot.record.mutate(self.ctx(), |edit| edit.set_state(target)).await;
                    tolerate_store_failure(&task_id, result)?;
                    slot.state = target;
                    debug!(task_id = %task_id, state = %target, "task waiting");
                }
            }

            runnable.sort_by(|a, b| OrderingPolicy::compare_keys(&a.0, &b.0));
            let capacity = self
                .config
                .max_concurrent_tasks
                .map_or(usize::MAX, |max| max.saturating_sub(st.running));
            if runnable.len() > capacity {
                debug!(
                    eligible = runnable.len(),
                    capacity, "concurrency limit reached; deferring the rest"
                );
            }
            for (_, task_id) in runnable.into_iter().take(capacity) {
                if let Some(slot) = st.tasks.get_mut(&task_id) {
                    slot.phase = Phase::Running;
                    slot.state = TaskState::Running;
                    dispatch.push((
                        task_id,
                        Arc::clone(&slot.record),
                        Arc::clone(&slot.handler),
                        slot.interrupt.subscribe(),
                    ));
                    st.running += 1;
                }
            }
            next_start
        };

        for (task_id, record, handler, interrupt) in dispatch {
            debug!(task_id = %task_id, "dispatching task");
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                let result = shared.runner.execute(record, handler, interrupt).await;
                shared.finish(task_id, result).await;
            });
        }
        for notification in notifications {
            self.deliver(notification).await;
        }
        Ok(next_start)
    }

    /// Apply a failed-dependency outcome to a pending task without running it.
    async fn resolve_blocked(
        &self,
        st: &mut SchedulerState,
        task_id: &TaskId,
        admission: Admission,
    ) -> Result<Option<Notification>, GuardError> {
        let (target, failed) = match admission {
            Admission::Cancel { failed } => (TaskState::CanceledBeforeStarting, failed),
            Admission::Disable { failed } => (TaskState::Disabled, failed),
            Admission::Run | Admission::Wait(_) => return Ok(None),
        };
        let Some(slot) = st.tasks.get_mut(task_id) else {
            return Ok(None);
        };
        let failed = failed
            .iter()
            .map(TaskId::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let result = slot
            .record
            .mutate(self.ctx(), |edit| {
                if target == TaskState::Disabled {
                    let text = format!(
                        "Task disabled because its dependencies did not complete successfully: {failed}"
                    );
                    edit.log(Severity::MildWarning, codes::DISABLED_BY_DEPENDENCY, &text);
                    edit.set_state(TaskState::Disabled);
                } else {
                    let text = format!(
                        "Task canceled because its dependencies did not complete successfully: {failed}"
                    );
                    edit.log(Severity::MildWarning, codes::DEPENDENCY_FAILED, &text);
                    edit.mark_completed(TaskState::CanceledBeforeStarting);
                }
            })
            .await;
        tolerate_store_failure(task_id, result)?;

        slot.phase = Phase::Retired;
        slot.state = target;
        info!(task_id = %task_id, state = %target, failed = %failed, "dependency failed; task not run");
        self.completions.send_modify(|n| *n += 1);
        Ok(slot.notification(target))
    }

    /// Runner hand-back: retire the task and wake the admission loop.
    async fn finish(&self, task_id: TaskId, result: Result<TaskState, GuardError>) {
        let notification = {
            let mut st = self.state.lock().await;
            st.running = st.running.saturating_sub(1);

            let notification = match st.tasks.get_mut(&task_id) {
                Some(slot) => {
                    slot.phase = Phase::Retired;
                    match &result {
                        Ok(state) => {
                            slot.state = *state;
                            slot.notification(*state)
                        }
                        // 完了を記録できなかった。実行中としては数えない
                        Err(_) => {
                            slot.state = TaskState::StoppedByError;
                            None
                        }
                    }
                }
                None => None,
            };

            notification
        };

        if let Some(notification) = notification {
            self.deliver(notification).await;
        }
        if let Err(err) = &result {
            self.halt(err).await;
        }
        self.completions.send_modify(|n| *n += 1);
        self.notify.notify_one();
    }

    async fn deliver(&self, notification: Notification) {
        let task_id = notification.task_id.clone();
        match self.notifier.notify(notification).await {
            Ok(()) => debug!(task_id = %task_id, "notification sent"),
            Err(err) => warn!(task_id = %task_id, %err, "notification failed"),
        }
    }

    /// Halt on a guard failure and turn it into the caller's error.
    async fn fail(&self, err: GuardError) -> SchedulerError {
        self.halt(&err).await;
        SchedulerError::Guard(err)
    }

    async fn halt(&self, err: &GuardError) {
        {
            let mut st = self.state.lock().await;
            if st.halted.is_some() {
                return;
            }
            st.halted = Some(err.to_string());
        }
        error!(%err, "scheduler halted");
        self.shutdown.send_replace(true);
        self.completions.send_modify(|n| *n += 1);
    }
}

/// Persist every staged record of a batch, or leave the store as it was.
async fn persist_batch(
    ctx: &MutationContext,
    slots: &[(TaskId, TaskSlot)],
) -> Result<(), SchedulerError> {
    let mut written: Vec<(&TaskId, Option<Entry>)> = Vec::with_capacity(slots.len());
    for (task_id, slot) in slots {
        let outcome = match ctx.store.load(task_id).await {
            Ok(previous) => slot.record.persist(ctx).await.map(|()| previous),
            Err(err) => Err(MutationError::Store(err)),
        };
        match outcome {
            Ok(previous) => written.push((task_id, previous)),
            Err(err) => {
                warn!(task_id = %task_id, %err, "batch not persisted; rolling back");
                roll_back(ctx, written).await;
                return Err(err.into());
            }
        }
    }
    Ok(())
}

async fn roll_back(ctx: &MutationContext, written: Vec<(&TaskId, Option<Entry>)>) {
    for (task_id, previous) in written.into_iter().rev() {
        let result = match &previous {
            Some(entry) => ctx.store.store(task_id, entry).await,
            None => ctx.store.remove(task_id).await,
        };
        match result {
            Ok(()) => debug!(task_id = %task_id, "batch write rolled back"),
            Err(err) => warn!(task_id = %task_id, %err, "could not roll back batch write"),
        }
    }
}

async fn admission_loop(shared: Arc<Shared>) {
    let mut shutdown = shared.shutdown.subscribe();
    let idle = shared.config.idle_poll_interval();
    info!("admission loop started");

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        let next_start = match shared.admit().await {
            Ok(next_start) => next_start,
            Err(err) => {
                shared.halt(&err).await;
                break;
            }
        };

        // 次の開始予定時刻までか、idle 間隔まで眠る
        let now = shared.ctx().clock.now_millis();
        let sleep_for = next_start
            .map(|at| Duration::from_millis(at.saturating_sub(now).max(1) as u64))
            .map_or(idle, |until| until.min(idle));

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shared.notify.notified() => {}
            _ = tokio::time::sleep(sleep_for) => {}
        }
    }
    info!("admission loop stopped");
}
