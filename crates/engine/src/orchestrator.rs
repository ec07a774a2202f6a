// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composes the registry, slot manager, git engine, and VM supervisor into
//! the tool contracts the daemon exposes over MCP.
//!
//! Held as a single `Arc<Orchestrator>` per process: the daemon hands clones
//! to its tool router, and the CLI's read-only subcommands (`list-tasks`,
//! `list-slots`) construct one directly against the same on-disk state
//! without needing the daemon to be running.

use crate::event_bus::{EventBus, WaitOutcome};
use crate::slot_manager::{SlotError, SlotManager};
use mvm_adapters::{ensure_slot_environment, BuildArgs, ExitCallback, VmBuilder, VmSupervisor};
use mvm_core::{ActiveSlot, Clock, Event, IdGen, SystemClock, Task, TaskConfig, TaskId, TaskStatus, UuidIdGen};
use mvm_git::{GitEngine, GitError};
use mvm_storage::{tasks_dir, HostPaths, RegistryError, RegistryStore, StorageError, TaskStore};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("unknown task id '{0}'")]
    UnknownTask(TaskId),
    #[error("task {0} is still running")]
    TaskRunning(TaskId),
}

#[derive(Debug, Error)]
pub enum RunTaskError {
    #[error("unknown repo alias '{alias}'")]
    UnknownRepo { alias: String },
    #[error("all {max} slots are busy")]
    SlotsBusy { max: u32, active: Vec<ActiveSlot> },
    #[error("environment variable {0} is not set")]
    MissingCredential(String),
    #[error("git setup failed: {0}")]
    GitSetup(String),
    #[error("slot environment setup failed: {0}")]
    SlotEnvironment(String),
    #[error("build failed: {0}")]
    Build(String),
    #[error("failed to start VM: {0}")]
    Spawn(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of `get_task_info`.
#[derive(Debug, Clone, Serialize)]
pub struct GetTaskInfo {
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub merge_result: Option<Value>,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
}

/// One entry of `list_repos`.
#[derive(Debug, Clone, Serialize)]
pub struct ListReposEntry {
    pub alias: String,
    pub path: PathBuf,
    pub added_at: chrono::DateTime<chrono::Utc>,
}

impl From<mvm_core::RepoEntry> for ListReposEntry {
    fn from(entry: mvm_core::RepoEntry) -> Self {
        Self {
            alias: entry.alias,
            path: entry.path,
            added_at: entry.added_at,
        }
    }
}

/// Dependencies and tunables an `Orchestrator` is built from.
pub struct OrchestratorConfig {
    pub host_paths: HostPaths,
    pub max_slots: u32,
    /// Name of the environment variable `run_task` reads the API token from.
    pub api_token_env: String,
    pub stop_deadline: Duration,
    pub builder: Arc<dyn VmBuilder>,
    pub supervisor: Arc<dyn VmSupervisor>,
}

/// Single process-wide instance composing every subsystem. Construct once
/// per process and share via `Arc`.
pub struct Orchestrator {
    host_paths: HostPaths,
    api_token_env: String,
    #[allow(dead_code)] // read by `stop_all` during daemon shutdown
    stop_deadline: Duration,
    builder: Arc<dyn VmBuilder>,
    supervisor: Arc<dyn VmSupervisor>,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGen>,
    registry: RegistryStore,
    slots: SlotManager,
    task_store: TaskStore,
    events: EventBus,
    git_engines: Mutex<HashMap<PathBuf, GitEngine>>,
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Arc<Self> {
        Self::with_clock_and_id_gen(config, Arc::new(SystemClock), Arc::new(UuidIdGen))
    }

    pub fn with_clock_and_id_gen(
        config: OrchestratorConfig,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGen>,
    ) -> Arc<Self> {
        let registry = RegistryStore::new(config.host_paths.clone());
        let slots = SlotManager::new(config.host_paths.clone(), config.max_slots);
        Arc::new(Self {
            host_paths: config.host_paths,
            api_token_env: config.api_token_env,
            stop_deadline: config.stop_deadline,
            builder: config.builder,
            supervisor: config.supervisor,
            clock,
            id_gen,
            registry,
            slots,
            task_store: TaskStore::new(),
            events: EventBus::new(),
            git_engines: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    pub fn slots(&self) -> &SlotManager {
        &self.slots
    }

    fn git_engine_for(&self, repo_path: &Path) -> GitEngine {
        self.git_engines
            .lock()
            .entry(repo_path.to_path_buf())
            .or_insert_with(GitEngine::new)
            .clone()
    }

    /// Resolve `repo`, acquire a slot, set up the isolated clone, build and
    /// spawn the VM runner. See spec.md §4.G for the full step sequence;
    /// the `running` transition here is deferred until the VM has actually
    /// been spawned (and its PID is known), since `Task::mark_running`
    /// requires a PID — the spec's prose lists it one step earlier, but the
    /// state machine's own invariant is the more precise contract.
    pub async fn run_task(
        self: &Arc<Self>,
        description: String,
        repo_alias: &str,
    ) -> Result<TaskId, RunTaskError> {
        let repo_path = match self.registry.resolve(repo_alias) {
            Ok(path) => path,
            Err(RegistryError::UnknownRepo { alias }) => return Err(RunTaskError::UnknownRepo { alias }),
            Err(other) => return Err(RunTaskError::Registry(other)),
        };

        let token = std::env::var(&self.api_token_env)
            .map_err(|_| RunTaskError::MissingCredential(self.api_token_env.clone()))?;

        let task_id = TaskId::new(self.id_gen.next());
        let slot = match self.slots.acquire(&repo_path, repo_alias, task_id.clone()) {
            Ok(slot) => slot,
            Err(SlotError::AllSlotsBusy { max, active }) => {
                return Err(RunTaskError::SlotsBusy { max, active })
            }
            Err(SlotError::Storage(e)) => return Err(RunTaskError::Storage(e)),
            Err(SlotError::NotActive { .. }) => unreachable!("acquire never returns NotActive"),
        };

        let mut task = Task::new(TaskConfig {
            id: task_id.clone(),
            description: description.clone(),
            slot,
            repo_alias: repo_alias.to_string(),
            repo_path: repo_path.clone(),
            created_at: self.clock.now(),
        });
        let task_dir = task.task_dir();
        self.task_store.write_description(&task_dir, &description)?;
        self.task_store.write_task_id(&task_dir, task.short_id())?;
        self.task_store.save_task(&task)?;
        self.remember(&task);

        let git_engine = self.git_engine_for(&repo_path);
        let setup = match git_engine.setup_isolated_repo(&repo_path, &task_dir).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail_pre_start(task, slot, format!("git setup failed: {e}")).await;
                return Err(RunTaskError::GitSetup(e.to_string()));
            }
        };
        task.set_start_ref(setup.start_ref.clone(), setup.branch.clone());
        self.task_store.write_start_ref(&task_dir, &setup.start_ref)?;
        self.task_store.save_task(&task)?;
        self.remember(&task);

        let slot_dir = self.host_paths.slot_dir(slot);
        let slot_env = match ensure_slot_environment(&slot_dir) {
            Ok(env) => env,
            Err(e) => {
                self.fail_pre_start(task, slot, format!("slot environment setup failed: {e}"))
                    .await;
                return Err(RunTaskError::SlotEnvironment(e.to_string()));
            }
        };

        let build_args = BuildArgs {
            task_dir: task_dir.clone(),
            nix_store_image: slot_env.nix_store_image.clone(),
            socket_path: slot_dir.join("vm.sock"),
            slot,
            var_dir: slot_env.var_dir.clone(),
            container_dir: slot_env.container_dir.clone(),
        };
        let runner_path = match self.builder.build(&build_args).await {
            Ok(path) => path,
            Err(e) => {
                self.fail_pre_start(task, slot, format!("build failed: {e}")).await;
                return Err(RunTaskError::Build(e.to_string()));
            }
        };

        if let Err(e) = self.task_store.write_api_key(&task_dir, &token) {
            self.fail_pre_start(task, slot, format!("failed to write credential: {e}"))
                .await;
            return Err(RunTaskError::Storage(e));
        }

        let orchestrator = Arc::clone(self);
        let exit_task_id = task_id.clone();
        let on_exit: ExitCallback = Box::new(move |exit_code| {
            tokio::spawn(async move {
                orchestrator.handle_exit(exit_task_id, exit_code).await;
            });
        });

        match self.supervisor.spawn(&runner_path, &task_dir, on_exit).await {
            Ok(vm) => {
                if let Err(e) = task.mark_running(vm.pid, self.clock.now()) {
                    error!(%task_id, error = %e, "invalid running transition after spawn");
                }
                self.task_store.save_task(&task)?;
                self.remember(&task);
                Ok(task_id)
            }
            Err(e) => {
                self.fail_pre_start(task, slot, format!("failed to start VM: {e}")).await;
                Err(RunTaskError::Spawn(e.to_string()))
            }
        }
    }

    /// Release the slot, mark the task failed, synthesize `result.json`, and
    /// emit a `failed` event, for any error encountered before the VM is
    /// actually running.
    async fn fail_pre_start(&self, mut task: Task, slot: mvm_core::SlotId, reason: String) {
        let task_dir = task.task_dir();
        if let Err(e) = task.mark_failed(None, self.clock.now()) {
            error!(task_id = %task.id, error = %e, "invalid failed transition during pre-start failure");
        }
        if let Err(e) = self.task_store.save_task(&task) {
            error!(task_id = %task.id, error = %e, "failed to persist pre-start failure");
        }
        let result = json!({
            "success": false,
            "summary": "",
            "files_changed": [],
            "commit_count": 0,
            "commits": [],
            "stream_log_file": "",
            "debug_log_file": "",
            "runner_exit_code": Value::Null,
            "error": reason,
        });
        if let Err(e) = self.task_store.save_result(&task_dir, &result) {
            error!(task_id = %task.id, error = %e, "failed to persist pre-start result");
        }
        self.slots.release(slot);
        self.remember(&task);
        self.events.emit(Event::Failed {
            task_id: task.id.clone(),
            error: reason,
            exit_code: None,
        });
    }

    /// Runs on the supervisor's exit callback: load the guest's result,
    /// merge commits back, decide the terminal status, persist, release the
    /// slot, and emit the event.
    async fn handle_exit(self: Arc<Self>, task_id: TaskId, exit_code: Option<i32>) {
        let Some(mut task) = self.tasks.lock().get(&task_id).cloned() else {
            warn!(%task_id, "exit callback fired for a task not in memory");
            return;
        };
        let task_dir = task.task_dir();

        let result = match self.task_store.load_result(&task_dir) {
            Ok(Some(value)) => value,
            Ok(None) => json!({"success": false, "error": "no result"}),
            Err(e) => {
                warn!(%task_id, error = %e, "failed to read result.json");
                json!({"success": false, "error": format!("no result: {e}")})
            }
        };
        let result_success = result.get("success").and_then(Value::as_bool).unwrap_or(false);

        let git_engine = self.git_engine_for(&task.repo_path);
        let merge_result = git_engine
            .merge_back(&task.repo_path, &task_dir, task_id.as_str())
            .await;
        if let Err(e) = self.task_store.save_merge_result(&task_dir, &merge_result) {
            warn!(%task_id, error = %e, "failed to persist merge-result.json");
        }
        let merge_failed_hard = merge_result.get("reason").and_then(Value::as_str) == Some("error");

        let now = self.clock.now();
        let transition = if result_success && !merge_failed_hard {
            task.mark_completed(exit_code, now)
        } else {
            task.mark_failed(exit_code, now)
        };
        if let Err(e) = transition {
            error!(%task_id, error = %e, "invalid terminal transition on exit");
        }
        if let Err(e) = self.task_store.save_task(&task) {
            error!(%task_id, error = %e, "failed to persist terminal task state");
        }

        self.slots.release(task.slot);
        self.remember(&task);

        let event = if task.status == TaskStatus::Completed {
            Event::Completed {
                task_id: task_id.clone(),
                result,
                merge_result,
            }
        } else {
            let error = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("task failed")
                .to_string();
            Event::Failed {
                task_id: task_id.clone(),
                error,
                exit_code,
            }
        };
        self.events.emit(event);
    }

    fn remember(&self, task: &Task) {
        self.tasks.lock().insert(task.id.clone(), task.clone());
    }

    pub fn get_task_info(&self, task_id: &TaskId) -> Result<GetTaskInfo, OrchestratorError> {
        let task = self
            .find_task(task_id)?
            .ok_or_else(|| OrchestratorError::UnknownTask(task_id.clone()))?;
        let task_dir = task.task_dir();
        Ok(GetTaskInfo {
            status: task.status,
            result: self.task_store.load_result(&task_dir)?,
            merge_result: self.task_store.load_merge_result(&task_dir)?,
            pid: task.pid,
            exit_code: task.exit_code,
        })
    }

    pub fn get_task_logs(&self, task_id: &TaskId) -> Result<PathBuf, OrchestratorError> {
        let task = self
            .find_task(task_id)?
            .ok_or_else(|| OrchestratorError::UnknownTask(task_id.clone()))?;
        Ok(self.task_store.serial_log_path(&task.task_dir()))
    }

    pub async fn wait_next_event<C: Future<Output = ()>>(&self, timeout_ms: u64, cancel: C) -> WaitOutcome {
        self.events.wait_next(timeout_ms, cancel).await
    }

    pub async fn cleanup_task(&self, task_id: &TaskId, delete_ref: bool) -> Result<(), OrchestratorError> {
        let task = self
            .find_task(task_id)?
            .ok_or_else(|| OrchestratorError::UnknownTask(task_id.clone()))?;
        if task.status == TaskStatus::Running {
            return Err(OrchestratorError::TaskRunning(task_id.clone()));
        }

        self.task_store.delete_task_dir(&task.task_dir())?;
        if delete_ref {
            let git_engine = self.git_engine_for(&task.repo_path);
            git_engine.delete_task_ref(&task.repo_path, task_id.as_str()).await?;
        }
        self.tasks.lock().remove(task_id);
        Ok(())
    }

    pub fn list_repos(&self) -> Result<Vec<ListReposEntry>, OrchestratorError> {
        Ok(self.registry.list()?.into_iter().map(ListReposEntry::from).collect())
    }

    /// Scans every registered repo's task directory on disk, so this
    /// reflects the true on-disk state even when called from a process
    /// other than the one that ran the tasks (e.g. the CLI).
    pub fn list_tasks(&self) -> Result<Vec<Task>, OrchestratorError> {
        let mut all = Vec::new();
        for repo in self.registry.list()? {
            for task_dir in task_subdirs(&repo.path) {
                if let Some(task) = self.task_store.load_task(&task_dir)? {
                    all.push(task);
                }
            }
        }
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    pub fn list_slots(&self) -> mvm_core::SlotPoolStatus {
        self.slots.status()
    }

    /// Scan every registered repo for non-terminal tasks left behind by a
    /// prior process: reserve their slots, and mark any whose recorded PID
    /// is no longer alive as `failed` with reason "orphaned".
    pub fn recover(&self) -> Result<(), OrchestratorError> {
        for repo in self.registry.list()? {
            for task_dir in task_subdirs(&repo.path) {
                let Some(mut task) = self.task_store.load_task(&task_dir)? else {
                    continue;
                };
                if task.status.is_terminal() {
                    continue;
                }
                self.slots.reserve(task.slot, task.id.clone(), task.repo_alias.clone());
                self.remember(&task);

                let alive = task.pid.map(process_alive).unwrap_or(false);
                if alive {
                    continue;
                }
                if let Err(e) = task.mark_failed(None, self.clock.now()) {
                    error!(task_id = %task.id, error = %e, "invalid transition recovering orphaned task");
                }
                if let Err(e) = self.task_store.save_task(&task) {
                    error!(task_id = %task.id, error = %e, "failed to persist orphaned task");
                }
                self.slots.release(task.slot);
                self.remember(&task);
                self.events.emit(Event::Failed {
                    task_id: task.id.clone(),
                    error: "orphaned".to_string(),
                    exit_code: None,
                });
            }
        }
        Ok(())
    }

    fn find_task(&self, task_id: &TaskId) -> Result<Option<Task>, OrchestratorError> {
        if let Some(task) = self.tasks.lock().get(task_id).cloned() {
            return Ok(Some(task));
        }
        for repo in self.registry.list()? {
            let task_dir = tasks_dir(&repo.path).join(task_id.as_str());
            if let Some(task) = self.task_store.load_task(&task_dir)? {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }
}

fn task_subdirs(repo_path: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(tasks_dir(repo_path)) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect()
}

fn process_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
