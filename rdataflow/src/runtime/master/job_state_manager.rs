use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::api::error::{Error, Result};
use crate::api::runtime::{JobId, StageId, TaskGroupId};
use crate::dag::PhysicalPlan;
use crate::runtime::master::BlockManagerMaster;
use crate::runtime::state::{JobState, StageState, State, StateMachine, TaskGroupState};

#[derive(Debug)]
struct TaskGroupStatus {
    machine: StateMachine<TaskGroupState>,
    /// recoverable failures so far
    attempts: u32,
}

#[derive(Debug)]
struct StageStatus {
    machine: StateMachine<StageState>,
    task_groups: Vec<TaskGroupStatus>,
}

impl StageStatus {
    fn all_complete(&self) -> bool {
        self.task_groups
            .iter()
            .all(|t| t.machine.state() == TaskGroupState::Complete)
    }
}

#[derive(Debug)]
struct JobStatus {
    machine: StateMachine<JobState>,
    complete_stages: HashSet<StageId>,
}

/// Owns the state machines of one submitted job.
///
/// Every stage has its own lock covering the stage and its task groups, so
/// reports about different stages never serialize on each other. The job
/// status sits behind a separate lock that is always taken after a stage
/// lock, never before. Code holding the job lock must not call back into
/// the public getters: `get_job_state` takes the job lock again.
#[derive(Debug)]
pub struct JobStateManager {
    job_id: JobId,
    plan: Arc<PhysicalPlan>,
    max_schedule_attempt: u32,
    stages: HashMap<StageId, Mutex<StageStatus>>,
    job: Mutex<JobStatus>,
    finish_cond: Condvar,
}

impl JobStateManager {
    /// Create the state machines of every stage and task group, declare the
    /// plan's partitions to the master, and move the job to EXECUTING.
    pub fn new(
        plan: Arc<PhysicalPlan>,
        block_manager_master: &BlockManagerMaster,
        max_schedule_attempt: u32,
    ) -> Result<Self> {
        let job_id = plan.id().clone();

        let mut stages = HashMap::new();
        for stage in plan.stages() {
            let task_groups = stage
                .task_group_ids()
                .into_iter()
                .map(|task_group_id| TaskGroupStatus {
                    machine: StateMachine::new(task_group_id.to_string(), TaskGroupState::Ready),
                    attempts: 0,
                })
                .collect();
            let status = StageStatus {
                machine: StateMachine::new(stage.id().to_string(), StageState::Ready),
                task_groups,
            };
            stages.insert(stage.id(), Mutex::new(status));
        }

        plan.initialize_partitions(block_manager_master)?;

        let mut machine = StateMachine::new(format!("Job-{}", job_id), JobState::Ready);
        machine.set_state(JobState::Executing)?;
        info!("job {} submitted with {} stages", job_id, stages.len());

        Ok(JobStateManager {
            job_id,
            plan,
            max_schedule_attempt,
            stages,
            job: Mutex::new(JobStatus {
                machine,
                complete_stages: HashSet::new(),
            }),
            finish_cond: Condvar::new(),
        })
    }

    pub fn get_job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn get_plan(&self) -> Arc<PhysicalPlan> {
        self.plan.clone()
    }

    pub fn get_job_state(&self) -> JobState {
        self.lock_job().machine.state()
    }

    pub fn get_stage_state(&self, stage_id: StageId) -> Result<StageState> {
        Ok(self.lock_stage(stage_id)?.machine.state())
    }

    pub fn get_task_group_state(&self, task_group_id: TaskGroupId) -> Result<TaskGroupState> {
        let stage = self.lock_stage(task_group_id.stage_id)?;
        Ok(Self::task_group(&stage, task_group_id)?.machine.state())
    }

    /// Snapshot of every task group state. Each stage is read atomically.
    pub fn get_id_to_task_group_states(&self) -> HashMap<TaskGroupId, TaskGroupState> {
        let mut states = HashMap::new();
        for (stage_id, stage) in &self.stages {
            let stage = stage.lock().expect("lock failed");
            for (index, task_group) in stage.task_groups.iter().enumerate() {
                states.insert(
                    TaskGroupId::new(*stage_id, index as u32),
                    task_group.machine.state(),
                );
            }
        }
        states
    }

    /// Recoverable failures recorded against the task group.
    pub fn attempts(&self, task_group_id: TaskGroupId) -> Result<u32> {
        let stage = self.lock_stage(task_group_id.stage_id)?;
        Ok(Self::task_group(&stage, task_group_id)?.attempts)
    }

    pub fn check_job_termination(&self) -> bool {
        self.get_job_state().is_terminal()
    }

    pub fn on_job_state_changed(&self, new_state: JobState) -> Result<()> {
        let mut job = self.lock_job();
        self.apply_job_state(&mut job, new_state)
    }

    pub fn on_stage_state_changed(&self, stage_id: StageId, new_state: StageState) -> Result<()> {
        let mut stage = self.lock_stage(stage_id)?;
        self.check_not_terminated()?;
        // completion follows the task groups, it cannot be reported ahead of them
        if new_state == StageState::Complete && !stage.all_complete() {
            warn!(
                "{} reported complete while some task groups are not",
                stage_id
            );
            return Err(Error::illegal_transition(
                stage_id,
                stage.machine.state(),
                new_state,
            ));
        }
        self.apply_stage_state(stage_id, &mut stage, new_state)
    }

    pub fn on_task_group_state_changed(
        &self,
        task_group_id: TaskGroupId,
        new_state: TaskGroupState,
    ) -> Result<()> {
        let stage_id = task_group_id.stage_id;
        let mut stage = self.lock_stage(stage_id)?;
        self.check_not_terminated()?;

        let previous = {
            let task_group = Self::task_group_mut(&mut stage, task_group_id)?;
            let previous = task_group.machine.set_state(new_state)?;
            debug!(
                "{} state changed: {:?} -> {:?}",
                task_group_id, previous, new_state
            );
            previous
        };

        match new_state {
            TaskGroupState::Executing => {
                if stage.machine.state() == StageState::Ready {
                    self.apply_stage_state(stage_id, &mut stage, StageState::Executing)?;
                }
            }
            TaskGroupState::Complete => {
                self.complete_stage_if_done(stage_id, &mut stage)?;
            }
            TaskGroupState::FailedRecoverable => {
                if previous == TaskGroupState::Complete
                    && stage.machine.state() == StageState::Complete
                {
                    // a completed task group lost its output, the stage runs again
                    self.apply_stage_state(stage_id, &mut stage, StageState::Executing)?;
                }

                let attempts = {
                    let task_group = Self::task_group_mut(&mut stage, task_group_id)?;
                    task_group.attempts += 1;
                    task_group.attempts
                };
                if attempts >= self.max_schedule_attempt {
                    error!(
                        "{} failed {} times, reached the max schedule attempt {}",
                        task_group_id, attempts, self.max_schedule_attempt
                    );
                    Self::task_group_mut(&mut stage, task_group_id)?
                        .machine
                        .set_state(TaskGroupState::FailedUnrecoverable)?;
                    self.fail_stage(stage_id, &mut stage)?;
                }
            }
            TaskGroupState::FailedUnrecoverable => {
                error!("{} failed unrecoverably", task_group_id);
                self.fail_stage(stage_id, &mut stage)?;
            }
            TaskGroupState::Ready | TaskGroupState::OnHold => {}
        }

        Ok(())
    }

    /// True iff every task group of the stage is COMPLETE, in which case the
    /// stage (and possibly the job) is completed too. Calling it again after
    /// completion is harmless.
    pub fn check_stage_completion(&self, stage_id: StageId) -> Result<bool> {
        let mut stage = self.lock_stage(stage_id)?;
        self.complete_stage_if_done(stage_id, &mut stage)
    }

    /// Block until the job is COMPLETE or FAILED.
    pub fn wait_until_finish(&self) -> JobState {
        let job = self.lock_job();
        let job = self
            .finish_cond
            .wait_while(job, |job| !job.machine.state().is_terminal())
            .expect("lock failed");
        job.machine.state()
    }

    /// Block until the job terminates or `timeout` elapses, then return the
    /// state at that moment.
    pub fn wait_until_finish_timeout(&self, timeout: Duration) -> JobState {
        let job = self.lock_job();
        let (job, _timeout_result) = self
            .finish_cond
            .wait_timeout_while(job, timeout, |job| !job.machine.state().is_terminal())
            .expect("lock failed");
        job.machine.state()
    }

    fn complete_stage_if_done(
        &self,
        stage_id: StageId,
        stage: &mut MutexGuard<StageStatus>,
    ) -> Result<bool> {
        if !stage.all_complete() {
            return Ok(false);
        }

        match stage.machine.state() {
            StageState::Complete => Ok(true),
            StageState::Executing => {
                self.apply_stage_state(stage_id, stage, StageState::Complete)?;
                Ok(true)
            }
            // every task group reported complete, but the stage cannot follow
            _ => Ok(false),
        }
    }

    fn fail_stage(&self, stage_id: StageId, stage: &mut MutexGuard<StageStatus>) -> Result<()> {
        match stage.machine.state() {
            StageState::Failed => Ok(()),
            // a completed stage re-opens before it can fail
            StageState::Complete => {
                self.apply_stage_state(stage_id, stage, StageState::Executing)?;
                self.apply_stage_state(stage_id, stage, StageState::Failed)
            }
            _ => self.apply_stage_state(stage_id, stage, StageState::Failed),
        }
    }

    /// Apply a stage transition and carry its effect over to the job.
    /// The caller holds the stage lock.
    fn apply_stage_state(
        &self,
        stage_id: StageId,
        stage: &mut MutexGuard<StageStatus>,
        new_state: StageState,
    ) -> Result<()> {
        let previous = stage.machine.set_state(new_state)?;
        info!("{} state changed: {:?} -> {:?}", stage_id, previous, new_state);

        let mut job = self.lock_job();
        match new_state {
            StageState::Complete => {
                job.complete_stages.insert(stage_id);
                if job.complete_stages.len() == self.stages.len()
                    && job.machine.state() == JobState::Executing
                {
                    self.apply_job_state(&mut job, JobState::Complete)?;
                }
            }
            StageState::Executing => {
                job.complete_stages.remove(&stage_id);
            }
            StageState::Failed => {
                job.complete_stages.remove(&stage_id);
                if !job.machine.state().is_terminal() {
                    self.apply_job_state(&mut job, JobState::Failed)?;
                }
            }
            StageState::Ready => {}
        }

        Ok(())
    }

    fn apply_job_state(&self, job: &mut MutexGuard<JobStatus>, new_state: JobState) -> Result<()> {
        let previous = job.machine.set_state(new_state)?;
        info!(
            "job {} state changed: {:?} -> {:?}",
            self.job_id, previous, new_state
        );

        if new_state.is_terminal() {
            self.finish_cond.notify_all();
        }
        Ok(())
    }

    fn check_not_terminated(&self) -> Result<()> {
        let state = self.get_job_state();
        if state.is_terminal() {
            warn!("job {} already {:?}, ignore the report", self.job_id, state);
            return Err(Error::JobTerminated(self.job_id.to_string()));
        }
        Ok(())
    }

    fn lock_job(&self) -> MutexGuard<JobStatus> {
        self.job.lock().expect("lock failed")
    }

    fn lock_stage(&self, stage_id: StageId) -> Result<MutexGuard<StageStatus>> {
        self.stages
            .get(&stage_id)
            .map(|stage| stage.lock().expect("lock failed"))
            .ok_or_else(|| Error::UnknownEntity(stage_id.to_string()))
    }

    fn task_group(stage: &StageStatus, task_group_id: TaskGroupId) -> Result<&TaskGroupStatus> {
        stage
            .task_groups
            .get(task_group_id.index as usize)
            .ok_or_else(|| Error::UnknownEntity(task_group_id.to_string()))
    }

    fn task_group_mut(
        stage: &mut StageStatus,
        task_group_id: TaskGroupId,
    ) -> Result<&mut TaskGroupStatus> {
        stage
            .task_groups
            .get_mut(task_group_id.index as usize)
            .ok_or_else(|| Error::UnknownEntity(task_group_id.to_string()))
    }
}
