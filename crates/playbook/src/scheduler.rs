//! Playbooks and the phase scheduler
//!
//! A playbook runs its steps strictly in order. Each step is compiled into
//! tasks which run on a rayon pool as wide as the step's policy allows; the
//! next step starts only once the pool has drained.

use crate::compiler::{Compiler, PlaybookStep};
use crate::context::ProgressCallback;
use crate::error::{Error, Result};
use crate::options::ExecPolicy;
use crate::task::{Task, TaskResult, TaskState};
use rayon::prelude::*;
use std::fmt;
use std::hash::Hash;
use std::sync::Mutex;

/// Outcome of one task, as seen by the scheduler
#[derive(Debug)]
pub struct TaskReport {
    pub name: String,
    pub subname: String,
    pub result: TaskResult,
}

/// Aggregate status of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Ok,
    /// No tasks, or none of them did anything
    Skipped,
    Failed,
}

/// Per-phase counts and task reports
#[derive(Debug, Default)]
pub struct PhaseSummary {
    pub name: String,
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
    pub reports: Vec<TaskReport>,
}

impl PhaseSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, report: TaskReport) {
        match report.result.state() {
            TaskState::Done => self.ok += 1,
            TaskState::Skipped => self.skipped += 1,
            _ => self.failed += 1,
        }
        self.reports.push(report);
    }

    pub fn total(&self) -> usize {
        self.ok + self.skipped + self.failed
    }

    pub fn status(&self) -> PhaseStatus {
        if self.failed > 0 {
            PhaseStatus::Failed
        } else if self.ok == 0 {
            PhaseStatus::Skipped
        } else {
            PhaseStatus::Ok
        }
    }

    /// Remove and return the first failed report
    fn take_failure(&mut self) -> Option<TaskReport> {
        let pos = self
            .reports
            .iter()
            .position(|r| matches!(r.result, TaskResult::Failed { .. }))?;
        Some(self.reports.remove(pos))
    }
}

/// Summary of a whole playbook run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub phases: Vec<PhaseSummary>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.phases.iter().map(|p| p.failed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Ordered phases, built once and run once
#[derive(Debug, Clone)]
pub struct Playbook<K, T> {
    steps: Vec<PlaybookStep<K, T>>,
}

impl<K, T> Default for Playbook<K, T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<K, T> Playbook<K, T>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step: PlaybookStep<K, T>) -> &mut Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[PlaybookStep<K, T>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every phase in order
    ///
    /// A phase with a failed task stops the run and returns that task's
    /// error, unless the phase policy sets `skip_error`. Later phases are then
    /// neither compiled nor run.
    pub fn run<E, P>(self, compiler: &Compiler<K, T, E>, progress: &P) -> Result<RunSummary>
    where
        E: Send + Sync,
        P: ProgressCallback,
    {
        let mut summary = RunSummary::default();

        for step in &self.steps {
            let name = step.kind.to_string();
            let tasks = compiler.compile(step)?;

            log::info!("{}: {} task(s)", name, tasks.len());
            progress.on_phase_start(&name, tasks.len(), &step.policy);
            let mut phase = run_phase(&name, &tasks, &step.policy, progress)?;
            progress.on_phase_complete(&phase, &step.policy);

            if phase.status() == PhaseStatus::Failed && !step.policy.skip_error {
                let failure = phase.take_failure();
                summary.phases.push(phase);
                if let Some(TaskReport {
                    name: task,
                    subname,
                    result: TaskResult::Failed { error },
                }) = failure
                {
                    return Err(Error::TaskFailed {
                        phase: name,
                        task,
                        subname,
                        source: error,
                    });
                }
            } else {
                if phase.failed > 0 {
                    log::warn!("{}: {} task(s) failed, continuing", name, phase.failed);
                }
                summary.phases.push(phase);
            }
        }

        Ok(summary)
    }
}

/// Run the tasks of one phase on a bounded worker pool
pub fn run_phase<E, P>(
    name: &str,
    tasks: &[Task<E>],
    policy: &ExecPolicy,
    progress: &P,
) -> Result<PhaseSummary>
where
    E: Send + Sync,
    P: ProgressCallback,
{
    let summary = Mutex::new(PhaseSummary::new(name));
    if tasks.is_empty() {
        return Ok(into_summary(summary));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(policy.width())
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    pool.install(|| {
        tasks.par_iter().for_each(|task| {
            progress.on_task_start(task.name(), task.subname());
            let report = TaskReport {
                name: task.name().to_string(),
                subname: task.subname().to_string(),
                result: task.run(),
            };
            progress.on_task_complete(&report);
            record(&summary, report);
        });
    });

    Ok(into_summary(summary))
}

fn record(summary: &Mutex<PhaseSummary>, report: TaskReport) {
    match summary.lock() {
        Ok(mut locked) => locked.record(report),
        Err(poisoned) => poisoned.into_inner().record(report),
    }
}

fn into_summary(summary: Mutex<PhaseSummary>) -> PhaseSummary {
    match summary.into_inner() {
        Ok(summary) => summary,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::options::Options;
    use crate::step::{Lambda, Outcome};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Op {
        Work,
        Fail,
        Skip,
        Count,
    }

    impl fmt::Display for Op {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    /// Tracks tasks in flight and how many ran
    #[derive(Default)]
    struct Probe {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        runs: AtomicUsize,
    }

    fn compiler(probe: &Arc<Probe>) -> Compiler<Op, u64, ()> {
        let mut c = Compiler::new();

        let p = Arc::clone(probe);
        c.register(Op::Work, move |millis: &u64, _: &Options| {
            let p = Arc::clone(&p);
            let millis = *millis;
            Ok(Some(Task::new("work", format!("ms={millis}"), ()).with_step(
                Lambda::new("sleep", move |_| {
                    let now = p.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    p.max_in_flight.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(millis));
                    p.in_flight.fetch_sub(1, Ordering::SeqCst);
                    p.runs.fetch_add(1, Ordering::SeqCst);
                    Outcome::Done
                }),
            )))
        });
        c.register(Op::Fail, |target: &u64, _: &Options| {
            let target = *target;
            Ok(Some(Task::new("fail", format!("host=h{target}"), ()).with_step(
                Lambda::new("fail", move |_| {
                    if target == 0 {
                        Outcome::Fail(anyhow::anyhow!("container exited"))
                    } else {
                        Outcome::Done
                    }
                }),
            )))
        });
        c.register(Op::Skip, |_: &u64, _: &Options| {
            Ok(Some(
                Task::new("skip", "", ()).with_step(Lambda::new("skip", |_| Outcome::skip("nothing"))),
            ))
        });
        let p = Arc::clone(probe);
        c.register(Op::Count, move |_: &u64, _: &Options| {
            let p = Arc::clone(&p);
            Ok(Some(Task::new("count", "", ()).with_step(Lambda::new(
                "count",
                move |_| {
                    p.runs.fetch_add(1, Ordering::SeqCst);
                    Outcome::Done
                },
            ))))
        });
        c
    }

    fn policy(concurrency: usize, skip_error: bool) -> ExecPolicy {
        ExecPolicy {
            concurrency,
            skip_error,
            ..Default::default()
        }
    }

    #[test]
    fn test_bounded_concurrency() {
        let probe = Arc::new(Probe::default());
        let mut pb = Playbook::new();
        pb.add_step(PlaybookStep::new(Op::Work, vec![50; 8]).with_policy(policy(3, false)));

        let start = Instant::now();
        let summary = pb.run(&compiler(&probe), &NoProgress).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(summary.phases[0].ok, 8);
        assert_eq!(probe.runs.load(Ordering::SeqCst), 8);
        assert!(probe.max_in_flight.load(Ordering::SeqCst) <= 3);
        // ceil(8 / 3) rounds of 50ms, with generous slack for slow machines
        assert!(elapsed < Duration::from_millis(150 + 1000), "took {elapsed:?}");
    }

    #[test]
    fn test_failure_stops_later_phases() {
        let probe = Arc::new(Probe::default());
        let mut pb = Playbook::new();
        pb.add_step(PlaybookStep::new(Op::Fail, vec![0, 1]))
            .add_step(PlaybookStep::new(Op::Count, vec![0]));

        let err = pb.run(&compiler(&probe), &NoProgress).unwrap_err();
        assert!(matches!(
            err,
            Error::TaskFailed { ref subname, ref source, .. }
                if subname == "host=h0" && source.to_string() == "container exited"
        ));
        assert_eq!(probe.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_skip_error_continues() {
        let probe = Arc::new(Probe::default());
        let mut pb = Playbook::new();
        pb.add_step(PlaybookStep::new(Op::Fail, vec![0, 1]).with_policy(policy(2, true)))
            .add_step(PlaybookStep::new(Op::Count, vec![0]));

        let summary = pb.run(&compiler(&probe), &NoProgress).unwrap();
        assert_eq!(probe.runs.load(Ordering::SeqCst), 1);
        assert_eq!(summary.phases[0].status(), PhaseStatus::Failed);
        assert_eq!(summary.phases[0].failed, 1);
        assert_eq!(summary.phases[1].status(), PhaseStatus::Ok);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_empty_and_all_skip_phases_are_skipped() {
        let probe = Arc::new(Probe::default());
        let mut pb = Playbook::new();
        pb.add_step(PlaybookStep::new(Op::Count, vec![]))
            .add_step(PlaybookStep::new(Op::Skip, vec![0, 1]));

        let summary = pb.run(&compiler(&probe), &NoProgress).unwrap();
        assert_eq!(summary.phases[0].total(), 0);
        assert_eq!(summary.phases[0].status(), PhaseStatus::Skipped);
        assert_eq!(summary.phases[1].skipped, 2);
        assert_eq!(summary.phases[1].status(), PhaseStatus::Skipped);
        assert!(summary.is_success());
    }

    #[test]
    fn test_record_handles_poisoned_mutex() {
        let summary = Arc::new(Mutex::new(PhaseSummary::new("p")));
        let poisoned = Arc::clone(&summary);
        let _ = std::thread::spawn(move || {
            let _guard = poisoned.lock().expect("lock should succeed before poisoning");
            panic!("intentional poison");
        })
        .join();

        record(
            &summary,
            TaskReport {
                name: "t".into(),
                subname: String::new(),
                result: TaskResult::Done,
            },
        );
        let summary = Arc::try_unwrap(summary).expect("single owner");
        assert_eq!(into_summary(summary).ok, 1);
    }
}
