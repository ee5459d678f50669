//! Recognize → plan → act engine

use action_primitives::{execute_action, Action, ActionError, Controller, ControllerError, ExecCtx};
use autoplay_core_types::{Capability, CapabilitySet};
use autoplay_event_bus::EventBus;
use nav_graph::{EdgeId, NavGraph, NodeId};
use perceiver_visual::{Frame, MatchReport, Scorer, TemplateMatcher, TemplateSet};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::events::{EngineEvent, EngineState, RetryKind};
use crate::resolver::{resolve, Resolution};
use crate::session::SessionState;
use crate::strategies::RetryPolicy;
use crate::types::{AbortReason, Outcome, RunReport, StepResult, Task, TaskStep};

/// A task checked against one engine, ready to run
#[derive(Debug, Clone)]
pub struct BoundTask {
    task: Task,
    target: Option<NodeId>,
    max_retries: u32,
    step_timeout: Duration,
}

impl BoundTask {
    pub fn name(&self) -> &str {
        &self.task.name
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }
}

/// Automation engine for one device.
///
/// Generic over the controller so the controller's type-level capability set
/// takes part in task binding. Templates and graph are immutable once the
/// engine is built; all mutable state lives in the run that owns it.
pub struct Engine<C: Controller> {
    controller: Arc<C>,
    matcher: TemplateMatcher,
    graph: Arc<NavGraph>,
    /// Templates any node refers to, in first-use order
    node_templates: Arc<Vec<String>>,
    config: EngineConfig,
    recovery: Vec<Action>,
    events: Option<Arc<dyn EventBus<EngineEvent>>>,
}

/// Where the state machine goes next; terminal arms carry their result
enum Step {
    Next(EngineState),
    Abort(AbortReason),
    Done,
}

impl<C: Controller> Engine<C> {
    pub fn new(controller: Arc<C>, templates: TemplateSet, graph: NavGraph) -> Self {
        let mut seen = BTreeSet::new();
        let node_templates = graph
            .nodes()
            .flat_map(|(_, node)| node.templates.iter().cloned())
            .filter(|t| seen.insert(t.clone()))
            .collect();

        Self {
            controller,
            matcher: TemplateMatcher::new(templates),
            graph: Arc::new(graph),
            node_templates: Arc::new(node_templates),
            config: EngineConfig::default(),
            recovery: Vec::new(),
            events: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the similarity metric
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.matcher = TemplateMatcher::with_scorer(self.matcher.templates().clone(), scorer);
        self
    }

    /// Actions run when the screen cannot be recognized, e.g. back or home
    pub fn with_recovery(mut self, recovery: Vec<Action>) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus<EngineEvent>>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Capabilities usable by tasks: declared by `C` and enabled at runtime
    pub fn capabilities(&self) -> CapabilitySet {
        self.controller.effective_capabilities()
    }

    /// Bind a task to this engine.
    ///
    /// Every action the run may issue is checked here: trailing steps, the
    /// recovery sequence, and each edge on some route to the target. A
    /// missing capability fails now rather than mid-run.
    pub fn load_task(&self, task: Task) -> Result<BoundTask, EngineError> {
        self.config.validate()?;
        self.graph
            .validate_templates(|t| self.matcher.templates().contains(t))?;

        let available = self.capabilities();
        if !available.contains(Capability::ScreenCapture) {
            return Err(EngineError::CapabilityUnavailable {
                action: "capture".to_string(),
                capability: Capability::ScreenCapture,
            });
        }

        let target = match &task.target {
            Some(name) => Some(
                self.graph
                    .node_id(name)
                    .ok_or_else(|| EngineError::UnknownNode(name.clone()))?,
            ),
            None => None,
        };

        if task.target.is_none() && task.steps.is_empty() {
            return Err(EngineError::InvalidTask {
                task: task.name.clone(),
                reason: "task has neither a target nor steps".to_string(),
            });
        }

        if task.step_timeout_ms == Some(0) {
            return Err(EngineError::InvalidTask {
                task: task.name.clone(),
                reason: "step_timeout_ms must be greater than 0".to_string(),
            });
        }

        for step in &task.steps {
            self.check_action(&step.action, available, &format!("task {}", task.name))?;
        }

        if let Some(target) = target {
            for action in &self.recovery {
                self.check_action(action, available, "recovery")?;
            }
            for edge_id in self.graph.edges_toward(target) {
                if let Some(edge) = self.graph.edge(edge_id) {
                    let context = format!(
                        "edge {} -> {}",
                        self.graph.name_of(edge.from),
                        self.graph.name_of(edge.to)
                    );
                    self.check_action(&edge.action, available, &context)?;
                }
            }
        }

        let max_retries = task
            .max_retries
            .unwrap_or(self.config.default_max_retries)
            .max(1);
        let step_timeout = Duration::from_millis(
            task.step_timeout_ms
                .unwrap_or(self.config.default_step_timeout_ms),
        );

        info!(
            task = %task.name,
            target_node = ?task.target,
            steps = task.steps.len(),
            max_retries,
            "task loaded"
        );

        Ok(BoundTask {
            task,
            target,
            max_retries,
            step_timeout,
        })
    }

    fn check_action(
        &self,
        action: &Action,
        available: CapabilitySet,
        context: &str,
    ) -> Result<(), EngineError> {
        let capability = action.required_capability();
        if !available.contains(capability) {
            return Err(EngineError::CapabilityUnavailable {
                action: format!("{} in {}", action, context),
                capability,
            });
        }
        if let Some(template) = action.template() {
            if !self.matcher.templates().contains(template) {
                return Err(EngineError::UnknownTemplate {
                    context: context.to_string(),
                    template: template.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run a bound task to completion, abort, or cancellation.
    ///
    /// Cancellation is checked before every state transition; an action
    /// already issued to the device is never interrupted.
    pub async fn run(&self, task: &BoundTask, cancel: &CancellationToken) -> Outcome {
        let mut run = Run::new(task, &self.config);
        info!(task = %task.name(), session = %run.session.id, "run started");

        let mut state = EngineState::Idle;
        let reason = loop {
            if cancel.is_cancelled() {
                break Some(AbortReason::Cancelled);
            }
            if let Some(limit) = self.config.max_task_duration() {
                let elapsed = run.session.started_at.elapsed();
                if elapsed >= limit {
                    break Some(AbortReason::DeadlineExceeded {
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
            }

            let step = match state {
                EngineState::Idle => Step::Next(if task.target.is_some() {
                    EngineState::Capturing
                } else {
                    EngineState::Completed
                }),
                EngineState::Capturing => self.capture(task, &mut run, cancel).await,
                EngineState::Resolving => self.resolve_node(task, &mut run, cancel).await,
                EngineState::Planning => self.plan(task, &mut run),
                EngineState::Acting => self.act(task, &mut run, cancel).await,
                EngineState::Stabilizing => self.stabilize(&mut run, cancel).await,
                EngineState::Completed => match self.run_steps(task, &mut run, cancel).await {
                    Ok(()) => Step::Done,
                    Err(reason) => Step::Abort(reason),
                },
                EngineState::Aborted => Step::Done,
            };

            match step {
                Step::Next(next) => {
                    self.transition(&run, state, next);
                    state = next;
                }
                Step::Abort(reason) => break Some(reason),
                Step::Done => break None,
            }
        };

        self.finish(task, run, state, reason)
    }

    fn finish(
        &self,
        task: &BoundTask,
        run: Run,
        state: EngineState,
        reason: Option<AbortReason>,
    ) -> Outcome {
        let session = run.session.id.to_string();
        match reason {
            None => {
                let report = run.report.with_success().finish();
                info!(
                    task = %task.name(),
                    session = %session,
                    actions = report.actions_executed,
                    latency_ms = report.latency_ms,
                    "run completed"
                );
                self.emit(EngineEvent::Finished {
                    session,
                    success: true,
                    reason: None,
                });
                Outcome::Success(report)
            }
            Some(reason) => {
                self.transition(&run, state, EngineState::Aborted);
                let report = run.report.with_error(reason.to_string()).finish();
                warn!(
                    task = %task.name(),
                    session = %session,
                    reason = %reason,
                    actions = report.actions_executed,
                    "run aborted"
                );
                self.emit(EngineEvent::Finished {
                    session,
                    success: false,
                    reason: Some(reason.kind().to_string()),
                });
                Outcome::Aborted { reason, report }
            }
        }
    }

    async fn capture(&self, task: &BoundTask, run: &mut Run, cancel: &CancellationToken) -> Step {
        run.report.capture_attempts += 1;

        let error = match timeout(task.step_timeout, self.controller.capture()).await {
            Ok(Ok(frame)) => {
                run.session.frame_captured();
                run.frame = Some(frame);
                return Step::Next(EngineState::Resolving);
            }
            Ok(Err(err)) if err.is_fatal() => {
                return Step::Abort(AbortReason::DeviceLost {
                    reason: err.to_string(),
                });
            }
            Ok(Err(err)) => err,
            Err(_) => ControllerError::Timeout(format!(
                "capture took longer than {}ms",
                task.step_timeout.as_millis()
            )),
        };

        run.session.consecutive_failures += 1;
        let attempt = run.session.consecutive_failures;
        warn!(session = %run.session.id, attempt, error = %error, "capture failed");

        if !run.policy.should_retry(attempt) {
            return Step::Abort(AbortReason::DeviceLost {
                reason: format!("capture failed {} times: {}", attempt, error),
            });
        }

        self.retry_occurred(run, RetryKind::Capture, attempt);
        sleep_or_cancel(run.policy.calculate_backoff(attempt), cancel).await;
        Step::Next(EngineState::Capturing)
    }

    async fn resolve_node(
        &self,
        task: &BoundTask,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Step {
        let Some(frame) = run.frame.take() else {
            return Step::Next(EngineState::Capturing);
        };
        let matches = self.match_frame(frame).await;
        let session = run.session.id.to_string();

        let unknown = match resolve(&self.graph, &matches, self.config.ambiguity_epsilon) {
            Resolution::Resolved { node, score } => {
                run.session.unresolved = 0;
                run.session.current = Some(node);
                let name = self.graph.name_of(node);
                run.report.visit(&name);
                info!(session = %session, node = %name, score, "node resolved");
                self.emit(EngineEvent::NodeResolved {
                    session,
                    node: name,
                    score,
                });

                if task.target == Some(node) {
                    return Step::Next(EngineState::Completed);
                }
                return self.check_progress(node, run, cancel).await;
            }
            Resolution::Unknown => {
                run.session.current = None;
                debug!(
                    session = %session,
                    failures = matches.failures.len(),
                    "no node matched"
                );
                self.emit(EngineEvent::Unknown {
                    session,
                    recognition_failures: matches.failures.len(),
                });
                true
            }
            Resolution::Ambiguous { candidates } => {
                let candidates: Vec<(String, f64)> = candidates
                    .into_iter()
                    .map(|(id, score)| (self.graph.name_of(id), score))
                    .collect();
                warn!(session = %session, candidates = ?candidates, "ambiguous match");
                self.emit(EngineEvent::Ambiguous {
                    session,
                    candidates,
                });
                false
            }
        };

        run.session.unresolved += 1;
        let attempt = run.session.unresolved;
        if !run.policy.should_retry(attempt) {
            return Step::Abort(AbortReason::UnresolvableState { attempts: attempt });
        }
        self.retry_occurred(run, RetryKind::Recognition, attempt);

        if unknown && !self.recovery.is_empty() {
            if let Err(reason) = self.recover(task, run, cancel).await {
                return Step::Abort(reason);
            }
            sleep_or_cancel(self.config.recovery_delay(), cancel).await;
        } else {
            sleep_or_cancel(run.policy.calculate_backoff(attempt), cancel).await;
        }
        Step::Next(EngineState::Capturing)
    }

    /// Bound edges that are acknowledged but leave the device where it was.
    ///
    /// Every acknowledged edge should land on its destination. Misses count
    /// against the retry bound for the whole run, so a device bouncing between
    /// screens cannot reset the count, and back off like any other retry.
    async fn check_progress(
        &self,
        node: NodeId,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Step {
        let Some(edge) = run.in_flight.take().and_then(|id| self.graph.edge(id)) else {
            return Step::Next(EngineState::Planning);
        };
        if edge.to == node {
            return Step::Next(EngineState::Planning);
        }

        run.session.stalled += 1;
        let attempt = run.session.stalled;
        let expected = self.graph.name_of(edge.to);
        let actual = self.graph.name_of(node);
        warn!(
            session = %run.session.id,
            action = %edge.action,
            expected = %expected,
            actual = %actual,
            attempt,
            "edge did not reach its destination"
        );

        if !run.policy.should_retry(attempt) {
            return Step::Abort(AbortReason::ActionFailed {
                action: edge.action.to_string(),
                reason: format!(
                    "device on {} instead of {} after {} attempts",
                    actual, expected, attempt
                ),
            });
        }
        self.retry_occurred(run, RetryKind::Stalled, attempt);
        sleep_or_cancel(run.policy.calculate_backoff(attempt), cancel).await;
        Step::Next(EngineState::Planning)
    }

    /// Run the recovery sequence; only a lost device or cancellation stops it
    async fn recover(
        &self,
        task: &BoundTask,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Result<(), AbortReason> {
        info!(session = %run.session.id, actions = self.recovery.len(), "running recovery");
        for action in &self.recovery {
            match self.execute(action, task, run, cancel).await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(device_lost(&err)),
                Err(ActionError::Interrupted(_)) => return Err(AbortReason::Cancelled),
                Err(err) => warn!(action = %action, error = %err, "recovery action failed"),
            }
        }
        self.emit(EngineEvent::RecoveryExecuted {
            session: run.session.id.to_string(),
            actions: self.recovery.len(),
        });
        Ok(())
    }

    fn plan(&self, task: &BoundTask, run: &mut Run) -> Step {
        let (Some(current), Some(target)) = (run.session.current, task.target) else {
            return Step::Next(EngineState::Capturing);
        };

        match self.graph.shortest_path(current, target) {
            Some(path) => match path.first() {
                Some(edge) => {
                    debug!(
                        session = %run.session.id,
                        hops = path.len(),
                        weight = path.total_weight,
                        "path planned"
                    );
                    run.pending_edge = Some(edge);
                    run.edge_attempts = 0;
                    Step::Next(EngineState::Acting)
                }
                None => Step::Next(EngineState::Completed),
            },
            None => Step::Abort(AbortReason::TargetUnreachable {
                from: self.graph.name_of(current),
                to: self.graph.name_of(target),
            }),
        }
    }

    async fn act(&self, task: &BoundTask, run: &mut Run, cancel: &CancellationToken) -> Step {
        let Some(edge) = run.pending_edge.and_then(|id| self.graph.edge(id)) else {
            return Step::Next(EngineState::Planning);
        };

        let started = Instant::now();
        match self.execute(&edge.action, task, run, cancel).await {
            Ok(()) => {
                let from = self.graph.name_of(edge.from);
                let to = self.graph.name_of(edge.to);
                info!(session = %run.session.id, from = %from, to = %to, action = %edge.action, "edge executed");
                self.emit(EngineEvent::EdgeExecuted {
                    session: run.session.id.to_string(),
                    from,
                    to,
                    action: edge.action.to_string(),
                    latency_ms: started.elapsed().as_millis() as u64,
                });
                run.settle = edge.delay;
                run.session.replans = 0;
                run.in_flight = run.pending_edge;
                Step::Next(EngineState::Stabilizing)
            }
            Err(err) if err.is_fatal() => Step::Abort(device_lost(&err)),
            Err(ActionError::Interrupted(_)) => Step::Abort(AbortReason::Cancelled),
            Err(err) if err.is_retryable() => {
                run.edge_attempts += 1;
                if run.edge_attempts <= self.config.edge_retry_budget {
                    self.retry_occurred(run, RetryKind::Action, run.edge_attempts);
                    sleep_or_cancel(run.policy.calculate_backoff(run.edge_attempts), cancel).await;
                    return Step::Next(EngineState::Acting);
                }

                // budget spent: look again and re-plan, the screen may have moved on
                run.session.replans += 1;
                let attempt = run.session.replans;
                if !run.policy.should_retry(attempt) {
                    return Step::Abort(action_failed(&edge.action, &err));
                }
                self.retry_occurred(run, RetryKind::Replan, attempt);
                run.pending_edge = None;
                sleep_or_cancel(run.policy.calculate_backoff(attempt), cancel).await;
                Step::Next(EngineState::Capturing)
            }
            Err(err) => Step::Abort(action_failed(&edge.action, &err)),
        }
    }

    async fn stabilize(&self, run: &mut Run, cancel: &CancellationToken) -> Step {
        let settle = run.settle.min(self.config.max_stabilize_delay());
        let since = run
            .session
            .last_activity_at
            .map(|at| at.elapsed())
            .unwrap_or_default();
        sleep_or_cancel(settle.saturating_sub(since), cancel).await;
        Step::Next(EngineState::Capturing)
    }

    /// Execute the trailing step sequence
    async fn run_steps(
        &self,
        task: &BoundTask,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Result<(), AbortReason> {
        for (index, step) in task.task.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(AbortReason::Cancelled);
            }
            sleep_or_cancel(step.delay(), cancel).await;

            let mut result = StepResult::new(index, &step.action);
            let outcome = self.run_step(step, task, run, cancel, &mut result).await;
            let success = outcome.is_ok();
            self.emit(EngineEvent::StepExecuted {
                session: run.session.id.to_string(),
                index,
                success,
            });

            match outcome {
                Ok(()) => {
                    run.report.steps.push(result.with_success().finish());
                }
                Err(err) => {
                    run.report.steps.push(result.with_error(err.to_string()).finish());
                    match err {
                        err if err.is_fatal() => return Err(device_lost(&err)),
                        ActionError::Interrupted(_) => return Err(AbortReason::Cancelled),
                        err if step.skip_if_failed => {
                            warn!(index, error = %err, "step failed, skipping");
                        }
                        err => return Err(action_failed(&step.action, &err)),
                    }
                }
            }
        }
        Ok(())
    }

    /// One step with its retries, then its repeats; repeats stop at the first failure
    async fn run_step(
        &self,
        step: &TaskStep,
        task: &BoundTask,
        run: &mut Run,
        cancel: &CancellationToken,
        result: &mut StepResult,
    ) -> Result<(), ActionError> {
        for _ in 0..=step.repeat {
            let mut attempt = 0;
            loop {
                attempt += 1;
                result.attempts += 1;
                match self.execute(&step.action, task, run, cancel).await {
                    Ok(()) => break,
                    Err(err)
                        if err.is_retryable() && attempt <= step.retry.unwrap_or(0) =>
                    {
                        self.retry_occurred(run, RetryKind::Step, attempt);
                        sleep_or_cancel(run.policy.calculate_backoff(attempt), cancel).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Issue one action and keep session bookkeeping
    async fn execute(
        &self,
        action: &Action,
        task: &BoundTask,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Result<(), ActionError> {
        let ctx = ExecCtx::new(task.step_timeout, cancel.clone());
        match execute_action(self.controller.as_ref(), &self.matcher, action, &ctx).await {
            Ok(report) => {
                if let Some((x, y)) = report.tapped_at {
                    debug!(action = %action, x, y, "template located and tapped");
                }
                run.report.actions_executed += 1;
                run.session.touch();
                Ok(())
            }
            Err(err) => {
                if !matches!(err, ActionError::Interrupted(_)) {
                    run.report.actions_failed += 1;
                }
                Err(err)
            }
        }
    }

    async fn match_frame(&self, frame: Frame) -> MatchReport {
        let matcher = self.matcher.clone();
        let names = Arc::clone(&self.node_templates);
        let matched = tokio::task::spawn_blocking(move || {
            matcher.match_templates(&frame, names.iter().map(String::as_str))
        })
        .await;

        match matched {
            Ok(report) => {
                for failure in &report.failures {
                    warn!(template = %failure.template, error = %failure.error, "recognition error");
                }
                report
            }
            Err(err) => {
                warn!(error = %err, "matching task failed");
                MatchReport::default()
            }
        }
    }

    fn transition(&self, run: &Run, from: EngineState, to: EngineState) {
        debug!(session = %run.session.id, %from, %to, "state transition");
        self.emit(EngineEvent::StateChanged {
            session: run.session.id.to_string(),
            from,
            to,
        });
    }

    fn retry_occurred(&self, run: &mut Run, kind: RetryKind, attempt: u32) {
        run.report.retries += 1;
        debug!(session = %run.session.id, ?kind, attempt, "retrying");
        self.emit(EngineEvent::RetryOccurred {
            session: run.session.id.to_string(),
            kind,
            attempt,
        });
    }

    /// Publish without waiting; a missing or slow sink never stalls the run
    fn emit(&self, event: EngineEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.publish(event);
        }
    }
}

/// Mutable state of one `run` call
struct Run {
    session: SessionState,
    report: RunReport,
    policy: RetryPolicy,
    frame: Option<Frame>,
    pending_edge: Option<EdgeId>,
    /// Acknowledged edge whose destination the next resolution must confirm
    in_flight: Option<EdgeId>,
    edge_attempts: u32,
    settle: Duration,
}

impl Run {
    fn new(task: &BoundTask, config: &EngineConfig) -> Self {
        let session = SessionState::new();
        let report = RunReport::new(task.name().to_string(), session.id.to_string());
        Self {
            session,
            report,
            policy: RetryPolicy::new(task.max_retries, config.backoff),
            frame: None,
            pending_edge: None,
            in_flight: None,
            edge_attempts: 0,
            settle: Duration::ZERO,
        }
    }
}

fn device_lost(err: &ActionError) -> AbortReason {
    AbortReason::DeviceLost {
        reason: err.to_string(),
    }
}

fn action_failed(action: &Action, err: &ActionError) -> AbortReason {
    AbortReason::ActionFailed {
        action: action.to_string(),
        reason: err.to_string(),
    }
}

/// Sleep that ends early on cancellation; the caller's next transition check sees it
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) {
    if duration.is_zero() {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = cancel.cancelled() => {}
    }
}
