//! Step-graph interpreter
//!
//! Walks a `WorkflowGraph` step by step, dispatching each step's tagged
//! variant, applying the retry wrapper, the on-error policy, loop-bound
//! tracking, and `workflow_call` recursion (spec.md §4.2).

use crate::condition;
use crate::context::Context;
use crate::error::{ArgoError, Result};
use crate::graph::{self, ErrorAction, ErrorPolicy, NextStep, Step, StepId, StepKind, WorkflowGraph};
use crate::io_channel::{InputQueue, OutputSink};
use crate::persona::PersonaRegistry;
use crate::provider::{AiMessage, AiProvider, AiRequest};
use crate::retry::with_retry;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// `workflow_call` recursion depth ceiling.
pub const MAX_RECURSION_DEPTH: u32 = 10;
/// Global step-count safety bound across an entire run, including all
/// nested `workflow_call` invocations.
pub const MAX_STEPS_TOTAL: u64 = 10_000;
/// Default backward-edge bound when a step doesn't set its own.
const DEFAULT_MAX_ITERATIONS: u32 = 1000;
/// `save_file`'s `data` bound, serialized-JSON byte length (spec.md §4.2).
const MAX_SAVE_FILE_BYTES: usize = 1_048_576;

/// Resolves a workflow template by name, for `workflow_call`.
pub trait GraphLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<WorkflowGraph>;
}

/// External capabilities a running interpreter dispatches into.
pub struct StepEnv<'a> {
    pub input: &'a InputQueue,
    pub output: &'a OutputSink,
    pub provider: &'a dyn AiProvider,
    pub loader: &'a dyn GraphLoader,
    pub personas: &'a PersonaRegistry,
}

/// Mutable bookkeeping shared across a run and all of its nested
/// `workflow_call` invocations.
#[derive(Debug, Default)]
struct RunState {
    steps_executed: u64,
}

/// Outcome of a full interpreter run.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Completed,
    Failed(ArgoError),
}

/// Per-invocation interpreter state: current graph, context, current step
/// id, and backward-edge iteration counts. One `InterpreterState` exists
/// per `workflow_call` depth level.
pub struct InterpreterState {
    pub graph: WorkflowGraph,
    pub context: Context,
    pub current: StepId,
    iteration_counts: HashMap<StepId, u32>,
    pub depth: u32,
}

impl InterpreterState {
    pub fn new(graph: WorkflowGraph, depth: u32) -> Self {
        let context = Context::from_map(graph.initial_context.clone());
        let current = graph.first_step_id().unwrap_or_default();
        Self {
            graph,
            context,
            current,
            iteration_counts: HashMap::new(),
            depth,
        }
    }

    /// Record a jump from `from` to `to`, returning an error if `to` is a
    /// backward edge whose bound is exceeded. Counts persist for the whole
    /// run and are not reset by intervening forward edges, so a step that
    /// jumps back to the same target N+1 times always trips at N (spec.md
    /// §8 S3).
    fn track_jump(&mut self, from: StepId, to: StepId) -> Result<()> {
        if to <= from {
            let max = self
                .graph
                .find_step(to)
                .and_then(|s| s.max_iterations)
                .unwrap_or(DEFAULT_MAX_ITERATIONS);
            let count = self.iteration_counts.entry(to).or_insert(0);
            *count += 1;
            if *count > max {
                return Err(ArgoError::MaxIterations);
            }
        }
        Ok(())
    }
}

/// Run the interpreter to completion, starting from `graph`'s first step.
pub async fn execute_all(
    graph: WorkflowGraph,
    env: &StepEnv<'_>,
) -> Result<(ExecutionOutcome, Context)> {
    let mut state = InterpreterState::new(graph, 0);
    let mut run_state = RunState::default();
    let outcome = run(&mut state, &mut run_state, env).await;
    let outcome = match outcome {
        Ok(()) => ExecutionOutcome::Completed,
        Err(e) => ExecutionOutcome::Failed(e),
    };
    Ok((outcome, state.context))
}

async fn run(state: &mut InterpreterState, run_state: &mut RunState, env: &StepEnv<'_>) -> Result<()> {
    loop {
        if state.graph.find_step(state.current).is_none() {
            return Err(ArgoError::ProtocolFormat(format!(
                "step {} not found in workflow {:?}",
                state.current, state.graph.workflow_name
            )));
        }

        run_state.steps_executed += 1;
        if run_state.steps_executed > MAX_STEPS_TOTAL {
            return Err(ArgoError::MaxSteps);
        }

        let step_id = state.current;
        let next = execute_step_with_policy(state, run_state, env, step_id).await?;

        match next {
            NextStep::Exit => {
                info!(workflow = %state.graph.workflow_name, step = step_id, "reached EXIT");
                return Ok(());
            }
            NextStep::Index(target) => {
                state.track_jump(step_id, target)?;
                state.current = target;
            }
        }
    }
}

/// Apply the step's retry policy, then its on-error policy if every retry
/// attempt failed.
async fn execute_step_with_policy(
    state: &mut InterpreterState,
    run_state: &mut RunState,
    env: &StepEnv<'_>,
    step_id: StepId,
) -> Result<NextStep> {
    let step = state
        .graph
        .find_step(step_id)
        .expect("existence checked by caller")
        .clone();

    let retry_policy = step.retry.clone();
    let step_label = step.id.to_string();
    let depth = state.depth;
    let graph = &state.graph;
    let context = &mut state.context;

    let result = with_retry(&retry_policy, &step_label, || {
        dispatch_step(&step, graph, &mut *context, depth, &mut *run_state, env)
    })
    .await;

    match result {
        Ok(Some(next)) => Ok(next),
        Ok(None) => Ok(step.next_step.clone()),
        Err(e) => apply_error_policy(&step, e),
    }
}

fn apply_error_policy(step: &Step, err: ArgoError) -> Result<NextStep> {
    match &step.on_error {
        ErrorPolicy::Goto(target) => {
            warn!(step = step.id, error = %err, "step failed, jumping to error target");
            graph::parse_step_ref(target)
        }
        ErrorPolicy::Structured { action, target } => match action {
            ErrorAction::Skip => {
                warn!(step = step.id, error = %err, "step failed, skipping");
                Ok(step.next_step.clone())
            }
            ErrorAction::Goto => {
                let target = target.as_deref().ok_or_else(|| {
                    ArgoError::ProtocolFormat(format!("step {} on_error goto has no target", step.id))
                })?;
                warn!(step = step.id, error = %err, "step failed, jumping to error target");
                graph::parse_step_ref(target)
            }
            ErrorAction::Fail => Err(err),
        },
    }
}

async fn dispatch_step(
    step: &Step,
    graph: &WorkflowGraph,
    context: &mut Context,
    depth: u32,
    run_state: &mut RunState,
    env: &StepEnv<'_>,
) -> Result<Option<NextStep>> {
    debug!(step = step.id, kind = ?step.kind, "dispatching step");
    match &step.kind {
        StepKind::Display { message } => {
            env.output.write_line(&context.substitute(message)).await?;
            Ok(None)
        }
        StepKind::SaveFile { destination, data } => {
            if context.get("timestamp").is_none() {
                context.set("timestamp", chrono::Utc::now().timestamp().to_string());
            }
            let destination = context.substitute(destination);
            let substituted = context.substitute_json(data);
            let rendered = serde_json::to_string(&substituted)?;
            if rendered.len() > MAX_SAVE_FILE_BYTES {
                return Err(ArgoError::InputTooLarge(format!(
                    "save_file data is {} bytes, exceeding the {} byte bound",
                    rendered.len(),
                    MAX_SAVE_FILE_BYTES
                )));
            }
            if let Some(parent) = std::path::Path::new(&destination).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(&destination, format!("{}\n", rendered)).await?;
            Ok(None)
        }
        StepKind::UserAsk { prompt, save_to } => {
            env.output.write_line(&context.substitute(prompt)).await?;
            let answer = env.input.read_blocking().await?;
            context.set(save_to.clone(), answer);
            Ok(None)
        }
        StepKind::UserChoose { prompt, options } => {
            let menu: Vec<String> = options
                .iter()
                .enumerate()
                .map(|(i, o)| format!("{}) {}", i + 1, o.label))
                .collect();
            let full_prompt = format!("{}\n{}", context.substitute(prompt), menu.join("\n"));
            env.output.write_line(&full_prompt).await?;
            let answer = env.input.read_blocking().await?;
            let chosen = answer
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 1 && *n <= options.len())
                .map(|n| &options[n - 1])
                .ok_or_else(|| {
                    ArgoError::InputInvalid(format!(
                        "{:?} is not a valid choice 1..{}",
                        answer,
                        options.len()
                    ))
                })?;
            Ok(Some(chosen.next_step.clone()))
        }
        StepKind::Decide {
            condition,
            if_true,
            if_false,
        } => {
            if condition::evaluate(condition, context)? {
                Ok(Some(if_true.clone()))
            } else {
                Ok(Some(if_false.clone()))
            }
        }
        StepKind::CiAsk {
            persona,
            prompt_template,
            save_to,
        } => {
            let prompt = context.substitute(prompt_template);
            let presented = env.personas.rewrap(persona.as_deref(), &prompt);
            env.output.write_line(&presented).await?;
            let answer = env.input.read_blocking().await?;
            context.set(save_to.clone(), answer);
            Ok(None)
        }
        StepKind::CiAnalyze { persona, task, save_to } => {
            let dump: String = context
                .as_map()
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("\n");
            let task = context.substitute(task);
            let full_prompt = format!("{}\n\ncontext:\n{}", task, dump);
            let presented = env.personas.rewrap(persona.as_deref(), &full_prompt);
            let response = ask_provider(env.provider, &presented).await?;
            context.set(save_to.clone(), response.content);
            Ok(None)
        }
        StepKind::CiAskSeries {
            persona,
            intro,
            questions,
            save_to,
        } => {
            if let Some(intro) = intro {
                env.output.write_line(&context.substitute(intro)).await?;
            }
            for question in questions {
                let presented = env
                    .personas
                    .rewrap(persona.as_deref(), &context.substitute(&question.question));
                env.output.write_line(&presented).await?;
                let answer = env.input.read_blocking().await?;
                context.set(format!("{}.{}", save_to, question.id), answer);
            }
            Ok(None)
        }
        StepKind::CiPresent { persona, data, format } => {
            let rendered = context.substitute(data);
            let presented = env.personas.rewrap(persona.as_deref(), &rendered);
            let line = match format {
                Some(fmt) => format!("[{}] {}", fmt, presented),
                None => presented,
            };
            env.output.write_line(&line).await?;
            Ok(None)
        }
        StepKind::WorkflowCall {
            workflow,
            input,
            save_to,
        } => {
            if depth + 1 > MAX_RECURSION_DEPTH {
                return Err(ArgoError::MaxRecursion);
            }
            let child_graph = env.loader.load(workflow)?;
            let mut child_state = InterpreterState::new(child_graph, depth + 1);
            for (k, v) in input {
                child_state.context.set(k.clone(), context.substitute(v));
            }
            // `run` calls back into `dispatch_step` for `workflow_call`,
            // forming a cycle through several async fns; box this edge so
            // the compiler isn't asked to compute an infinitely-sized
            // future type.
            let child_fut: std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> =
                Box::pin(run(&mut child_state, run_state, env));
            child_fut.await?;
            context.set(save_to.clone(), r#"{"status":"success"}"#.to_string());
            Ok(None)
        }
        StepKind::Parallel { parallel_steps } => {
            // Non-goal: no real concurrency (spec.md §4.2). Validate every
            // referenced id resolves, log, and return without dispatching
            // any of them.
            for id in parallel_steps {
                if graph.find_step(*id).is_none() {
                    return Err(ArgoError::ProtocolFormat(format!(
                        "parallel step {} references unknown step {}",
                        step.id, id
                    )));
                }
            }
            info!(step = step.id, branches = parallel_steps.len(), "parallel step validated, not executed");
            Ok(None)
        }
    }
}

async fn ask_provider(provider: &dyn AiProvider, prompt: &str) -> Result<crate::provider::AiResponse> {
    provider
        .complete(AiRequest {
            system_prompt: None,
            messages: vec![AiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        })
        .await
}
