//! Orchestrator: executes a model tree in one interpreter session.
//!
//! A composite runs as a fixed sequence of stages: setup, recurse into the
//! left child, propagate resources, bind join values, recurse into the right
//! child, aggregate. The right child never starts before the left child's
//! scripts have returned. Cancellation is checked before every stage; a
//! script already handed to the interpreter is not interrupted.

use crate::config::RunnerConfig;
use crate::error::{ExecutionError, ExecutionFailure, RunReport, RunWarning, Stage};
use crate::interpreter::{Interpreter, InterpreterError, ScriptOutput};
use crate::monitor::{Metrics, RunMonitor, StageEvent};
use crate::propagate::{ResourcePropagator, ResourceSnapshot};
use crate::session::{InterpreterFactory, InterpreterSession};
use crate::workdir::{resolve_layout, temp_dir, Layout};
use indexmap::IndexMap;
use modeljoin_core::{
    parameter, CombinedModel, LeafModel, Model, ParameterClassification, ParameterId, RunId,
    Simulation,
};
use modeljoin_plan::Validator;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};

/// Parameter values by id
pub type Values = IndexMap<ParameterId, String>;

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Run identifier
    pub run_id: RunId,
    /// The executed model with the root's parameter values filled in
    pub model: Model,
    /// Final values of the root's exposed parameters
    pub values: Values,
    /// Captured output and warnings
    pub report: RunReport,
    /// Last plot produced
    pub plot: Option<PathBuf>,
    /// Workspace of the last leaf executed
    pub workspace: Option<PathBuf>,
    /// Run metrics
    pub metrics: Metrics,
    /// Stage sequence of every composite
    pub stages: Vec<StageEvent>,
}

struct NodeResult {
    values: Values,
    plot: Option<PathBuf>,
    workspace: Option<PathBuf>,
}

/// Executes model trees
pub struct Orchestrator<F> {
    factory: F,
    config: RunnerConfig,
    cancel: CancellationToken,
    validator: Validator,
}

impl<F: InterpreterFactory> Orchestrator<F> {
    /// Create an orchestrator opening sessions from `factory`
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            config: RunnerConfig::default(),
            cancel: CancellationToken::new(),
            validator: Validator::new(),
        }
    }

    /// Set the runner configuration
    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Observe a host cancellation signal
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancellation token checked between stages
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Execute `model` with its simulation number `simulation`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error together with the output and warnings
    /// captured before it
    pub fn execute(
        &self,
        model: &Model,
        simulation: usize,
    ) -> Result<ExecutionOutcome, ExecutionFailure> {
        let run_id = RunId::new();
        let span = info_span!("run", %run_id, model = model.name());
        let _enter = span.enter();
        info!(simulation, leaves = model.leaves().len(), "Starting run");

        let mut run = Run {
            config: &self.config,
            cancel: &self.cancel,
            report: RunReport::default(),
            monitor: RunMonitor::new(),
            output_dir: PathBuf::new(),
            artifacts: 0,
        };

        match run.execute_root(&self.factory, &self.validator, model, simulation) {
            Ok(result) => {
                let mut finished = model.clone();
                for p in finished.parameters_mut() {
                    if let Some(value) = result.values.get(&p.id) {
                        p.value = Some(value.clone());
                    }
                }
                info!(
                    warnings = run.report.warnings.len(),
                    elapsed_ms = run.monitor.uptime_ms(),
                    "Run finished"
                );
                let (metrics, stages) = run.monitor.finish();
                Ok(ExecutionOutcome {
                    run_id,
                    model: finished,
                    values: result.values,
                    report: run.report,
                    plot: result.plot,
                    workspace: result.workspace,
                    metrics,
                    stages,
                })
            }
            Err(error) => {
                warn!(%error, "Run failed");
                Err(ExecutionFailure {
                    error,
                    report: run.report,
                })
            }
        }
    }
}

/// State of one top-level execution
struct Run<'a> {
    config: &'a RunnerConfig,
    cancel: &'a CancellationToken,
    report: RunReport,
    monitor: RunMonitor,
    output_dir: PathBuf,
    artifacts: usize,
}

impl Run<'_> {
    fn execute_root(
        &mut self,
        factory: &dyn InterpreterFactory,
        validator: &Validator,
        model: &Model,
        simulation: usize,
    ) -> Result<NodeResult, ExecutionError> {
        validator.validate(model).map_err(ExecutionError::Invalid)?;
        self.check(Stage::Setup)?;

        let assignments = select_simulation(model, simulation)?;
        let layout = resolve_layout(model, None)?;
        self.output_dir = match &self.config.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| ExecutionError::WorkingDirectory {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                })?;
                dir.clone()
            }
            None => temp_dir()?,
        };
        debug!(output = %self.output_dir.display(), "Output directory");

        let mut session = InterpreterSession::open(factory, model.language())?;
        let result = self.run_node(session.interpreter(), model, &layout, assignments)?;
        if let Err(e) = session.close() {
            warn!(error = %e, "Interpreter did not close cleanly");
        }
        Ok(result)
    }

    fn check(&self, stage: Stage) -> Result<Instant, ExecutionError> {
        if self.cancel.is_cancelled() {
            info!(%stage, "Cancelled");
            return Err(ExecutionError::Cancelled { stage });
        }
        Ok(Instant::now())
    }

    fn warn(&mut self, warning: RunWarning) {
        warn!(%warning, "Recoverable problem");
        self.monitor.metrics_mut().warnings += 1;
        self.report.warnings.push(warning);
    }

    fn absorb(&mut self, output: &ScriptOutput) {
        self.monitor.metrics_mut().scripts_executed += 1;
        self.report.stdout.extend(output.stdout.iter().cloned());
        self.report.stderr.extend(output.stderr.iter().cloned());
    }

    /// Execute a script whose failure is fatal
    fn run_script(
        &mut self,
        interpreter: &mut dyn Interpreter,
        model: &str,
        script: &str,
    ) -> Result<ScriptOutput, ExecutionError> {
        let output = interpreter.execute(script)?;
        self.fatal_check(model, &output)?;
        Ok(output)
    }

    fn fatal_check(&mut self, model: &str, output: &ScriptOutput) -> Result<(), ExecutionError> {
        self.absorb(output);
        match output.fatal_line() {
            Some(line) => Err(ExecutionError::Script {
                model: model.to_string(),
                message: line.to_string(),
                stderr: output.stderr.clone(),
            }),
            None => Ok(()),
        }
    }

    fn artifact_path(&mut self, model: &str, extension: &str) -> PathBuf {
        self.artifacts += 1;
        let mut stem: String = model
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if stem.is_empty() {
            stem.push_str("model");
        }
        self.output_dir
            .join(format!("{:02}-{}.{}", self.artifacts, stem, extension))
    }

    fn run_node(
        &mut self,
        interpreter: &mut dyn Interpreter,
        model: &Model,
        layout: &Layout,
        assignments: Values,
    ) -> Result<NodeResult, ExecutionError> {
        match (model, layout) {
            (Model::Leaf(leaf), _) => self.run_leaf(interpreter, leaf, layout.dir(), &assignments),
            (Model::Combined(combined), Layout::Combined { left, right, .. }) => {
                self.run_combined(interpreter, combined, left, right, assignments)
            }
            (Model::Combined(combined), Layout::Leaf { dir }) => {
                Err(ExecutionError::WorkingDirectory {
                    path: dir.display().to_string(),
                    reason: format!("no directory layout for the children of '{}'", combined.name),
                })
            }
        }
    }

    fn run_combined(
        &mut self,
        interpreter: &mut dyn Interpreter,
        combined: &CombinedModel,
        left_layout: &Layout,
        right_layout: &Layout,
        assignments: Values,
    ) -> Result<NodeResult, ExecutionError> {
        let name = combined.name.as_str();
        let span = info_span!("composite", model = name);
        let _enter = span.enter();

        let started = self.check(Stage::Setup)?;
        let (left_routed, mut right_routed) = route(combined, assignments);
        let left_assignments = child_assignments(&combined.left, left_routed)?;
        self.monitor.record_stage(name, Stage::Setup, started);

        let started = self.check(Stage::RecurseLeft)?;
        let before = ResourceSnapshot::capture(left_layout.exit_dir());
        let left = self.run_node(interpreter, &combined.left, left_layout, left_assignments)?;
        self.monitor.record_stage(name, Stage::RecurseLeft, started);

        let started = self.check(Stage::Propagate)?;
        let dialect = interpreter.dialect();
        for (original, renamed) in &combined.id_mapping {
            let script = dialect.alias(original.as_str(), renamed.as_str());
            self.run_script(interpreter, name, &script)?;
        }
        let propagation =
            ResourcePropagator::propagate(&before, left_layout.exit_dir(), right_layout.entry_dir());
        self.monitor.metrics_mut().files_copied += propagation.copied.len() as u64;
        for warning in propagation.warnings {
            self.warn(warning);
        }
        self.monitor.record_stage(name, Stage::Propagate, started);

        let started = self.check(Stage::Bind)?;
        for binding in &combined.bindings {
            let has_value = left_id(combined, &binding.source)
                .is_some_and(|id| left.values.contains_key(id));
            if !has_value {
                self.warn(RunWarning::UnboundTarget {
                    model: name.to_string(),
                    from: binding.source.clone(),
                    target: binding.target.clone(),
                });
                continue;
            }
            let value = interpreter
                .inspect(&binding.command)
                .map_err(|e| match e {
                    InterpreterError::Evaluation { message, .. } => ExecutionError::Script {
                        model: name.to_string(),
                        message: message.clone(),
                        stderr: vec![message],
                    },
                    other => other.into(),
                })?;
            let value = if binding.is_file() {
                dialect.file_value(left_layout.exit_dir(), &value)
            } else {
                value
            };
            debug!(target = %binding.target, %value, "Bound join value");
            right_routed.insert(binding.target.clone(), value);
            self.monitor.metrics_mut().bindings_applied += 1;
        }
        self.monitor.record_stage(name, Stage::Bind, started);

        let started = self.check(Stage::RecurseRight)?;
        let right_assignments = child_assignments(&combined.right, right_routed)?;
        let right = self.run_node(interpreter, &combined.right, right_layout, right_assignments)?;
        self.monitor.record_stage(name, Stage::RecurseRight, started);

        let started = self.check(Stage::Aggregate)?;
        let mut values = Values::new();
        for p in &combined.merged_parameters {
            let value = match left_id(combined, &p.id) {
                Some(id) => left.values.get(id),
                None => right.values.get(&p.id),
            };
            if let Some(value) = value {
                values.insert(p.id.clone(), value.clone());
            }
        }
        self.monitor.record_stage(name, Stage::Aggregate, started);

        Ok(NodeResult {
            values,
            plot: right.plot.or(left.plot),
            workspace: right.workspace.or(left.workspace),
        })
    }

    fn run_leaf(
        &mut self,
        interpreter: &mut dyn Interpreter,
        leaf: &LeafModel,
        dir: &Path,
        assignments: &Values,
    ) -> Result<NodeResult, ExecutionError> {
        let name = leaf.name.as_str();
        let span = info_span!("leaf", model = name);
        let _enter = span.enter();
        self.monitor.metrics_mut().leaves_executed += 1;

        let output = interpreter.set_working_directory(dir)?;
        self.fatal_check(name, &output)?;

        if self.config.install_packages && !leaf.packages.is_empty() {
            let packages: Vec<String> = leaf.packages.iter().cloned().collect();
            let output = interpreter.install_packages(&packages)?;
            self.absorb(&output);
            if let Some(line) = output.fatal_line() {
                self.warn(RunWarning::PackageInstall {
                    model: name.to_string(),
                    message: line.to_string(),
                });
            }
        }

        if let Some(missing) = leaf
            .parameters
            .iter()
            .find(|p| p.classification.requires_value() && !assignments.contains_key(&p.id))
        {
            return Err(ExecutionError::MissingParameterValue {
                model: name.to_string(),
                param: missing.id.clone(),
            });
        }

        let dialect = interpreter.dialect();
        let mut values = Values::new();
        for p in &leaf.parameters {
            if let Some(value) = assignments.get(&p.id) {
                values.insert(p.id.clone(), value.clone());
            }
        }
        let parameter_script =
            dialect.parameter_script(values.iter().map(|(id, v)| (id.as_str(), v.as_str())));
        if !parameter_script.is_empty() {
            self.run_script(interpreter, name, &parameter_script)?;
        }
        self.run_script(interpreter, name, &leaf.script)?;
        info!(parameters = values.len(), "Model script finished");

        for p in leaf
            .parameters
            .iter()
            .filter(|p| p.classification == ParameterClassification::Output)
        {
            match interpreter.inspect(p.id.as_str()) {
                Ok(value) if !value.is_empty() => {
                    values.insert(p.id.clone(), value);
                }
                Ok(_) | Err(InterpreterError::Evaluation { .. }) => {
                    self.warn(RunWarning::OutputUnavailable {
                        model: name.to_string(),
                        param: p.id.clone(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut plot = None;
        if self.config.plot.enabled && !leaf.viz_script.trim().is_empty() {
            let path = self.artifact_path(name, "png");
            let output = interpreter.plot(&leaf.viz_script, &path, &self.config.plot)?;
            self.absorb(&output);
            match output.fatal_line() {
                Some(line) => self.warn(RunWarning::Visualization {
                    model: name.to_string(),
                    message: line.to_string(),
                }),
                None => plot = Some(path),
            }
        }

        let path = self.artifact_path(name, dialect.workspace_extension());
        let output = interpreter.save_workspace(&path)?;
        self.absorb(&output);
        let workspace = match output.fatal_line() {
            Some(line) => {
                self.warn(RunWarning::WorkspaceSave {
                    model: name.to_string(),
                    message: line.to_string(),
                });
                None
            }
            None => Some(path),
        };

        Ok(NodeResult {
            values,
            plot,
            workspace,
        })
    }
}

/// Assignments of simulation `index` of `model`. A model without simulations
/// runs its synthesized default as simulation 0.
fn select_simulation(model: &Model, index: usize) -> Result<Values, ExecutionError> {
    let simulations = model.simulations();
    if simulations.is_empty() && index == 0 {
        return Ok(Simulation::synthesize_default(model.parameters()).parameters);
    }
    simulations
        .get(index)
        .map(|s| s.parameters.clone())
        .ok_or_else(|| ExecutionError::SimulationNotFound {
            model: model.name().to_string(),
            index,
            count: simulations.len(),
        })
}

/// The child's own selected simulation, overridden by values from its parent
fn child_assignments(child: &Model, routed: Values) -> Result<Values, ExecutionError> {
    let mut assignments = select_simulation(child, child.selected_simulation())?;
    assignments.extend(routed);
    Ok(assignments)
}

/// The left child's id for an id exposed by `combined`, if it belongs to the left
fn left_id<'a>(combined: &'a CombinedModel, exposed: &ParameterId) -> Option<&'a ParameterId> {
    if let Some((original, _)) = combined.id_mapping.iter().find(|(_, r)| *r == exposed) {
        return Some(original);
    }
    if combined.id_mapping.contains_key(exposed) {
        return None;
    }
    parameter::find(combined.left.parameters(), exposed.as_str()).map(|p| &p.id)
}

/// Split a composite's assignments into left and right child assignments
fn route(combined: &CombinedModel, assignments: Values) -> (Values, Values) {
    let mut left = Values::new();
    let mut right = Values::new();
    for (id, value) in assignments {
        if let Some(original) = left_id(combined, &id) {
            left.insert(original.clone(), value);
        } else if parameter::find(combined.right.parameters(), id.as_str()).is_some() {
            right.insert(id, value);
        } else {
            debug!(param = %id, "Assignment matches no child parameter");
        }
    }
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotSettings;
    use crate::testing::{Reaction, ScriptedFactory, ScriptedInterpreter};
    use modeljoin_core::{DataType, JoinRelation, Language, Parameter};
    use modeljoin_plan::Composer;

    fn producer() -> Model {
        LeafModel::new("producer", "run_producer()")
            .with_parameter(Parameter::input("x", DataType::Double).with_value("3"))
            .with_parameter(Parameter::output("total", DataType::Double))
            .with_viz("plot_producer()")
            .into()
    }

    fn consumer() -> Model {
        LeafModel::new("consumer", "run_consumer()")
            .with_parameter(Parameter::output("x", DataType::Double))
            .with_parameter(Parameter::input("y", DataType::Double).with_value("0"))
            .with_viz("plot_consumer()")
            .into()
    }

    fn joined() -> Model {
        Composer::new()
            .compose(
                "joined",
                producer(),
                consumer(),
                &[JoinRelation::new("x_dup", "y", "x_dup*2")],
            )
            .unwrap()
            .model
            .into()
    }

    fn scripted() -> ScriptedInterpreter {
        ScriptedInterpreter::new(Language::R)
            .value("total", "6")
            .value("x_dup*2", "6")
            .value("x", "7")
    }

    fn orchestrator(interpreter: ScriptedInterpreter, output: &Path) -> Orchestrator<ScriptedFactory> {
        Orchestrator::new(ScriptedFactory::new(interpreter))
            .with_config(RunnerConfig::new().with_output_dir(output))
    }

    #[test]
    fn test_join_runs_left_then_right() {
        let out = tempfile::tempdir().unwrap();
        let interpreter = scripted();
        let journal = interpreter.journal();
        let outcome = orchestrator(interpreter, out.path())
            .execute(&joined(), 0)
            .unwrap();

        let journal = journal.borrow();
        let left_params = journal.position("x <- 3").unwrap();
        let left_model = journal.position("run_producer()").unwrap();
        let alias = journal.position("x_dup <- x; rm(x)").unwrap();
        let right_params = journal.position("y <- 6").unwrap();
        let right_model = journal.position("run_consumer()").unwrap();
        assert!(left_params < left_model);
        assert!(left_model < alias);
        assert!(alias < right_params);
        assert!(right_params < right_model);
        assert!(journal.calls[left_model].at <= journal.calls[right_model].at);
        assert_eq!(journal.closes, 1);

        assert_eq!(outcome.values.get("x_dup").map(String::as_str), Some("3"));
        assert_eq!(outcome.values.get("total").map(String::as_str), Some("6"));
        assert_eq!(outcome.values.get("x").map(String::as_str), Some("7"));
        assert!(outcome.values.get("y").is_none());
        assert_eq!(
            parameter::find(outcome.model.parameters(), "total").and_then(|p| p.value.as_deref()),
            Some("6")
        );
        assert!(outcome.report.warnings.is_empty());
        assert_eq!(outcome.metrics.leaves_executed, 2);
        assert_eq!(outcome.metrics.bindings_applied, 1);
    }

    #[test]
    fn test_relation_on_original_id_binds_after_alias() {
        let out = tempfile::tempdir().unwrap();
        let model: Model = Composer::new()
            .compose(
                "joined",
                producer(),
                consumer(),
                &[JoinRelation::direct("x", "y")],
            )
            .unwrap()
            .model
            .into();

        let interpreter = scripted().value("x_dup", "3");
        let journal = interpreter.journal();
        let outcome = orchestrator(interpreter, out.path())
            .execute(&model, 0)
            .unwrap();

        let journal = journal.borrow();
        let alias = journal.position("x_dup <- x; rm(x)").unwrap();
        let bound = journal.position("inspect:x_dup").unwrap();
        assert!(alias < bound);
        let right_model = journal.position("run_consumer()").unwrap();
        assert!(journal.calls[..right_model]
            .iter()
            .all(|c| c.script != "inspect:x"));
        assert!(journal.contains("y <- 3"));
        assert_eq!(outcome.metrics.bindings_applied, 1);
        assert!(outcome.report.warnings.is_empty());
    }

    #[test]
    fn test_stage_sequence() {
        let out = tempfile::tempdir().unwrap();
        let outcome = orchestrator(scripted(), out.path())
            .execute(&joined(), 0)
            .unwrap();
        let stages: Vec<_> = outcome.stages.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Setup,
                Stage::RecurseLeft,
                Stage::Propagate,
                Stage::Bind,
                Stage::RecurseRight,
                Stage::Aggregate
            ]
        );
    }

    #[test]
    fn test_left_failure_aborts_before_right() {
        let out = tempfile::tempdir().unwrap();
        let interpreter = scripted()
            .on("run_producer()", Reaction::Print("partial".to_string()))
            .on("run_producer()", Reaction::Fail("boom".to_string()));
        let journal = interpreter.journal();
        let failure = orchestrator(interpreter, out.path())
            .execute(&joined(), 0)
            .unwrap_err();

        match &failure.error {
            ExecutionError::Script { model, message, stderr } => {
                assert_eq!(model, "producer");
                assert_eq!(message, "Error: boom");
                assert_eq!(stderr, &vec!["Error: boom".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(failure.report.stdout.contains(&"partial".to_string()));
        assert!(failure.report.stderr.contains(&"Error: boom".to_string()));

        let journal = journal.borrow();
        assert!(!journal.contains("run_consumer()"));
        assert_eq!(journal.closes, 1);
    }

    #[test]
    fn test_visualization_failure_is_warning() {
        let out = tempfile::tempdir().unwrap();
        let interpreter = scripted().on("plot_producer()", Reaction::Fail("no device".to_string()));
        let outcome = orchestrator(interpreter, out.path())
            .execute(&joined(), 0)
            .unwrap();

        assert_eq!(outcome.report.warnings.len(), 1);
        assert!(matches!(
            &outcome.report.warnings[0],
            RunWarning::Visualization { model, .. } if model == "producer"
        ));
        let plot = outcome.plot.unwrap();
        assert!(plot.to_string_lossy().contains("consumer"));
        assert!(outcome.workspace.unwrap().to_string_lossy().ends_with("consumer.RData"));
    }

    #[test]
    fn test_plots_disabled() {
        let out = tempfile::tempdir().unwrap();
        let interpreter = scripted();
        let journal = interpreter.journal();
        let config = RunnerConfig::new()
            .with_output_dir(out.path())
            .with_plot(PlotSettings {
                enabled: false,
                ..PlotSettings::default()
            });
        let outcome = Orchestrator::new(ScriptedFactory::new(interpreter))
            .with_config(config)
            .execute(&joined(), 0)
            .unwrap();
        assert!(outcome.plot.is_none());
        assert!(!journal.borrow().contains("plot_consumer()"));
    }

    #[test]
    fn test_missing_parameter_value() {
        let left: Model = LeafModel::new("l", "f()")
            .with_parameter(Parameter::input("a", DataType::Double))
            .into();
        let out = tempfile::tempdir().unwrap();
        let interpreter = scripted();
        let journal = interpreter.journal();
        let failure = orchestrator(interpreter, out.path())
            .execute(&left, 0)
            .unwrap_err();
        assert_eq!(
            failure.error,
            ExecutionError::MissingParameterValue {
                model: "l".to_string(),
                param: ParameterId::from("a"),
            }
        );
        assert!(!journal.borrow().contains("f()"));
    }

    #[test]
    fn test_cancelled_before_start() {
        let out = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let interpreter = scripted();
        let journal = interpreter.journal();
        let failure = orchestrator(interpreter, out.path())
            .with_cancellation(token)
            .execute(&joined(), 0)
            .unwrap_err();
        assert_eq!(
            failure.error,
            ExecutionError::Cancelled {
                stage: Stage::Setup
            }
        );
        assert!(journal.borrow().calls.is_empty());
    }

    #[test]
    fn test_cancelled_between_stages() {
        let out = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let interpreter = scripted().on("run_producer()", Reaction::Cancel(token.clone()));
        let journal = interpreter.journal();
        let failure = orchestrator(interpreter, out.path())
            .with_cancellation(token)
            .execute(&joined(), 0)
            .unwrap_err();

        assert_eq!(
            failure.error,
            ExecutionError::Cancelled {
                stage: Stage::Propagate
            }
        );
        let journal = journal.borrow();
        assert!(journal.contains("run_producer()"));
        assert!(!journal.contains("run_consumer()"));
        assert_eq!(journal.closes, 1);
    }

    #[test]
    fn test_resources_propagated() {
        let root = tempfile::tempdir().unwrap();
        let left_dir = root.path().join("left");
        let right_dir = root.path().join("right");
        std::fs::create_dir_all(&left_dir).unwrap();
        std::fs::write(left_dir.join("notes.txt"), "old").unwrap();

        let left: Model = LeafModel::new("writer", "write_csv()")
            .with_working_directory(left_dir.display().to_string())
            .into();
        let right: Model = LeafModel::new("reader", "read_csv()")
            .with_working_directory(right_dir.display().to_string())
            .into();
        let model: Model = Composer::new()
            .compose("files", left, right, &[])
            .unwrap()
            .model
            .into();

        let interpreter = scripted().on(
            "write_csv()",
            Reaction::Write(left_dir.join("out.csv"), "a,b\n".to_string()),
        );
        let outcome = orchestrator(interpreter, &root.path().join("out"))
            .execute(&model, 0)
            .unwrap();

        assert!(right_dir.join("out.csv").is_file());
        assert!(!right_dir.join("notes.txt").exists());
        assert_eq!(outcome.metrics.files_copied, 1);
    }

    #[test]
    fn test_file_binding_points_into_source_dir() {
        let root = tempfile::tempdir().unwrap();
        let left_dir = root.path().join("left");
        let left: Model = LeafModel::new("writer", "w()")
            .with_parameter(Parameter::output("result", DataType::File))
            .with_working_directory(left_dir.display().to_string())
            .into();
        let right: Model = LeafModel::new("reader", "r()")
            .with_parameter(Parameter::input("data", DataType::File))
            .into();
        let model: Model = Composer::new()
            .compose("files", left, right, &[JoinRelation::direct("result", "data")])
            .unwrap()
            .model
            .into();

        let interpreter = scripted().value("result", "\"out.csv\"");
        let journal = interpreter.journal();
        orchestrator(interpreter, &root.path().join("out"))
            .execute(&model, 0)
            .unwrap();

        let expected = format!("data <- \"{}\"", left_dir.join("out.csv").display());
        assert!(journal.borrow().contains(&expected));
    }

    #[test]
    fn test_unbound_target_keeps_own_value() {
        let out = tempfile::tempdir().unwrap();
        let left: Model = LeafModel::new("l", "l()")
            .with_parameter(Parameter::output("z", DataType::Double))
            .into();
        let right: Model = LeafModel::new("r", "r()")
            .with_parameter(Parameter::input("y", DataType::Double).with_value("0"))
            .into();
        let model: Model = Composer::new()
            .compose("c", left, right, &[JoinRelation::direct("z", "y")])
            .unwrap()
            .model
            .into();

        let interpreter = ScriptedInterpreter::new(Language::R);
        let journal = interpreter.journal();
        let outcome = orchestrator(interpreter, out.path())
            .execute(&model, 0)
            .unwrap();

        assert!(outcome
            .report
            .warnings
            .iter()
            .any(|w| matches!(w, RunWarning::OutputUnavailable { .. })));
        assert!(outcome
            .report
            .warnings
            .iter()
            .any(|w| matches!(w, RunWarning::UnboundTarget { .. })));
        assert!(journal.borrow().contains("y <- 0"));
    }

    #[test]
    fn test_selected_simulation_routed_to_children() {
        let out = tempfile::tempdir().unwrap();
        let mut model = joined();
        model
            .simulations_mut()
            .push(Simulation::new("high").with("x_dup", "10").with("x", "1"));

        let interpreter = scripted();
        let journal = interpreter.journal();
        orchestrator(interpreter, out.path())
            .execute(&model, 1)
            .unwrap();

        let journal = journal.borrow();
        assert!(journal.contains("x <- 10"));
        let right_params = journal.script("y <- 6").unwrap();
        assert!(right_params.contains("x <- 1"));
    }

    #[test]
    fn test_simulation_not_found() {
        let out = tempfile::tempdir().unwrap();
        let failure = orchestrator(scripted(), out.path())
            .execute(&joined(), 5)
            .unwrap_err();
        assert!(matches!(
            failure.error,
            ExecutionError::SimulationNotFound { index: 5, count: 1, .. }
        ));
    }

    #[test]
    fn test_nested_tree_order() {
        let out = tempfile::tempdir().unwrap();
        let composer = Composer::new();
        let third: Model = LeafModel::new("third", "run_third()")
            .with_parameter(Parameter::input("w", DataType::Double))
            .into();
        let model: Model = composer
            .compose(
                "outer",
                joined(),
                third,
                &[JoinRelation::new("total", "w", "total + 1")],
            )
            .unwrap()
            .model
            .into();

        let interpreter = scripted().value("total + 1", "7");
        let journal = interpreter.journal();
        let outcome = orchestrator(interpreter, out.path())
            .execute(&model, 0)
            .unwrap();

        let journal = journal.borrow();
        let a = journal.position("run_producer()").unwrap();
        let b = journal.position("run_consumer()").unwrap();
        let c = journal.position("run_third()").unwrap();
        assert!(a < b && b < c);
        assert!(journal.contains("w <- 7"));
        assert_eq!(outcome.metrics.leaves_executed, 3);
        assert_eq!(journal.closes, 1);
    }

    #[test]
    fn test_package_failure_is_warning() {
        let out = tempfile::tempdir().unwrap();
        let model: Model = LeafModel::new("m", "m()").with_package("nosuchpkg").into();
        let interpreter =
            ScriptedInterpreter::new(Language::R).on("nosuchpkg", Reaction::Fail("no package".to_string()));
        let journal = interpreter.journal();
        let outcome = orchestrator(interpreter, out.path())
            .execute(&model, 0)
            .unwrap();
        assert!(matches!(
            outcome.report.warnings[0],
            RunWarning::PackageInstall { .. }
        ));
        assert!(journal.borrow().contains("m()"));
    }

    #[test]
    fn test_python_session() {
        let out = tempfile::tempdir().unwrap();
        let model: Model = LeafModel::new("py", "result = a * 2")
            .with_language(Language::Python)
            .with_parameter(Parameter::input("a", DataType::Integer).with_value("4"))
            .into();
        let interpreter = ScriptedInterpreter::new(Language::Python);
        let journal = interpreter.journal();
        let outcome = orchestrator(interpreter, out.path())
            .execute(&model, 0)
            .unwrap();
        assert!(journal.borrow().contains("a = 4"));
        assert!(outcome.workspace.unwrap().to_string_lossy().ends_with(".pkl"));
    }

    #[test]
    fn test_invalid_model_rejected() {
        let out = tempfile::tempdir().unwrap();
        let mut model = joined();
        if let Model::Combined(c) = &mut model {
            if let Model::Leaf(right) = c.right.as_mut() {
                right.language = Language::Python;
            }
        }
        let failure = orchestrator(scripted(), out.path())
            .execute(&model, 0)
            .unwrap_err();
        assert!(matches!(failure.error, ExecutionError::Invalid(_)));
    }

    #[test]
    fn test_route_uses_mapping() {
        let Model::Combined(combined) = joined() else {
            panic!("expected combined model");
        };
        let mut assignments = Values::new();
        assignments.insert(ParameterId::from("x_dup"), "1".to_string());
        assignments.insert(ParameterId::from("x"), "2".to_string());
        assignments.insert(ParameterId::from("ghost"), "3".to_string());
        let (left, right) = route(&combined, assignments);
        assert_eq!(left.get("x").map(String::as_str), Some("1"));
        assert_eq!(right.get("x").map(String::as_str), Some("2"));
        assert_eq!(left.len() + right.len(), 2);
    }
}
