use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::actions::interpret;
use crate::actions::parser::ParserBackend;
use crate::agent_engine::state::{AutomationResult, StageTiming};
use crate::errors::{GuiActError, GuiActResult};
use crate::executor::coordinator::COORDINATE_SCALE;
use crate::executor::dispatcher::{DispatchTimings, Dispatcher};
use crate::executor::input::InputBackend;
use crate::executor::keymap::KeyMap;
use crate::llm::prompt::build_conversation;
use crate::llm::provider::VisionModel;
use crate::perception::traits::ScreenSource;
use crate::perception::types::ScreenGeometry;

/// Pause between receiving the model's answer and touching the screen.
pub const PRE_EXECUTE_DELAY: Duration = Duration::from_millis(500);

/// What one interpret-and-dispatch pass did: whether any command was parsed,
/// the step log, and the kind of the first command.
pub type ExecutionOutcome = (bool, Vec<String>, Option<String>);

/// One-shot screen automation: capture, ask the model, act on its answer.
pub struct AutomationEngine {
    screen: Box<dyn ScreenSource>,
    model: Arc<dyn VisionModel>,
    parser: ParserBackend,
    input: Option<Box<dyn InputBackend>>,
    keymap: KeyMap,
    timings: DispatchTimings,
    scale_factor: u32,
    pre_execute_delay: Duration,
}

impl AutomationEngine {
    pub fn new(screen: Box<dyn ScreenSource>, model: Arc<dyn VisionModel>, parser: ParserBackend) -> Self {
        Self {
            screen,
            model,
            parser,
            input: None,
            keymap: KeyMap::for_host(),
            timings: DispatchTimings::default(),
            scale_factor: COORDINATE_SCALE,
            pre_execute_delay: PRE_EXECUTE_DELAY,
        }
    }

    /// Input backend used when `run` is asked to execute. Without one, only
    /// analysis is possible.
    pub fn with_input(mut self, input: Box<dyn InputBackend>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_keymap(mut self, keymap: KeyMap) -> Self {
        self.keymap = keymap;
        self
    }

    pub fn with_timings(mut self, timings: DispatchTimings, pre_execute_delay: Duration) -> Self {
        self.timings = timings;
        self.pre_execute_delay = pre_execute_delay;
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: u32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Runs one automation step. Never fails: errors are reported in the
    /// result with `success = false`.
    pub async fn run(&mut self, instruction: &str, execute: bool) -> AutomationResult {
        let total_start = Instant::now();
        let mut timing = StageTiming::default();
        match self.try_run(instruction, execute, &mut timing).await {
            Ok(mut result) => {
                timing.total_ms = elapsed_ms(total_start);
                result.timing = timing;
                result
            }
            Err(e) => {
                tracing::error!(error = %e, "automation step failed");
                timing.total_ms = elapsed_ms(total_start);
                AutomationResult::failed(e.to_string(), timing)
            }
        }
    }

    async fn try_run(
        &mut self,
        instruction: &str,
        execute: bool,
        timing: &mut StageTiming,
    ) -> GuiActResult<AutomationResult> {
        let step = Instant::now();
        let shot = self.screen.capture()?;
        let geometry = shot.meta.geometry();
        timing.screenshot_ms = Some(elapsed_ms(step));

        let step = Instant::now();
        let messages = build_conversation(instruction, &shot.image_base64, &shot.meta.format);
        timing.build_conv_ms = Some(elapsed_ms(step));

        let step = Instant::now();
        tracing::info!(model = %self.model.name(), width = geometry.width, height = geometry.height, "requesting model inference");
        let response = self.model.complete(messages).await?;
        timing.inference_ms = Some(elapsed_ms(step));
        tracing::debug!(response = %response, "model response");

        let mut execution_result = None;
        let mut action_triggered = false;
        let mut action_type = None;

        if execute {
            let step = Instant::now();
            tokio::time::sleep(self.pre_execute_delay).await;
            let (triggered, steps, first_kind) = self.parse_and_execute(&response, geometry).await?;
            action_triggered = triggered;
            execution_result = Some(steps);
            action_type = first_kind;
            timing.execution_ms = Some(elapsed_ms(step));
        }

        Ok(AutomationResult {
            success: true,
            image_size: Some((geometry.width, geometry.height)),
            response: Some(response),
            execution_result,
            action_triggered,
            action_type,
            timing: StageTiming::default(),
            error: None,
        })
    }

    /// Interprets `response` and dispatches the commands it contains.
    pub async fn parse_and_execute(
        &mut self,
        response: &str,
        geometry: ScreenGeometry,
    ) -> GuiActResult<ExecutionOutcome> {
        let input = self
            .input
            .as_deref_mut()
            .ok_or_else(|| GuiActError::Executor("no input backend configured".into()))?;
        parse_and_execute(
            response,
            geometry,
            self.scale_factor,
            &self.parser,
            input,
            self.keymap.clone(),
            self.timings,
        )
        .await
    }
}

/// Interprets `response` with `parser` and dispatches the result against
/// `input`. An empty command list triggers nothing and touches no input.
pub async fn parse_and_execute(
    response: &str,
    geometry: ScreenGeometry,
    scale_factor: u32,
    parser: &ParserBackend,
    input: &mut dyn InputBackend,
    keymap: KeyMap,
    timings: DispatchTimings,
) -> GuiActResult<ExecutionOutcome> {
    let commands = interpret(response, geometry, scale_factor, parser)?;
    let Some(first) = commands.first() else {
        tracing::info!(parser = %parser.kind(), "no action triggered");
        return Ok((false, Vec::new(), None));
    };
    let first_kind = first.kind.to_string();
    tracing::info!(parser = %parser.kind(), commands = commands.len(), first = %first_kind, "dispatching");

    let steps = Dispatcher::new(input, keymap)
        .with_timings(timings)
        .execute(&commands, geometry, scale_factor)
        .await?;
    Ok((true, steps, Some(first_kind)))
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
