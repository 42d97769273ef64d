//! # Browser Atomic-Action Engine
//!
//! Runs one "browse to accomplish X" dispatch: optionally open a start URL,
//! then ask the oracle for one atomic action at a time until it chooses
//! `CLOSE`, the step budget runs out, the same action keeps coming back, or
//! the optional sufficiency check is satisfied.
//!
//! Action and oracle failures end the dispatch with a [`BrowserError`]; there
//! is no per-action retry. Budget and loop terminations are ordinary
//! [`BrowserResult`]s that carry the reason.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use stepweave_core::error::{BudgetExceeded, LoopDetected};
use stepweave_core::{FailureReason, Oracle, OracleRequest, complete_as};

use crate::error::BrowserError;
use crate::manager::SessionManager;
use crate::method::BrowserMethod;
use crate::prompt;
use crate::session::BrowserSession;
use crate::types::{
    BrowserDecision, BrowserResult, BrowserStep, BrowserTermination, ExtractedData, ExtractedKind,
    ExtractedMetadata, SufficiencyVerdict,
};

/// Tuning for [`BrowserEngine`].
#[derive(Debug, Clone)]
pub struct BrowserEngineConfig {
    /// Oracle decisions allowed per dispatch. The start URL is not counted.
    pub max_steps: u32,
    /// Recent steps shown to the oracle.
    pub history_window: usize,
    /// Consecutive repeats of one action that end the loop.
    pub max_repeats: u32,
    /// Attach a screenshot to every other decision.
    pub enable_vision: bool,
    /// Ask the oracle after each data-producing step whether to stop early.
    pub early_exit_check: bool,
    /// Produce a text summary of the collected data.
    pub summarize_results: bool,
    pub browser_model: Option<String>,
    pub check_model: Option<String>,
    pub default_wait: Duration,
    pub max_wait: Duration,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            history_window: 5,
            max_repeats: 3,
            enable_vision: false,
            early_exit_check: false,
            summarize_results: false,
            browser_model: None,
            check_model: None,
            default_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl BrowserEngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_vision(mut self, enabled: bool) -> Self {
        self.enable_vision = enabled;
        self
    }

    pub fn with_early_exit_check(mut self, enabled: bool) -> Self {
        self.early_exit_check = enabled;
        self
    }

    pub fn with_summary(mut self, enabled: bool) -> Self {
        self.summarize_results = enabled;
        self
    }

    pub fn with_models(mut self, browser_model: Option<String>, check_model: Option<String>) -> Self {
        self.browser_model = browser_model;
        self.check_model = check_model;
        self
    }
}

/// Consecutive-repeat counter over `(method, instruction)`.
#[derive(Debug)]
struct RepeatGuard {
    last: Option<(BrowserMethod, Option<String>)>,
    repeats: u32,
    limit: u32,
}

impl RepeatGuard {
    fn new(limit: u32) -> Self {
        Self {
            last: None,
            repeats: 0,
            limit,
        }
    }

    fn observe(&mut self, decision: &BrowserDecision) -> Option<LoopDetected> {
        let key = (decision.method, decision.instruction.clone());
        if self.last.as_ref() == Some(&key) {
            self.repeats += 1;
        } else {
            self.last = Some(key);
            self.repeats = 0;
        }
        (self.repeats >= self.limit).then(|| LoopDetected {
            method: decision.method.to_string(),
            instruction: decision.instruction.clone(),
            repeats: self.repeats,
        })
    }
}

/// Steps and data collected during one dispatch.
#[derive(Default)]
struct Transcript {
    steps: Vec<BrowserStep>,
    results: Vec<ExtractedData>,
    /// Screenshot taken by a `SCREENSHOT` action, attached to the next decision.
    pending_image: Option<String>,
}

impl Transcript {
    fn recent(&self, window: usize) -> &[BrowserStep] {
        let start = self.steps.len().saturating_sub(window);
        &self.steps[start..]
    }

    fn record(&mut self, decision: BrowserDecision, result: Value, url: Option<String>) {
        let timestamp = Utc::now();
        if let Some(kind) = ExtractedKind::from_method(decision.method) {
            self.results.push(ExtractedData {
                data_type: kind,
                content: result.clone(),
                metadata: ExtractedMetadata {
                    url: url.clone(),
                    instruction: decision.instruction.clone(),
                    step: self.steps.len() + 1,
                    timestamp,
                },
            });
        }
        self.steps.push(BrowserStep {
            text: decision.text,
            reasoning: decision.reasoning,
            method: decision.method,
            instruction: decision.instruction,
            result,
            timestamp,
            url,
        });
    }
}

/// The inner browser loop.
pub struct BrowserEngine {
    oracle: Arc<dyn Oracle>,
    config: BrowserEngineConfig,
}

impl BrowserEngine {
    pub fn new(oracle: Arc<dyn Oracle>, config: BrowserEngineConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &BrowserEngineConfig {
        &self.config
    }

    /// Lease the shared session and run the loop on it. The session is
    /// invalidated when the dispatch fails.
    pub async fn run(
        &self,
        sessions: &SessionManager,
        goal: &str,
        start_url: Option<&str>,
    ) -> Result<BrowserResult, BrowserError> {
        let mut lease = sessions.acquire().await?;
        let outcome = match lease.session() {
            Some(session) => self.run_with_session(session, goal, start_url).await,
            None => Err(BrowserError::Session(FailureReason::InternalError {
                message: "leased browser session is missing".to_string(),
            })),
        };
        match &outcome {
            Ok(_) => lease.release().await,
            Err(_) => lease.invalidate().await,
        }
        outcome
    }

    /// Run the loop on a session the caller already owns.
    pub async fn run_with_session(
        &self,
        session: &mut dyn BrowserSession,
        goal: &str,
        start_url: Option<&str>,
    ) -> Result<BrowserResult, BrowserError> {
        tracing::info!(goal, start_url, max_steps = self.config.max_steps, "Browser task started");
        let mut transcript = Transcript::default();

        if let Some(url) = start_url.map(str::trim).filter(|u| !u.is_empty()) {
            let decision = BrowserDecision {
                text: format!("Open {url}"),
                reasoning: "Start URL supplied with the task".to_string(),
                method: BrowserMethod::Goto,
                instruction: Some(url.to_string()),
            };
            let result = self.execute(session, goal, &decision, &transcript).await?;
            transcript.record(decision, result, session.current_url());
        }

        let mut guard = RepeatGuard::new(self.config.max_repeats);
        let mut stop: Option<(BrowserTermination, String)> = None;

        for iteration in 0..self.config.max_steps {
            let image = if self.config.enable_vision && iteration % 2 == 0 {
                self.capture(session).await
            } else {
                transcript.pending_image.take()
            };

            let decision = self
                .decide(goal, session.current_url(), &transcript, iteration + 1, image)
                .await?;
            tracing::debug!(
                step = iteration + 1,
                method = %decision.method,
                instruction = decision.instruction.as_deref(),
                "Browser decision"
            );

            if let Some(detected) = guard.observe(&decision) {
                tracing::warn!(method = %detected.method, repeats = detected.repeats, "Browser loop detected");
                stop = Some((BrowserTermination::LoopDetected, detected.to_string()));
                break;
            }

            if decision.method.is_terminal() {
                let message = if decision.text.trim().is_empty() {
                    "Browser task completed".to_string()
                } else {
                    decision.text.clone()
                };
                let url = session.current_url();
                transcript.record(decision, json!({ "status": "closed" }), url);
                stop = Some((BrowserTermination::GoalCompleted, message));
                break;
            }

            let produces_data = decision.method.produces_data();
            let result = self.execute(session, goal, &decision, &transcript).await?;
            if decision.method == BrowserMethod::Screenshot {
                transcript.pending_image = result
                    .get("image")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            transcript.record(decision, strip_image(result), session.current_url());

            if self.config.early_exit_check && produces_data {
                if let Some(reason) = self.sufficient(goal, &transcript.results).await? {
                    stop = Some((
                        BrowserTermination::SufficientData,
                        format!("Sufficient data collected: {reason}"),
                    ));
                    break;
                }
            }
        }

        let (termination, message) = stop.unwrap_or_else(|| {
            let exceeded = BudgetExceeded {
                limit: self.config.max_steps,
            };
            tracing::warn!(limit = exceeded.limit, "Browser step budget exhausted");
            (BrowserTermination::BudgetExhausted, exceeded.to_string())
        });

        let Transcript { steps, results, .. } = transcript;
        let mut result = BrowserResult::new(termination, message, steps, results);
        if self.config.summarize_results && !result.results.is_empty() {
            result.summary = self.summarize(goal, &result.results).await;
        }

        tracing::info!(
            termination = %result.termination,
            total_steps = result.total_steps,
            results = result.results.len(),
            "Browser task finished"
        );
        Ok(result)
    }

    async fn decide(
        &self,
        goal: &str,
        current_url: Option<String>,
        transcript: &Transcript,
        step: u32,
        image: Option<String>,
    ) -> Result<BrowserDecision, BrowserError> {
        let prompt = prompt::decision_prompt(
            goal,
            current_url.as_deref(),
            transcript.recent(self.config.history_window),
            step,
            self.config.max_steps,
        );
        let mut request = OracleRequest::new(prompt)
            .with_system(prompt::DECISION_SYSTEM_PROMPT)
            .with_model(self.config.browser_model.as_deref());
        if let Some(image) = image {
            request = request.with_image(image);
        }
        let decision: BrowserDecision =
            complete_as(self.oracle.as_ref(), request, &prompt::decision_schema()).await?;
        Ok(decision.normalized())
    }

    async fn execute(
        &self,
        session: &mut dyn BrowserSession,
        goal: &str,
        decision: &BrowserDecision,
        transcript: &Transcript,
    ) -> Result<Value, BrowserError> {
        let method = decision.method;
        let fail = |reason: FailureReason| BrowserError::Action { method, reason };
        let instruction = decision.instruction.as_deref();
        if method.requires_instruction() && instruction.is_none() {
            return Err(fail(FailureReason::invalid_input(format!(
                "{method} requires an instruction"
            ))));
        }
        let instruction_text = instruction.unwrap_or_default();

        match method {
            BrowserMethod::Goto => session.goto(instruction_text).await.map_err(fail),
            BrowserMethod::Act => session.act(instruction_text).await.map_err(fail),
            BrowserMethod::Extract => session.extract(instruction_text).await.map_err(fail),
            BrowserMethod::Observe => session.observe(instruction).await.map_err(fail),
            BrowserMethod::Html => session.html().await.map_err(fail),
            BrowserMethod::Screenshot => {
                let png = session.screenshot().await.map_err(fail)?;
                Ok(json!({ "bytes": png.len(), "image": STANDARD.encode(&png) }))
            }
            BrowserMethod::Wait => {
                let duration = self.wait_duration(instruction).map_err(fail)?;
                session.wait(duration).await.map_err(fail)
            }
            BrowserMethod::NavBack => session.nav_back().await.map_err(fail),
            BrowserMethod::AiHandle => {
                let request = OracleRequest::new(prompt::ai_handle_prompt(
                    goal,
                    instruction_text,
                    transcript.recent(self.config.history_window),
                ))
                .with_model(self.config.browser_model.as_deref());
                let response = self.oracle.complete_text(request).await?;
                Ok(json!({ "response": response }))
            }
            BrowserMethod::Close => Ok(json!({ "status": "closed" })),
        }
    }

    /// `WAIT` accepts `2s`, `500ms` or a bare number of seconds.
    fn wait_duration(&self, instruction: Option<&str>) -> Result<Duration, FailureReason> {
        let Some(text) = instruction else {
            return Ok(self.config.default_wait);
        };
        let parsed = humantime::parse_duration(text).or_else(|_| {
            text.parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .ok_or_else(|| FailureReason::invalid_input(format!("invalid wait duration '{text}'")))
        })?;
        Ok(parsed.min(self.config.max_wait))
    }

    async fn capture(&self, session: &mut dyn BrowserSession) -> Option<String> {
        match session.screenshot().await {
            Ok(png) => Some(STANDARD.encode(png)),
            Err(reason) => {
                tracing::warn!(error = %reason, "Screenshot for vision context failed");
                None
            }
        }
    }

    async fn sufficient(
        &self,
        goal: &str,
        results: &[ExtractedData],
    ) -> Result<Option<String>, BrowserError> {
        let request = OracleRequest::new(prompt::sufficiency_prompt(goal, results))
            .with_model(self.config.check_model.as_deref());
        let verdict: SufficiencyVerdict =
            complete_as(self.oracle.as_ref(), request, &prompt::sufficiency_schema()).await?;
        tracing::debug!(sufficient = verdict.sufficient, reason = %verdict.reason, "Sufficiency check");
        Ok(verdict.sufficient.then_some(verdict.reason))
    }

    async fn summarize(&self, goal: &str, results: &[ExtractedData]) -> Option<String> {
        let request = OracleRequest::new(prompt::summary_prompt(goal, results))
            .with_model(self.config.browser_model.as_deref());
        match self.oracle.complete_text(request).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                tracing::warn!(error = %err, "Browser result summary failed");
                None
            }
        }
    }
}

/// Screenshots are attached to the next prompt, not kept in the step log.
fn strip_image(mut result: Value) -> Value {
    if let Some(map) = result.as_object_mut() {
        map.remove("image");
    }
    result
}
