//! Play command for Kujua.
//!
//! Runs an activity file interactively: prompts go to the given writer, the
//! learner's answers come from the given reader one line at a time. Options
//! and matching cards are shown in a shuffled order. A passing run is
//! recorded in the progress log.

use std::io::{BufRead, Write};

use rand::Rng;
use serde::Serialize;

use crate::config::Config;
use crate::core::activity::{ActivitySession, Advance, CompletionSummary, Stage, StageOutcome};
use crate::core::definition::ActivityDefinition;
use crate::core::quality::{QualityGate, QualityPreset};
use crate::core::shuffle::{display_order, original_index};
use crate::core::stage::{StageDef, StageInput};
use crate::effects::{CelebrationGuard, CelebrationKind, EffectTrigger};
use crate::error::{KujuaError, Result};
use crate::progress::ProgressLogger;

/// Options for the play command.
#[derive(Debug, Clone)]
pub struct PlayOptions {
    /// Output the final result as JSON.
    pub json: bool,
    /// Suppress the final result.
    pub quiet: bool,
    /// Shuffle options and matching cards.
    pub shuffle: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            json: false,
            quiet: false,
            shuffle: true,
        }
    }
}

/// Output format for the play command.
#[derive(Debug, Clone, Serialize)]
pub struct PlayOutput {
    pub success: bool,
    pub activity_id: String,
    /// Every stage was evaluated.
    pub completed: bool,
    /// Completion was signalled.
    pub passed: bool,
    pub score: f64,
    pub max_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub celebration: Option<CelebrationKind>,
    pub outcomes: Vec<StageOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlayOutput {
    fn finished(activity_id: &str, summary: &CompletionSummary, outcomes: &[StageOutcome]) -> Self {
        Self {
            success: true,
            activity_id: activity_id.to_string(),
            completed: true,
            passed: summary.passed,
            score: summary.aggregate_score,
            max_score: summary.max_score,
            celebration: summary.celebration,
            outcomes: outcomes.to_vec(),
            error: None,
        }
    }

    fn abandoned(activity_id: &str, session: &ActivitySession<'_, StageDef>) -> Self {
        Self {
            success: false,
            activity_id: activity_id.to_string(),
            completed: false,
            passed: false,
            score: session.aggregate_score(),
            max_score: session.max_score(),
            celebration: None,
            outcomes: session.outcome_log().to_vec(),
            error: Some("input ended before the activity was complete".to_string()),
        }
    }

    /// Create a failed output.
    pub fn failure(activity_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            activity_id: activity_id.to_string(),
            completed: false,
            passed: false,
            score: 0.0,
            max_score: 0.0,
            celebration: None,
            outcomes: Vec::new(),
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// Terminal effects
// =============================================================================

/// Draws celebrations as text.
pub struct TerminalEffects<W: Write> {
    out: W,
}

impl<W: Write> TerminalEffects<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

// Drawing is best effort; a closed terminal must not fail the activity.
impl<W: Write> EffectTrigger for TerminalEffects<W> {
    fn start(&mut self, kind: CelebrationKind) {
        let _ = write!(self.out, "*** {} *** ", kind);
    }

    fn burst(&mut self, kind: CelebrationKind, _index: u32) {
        let glyph = match kind {
            CelebrationKind::Confetti => "*",
            CelebrationKind::Fireworks => "\\|/",
        };
        let _ = write!(self.out, "{} ", glyph);
    }

    fn stop(&mut self, _kind: CelebrationKind) {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }
}

// =============================================================================
// Command
// =============================================================================

/// The play command implementation.
pub struct PlayCommand {
    config: Config,
    activity: ActivityDefinition,
    logger: Option<ProgressLogger>,
}

impl PlayCommand {
    pub fn new(config: Config, activity: ActivityDefinition) -> Self {
        Self {
            config,
            activity,
            logger: None,
        }
    }

    /// Record passing runs in the given progress log.
    pub fn with_logger(mut self, logger: ProgressLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Play the activity to the end or until input runs out.
    pub fn run<I: BufRead, W: Write, R: Rng + ?Sized>(
        &self,
        input: &mut I,
        out: &mut W,
        rng: &mut R,
        options: &PlayOptions,
    ) -> PlayOutput {
        match self.play(input, out, rng, options) {
            Ok(output) => output,
            Err(e) => PlayOutput::failure(&self.activity.id, e.to_string()),
        }
    }

    fn play<I: BufRead, W: Write, R: Rng + ?Sized>(
        &self,
        input: &mut I,
        out: &mut W,
        rng: &mut R,
        options: &PlayOptions,
    ) -> Result<PlayOutput> {
        let mut session = self.activity.session(&self.config)?;
        if let Some(logger) = &self.logger {
            session.on_complete(logger.recorder(&self.activity));
        }

        writeln!(out, "{}", self.activity.title)?;
        session.start()?;

        while let Some(stage) = session.current_stage().cloned() {
            let index = session.status().stage().unwrap_or_default();
            writeln!(out, "\n[{}/{}] {}", index + 1, session.stage_count(), stage.prompt())?;

            let Some(selection) = self.prompt(&stage, input, out, rng, options)? else {
                return Ok(PlayOutput::abandoned(&self.activity.id, &session));
            };
            session.select(selection)?;

            let outcome = session.evaluate()?.clone();
            writeln!(out, "{}", outcome.feedback)?;
            if outcome.tier.is_some_and(|tier| tier.celebrates()) {
                self.celebrate(out, CelebrationKind::Confetti);
            }

            if let Advance::Completed(summary) = session.advance()? {
                writeln!(
                    out,
                    "\nScore: {:.1} / {:.1}",
                    summary.aggregate_score, summary.max_score
                )?;
                if let Some(kind) = summary.celebration {
                    self.celebrate(out, kind);
                }
                if !summary.passed {
                    writeln!(out, "Some answers need more work. Play the activity again to retry.")?;
                }
                return Ok(PlayOutput::finished(
                    &self.activity.id,
                    &summary,
                    session.outcome_log(),
                ));
            }
        }

        Err(KujuaError::invalid_state(format!(
            "activity stopped in {} state",
            session.status()
        )))
    }

    /// Ask for one stage's input until it is acceptable. `None` on end of input.
    fn prompt<I: BufRead, W: Write, R: Rng + ?Sized>(
        &self,
        stage: &StageDef,
        input: &mut I,
        out: &mut W,
        rng: &mut R,
        options: &PlayOptions,
    ) -> Result<Option<StageInput>> {
        loop {
            let selection = match stage {
                StageDef::Choice(choice) => {
                    let order = presentation_order(choice.options.len(), rng, options.shuffle);
                    for (shown, &original) in order.iter().enumerate() {
                        writeln!(out, "  {}) {}", shown + 1, choice.options[original].label)?;
                    }
                    let Some(shown) = ask_number(input, out, "> ", order.len())? else {
                        return Ok(None);
                    };
                    match original_index(&order, shown) {
                        Some(original) => StageInput::Choice(original),
                        None => continue,
                    }
                }
                StageDef::Matching(matching) => {
                    let order = presentation_order(matching.pairs.len(), rng, options.shuffle);
                    for (shown, &original) in order.iter().enumerate() {
                        writeln!(out, "  {}) {}", shown + 1, matching.pairs[original].right)?;
                    }
                    let mut matches = Vec::with_capacity(matching.pairs.len());
                    for pair in &matching.pairs {
                        let prompt = format!("{} -> ", pair.left);
                        let Some(shown) = ask_number(input, out, &prompt, order.len())? else {
                            return Ok(None);
                        };
                        matches.push(original_index(&order, shown).unwrap_or(shown));
                    }
                    StageInput::Matching(matches)
                }
                StageDef::Allocation(allocation) => {
                    let mut split = Vec::with_capacity(allocation.categories.len());
                    for category in &allocation.categories {
                        let prompt = format!("{} (%): ", category.name);
                        let Some(percent) = ask_percent(input, out, &prompt)? else {
                            return Ok(None);
                        };
                        split.push(percent);
                    }
                    StageInput::Allocation(split)
                }
                StageDef::Reflection(_) => {
                    let Some(text) = ask(input, out, "> ")? else {
                        return Ok(None);
                    };
                    let verdict = QualityGate::for_preset(&self.config.quality, QualityPreset::Reflection)
                        .check(&text);
                    if let Some(rejection) = verdict.rejection {
                        writeln!(out, "Please provide a more thoughtful response ({}).", rejection)?;
                        continue;
                    }
                    StageInput::Text(text)
                }
                StageDef::Scenario(_) => {
                    let Some(text) = ask(input, out, "> ")? else {
                        return Ok(None);
                    };
                    StageInput::Text(text)
                }
            };

            match stage.validate_selection(&selection) {
                Ok(()) => return Ok(Some(selection)),
                Err(KujuaError::InvalidSelection { message }) => {
                    writeln!(out, "That doesn't fit: {}.", message)?;
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn celebrate<W: Write>(&self, out: &mut W, kind: CelebrationKind) {
        let mut effects = TerminalEffects::new(&mut *out);
        CelebrationGuard::with_config(&mut effects, kind, &self.config.celebration).run_to_end();
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &PlayOutput, options: &PlayOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &PlayOutput) -> String {
        if let Some(error) = &output.error {
            return format!("Activity '{}' not finished: {}\n", output.activity_id, error);
        }

        let status = if output.passed { "complete" } else { "needs another try" };
        format!(
            "Activity '{}' {} ({}/{} stages correct).\n",
            output.activity_id,
            status,
            output.outcomes.iter().filter(|o| o.correct).count(),
            output.outcomes.len()
        )
    }
}

// =============================================================================
// Input helpers
// =============================================================================

fn presentation_order<R: Rng + ?Sized>(len: usize, rng: &mut R, shuffle: bool) -> Vec<usize> {
    if shuffle {
        display_order(len, rng)
    } else {
        (0..len).collect()
    }
}

/// Print a prompt and read one trimmed, non-empty line. `None` on end of input.
fn ask<I: BufRead, W: Write>(input: &mut I, out: &mut W, prompt: &str) -> Result<Option<String>> {
    loop {
        write!(out, "{}", prompt)?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }
}

/// Ask for a 1-based choice and return it 0-based.
fn ask_number<I: BufRead, W: Write>(
    input: &mut I,
    out: &mut W,
    prompt: &str,
    max: usize,
) -> Result<Option<usize>> {
    loop {
        let Some(answer) = ask(input, out, prompt)? else {
            return Ok(None);
        };
        match answer.parse::<usize>() {
            Ok(n) if (1..=max).contains(&n) => return Ok(Some(n - 1)),
            _ => writeln!(out, "Enter a number between 1 and {}.", max)?,
        }
    }
}

fn ask_percent<I: BufRead, W: Write>(
    input: &mut I,
    out: &mut W,
    prompt: &str,
) -> Result<Option<u32>> {
    loop {
        let Some(answer) = ask(input, out, prompt)? else {
            return Ok(None);
        };
        match answer.trim_end_matches('%').trim().parse::<u32>() {
            Ok(n) if n <= 100 => return Ok(Some(n)),
            _ => writeln!(out, "Enter a whole percentage from 0 to 100.")?,
        }
    }
}
