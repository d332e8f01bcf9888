//! The `proctor take` command.
//!
//! Runs one attempt in the terminal: review slides, then the questions, then
//! the result. Commands are read line by line from stdin. Ctrl-C and `leave`
//! are treated as attempts to navigate away and are blocked from the moment
//! loading starts until the exam is submitted.
//!
//! With `--json`, stdout carries only the outcome document; everything
//! interactive goes to stderr.

use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::task::JoinHandle;

use proctor_core::guard::{InMemoryHistory, NavigationGuard};
use proctor_core::model::{choice_letter, parse_choice_letter, Exam};
use proctor_core::review::ReviewCarousel;
use proctor_core::{AttemptOutcome, ExamAttempt, ExamError, SessionSnapshot};
use proctor_providers::config::{create_content_provider, create_results_store, load_config_from};

pub async fn execute(
    exam_id: String,
    config_path: Option<PathBuf>,
    skip_review: bool,
    json: bool,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let content = create_content_provider(&config)?;
    let results = create_results_store(&config)?;

    let mut terminal = Terminal::new(json);

    terminal.say(format_args!("Loading exam '{exam_id}'..."));
    let mut attempt = terminal
        .guarded(ExamAttempt::load(
            content.as_ref(),
            results,
            &exam_id,
            &config.attempt_config(),
        ))
        .await?;

    if !skip_review && !attempt.exam().review.slides.is_empty() {
        review(attempt.exam(), &mut terminal).await?;
    }

    let outcome = answer(&mut attempt, &mut terminal).await?;
    drop(terminal);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(attempt.exam(), &outcome);
    }
    Ok(())
}

/// Line-oriented input with back-navigation interception.
///
/// Holds the navigation guard for its whole lifetime. Ctrl-C is turned into a
/// back event by a listener task, so it is blocked while waiting for input and
/// while loading or reporting.
struct Terminal {
    lines: Lines<BufReader<Stdin>>,
    history: Arc<InMemoryHistory>,
    guard: NavigationGuard,
    interrupts: JoinHandle<()>,
    json: bool,
}

impl Terminal {
    fn new(json: bool) -> Self {
        let history = Arc::new(InMemoryHistory::new());
        let guard = NavigationGuard::engage(history.clone());
        let interrupts = tokio::spawn({
            let history = history.clone();
            async move {
                loop {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => history.back(),
                        Err(e) => {
                            tracing::warn!("failed to listen for Ctrl-C: {e}");
                            break;
                        }
                    }
                }
            }
        });
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            history,
            guard,
            interrupts,
            json,
        }
    }

    /// Interactive output. Kept off stdout when it carries JSON.
    fn say(&self, text: impl Display) {
        if self.json {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
    }

    fn show_notice(&self) {
        if let Some(notice) = self.guard.take_notice() {
            self.say(notice);
        }
    }

    /// Drive `fut` to completion, reporting blocked leave attempts meanwhile.
    async fn guarded<F: Future>(&self, fut: F) -> F::Output {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;

                _ = self.guard.blocked() => self.show_notice(),
                out = &mut fut => return out,
            }
        }
    }

    /// Next non-navigation command, or `None` at end of input.
    async fn next_command(&mut self) -> Result<Option<String>> {
        loop {
            tokio::select! {
                biased;

                _ = self.guard.blocked() => self.show_notice(),
                line = self.lines.next_line() => {
                    let Some(line) = line.context("failed to read input")? else {
                        return Ok(None);
                    };
                    let line = line.trim();
                    if line.eq_ignore_ascii_case("leave") {
                        self.history.back();
                        continue;
                    }
                    return Ok(Some(line.to_string()));
                }
            }
        }
    }

    fn render(&self, snapshot: &SessionSnapshot) {
        self.say(format_args!(
            "\nQuestion {} of {}",
            snapshot.index + 1,
            snapshot.total
        ));
        self.say(&snapshot.question);
        for choice in &snapshot.choices {
            let mark = if choice.selected { "x" } else { " " };
            self.say(format_args!("  [{mark}] {}) {}", choice.letter, choice.text));
        }
        if let Some(feedback) = &snapshot.feedback {
            self.say(&feedback.message);
        }

        let mut commands = Vec::new();
        if !snapshot.confirmed {
            commands.push("<letter>");
        }
        if snapshot.can_confirm {
            commands.push("confirm");
        }
        if snapshot.can_retreat {
            commands.push("prev");
        }
        if snapshot.can_advance {
            commands.push("next");
        }
        if snapshot.can_submit {
            commands.push("submit");
        }
        self.say(format_args!("commands: {}", commands.join(", ")));
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.interrupts.abort();
    }
}

async fn review(exam: &Exam, terminal: &mut Terminal) -> Result<()> {
    let mut carousel = ReviewCarousel::new(&exam.review.slides);
    terminal.say(format_args!("\n== {} ==", exam.title));
    if !exam.description.is_empty() {
        terminal.say(&exam.description);
    }

    loop {
        if let Some(slide) = carousel.current() {
            terminal.say(format_args!(
                "\n-- Slide {} of {}: {} --",
                carousel.active_index() + 1,
                carousel.len(),
                slide.header
            ));
            terminal.say(&slide.body_text);
            if let Some(image) = &slide.image {
                terminal.say(format_args!("[image: {image}]"));
            }
        }
        terminal.say("commands: next, prev, take");

        let Some(command) = terminal.next_command().await? else {
            anyhow::bail!("input ended before the exam started");
        };
        match command.to_ascii_lowercase().as_str() {
            "n" | "next" => {
                carousel.next_slide();
            }
            "p" | "prev" => {
                carousel.prev_slide();
            }
            "t" | "take" if carousel.can_take_exam() => return Ok(()),
            "t" | "take" => terminal.say("Review every slide before taking the exam."),
            other => terminal.say(format_args!("unknown command: {other}")),
        }
    }
}

async fn answer(attempt: &mut ExamAttempt, terminal: &mut Terminal) -> Result<AttemptOutcome> {
    terminal.say(format_args!("\n== {} ==", attempt.exam().title));
    if !attempt.exam().instructions.is_empty() {
        terminal.say(&attempt.exam().instructions);
    }
    terminal.render(&attempt.session().snapshot());

    loop {
        let Some(command) = terminal.next_command().await? else {
            anyhow::bail!("input ended before the exam was submitted");
        };
        if command.is_empty() {
            terminal.render(&attempt.session().snapshot());
            continue;
        }

        let result = match command.to_ascii_lowercase().as_str() {
            "confirm" => attempt.session_mut().confirm_answer().map(|_| ()),
            "next" => attempt.session_mut().advance().map(|_| ()),
            "prev" => attempt.session_mut().retreat().map(|_| ()),
            "submit" => match terminal.guarded(attempt.submit()).await {
                Ok(outcome) => return Ok(outcome),
                Err(ExamError::InvalidTransition(e)) => Err(e),
                Err(e) => return retry_report(attempt, terminal, e).await,
            },
            label => match parse_choice_letter(label).filter(|_| label.len() <= 2) {
                Some(choice) => match attempt.session_mut().select_answer(choice) {
                    Ok(true) => Ok(()),
                    Ok(false) => {
                        terminal.say("This answer is confirmed and can no longer be changed.");
                        continue;
                    }
                    Err(e) => Err(e),
                },
                None => {
                    terminal.say(format_args!("unknown command: {label}"));
                    continue;
                }
            },
        };

        match result {
            Ok(()) => terminal.render(&attempt.session().snapshot()),
            Err(e) => terminal.say(format_args!("! {e}")),
        }
    }
}

/// The session is scored but its record was not delivered. Only retrying or
/// giving up is possible from here.
async fn retry_report(
    attempt: &ExamAttempt,
    terminal: &mut Terminal,
    mut error: ExamError,
) -> Result<AttemptOutcome> {
    loop {
        if !error.is_retryable() {
            return Err(error.into());
        }
        terminal.say(format_args!("Your result could not be recorded: {error}"));
        terminal.say("commands: retry, quit");

        let Some(command) = terminal.next_command().await? else {
            anyhow::bail!("input ended before the result was recorded");
        };
        match command.to_ascii_lowercase().as_str() {
            "retry" => match terminal.guarded(attempt.report_result()).await {
                Ok(_) => {
                    return attempt
                        .outcome()
                        .context("submitted session has no outcome");
                }
                Err(e) => error = e,
            },
            "quit" => anyhow::bail!("exam submitted but the result was not recorded"),
            other => terminal.say(format_args!("unknown command: {other}")),
        }
    }
}

fn print_outcome(exam: &Exam, outcome: &AttemptOutcome) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Exam", "Correct", "Score", "Verdict"]);
    table.add_row(vec![
        Cell::new(&exam.title),
        Cell::new(format!("{} / {}", outcome.tally.correct, outcome.tally.total)),
        Cell::new(format!("{}%", outcome.score)),
        Cell::new(outcome.verdict),
    ]);

    println!("\n{table}");

    let explanations: Vec<String> = exam
        .questions
        .iter()
        .enumerate()
        .filter_map(|(i, q)| {
            let explanation = q.explanation.as_deref()?;
            Some(format!(
                "  Q{} ({}): {explanation}",
                i + 1,
                choice_letter(q.correct_answer)
            ))
        })
        .collect();
    if !explanations.is_empty() {
        println!("\nExplanations:");
        for line in explanations {
            println!("{line}");
        }
    }
}
