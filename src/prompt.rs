// 💬 Prompt Surface - asking the user before records are created
//
// The resolver never talks to a terminal or a dialog directly. It receives
// something implementing `Prompt`, so the same flow runs against a real
// terminal, a scripted list of answers, or a batch job that declines
// everything.

use std::collections::VecDeque;

/// Synchronous yes/no confirmation and single-line text input
pub trait Prompt {
    /// Ask a yes/no question. `false` means declined.
    fn confirm(&mut self, message: &str) -> bool;

    /// Ask for one line of text. `None` means the user cancelled.
    fn prompt_text(&mut self, message: &str) -> Option<String>;
}

// ============================================================================
// SCRIPTED PROMPT
// ============================================================================

/// Answers questions from pre-recorded responses, in order.
///
/// Once a script runs dry, confirmations are declined and text prompts are
/// cancelled. Every message asked is kept in `asked`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    confirms: VecDeque<bool>,
    answers: VecDeque<Option<String>>,
    pub asked: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirming(mut self, answer: bool) -> Self {
        self.confirms.push_back(answer);
        self
    }

    pub fn answering(mut self, text: &str) -> Self {
        self.answers.push_back(Some(text.to_string()));
        self
    }

    pub fn cancelling(mut self) -> Self {
        self.answers.push_back(None);
        self
    }

    /// True when every scripted response has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.confirms.is_empty() && self.answers.is_empty()
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&mut self, message: &str) -> bool {
        self.asked.push(message.to_string());
        self.confirms.pop_front().unwrap_or(false)
    }

    fn prompt_text(&mut self, message: &str) -> Option<String> {
        self.asked.push(message.to_string());
        self.answers.pop_front().flatten()
    }
}

// ============================================================================
// NON-INTERACTIVE
// ============================================================================

/// Declines every confirmation and cancels every text prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl Prompt for NonInteractive {
    fn confirm(&mut self, message: &str) -> bool {
        tracing::warn!(%message, "declining confirmation in non-interactive mode");
        false
    }

    fn prompt_text(&mut self, message: &str) -> Option<String> {
        tracing::warn!(%message, "cancelling prompt in non-interactive mode");
        None
    }
}

// ============================================================================
// TERMINAL PROMPT
// ============================================================================

#[cfg(feature = "tui")]
pub use terminal::TerminalPrompt;

#[cfg(feature = "tui")]
mod terminal {
    use super::Prompt;
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
        execute,
        style::Print,
        terminal::{disable_raw_mode, enable_raw_mode},
    };
    use std::io::{self, Write};

    /// Reads answers from the terminal in raw mode.
    ///
    /// `y` confirms; any other key declines. Text input supports Backspace,
    /// Enter submits, Esc or Ctrl-C cancels.
    #[derive(Debug, Default)]
    pub struct TerminalPrompt;

    impl TerminalPrompt {
        pub fn new() -> Self {
            TerminalPrompt
        }

        fn read_confirm(&self, message: &str) -> io::Result<bool> {
            let mut stdout = io::stdout();
            execute!(stdout, Print(format!("{} [y/N] ", message)))?;

            enable_raw_mode()?;
            let answer = loop {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    break matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y'));
                }
            };
            disable_raw_mode()?;

            execute!(stdout, Print(if answer { "y\r\n" } else { "n\r\n" }))?;
            Ok(answer)
        }

        fn read_line(&self, message: &str) -> io::Result<Option<String>> {
            let mut stdout = io::stdout();
            execute!(stdout, Print(format!("{} ", message)))?;

            let mut line = String::new();
            enable_raw_mode()?;
            let result = loop {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match key.code {
                    KeyCode::Enter => break Some(line),
                    KeyCode::Esc => break None,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        break None
                    }
                    KeyCode::Backspace => {
                        if line.pop().is_some() {
                            execute!(stdout, Print("\u{8} \u{8}"))?;
                        }
                    }
                    KeyCode::Char(c) => {
                        line.push(c);
                        execute!(stdout, Print(c))?;
                    }
                    _ => {}
                }
            };
            disable_raw_mode()?;

            execute!(stdout, Print("\r\n"))?;
            stdout.flush()?;
            Ok(result)
        }
    }

    impl Prompt for TerminalPrompt {
        fn confirm(&mut self, message: &str) -> bool {
            self.read_confirm(message).unwrap_or_else(|e| {
                let _ = disable_raw_mode();
                tracing::warn!(error = %e, "terminal confirmation failed, treating as declined");
                false
            })
        }

        fn prompt_text(&mut self, message: &str) -> Option<String> {
            self.read_line(message).unwrap_or_else(|e| {
                let _ = disable_raw_mode();
                tracing::warn!(error = %e, "terminal prompt failed, treating as cancelled");
                None
            })
        }
    }
}
