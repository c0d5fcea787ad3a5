use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{MuxError, Result};

/// Asks the user yes/no questions
pub trait Prompter {
    /// `None` when nobody is there to answer
    fn confirm(&mut self, question: &str) -> Option<bool>;
}

/// Prompts on stderr and reads the answer from stdin, only when stdin is a terminal
pub struct TerminalPrompter {
    interactive: bool,
}

impl TerminalPrompter {
    pub fn new(silent: bool) -> Self {
        Self {
            interactive: !silent && io::stdin().is_terminal(),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, question: &str) -> Option<bool> {
        if !self.interactive {
            return None;
        }

        let mut stderr = io::stderr();
        write!(stderr, "{} [y/N]: ", question).ok()?;
        stderr.flush().ok()?;

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(parse_answer(&answer)),
        }
    }
}

fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// Nothing was there
    Fresh,
    /// A previous file was deleted
    Replaced,
}

/// Make room for `output`.
///
/// `force` deletes an existing file without asking. Otherwise the prompter
/// decides; a refusal or an unanswerable prompt leaves the file alone and
/// fails with `OutputExists`.
pub fn prepare_output(output: &Path, force: bool, prompter: &mut dyn Prompter) -> Result<OutputState> {
    if !output.exists() {
        return Ok(OutputState::Fresh);
    }

    let replace = force
        || match prompter.confirm(&format!("Output file {} exists. Overwrite?", output.display())) {
            Some(answer) => {
                if !answer {
                    warn!("Keeping existing output file: {}", output.display());
                }
                answer
            }
            None => {
                warn!("Output file exists and no one can confirm overwriting: {}", output.display());
                false
            }
        };

    if !replace {
        return Err(MuxError::OutputExists(output.to_path_buf()));
    }

    std::fs::remove_file(output)?;
    info!("Deleted existing output file: {}", output.display());
    Ok(OutputState::Replaced)
}
