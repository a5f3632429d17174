use anyhow::{Context, Result};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Save,
    Delete,
}

/// A yes/no question asked before a destructive step.
#[derive(Debug, Clone)]
pub struct Question {
    pub step: Step,
    pub path: PathBuf,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Step::Save => write!(
                f,
                "Do you want to save the updated file to '{}'? (y/n): ",
                self.path.display()
            ),
            Step::Delete => write!(
                f,
                "Do you want to delete the original file '{}'? (y/n): ",
                self.path.display()
            ),
        }
    }
}

pub trait Confirm {
    fn confirm(&self, question: &Question) -> Result<bool>;
}

/// Only `y` (any case, surrounding whitespace ignored) affirms.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Asks on stdout and reads the answer from stdin. EOF counts as "no".
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &Question) -> Result<bool> {
        let mut out = std::io::stdout().lock();
        write!(out, "{question}")?;
        out.flush()?;

        let mut line = String::new();
        let n = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .with_context(|| "reading confirmation")?;
        if n == 0 {
            return Ok(false);
        }
        Ok(is_affirmative(&line))
    }
}
