//! Interactive editor for the fields of one leap.
//!
//! For each recognized field the wizard shows progress, the current value
//! and a description, then reads one line:
//!
//! - empty input keeps the current value (`Skipping`), unless that value
//!   fails validation, in which case the field is prompted again;
//! - other input is validated, reviewed and committed on `y`.
//!
//! After the last field the whole leap is printed as JSON and must be
//! accepted; rejecting it restarts the leap from the original data. The
//! data handed in is not expected to be valid: the wizard is how a broken
//! leap file gets repaired. The accepted data is validated once more.

use std::io::{BufRead, Write};
use std::path::Path;

use serde_json::Value;

use crate::data::ConfData;
use crate::error::ConfError;
use crate::field::ConfField;
use crate::leap::ConfLeap;

/// Position of a leap's fields among all wizard fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardProgress {
    /// Fields handled by earlier leaps.
    pub offset: usize,
    /// Fields across all file-backed leaps.
    pub total: usize,
}

impl WizardProgress {
    pub fn for_leap(leap: ConfLeap) -> Self {
        let mut offset = 0;
        let mut total = 0;
        for other in ConfLeap::FILE_BACKED {
            let count = other.fields().len();
            if other < leap {
                offset += count;
            }
            total += count;
        }
        WizardProgress { offset, total }
    }
}

enum Answer {
    Yes,
    No,
}

/// Wizard over the fields of one leap.
pub struct LeapWizard<'a> {
    leap: ConfLeap,
    path: &'a Path,
    proposals: ConfData,
    progress: WizardProgress,
}

impl<'a> LeapWizard<'a> {
    /// `path` is only shown to the user; the caller persists the result.
    pub fn new(leap: ConfLeap, path: &'a Path) -> Self {
        LeapWizard {
            leap,
            path,
            proposals: ConfData::new(),
            progress: WizardProgress::for_leap(leap),
        }
    }

    /// Values offered as current when a field is absent from the data.
    pub fn with_proposals(mut self, proposals: ConfData) -> Self {
        self.proposals = proposals;
        self
    }

    /// Runs the wizard and returns the accepted data.
    pub fn run(
        &self,
        data: ConfData,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<ConfData, ConfError> {
        let fields = self.leap.fields();
        loop {
            let mut working = data.clone();
            for (index, field) in fields.iter().enumerate() {
                writeln!(output)?;
                writeln!(
                    output,
                    "[{}] field ({}/{} total, {}/{} in leap): {}",
                    self.leap,
                    self.progress.offset + index + 1,
                    self.progress.total,
                    index + 1,
                    fields.len(),
                    field.key()
                )?;
                if let Some(reason) = field.not_wizardable(&working) {
                    writeln!(output, "Not wizardable: {}", reason)?;
                    continue;
                }
                self.edit_field(*field, &mut working, input, output)?;
            }

            let summary = serde_json::to_string_pretty(&working)
                .map_err(|err| ConfError::Prompt(err.into()))?;
            writeln!(output)?;
            writeln!(output, "Summary of [{}] `{}`:", self.leap, self.path.display())?;
            writeln!(output, "{}", summary)?;
            match self.ask_yes_no("Accept? y/n: ", input, output)? {
                Answer::Yes => {
                    // Only fields the wizard cannot edit may still be invalid.
                    for field in &fields {
                        if let Some(value) = working.get(field.key()).filter(|v| !v.is_null()) {
                            field.validate(value)?;
                        }
                    }
                    return Ok(working);
                }
                Answer::No => {
                    writeln!(output, "Restarting [{}]", self.leap)?;
                }
            }
        }
    }

    fn edit_field(
        &self,
        field: ConfField,
        working: &mut ConfData,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), ConfError> {
        writeln!(output, "{}", field.description())?;
        loop {
            let current: Option<Value> = working
                .get(field.key())
                .filter(|value| !value.is_null())
                .or_else(|| self.proposals.get(field.key()))
                .cloned();
            let invalid = current.as_ref().and_then(|value| field.validate(value).err());
            writeln!(output, "Current value: {}", field.review(current.as_ref()))?;
            if let Some(err) = &invalid {
                writeln!(output, "Invalid value: {}", err)?;
            }
            write!(output, "New value (empty to keep): ")?;
            output.flush()?;

            let line = self.read_line(input)?;
            if line.is_empty() {
                if invalid.is_some() {
                    writeln!(output, "A valid value is required")?;
                    continue;
                }
                writeln!(output, "Skipping")?;
                if let Some(value) = current {
                    working.insert(field.key().to_string(), value);
                }
                return Ok(());
            }

            let value = match field.parse_input(&line) {
                Ok(value) => value,
                Err(reason) => {
                    writeln!(output, "Invalid value: {}", reason)?;
                    continue;
                }
            };
            writeln!(output, "Review: {} = {}", field.key(), field.review(Some(&value)))?;
            match self.ask_yes_no("Confirm? y/n: ", input, output)? {
                Answer::Yes => {
                    working.insert(field.key().to_string(), value);
                    return Ok(());
                }
                Answer::No => continue,
            }
        }
    }

    fn ask_yes_no(
        &self,
        prompt: &str,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<Answer, ConfError> {
        loop {
            write!(output, "{}", prompt)?;
            output.flush()?;
            match self.read_line(input)?.as_str() {
                "y" => return Ok(Answer::Yes),
                "n" => return Ok(Answer::No),
                _ => {}
            }
        }
    }

    fn read_line(&self, input: &mut dyn BufRead) -> Result<String, ConfError> {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(ConfError::PromptClosed {
                leap: self.leap.as_str(),
            });
        }
        Ok(line.trim().to_string())
    }
}
