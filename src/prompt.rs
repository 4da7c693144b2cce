use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};

use crate::data::filter::{
    validate, City, DayFilter, MonthFilter, Selection, CITY_CHOICES, DAY_CHOICES, MONTH_CHOICES,
};

/// Line-oriented console over any reader/writer pair.
///
/// The session runs on stdin/stdout; tests drive it with in-memory buffers.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Console { input, output }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    pub fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}").context("writing to console")
    }

    /// Print `prompt` and read one line, trimmed and lower-cased.
    /// `None` once the input is closed.
    pub fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}").context("writing to console")?;
        self.output.flush().context("flushing console")?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("reading console input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_lowercase()))
    }

    /// Re-prompt until the answer is one of `allowed`.
    pub fn ask_choice(
        &mut self,
        prompt: &str,
        allowed: &[&'static str],
        rejection: &str,
    ) -> Result<&'static str> {
        loop {
            let Some(answer) = self.ask(prompt)? else {
                bail!("input closed while waiting for an answer to '{}'", prompt.trim());
            };
            if let Some(choice) = validate(&answer, allowed) {
                return Ok(choice);
            }
            log::debug!("Rejected input {answer:?}");
            self.say(rejection)?;
        }
    }

    /// `true` only for an explicit "yes"; closed input counts as "no".
    pub fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(self.ask(prompt)?.as_deref() == Some("yes"))
    }

    /// Collect a full city/month/day selection.
    pub fn collect_selection(&mut self) -> Result<Selection> {
        self.say("\nWelcome to the Bike Data Analysis Project! 🚴")?;
        let city = self.ask_choice(
            "Choose a city (chicago / new york / washington): ",
            &CITY_CHOICES,
            "❌ Invalid city name.",
        )?;
        let month = self.ask_choice(
            "Choose a month (january - june) or all: ",
            &MONTH_CHOICES,
            "❌ Invalid month name.",
        )?;
        let day = self.ask_choice(
            "Choose a day of the week or all: ",
            &DAY_CHOICES,
            "❌ Invalid day name.",
        )?;

        Ok(Selection {
            city: city.parse::<City>()?,
            month: month.parse::<MonthFilter>()?,
            day: day.parse::<DayFilter>()?,
        })
    }
}
