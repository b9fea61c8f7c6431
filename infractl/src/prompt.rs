use std::io::{self, BufRead, Write};

use anyhow::Context;
use infractl_core::validation::validate_network_block;
use log::debug;

/// Where interactive answers come from.
pub trait OperatorInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;

    /// Reads without echoing when possible.
    fn read_secret(&mut self, prompt: &str) -> io::Result<String>;

    /// Shows a line to the operator.
    fn notify(&mut self, message: &str);
}

/// The controlling terminal, falling back to plain stdin when there's none.
pub struct TerminalInput;

impl OperatorInput for TerminalInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;

        Ok(line.trim().to_owned())
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
        match rpassword::prompt_password(prompt) {
            Ok(secret) => Ok(secret.trim().to_owned()),
            Err(error) => {
                debug!("Masked input unavailable ({error}), reading visibly...");
                self.read_line(prompt)
            }
        }
    }

    fn notify(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Returns the provided value, asking for it when missing.
pub fn value_or_prompt(
    input: &mut impl OperatorInput,
    provided: Option<String>,
    prompt: &str,
) -> anyhow::Result<String> {
    match provided {
        Some(value) => Ok(value),
        None => input
            .read_line(prompt)
            .with_context(|| format!("Couldn't read '{}'!", prompt.trim_end())),
    }
}

pub fn secret_or_prompt(
    input: &mut impl OperatorInput,
    provided: Option<String>,
    prompt: &str,
) -> anyhow::Result<String> {
    match provided {
        Some(value) => Ok(value),
        None => input
            .read_secret(prompt)
            .with_context(|| format!("Couldn't read '{}'!", prompt.trim_end())),
    }
}

/// Asks for the network block until a valid one is entered.
///
/// A block passed on the command line isn't re-prompted, it's validated with the rest
/// of the configuration.
pub fn network_block_or_prompt(
    input: &mut impl OperatorInput,
    provided: Option<String>,
) -> anyhow::Result<String> {
    if let Some(value) = provided {
        return Ok(value);
    }

    loop {
        let value = value_or_prompt(input, None, "Network CIDR (e.g. 192.168.100.0/24): ")?;

        match validate_network_block(&value) {
            Ok(_) => return Ok(value),
            Err(error) => {
                input.notify(&format!("Invalid CIDR: {error}"));
                input.notify("  Please enter a valid private network CIDR (e.g. 192.168.100.0/24)");
            }
        }
    }
}
