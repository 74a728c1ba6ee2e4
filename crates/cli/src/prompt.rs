//! Interactive prompts
//!
//! Every prompt gates an optional or destructive action. When no terminal is
//! attached the default answer is used instead of blocking.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};
use flutterkit_core::error::{Error, ErrorCode, Result};
use std::io;

/// Console prompter
#[derive(Debug, Clone, Copy)]
pub struct Prompter {
    interactive: bool,
}

impl Default for Prompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter {
    /// Prompt when a user is attached to the terminal
    pub fn new() -> Self {
        Self {
            interactive: console::user_attended() && console::user_attended_stderr(),
        }
    }

    /// Never prompt; every question takes its default
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Whether prompts reach the user
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Yes/no question
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if !self.interactive {
            return Ok(default);
        }
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    /// Free-text input; an empty answer yields `default`
    pub fn input(&self, prompt: &str, default: &str) -> Result<String> {
        if !self.interactive {
            return Ok(default.to_string());
        }
        let value: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)?;
        let value = value.trim();
        Ok(if value.is_empty() {
            default.to_string()
        } else {
            value.to_string()
        })
    }

    /// Pick one item, returning its index
    pub fn select<S: ToString>(&self, prompt: &str, items: &[S], default: usize) -> Result<usize> {
        if items.is_empty() {
            return Err(Error::invalid_selection("nothing to choose from"));
        }
        let default = default.min(items.len() - 1);
        if !self.interactive {
            return Ok(default);
        }
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    /// Hidden input; fails without a terminal
    pub fn password(&self, prompt: &str) -> Result<String> {
        if !self.interactive {
            return Err(Error::new(
                ErrorCode::InvalidSelection,
                format!("{} requires an interactive terminal", prompt),
            ));
        }
        Password::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .interact()
            .map_err(prompt_error)
    }
}

fn prompt_error(err: dialoguer::Error) -> Error {
    let dialoguer::Error::IO(io_err) = err;
    if io_err.kind() == io::ErrorKind::Interrupted {
        Error::interrupted()
    } else {
        Error::internal(format!("Prompt failed: {}", io_err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_interactive_defaults() {
        let prompter = Prompter::non_interactive();
        assert!(!prompter.is_interactive());
        assert!(prompter.confirm("Install?", true).unwrap());
        assert!(!prompter.confirm("Delete?", false).unwrap());
        assert_eq!(prompter.input("Branch", "main").unwrap(), "main");
        assert_eq!(prompter.select("Pick", &["a", "b"], 1).unwrap(), 1);
    }

    #[test]
    fn test_select_clamps_default() {
        let prompter = Prompter::non_interactive();
        assert_eq!(prompter.select("Pick", &["only"], 5).unwrap(), 0);
    }

    #[test]
    fn test_select_empty_fails() {
        let prompter = Prompter::non_interactive();
        let items: [&str; 0] = [];
        let err = prompter.select("Pick", &items, 0).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSelection);
    }

    #[test]
    fn test_password_requires_terminal() {
        assert!(Prompter::non_interactive().password("Token").is_err());
    }
}
