//! Explicit command table, owned by `run()` and passed by reference.

use std::collections::BTreeMap;

use super::shell::ShellContext;

/// Command handler: parsed arguments in, printable output or error message out
pub type Handler = fn(&ShellContext, &[String]) -> Result<String, String>;

/// Words that end the session
pub const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

struct Command {
    usage: &'static str,
    description: &'static str,
    handler: Handler,
}

/// Result of dispatching one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Output(String),
    /// The handler ran and reported an error
    Failed(String),
    Exit,
    NotFound(String),
    /// Blank line
    Empty,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &'static str,
        usage: &'static str,
        description: &'static str,
        handler: Handler,
    ) {
        self.commands.insert(
            name,
            Command {
                usage,
                description,
                handler,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Sorted command list with usage and description
    pub fn help(&self) -> String {
        let width = self
            .commands
            .values()
            .map(|c| c.usage.len())
            .max()
            .unwrap_or(0)
            .max("help".len());
        let mut out = String::from("Available commands:\n");
        out.push_str(&format!("  {:<width$}  {}\n", "help", "Show this list"));
        for command in self.commands.values() {
            out.push_str(&format!("  {:<width$}  {}\n", command.usage, command.description));
        }
        out.push_str(&format!("  {:<width$}  {}", EXIT_WORDS.join("|"), "Leave the shell"));
        out
    }

    pub fn dispatch(&self, ctx: &ShellContext, line: &str) -> Dispatch {
        let words = split_words(line);
        let Some((name, args)) = words.split_first() else {
            return Dispatch::Empty;
        };

        if EXIT_WORDS.contains(&name.as_str()) {
            return Dispatch::Exit;
        }
        if name == "help" {
            return Dispatch::Output(self.help());
        }

        match self.commands.get(name.as_str()) {
            Some(command) => {
                tracing::debug!(command = %name, args = ?args, "Dispatching");
                match (command.handler)(ctx, args) {
                    Ok(output) => Dispatch::Output(output),
                    Err(message) => Dispatch::Failed(message),
                }
            }
            None => Dispatch::NotFound(name.clone()),
        }
    }
}

/// Split on whitespace, keeping single- or double-quoted runs together
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;
    use crate::history::ActionLog;

    fn echo(_ctx: &ShellContext, args: &[String]) -> Result<String, String> {
        Ok(args.join(","))
    }

    fn fail(_ctx: &ShellContext, _args: &[String]) -> Result<String, String> {
        Err("nope".to_string())
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register("echo", "echo <words>", "Repeat the arguments", echo);
        registry.register("fail", "fail", "Always fails", fail);
        registry
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("  mv a  b "), vec!["mv", "a", "b"]);
        assert_eq!(
            split_words(r#"mv "my file.txt" 'other name'"#),
            vec!["mv", "my file.txt", "other name"]
        );
        assert_eq!(split_words(r#"find . """#), vec!["find", ".", ""]);
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn test_dispatch() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = ShellContext::new(ShellConfig::default(), runtime.handle().clone(), ActionLog::new());
        let registry = registry();

        assert_eq!(registry.dispatch(&ctx, ""), Dispatch::Empty);
        assert_eq!(registry.dispatch(&ctx, "echo a b"), Dispatch::Output("a,b".to_string()));
        assert_eq!(registry.dispatch(&ctx, "fail"), Dispatch::Failed("nope".to_string()));
        assert_eq!(registry.dispatch(&ctx, "quit"), Dispatch::Exit);
        assert_eq!(
            registry.dispatch(&ctx, "frobnicate"),
            Dispatch::NotFound("frobnicate".to_string())
        );
        assert!(registry.contains("echo"));
    }

    #[test]
    fn test_help_is_sorted() {
        let help = registry().help();
        let echo = help.find("echo <words>").unwrap();
        let fail = help.find("Always fails").unwrap();
        assert!(echo < fail);
        assert!(help.contains("exit|quit|q"));
    }
}
