use std::path::Path;

use anyhow::{
    Context as _,
    Result,
};
use clap::{
    CommandFactory,
    ValueEnum,
};
use log::{
    info,
    warn,
};
use rustyline::{
    CompletionType,
    Config,
    Context,
    Editor,
    Helper,
    completion::{
        Completer,
        Pair,
    },
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::DefaultHistory,
    validate::Validator,
};

use crate::{
    command::CommandLine,
    config::ReplConfig,
    path::EntityKind,
    shell::{
        Outcome,
        Shell,
    },
};

const PROMPT: &str = "wamp> ";
const KIND_COMMANDS: [&str; 3] = ["show", "list", "wait"];

/// Completes command names, entity kinds, and entity paths.
struct ReplHelper {
    commands: Vec<String>,
    paths: Vec<String>,
}

impl ReplHelper {
    fn new() -> Self {
        let mut commands = CommandLine::command()
            .get_subcommands()
            .map(|command| command.get_name().to_owned())
            .collect::<Vec<_>>();
        commands.push("help".to_owned());
        commands.sort();
        Self {
            commands,
            paths: Vec::new(),
        }
    }

    fn completions(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let start = line[..pos]
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let word = &line[start..pos];
        let previous = line[..start].split_whitespace().collect::<Vec<_>>();
        let candidates: Vec<&str> = match previous.as_slice() {
            [] => self.commands.iter().map(String::as_str).collect(),
            [command] if KIND_COMMANDS.contains(command) => EntityKind::value_variants()
                .iter()
                .map(EntityKind::as_str)
                .collect(),
            _ => self.paths.iter().map(String::as_str).collect(),
        };
        let completions = candidates
            .into_iter()
            .filter(|candidate| candidate.starts_with(word))
            .map(|candidate| candidate.to_owned())
            .collect();
        (start, completions)
    }
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let (start, completions) = self.completions(line, pos);
        Ok((
            start,
            completions
                .into_iter()
                .map(|completion| Pair {
                    display: completion.clone(),
                    replacement: completion,
                })
                .collect(),
        ))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

impl Helper for ReplHelper {}

/// The interactive loop around a [`Shell`].
pub struct Repl {
    shell: Shell,
    config: ReplConfig,
    editor: Editor<ReplHelper, DefaultHistory>,
}

impl Repl {
    pub fn new(shell: Shell, config: ReplConfig) -> Result<Self> {
        let mut editor = Editor::with_config(
            Config::builder()
                .completion_type(CompletionType::List)
                .auto_add_history(false)
                .build(),
        )?;
        editor.set_helper(Some(ReplHelper::new()));
        Ok(Self {
            shell,
            config,
            editor,
        })
    }

    /// Runs the startup script, then reads lines until the operator exits.
    pub async fn run(mut self) -> Result<()> {
        self.load_history();
        let mut exit = false;
        if let Some(script) = self.config.startup_script.clone() {
            exit = self.run_script(&script).await?;
        }
        while !exit {
            let line = match tokio::task::block_in_place(|| self.editor.readline(PROMPT)) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    self.save_history();
                    return Err(err.into());
                }
            };
            if !line.trim().is_empty() {
                self.editor.add_history_entry(line.as_str())?;
            }
            exit = self.execute(&line).await;
        }
        self.save_history();
        Ok(())
    }

    /// Runs a line, printing its output or error. Returns whether the shell should exit.
    async fn execute(&mut self, line: &str) -> bool {
        let exit = match self.shell.execute_line(line).await {
            Ok(Outcome::Exit) => true,
            Ok(Outcome::Output(output)) => {
                if !output.is_empty() {
                    println!("{output}");
                }
                false
            }
            Err(err) => {
                eprintln!("error: {err:#}");
                false
            }
        };
        let paths = self.shell.paths().await;
        if let Some(helper) = self.editor.helper_mut() {
            helper.paths = paths;
        }
        exit
    }

    async fn run_script(&mut self, path: &Path) -> Result<bool> {
        let script = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read startup script {}", path.display()))?;
        info!("Running startup script {}", path.display());
        for line in script.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            println!("{PROMPT}{line}");
            if self.execute(line).await {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn load_history(&mut self) {
        let Some(path) = &self.config.history_file else {
            return;
        };
        if !path.exists() {
            return;
        }
        if let Err(err) = self.editor.load_history(path) {
            warn!("Failed to load history from {}: {err}", path.display());
        }
    }

    fn save_history(&mut self) {
        let Some(path) = &self.config.history_file else {
            return;
        };
        if let Some(dir) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(dir) {
                warn!("Failed to create history directory {}: {err}", dir.display());
                return;
            }
        }
        if let Err(err) = self.editor.save_history(path) {
            warn!("Failed to save history to {}: {err}", path.display());
        }
    }
}
