// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::session::Session;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Keystroke that operates on the whole sheet instead of the cursor.
pub const PREFIX_WHOLE: &str = "g";
/// Keystroke that operates at reduced granularity.
pub const PREFIX_FINE: &str = "z";

const MAX_ALIAS_HOPS: usize = 8;

/// Buffered modifier prefixes. Pressing the same prefix twice, or two
/// prefixes in either order, yields the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prefixes {
    pub whole: bool,
    pub fine: bool,
}

impl Prefixes {
    /// Absorb a keystroke if it is a prefix; returns whether it was.
    pub fn absorb(&mut self, keystroke: &str) -> bool {
        match keystroke {
            PREFIX_WHOLE => {
                self.whole = true;
                true
            }
            PREFIX_FINE => {
                self.fine = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(self) -> bool {
        !self.whole && !self.fine
    }

    /// Normalized label: whole-sheet prefix before fine prefix.
    pub fn label(self) -> String {
        let mut label = String::new();
        if self.whole {
            label.push_str(PREFIX_WHOLE);
        }
        if self.fine {
            label.push_str(PREFIX_FINE);
        }
        label
    }

    pub fn apply_to(self, keystroke: &str) -> String {
        format!("{}{keystroke}", self.label())
    }
}

/// Execution context handed to every command: the live session (cursor
/// state read through it reflects earlier steps of the same sequence)
/// and the keystroke that triggered the command.
pub struct ExecCtx<'a> {
    pub session: &'a mut Session,
    pub keystroke: String,
    pub prefixes: Prefixes,
}

pub type CommandFn = Arc<dyn Fn(&mut ExecCtx) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub help: String,
    run: CommandFn,
}

impl Command {
    pub fn run(&self, ctx: &mut ExecCtx) -> Result<()> {
        (self.run)(ctx)
    }
}

/// The global command table: long names to commands, keystrokes to long
/// names, and name-to-name aliases. Built once at startup and sealed;
/// sheets layer their own keystroke bindings on top.
pub struct CommandSet {
    commands: HashMap<String, Command>,
    binds: HashMap<String, String>,
    aliases: HashMap<String, String>,
}

impl CommandSet {
    pub fn builder() -> CommandSetBuilder {
        CommandSetBuilder {
            set: Self {
                commands: HashMap::new(),
                binds: HashMap::new(),
                aliases: HashMap::new(),
            },
        }
    }

    /// Resolve a keystroke sequence, consulting the sheet-local binding
    /// first, then the global table, then chasing aliases a bounded
    /// number of hops (a cycle is a configuration bug, not something to
    /// loop on).
    pub fn resolve(&self, sheet_binding: Option<&str>, keyseq: &str) -> Option<&Command> {
        let mut name = sheet_binding.or_else(|| self.binds.get(keyseq).map(String::as_str))?;
        for _ in 0..MAX_ALIAS_HOPS {
            if let Some(command) = self.commands.get(name) {
                return Some(command);
            }
            name = self.aliases.get(name)?.as_str();
        }
        None
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// (keystroke, command name) pairs, for the help sheet.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.binds
            .iter()
            .map(|(keyseq, name)| (keyseq.as_str(), name.as_str()))
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }
}

pub struct CommandSetBuilder {
    set: CommandSet,
}

impl CommandSetBuilder {
    pub fn command<F>(mut self, name: &str, help: &str, run: F) -> Self
    where
        F: Fn(&mut ExecCtx) -> Result<()> + Send + Sync + 'static,
    {
        self.set.commands.insert(
            name.to_owned(),
            Command {
                name: name.to_owned(),
                help: help.to_owned(),
                run: Arc::new(run),
            },
        );
        self
    }

    pub fn bind(mut self, keyseq: &str, command: &str) -> Self {
        self.set.binds.insert(keyseq.to_owned(), command.to_owned());
        self
    }

    pub fn alias(mut self, from: &str, to: &str) -> Self {
        self.set.aliases.insert(from.to_owned(), to.to_owned());
        self
    }

    pub fn build(self) -> Arc<CommandSet> {
        Arc::new(self.set)
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandSet, Prefixes};

    fn sample_set() -> std::sync::Arc<CommandSet> {
        CommandSet::builder()
            .command("cursor-down", "move down", |_ctx| Ok(()))
            .command("select-all", "select every row", |_ctx| Ok(()))
            .bind("j", "cursor-down")
            .bind("Down", "down-alias")
            .alias("down-alias", "cursor-down")
            .bind("gs", "select-all")
            .alias("loop-a", "loop-b")
            .alias("loop-b", "loop-a")
            .bind("x", "loop-a")
            .build()
    }

    #[test]
    fn prefixes_are_order_and_duplicate_insensitive() {
        let mut forward = Prefixes::default();
        assert!(forward.absorb("g"));
        assert!(forward.absorb("z"));
        assert!(forward.absorb("g"));

        let mut backward = Prefixes::default();
        assert!(backward.absorb("z"));
        assert!(backward.absorb("g"));

        assert_eq!(forward, backward);
        assert_eq!(forward.label(), "gz");
        assert_eq!(forward.apply_to("q"), "gzq");
        assert!(!forward.absorb("q"));
    }

    #[test]
    fn keystrokes_resolve_through_binds_and_aliases() {
        let set = sample_set();
        assert_eq!(set.resolve(None, "j").map(|c| c.name.as_str()), Some("cursor-down"));
        assert_eq!(
            set.resolve(None, "Down").map(|c| c.name.as_str()),
            Some("cursor-down")
        );
        assert_eq!(
            set.resolve(None, "gs").map(|c| c.name.as_str()),
            Some("select-all")
        );
        assert!(set.resolve(None, "unbound").is_none());
    }

    #[test]
    fn sheet_binding_shadows_the_global_table() {
        let set = sample_set();
        let resolved = set.resolve(Some("select-all"), "j");
        assert_eq!(resolved.map(|c| c.name.as_str()), Some("select-all"));
    }

    #[test]
    fn alias_cycles_resolve_to_nothing() {
        let set = sample_set();
        assert!(set.resolve(None, "x").is_none());
    }
}
