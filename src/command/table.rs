//! Ordered prefix table
//!
//! Entries are tried in insertion order and the first prefix that matches
//! the start of the command, ignoring ASCII case, wins. Put longer prefixes
//! before shorter ones that share a stem.

use super::handlers;
use super::CommandHandler;

/// Commands this short never match anything
pub const MIN_COMMAND_LEN: usize = 3;

pub struct CommandEntry {
    prefix: String,
    handler: Box<dyn CommandHandler>,
}

impl CommandEntry {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn handler(&self) -> &dyn CommandHandler {
        self.handler.as_ref()
    }

    fn matches(&self, command: &str) -> bool {
        command
            .as_bytes()
            .get(..self.prefix.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(self.prefix.as_bytes()))
    }
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEntry")
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Immutable command registry
#[derive(Debug)]
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    pub fn builder() -> CommandTableBuilder {
        CommandTableBuilder {
            entries: Vec::new(),
        }
    }

    /// The built-in ecmd command set
    pub fn standard() -> Self {
        use handlers::{fs20, network, onewire, portio, rc5, system};

        Self::builder()
            .command("ip ", network::set_ip)
            .command("show mac", network::show_mac)
            .command("show ip", network::show_ip)
            .command("show version", system::show_version)
            .command("mac ", network::set_mac)
            .command("bootloader", system::bootloader)
            .command("reset", system::reset)
            .command("io set ddr", portio::set_ddr)
            .command("io get ddr", portio::get_ddr)
            .command("io set port", portio::set_port)
            .command("io get port", portio::get_port)
            .command("io get pin", portio::get_pin)
            .command("fs20 send", fs20::send)
            .command("fs20 receive", fs20::receive)
            .command("fs20 ws300", fs20::ws300)
            .command("1w list", onewire::list)
            .command("1w get", onewire::get)
            .command("1w convert", onewire::convert)
            .command("ir send", rc5::send)
            .command("ir receive", rc5::receive)
            .build()
    }

    /// Find the handler for a command and the text after its prefix
    pub fn lookup<'c>(&self, command: &'c str) -> Option<(&CommandEntry, &'c str)> {
        if command.len() < MIN_COMMAND_LEN {
            return None;
        }

        self.entries.iter().find_map(|entry| {
            if !entry.matches(command) {
                return None;
            }
            command.get(entry.prefix.len()..).map(|rest| (entry, rest))
        })
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.prefix())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct CommandTableBuilder {
    entries: Vec<CommandEntry>,
}

impl CommandTableBuilder {
    pub fn command(mut self, prefix: impl Into<String>, handler: impl CommandHandler + 'static) -> Self {
        self.entries.push(CommandEntry {
            prefix: prefix.into(),
            handler: Box::new(handler),
        });
        self
    }

    pub fn build(self) -> CommandTable {
        CommandTable {
            entries: self.entries,
        }
    }
}
