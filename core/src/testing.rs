//! Scripted capabilities for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;

use crate::dns::ReverseDns;
use crate::system::CommandRunner;

/// Answers commands from a table keyed by the full command line.
#[derive(Default)]
pub struct FakeRunner {
    outputs: HashMap<String, String>,
    programs: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn with_output(mut self, command_line: &str, output: &str) -> Self {
        if let Some(program) = command_line.split_whitespace().next() {
            self.programs.insert(program.to_string());
        }
        self.outputs.insert(command_line.to_string(), output.to_string());
        self
    }

    pub fn with_program(mut self, program: &str) -> Self {
        self.programs.insert(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, program: &str, args: &[&str]) -> String {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());
        line
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn output(&self, program: &str, args: &[&str], _timeout: Duration) -> Option<String> {
        let line = self.record(program, args);
        self.outputs.get(&line).cloned()
    }

    async fn stream(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
        on_line: &mut (dyn FnMut(&str) + Send),
    ) -> anyhow::Result<()> {
        let line = self.record(program, args);
        let Some(out) = self.outputs.get(&line) else {
            bail!("{program} not found");
        };
        for l in out.lines() {
            on_line(l);
        }
        Ok(())
    }

    fn has_program(&self, program: &str) -> bool {
        self.programs.contains(program)
    }
}

#[derive(Default)]
pub struct FakeDns {
    pub names: HashMap<String, String>,
}

impl FakeDns {
    pub fn with(mut self, ip: &str, name: &str) -> Self {
        self.names.insert(ip.to_string(), name.to_string());
        self
    }
}

#[async_trait]
impl ReverseDns for FakeDns {
    async fn reverse(&self, ip: &str) -> String {
        self.names.get(ip).cloned().unwrap_or_default()
    }

    async fn resolve(&self, name: &str) -> Option<String> {
        if name.parse::<std::net::Ipv4Addr>().is_ok() {
            return Some(name.to_string());
        }
        self.names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(ip, _)| ip.clone())
    }
}
