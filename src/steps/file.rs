//! Reading, rewriting and installing files inside containers

use anyhow::{Context, Result};
use playbook::{Outcome, Step, StepContext};
use regex::Regex;
use std::io::Write;
use std::sync::Arc;

use super::{ContainerRef, Target, remote_temp_path};

/// Rewrites one line; called with `(line, key, value)`, where key and value
/// are empty for lines that are not `key<delimiter>value`
pub type Mutate = Arc<dyn Fn(&str, &str, &str) -> Result<String> + Send + Sync>;

/// Regex splitting `key<delimiter>value` lines
pub fn kv_regex(delimiter: &str) -> Result<Regex> {
    let d = regex::escape(delimiter);
    Regex::new(&format!(r"^(([^{d}]+){d}\s*)([^\s#]*)"))
        .with_context(|| format!("invalid delimiter {delimiter:?}"))
}

/// Split a config line into key and value
pub fn kv_split(regex: &Regex, line: &str) -> Option<(String, String)> {
    let caps = regex.captures(line)?;
    let key = caps.get(2)?.as_str().trim().to_string();
    let value = caps.get(3).map_or("", |m| m.as_str()).to_string();
    Some((key, value))
}

/// Run every line of `input` through `mutate`
pub fn filter(input: &str, delimiter: &str, mutate: &Mutate) -> Result<String> {
    let regex = kv_regex(delimiter)?;
    let mut output = Vec::new();
    for line in input.lines() {
        let (key, value) = kv_split(&regex, line).unwrap_or_default();
        output.push(mutate(line, &key, &value)?);
    }
    Ok(output.join("\n"))
}

/// Copy a file out of a container; returns its content
pub fn read_from_container(target: &Target, container: &str, path: &str) -> Result<String> {
    let remote = remote_temp_path();
    target
        .exec(&format!("{} cp {container}:{path} {remote}", target.engine()))
        .with_context(|| format!("copy {path} out of container failed"))?;

    let local = tempfile::NamedTempFile::new()?;
    let result = target.download(&remote, local.path());
    let _ = target.exec(&format!("rm -f {remote}"));
    result?;

    std::fs::read_to_string(local.path()).context("downloaded file is not UTF-8")
}

/// Copy `content` into a container at `path`
pub fn install_into_container(target: &Target, container: &str, path: &str, content: &str) -> Result<()> {
    let mut local = tempfile::NamedTempFile::new()?;
    local.write_all(content.as_bytes())?;
    local.flush()?;

    let remote = remote_temp_path();
    target.upload(local.path(), &remote)?;
    let result = target
        .exec(&format!("{} cp {remote} {container}:{path}", target.engine()))
        .with_context(|| format!("copy into container {path} failed"));
    let _ = target.exec(&format!("rm -f {remote}"));
    result.map(drop)
}

/// Writes fixed content into a container
pub struct InstallFile {
    pub container: ContainerRef,
    pub path: String,
    pub content: String,
}

impl Step<Target> for InstallFile {
    fn name(&self) -> &str {
        "install file"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        self.container
            .resolve(ctx)
            .and_then(|id| install_into_container(ctx.env(), &id, &self.path, &self.content))
            .into()
    }
}

/// Read a template, rewrite it line by line and install the result
pub struct SyncFile {
    pub container: ContainerRef,
    pub source: String,
    pub dest: String,
    pub delimiter: &'static str,
    pub mutate: Mutate,
}

impl Step<Target> for SyncFile {
    fn name(&self) -> &str {
        "sync file"
    }

    fn execute(&self, ctx: &mut StepContext<'_, Target>) -> Outcome {
        let run = || -> Result<()> {
            let id = self.container.resolve(ctx)?;
            let target = ctx.env();
            let input = read_from_container(target, &id, &self.source)?;
            let output = filter(&input, self.delimiter, &self.mutate)
                .with_context(|| format!("render {} failed", self.dest))?;
            install_into_container(target, &id, &self.dest, &output)
        };
        run().into()
    }
}
