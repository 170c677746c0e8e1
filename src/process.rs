//! Command-backed lister and generator.
//!
//! Drives an external generator program. The listing protocol is line based:
//! the first stdout line is the generator version (`major.minor`), every
//! further line is `<module>\t<path>\t<size>\t<mtime seconds>`.

use crate::collaborators::{BinaryLister, Generator};
use crate::environment::Environment;
use crate::error::RefreshError;
use crate::types::{BinaryModule, Listing};
use crate::version::from_version_string;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Environment variable carrying the extra module search path.
pub const EXTRA_PATH_ENV: &str = "STUBCACHE_EXTRA_PATH";
/// Environment variable carrying the runtime home.
pub const RUNTIME_HOME_ENV: &str = "STUBCACHE_RUNTIME_HOME";

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How to invoke the external generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorCommandConfig {
    /// Program to run, usually the runtime's interpreter.
    #[serde(default)]
    pub program: Option<PathBuf>,

    /// Leading arguments, usually the generator script.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra arguments selecting the listing mode.
    #[serde(default = "default_list_args")]
    pub list_args: Vec<String>,

    /// Extra arguments selecting built-in namespace generation.
    #[serde(default = "default_builtins_args")]
    pub builtins_args: Vec<String>,

    /// Wall-clock limit per generator invocation. `0` disables the limit.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

fn default_list_args() -> Vec<String> {
    vec!["-L".to_string()]
}

fn default_builtins_args() -> Vec<String> {
    vec!["-b".to_string()]
}

fn default_timeout_secs() -> Option<u64> {
    Some(DEFAULT_TIMEOUT_SECS)
}

impl Default for GeneratorCommandConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            list_args: default_list_args(),
            builtins_args: default_builtins_args(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// External generator bound to one cache directory.
pub struct ProcessGenerator {
    program: PathBuf,
    config: GeneratorCommandConfig,
    cache_dir: PathBuf,
}

impl ProcessGenerator {
    pub fn new(config: GeneratorCommandConfig, cache_dir: impl Into<PathBuf>) -> Result<Self, RefreshError> {
        let program = config
            .program
            .clone()
            .ok_or_else(|| RefreshError::Config("generator.program is not set".to_string()))?;
        Ok(Self {
            program,
            config,
            cache_dir: cache_dir.into(),
        })
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.config.args);
        command
    }

    fn timeout(&self) -> Option<Duration> {
        self.config
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Run `command` to completion. `None` means it outlived the configured
    /// timeout and was killed.
    fn run(&self, mut command: Command, what: &str) -> Result<Option<Output>, RefreshError> {
        debug!(?command, "Running generator");
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command
            .spawn()
            .map_err(|e| RefreshError::Collaborator(format!("{} failed to start: {}", what, e)))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let waited = match self.timeout() {
            Some(limit) => wait_with_deadline(&mut child, limit),
            None => child.wait().map(Some),
        };
        let status = waited
            .map_err(|e| RefreshError::Collaborator(format!("{} could not be awaited: {}", what, e)))?;
        let Some(status) = status else {
            warn!(
                timeout_secs = ?self.config.timeout_secs,
                "{} timed out and was killed", what
            );
            return Ok(None);
        };
        Ok(Some(Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        }))
    }
}

/// Poll `child` until it exits or `limit` elapses; on expiry the child is
/// killed and reaped.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a child pipe on its own thread so a full pipe never stalls the child.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

impl BinaryLister for ProcessGenerator {
    fn list(&self, env: &Environment, extra_search_path: &str) -> Result<Listing, RefreshError> {
        let mut command = self.command();
        command
            .args(&self.config.list_args)
            .env(EXTRA_PATH_ENV, extra_search_path)
            .env(RUNTIME_HOME_ENV, &env.home);
        let output = self.run(command, "Binary listing")?.ok_or_else(|| {
            RefreshError::Collaborator("Binary listing timed out".to_string())
        })?;
        if !output.status.success() {
            return Err(RefreshError::Collaborator(format!(
                "Binary listing exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_listing(&String::from_utf8_lossy(&output.stdout))
    }
}

impl Generator for ProcessGenerator {
    fn generate(
        &self,
        module_name: &str,
        origin_path: Option<&str>,
        extra_search_path: &str,
        environment_root: &Path,
    ) -> Result<bool, RefreshError> {
        let mut command = self.command();
        command
            .arg("-d")
            .arg(&self.cache_dir)
            .arg("-s")
            .arg(extra_search_path)
            .arg(module_name)
            .args(origin_path)
            .env(RUNTIME_HOME_ENV, environment_root);
        let Some(output) = self.run(command, "Stub generation")? else {
            return Ok(false);
        };
        if !output.status.success() {
            debug!(
                module = module_name,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Generator reported failure"
            );
        }
        Ok(output.status.success())
    }

    fn generate_builtins(&self, env: &Environment) -> Result<bool, RefreshError> {
        let mut command = self.command();
        command
            .args(&self.config.builtins_args)
            .arg("-d")
            .arg(&self.cache_dir)
            .env(RUNTIME_HOME_ENV, &env.home);
        let output = self.run(command, "Built-in stub generation")?;
        Ok(output.is_some_and(|output| output.status.success()))
    }
}

/// Parse listing output. Malformed module lines are logged and skipped;
/// an unreadable version line fails the listing.
pub fn parse_listing(stdout: &str) -> Result<Listing, RefreshError> {
    let mut lines = stdout.lines();
    let version_line = lines
        .next()
        .ok_or_else(|| RefreshError::Collaborator("Empty binary listing".to_string()))?;
    let generator_version = from_version_string(version_line);
    if generator_version == 0 {
        return Err(RefreshError::Collaborator(format!(
            "Bad generator version line '{}'",
            version_line
        )));
    }

    let mut listing = Listing::new(generator_version);
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_module_line(line) {
            Some(module) => {
                listing.modules.insert(module.name.clone(), module);
            }
            None => warn!(line, "Skipping malformed binary listing line"),
        }
    }
    Ok(listing)
}

fn parse_module_line(line: &str) -> Option<BinaryModule> {
    let mut fields = line.split('\t');
    let name = fields.next()?;
    let path = fields.next()?;
    let size = fields.next()?.parse::<u64>().ok()?;
    let modified_secs = fields.next()?.parse::<i64>().ok()?;
    if name.is_empty() || path.is_empty() {
        return None;
    }
    Some(BinaryModule::new(name, path, size, modified_secs.checked_mul(1000)?))
}
