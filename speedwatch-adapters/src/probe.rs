//! Speed probe abstraction and the command-line probe.
//!
//! ## Example
//!
//! ```rust,no_run
//! use speedwatch_adapters::{CommandProbe, SpeedProbe};
//!
//! let probe = CommandProbe::builder()
//!     .program("speedtest")
//!     .args(["--format=json", "--accept-license"])
//!     .build();
//!
//! match probe.probe() {
//!     Ok(t) => println!("down {} bit/s, up {} bit/s", t.download_bps, t.upload_bps),
//!     Err(e) => eprintln!("probe failed: {}", e),
//! }
//! ```

use std::fmt::Debug;
use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use speedwatch_types::Throughput;

use crate::ProbeError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Something that can measure network throughput.
///
/// `probe` blocks for as long as the measurement takes. Implementations
/// report raw bits per second; unit conversion happens in the monitor.
pub trait SpeedProbe: Send + Sync + Debug {
    /// Run one measurement.
    fn probe(&self) -> Result<Throughput, ProbeError>;

    /// Returns a human-readable description of the probe.
    fn description(&self) -> &str;
}

/// Runs an external speed test program and parses its JSON output.
///
/// Two output shapes are understood:
///
/// - `speedtest-cli --json`: `{"download": <bit/s>, "upload": <bit/s>, ...}`
/// - Ookla `speedtest --format=json`:
///   `{"download": {"bandwidth": <byte/s>}, "upload": {"bandwidth": <byte/s>}, ...}`
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    description: String,
}

impl CommandProbe {
    /// Create a new builder for configuring the probe.
    pub fn builder() -> CommandProbeBuilder {
        CommandProbeBuilder::default()
    }

    /// The classic `speedtest-cli --json --secure`.
    pub fn speedtest_cli() -> Self {
        Self::builder()
            .program("speedtest-cli")
            .args(["--json", "--secure"])
            .build()
    }

    /// The program this probe runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self) -> Result<Output, ProbeError> {
        let Some(limit) = self.timeout else {
            return Ok(Command::new(&self.program).args(&self.args).output()?);
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + limit;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                // Kill failure means it already exited; reap either way.
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProbeError::Timeout);
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl SpeedProbe for CommandProbe {
    fn probe(&self) -> Result<Throughput, ProbeError> {
        let output = self.run()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_output(&stdout)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for CommandProbe.
#[derive(Debug, Default)]
pub struct CommandProbeBuilder {
    program: Option<String>,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandProbeBuilder {
    /// Set the program to run.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kill the program if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the CommandProbe.
    pub fn build(self) -> CommandProbe {
        let program = self.program.unwrap_or_else(|| "speedtest-cli".to_string());
        let description = if self.args.is_empty() {
            format!("command: {}", program)
        } else {
            format!("command: {} {}", program, self.args.join(" "))
        };
        CommandProbe {
            program,
            args: self.args,
            timeout: self.timeout,
            description,
        }
    }
}

/// Parse speed test JSON output into a raw throughput.
pub fn parse_output(output: &str) -> Result<Throughput, ProbeError> {
    let value: Value =
        serde_json::from_str(output.trim()).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let download = direction_bps(&value, "download")?;
    let upload = direction_bps(&value, "upload")?;

    let throughput = Throughput::new(download, upload);
    if !throughput.is_valid() {
        return Err(ProbeError::Invalid(format!(
            "download={} upload={}",
            download, upload
        )));
    }
    Ok(throughput)
}

fn direction_bps(value: &Value, key: &str) -> Result<f64, ProbeError> {
    match value.get(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ProbeError::Parse(format!("'{}' is not a number", key))),
        // Ookla reports bytes per second
        Some(Value::Object(obj)) => obj
            .get("bandwidth")
            .and_then(Value::as_f64)
            .map(|bytes| bytes * 8.0)
            .ok_or_else(|| ProbeError::Parse(format!("'{}.bandwidth' missing", key))),
        Some(_) => Err(ProbeError::Parse(format!("unexpected type for '{}'", key))),
        None => Err(ProbeError::Parse(format!("missing '{}'", key))),
    }
}
