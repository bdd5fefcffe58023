// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    fs,
    io::{self, BufRead},
    path::PathBuf,
    sync::Arc,
};

use clap::{Args, Parser, Subcommand};
use rplog_common_telemetry::{LogFormat, LoggingOptions};
use rplog_error::ErrorExt;
use rplog_reporter::{
    Attachment, LogLevel, LogRecord, Reporter, ReporterConfig, ServiceConfig,
    http::{
        FinishExecutionRq, FinishItemRq, ItemStatus, ItemType, ServiceClient, StartItemRq,
        StartLaunchRq, attributes_from_map,
    },
};
use snafu::{FromString, ResultExt, Whatever};
use tracing::{info, warn};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "rplog",
about = "Report logs to a ReportPortal-compatible service",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Send(SendArgs),
    Attach(AttachArgs),
}

#[derive(Debug, Clone, Args)]
struct LoggingArgs {
    /// Level filter, e.g. `info` or `info,rplog_reporter=debug`.
    #[arg(long, global = true, env = "RPLOG_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write rolling log files to this directory.
    #[arg(long, global = true, env = "RPLOG_LOG_DIR", default_value = "")]
    log_dir: String,

    #[arg(long, global = true)]
    json_logs: bool,
}

impl LoggingArgs {
    fn options(&self) -> LoggingOptions {
        LoggingOptions::builder()
            .dir(self.log_dir.clone())
            .maybe_level(self.log_level.clone())
            .log_format(if self.json_logs { LogFormat::Json } else { LogFormat::Text })
            .build()
    }
}

#[derive(Debug, Clone, Args)]
struct ServiceArgs {
    #[arg(long, env = "RP_ENDPOINT")]
    endpoint: String,

    #[arg(long, env = "RP_PROJECT")]
    project: String,

    #[arg(long, env = "RP_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long, default_value = "api/v1")]
    api_base: String,

    /// Skip TLS certificate verification.
    #[arg(long)]
    insecure: bool,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl ServiceArgs {
    fn client(&self) -> Result<ServiceClient, Whatever> {
        let config = ServiceConfig::builder()
            .endpoint(self.endpoint.clone())
            .project(self.project.clone())
            .token(self.token.clone())
            .api_base(self.api_base.clone())
            .verify_ssl(!self.insecure)
            .timeout_secs(self.timeout_secs)
            .build();
        ServiceClient::new(config).map_err(fail("Failed to create client"))
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Start a launch, report every line read from stdin as a log entry and finish
the launch once stdin is closed.
Examples:

make test 2>&1 | rplog send --name nightly --item unit-tests

")]
struct SendArgs {
    #[command(flatten)]
    service: ServiceArgs,

    /// Launch name.
    #[arg(long)]
    name: String,

    #[arg(long)]
    description: Option<String>,

    /// Start the launch as a rerun of this launch id.
    #[arg(long)]
    rerun_of: Option<String>,

    /// Report lines under a test item with this name.
    #[arg(long)]
    item: Option<String>,

    /// Launch attribute as `key=value`. Repeatable.
    #[arg(long = "attribute", value_parser = parse_key_value)]
    attributes: Vec<(String, String)>,

    #[arg(long, default_value = "info")]
    level: LogLevel,

    #[arg(long, default_value_t = 20)]
    batch_size: usize,
}

impl SendArgs {
    fn run(&self) -> Result<(), Whatever> {
        let client = self.service.client()?;
        let launch = client
            .start_launch(
                &StartLaunchRq::builder()
                    .name(self.name.clone())
                    .maybe_description(self.description.clone())
                    .rerun(self.rerun_of.is_some())
                    .maybe_rerun_of(self.rerun_of.clone())
                    .attributes(attributes_from_map(self.attributes.clone(), None))
                    .build(),
            )
            .map_err(fail("Failed to start launch"))?;
        let item = match &self.item {
            Some(name) => Some(
                client
                    .start_test_item(
                        None,
                        &StartItemRq::builder()
                            .name(name.clone())
                            .launch_uuid(launch.clone())
                            .item_type(ItemType::Test)
                            .build(),
                    )
                    .map_err(fail("Failed to start test item"))?,
            ),
            None => None,
        };

        let config = ReporterConfig::builder().batch_size(self.batch_size).build();
        let reporter = Arc::new(client.log_reporter(&launch, config));
        reporter.start().map_err(fail("Failed to start reporter"))?;
        {
            let reporter = reporter.clone();
            ctrlc::set_handler(move || {
                warn!("Interrupted, dropping logs that were not sent yet");
                let _ = reporter.stop_force();
            })
            .whatever_context("Failed to install the interrupt handler")?;
        }

        let pumped = self.pump_lines(io::stdin().lock(), &reporter, &launch, item.as_deref());
        let delivery = reporter.stop(true).and_then(|()| reporter.join());
        let status = if delivery.is_ok() && pumped.read_error.is_none() {
            ItemStatus::Passed
        } else {
            ItemStatus::Failed
        };

        if let Some(item) = &item {
            client
                .finish_test_item(
                    item,
                    FinishItemRq::builder()
                        .launch_uuid(launch.clone())
                        .status(status)
                        .build(),
                )
                .map_err(fail("Failed to finish test item"))?;
        }
        client
            .finish_launch(&launch, &FinishExecutionRq::builder().status(status).build())
            .map_err(fail("Failed to finish launch"))?;
        info!(launch = %launch, lines = pumped.lines, status = %status, "Launch finished");
        println!("{launch}");

        delivery.map_err(fail("Some log entries were not delivered"))?;
        match pumped.read_error {
            Some(e) => Err(e).whatever_context("Failed to read stdin"),
            None => Ok(()),
        }
    }

    /// Submit one record per input line until the input ends, the reporter
    /// refuses a record, or reading fails. Bytes that are not valid UTF-8 are
    /// replaced rather than ending the run.
    fn pump_lines(
        &self,
        mut input: impl BufRead,
        reporter: &Reporter,
        launch: &str,
        item: Option<&str>,
    ) -> Pumped {
        let mut pumped = Pumped::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match input.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, lines = pumped.lines, "Stopped reading input");
                    pumped.read_error = Some(e);
                    break;
                }
            }
            let line = String::from_utf8_lossy(&buf);
            let record = LogRecord::builder()
                .launch_id(launch)
                .maybe_item_id(item)
                .message(line.trim_end_matches(['\n', '\r']))
                .level(self.level)
                .build();
            if let Err(e) = reporter.submit(record) {
                warn!(error = %e, "Reporter no longer accepts log entries");
                break;
            }
            pumped.lines += 1;
        }
        pumped
    }
}

#[derive(Debug, Default)]
struct Pumped {
    lines:      usize,
    read_error: Option<io::Error>,
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Attach a file to an existing launch or test item.
Examples:

rplog attach --launch 5f2c... --file screenshot.png --mime image/png

")]
struct AttachArgs {
    #[command(flatten)]
    service: ServiceArgs,

    #[arg(long)]
    launch: String,

    #[arg(long)]
    item: Option<String>,

    #[arg(long)]
    file: PathBuf,

    /// Defaults to `application/octet-stream`.
    #[arg(long)]
    mime: Option<String>,

    /// Log message sent with the file. Defaults to the file name.
    #[arg(long)]
    message: Option<String>,

    #[arg(long, default_value = "info")]
    level: LogLevel,
}

impl AttachArgs {
    fn run(&self) -> Result<(), Whatever> {
        let content = fs::read(&self.file)
            .whatever_context(format!("Failed to read {}", self.file.display()))?;
        let name = self
            .file
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        let mut attachment = Attachment::new(name.clone(), content);
        if let Some(mime) = &self.mime {
            attachment = attachment.with_mime_type(mime.clone());
        }
        let record = LogRecord::builder()
            .launch_id(self.launch.clone())
            .maybe_item_id(self.item.clone())
            .message(self.message.clone().unwrap_or(name))
            .level(self.level)
            .attachment(attachment)
            .build();

        let client = self.service.client()?;
        let reporter = client.log_reporter(&self.launch, ReporterConfig::default());
        reporter.start().map_err(fail("Failed to start reporter"))?;
        reporter.submit(record).map_err(fail("Failed to queue attachment"))?;
        reporter.stop(true).map_err(fail("Attachment was not delivered"))?;
        info!(launch = %self.launch, file = %self.file.display(), "Attachment sent");
        Ok(())
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    Ok((key.to_string(), value.to_string()))
}

/// Turn a library error into a CLI error carrying its user-facing message.
fn fail<E: ErrorExt>(what: &'static str) -> impl FnOnce(E) -> Whatever {
    move |e| Whatever::without_source(format!("{what}: {}", e.output_msg()))
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    let _guards = rplog_common_telemetry::init_global_logging("rplog", &cli.logging.options());
    rplog_common_telemetry::set_panic_hook();
    match cli.commands {
        Commands::Send(args) => args.run(),
        Commands::Attach(args) => args.run(),
    }
}
