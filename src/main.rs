use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cncrelay::{
    init_logging, plan_resume, Config, Error, FileTransfer, LineTransport, MotionEstimator,
    MoveType, BUILD_DATE, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = "cncrelay")]
#[command(version)]
#[command(about = "Command and job execution engine for GRBL-class CNC controllers")]
#[command(propagate_version = true)]
struct Args {
    /// Configuration file (.toml or .json); defaults to the platform config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate the run time of a program
    Estimate {
        /// G-code program
        file: PathBuf,
    },

    /// Print the sequence that safely resumes a program at a line
    Resume {
        /// G-code program
        file: PathBuf,

        /// 1-based line to resume at
        #[arg(long)]
        line: usize,

        /// Tool currently in the spindle
        #[arg(long)]
        tool: Option<u32>,
    },

    /// Push a program onto controller storage
    Upload {
        /// Controller address (host:port)
        address: String,

        /// G-code program
        file: PathBuf,

        /// Name on the controller; defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json)?;
    tracing::debug!("cncrelay {} (built {})", VERSION, BUILD_DATE);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Estimate { file } => estimate(&config, &file),
        Commands::Resume { file, line, tool } => resume(&config, &file, line, tool),
        Commands::Upload {
            address,
            file,
            name,
        } => upload(&config, address, &file, name).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(path) => return Ok(Config::load_from_file(path)?),
        None => Config::default_path()?,
    };
    Ok(Config::load_or_default(&path)?)
}

fn read_program(file: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn estimate(config: &Config, file: &Path) -> anyhow::Result<()> {
    let text = read_program(file)?;
    let plan = MotionEstimator::new(config.estimator.clone()).parse(&text);

    println!("{}: {} lines", file.display(), plan.line_count());
    println!("  total   {}", format_duration(plan.total_sec()));
    for (label, move_type) in [
        ("rapid", MoveType::Rapid),
        ("linear", MoveType::Linear),
        ("arc", MoveType::Arc),
        ("dwell", MoveType::Dwell),
    ] {
        println!("  {:<7} {}", label, format_duration(plan.total_for(move_type)));
    }
    Ok(())
}

fn resume(config: &Config, file: &Path, line: usize, tool: Option<u32>) -> anyhow::Result<()> {
    let text = read_program(file)?;
    let options = config.resume.clone().with_current_tool(tool);
    let plan = plan_resume(&text, line, &options)?;

    if let Some(warning) = &plan.tool_warning {
        eprintln!("warning: {}", warning.message);
    }
    for command in &plan.commands {
        println!("{}", command);
    }
    Ok(())
}

async fn upload(
    config: &Config,
    address: String,
    file: &Path,
    name: Option<String>,
) -> anyhow::Result<()> {
    let content = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("File has no name; pass --name")?,
    };
    let transport = LineTransport::connect(address.as_str(), config.connection.transport.clone())
        .await
        .with_context(|| format!("Failed to connect to {}", address))?;
    let transfer = FileTransfer::new(Arc::new(transport), config.transfer.clone());

    let sent = transfer
        .send(&name, &content, |progress| {
            println!(
                "{:>3}% {}/{} bytes",
                progress.percent, progress.bytes_sent, progress.total_bytes
            );
        })
        .await;
    if let Err(e) = sent {
        let err = Error::from(e);
        let context = format!("Upload of {} failed: {}", name, upload_failure_hint(&err));
        return Err(anyhow::Error::new(err).context(context));
    }
    println!("Uploaded {} as {}", file.display(), name);
    Ok(())
}

fn upload_failure_hint(err: &Error) -> &'static str {
    if err.is_timeout() {
        "the receiver stopped responding"
    } else if err.is_transport_error() {
        "the connection to the controller failed"
    } else {
        "the receiver refused the transfer"
    }
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    format!(
        "{:02}:{:02}:{:02} ({:.1}s)",
        total / 3600,
        (total % 3600) / 60,
        total % 60,
        seconds
    )
}
