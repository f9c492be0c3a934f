use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;

use voxgate::events::{EventLog, VadEvent};
use voxgate::logging::{self, LogFormat};
use voxgate::opts::{VadOptions, VadOptionsPatch};
use voxgate::trace::{parse_trace, replay};

fn main() -> Result<()> {
    let params = Params::parse();
    logging::init_with_format(params.log_format);

    let opts = load_options(&params)?;
    let samples = parse_trace(open_trace(&params.trace_path)?)
        .with_context(|| format!("failed to read trace from {}", params.trace_path))?;

    let log = replay(&samples, opts, EventLog::new());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for event in log.events() {
        if params.quiet_volume && matches!(event, VadEvent::VolumeChange { .. }) {
            continue;
        }
        serde_json::to_writer(&mut out, event)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "voxgate")]
#[command(about = "Replay a recorded volume trace through the voice activity detector")]
struct Params {
    /// Trace file (`t_ms volume` or JSON lines); `-` reads stdin.
    #[arg(short = 't', long = "trace")]
    pub trace_path: String,

    /// JSON file with detector options; flags below override it.
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    /// Volume floor (0..255) at or below which a reading is silence.
    #[arg(long = "threshold")]
    pub silence_threshold: Option<f32>,

    /// Seconds of silence before end-of-speech is confirmed.
    #[arg(long = "silence-duration")]
    pub silence_duration: Option<f64>,

    /// Minimum segment length in seconds before end-of-speech is considered.
    #[arg(long = "min-speech-duration")]
    pub min_speech_duration: Option<f64>,

    /// Omit per-tick volume events from the output.
    #[arg(short = 'q', long = "quiet-volume", default_value_t = false)]
    pub quiet_volume: bool,

    /// Log line format on stderr (filter with `VOXGATE_LOG`).
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

fn load_options(params: &Params) -> Result<VadOptions> {
    let mut opts = match &params.config_path {
        Some(path) => VadOptions::from_json_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => VadOptions::default(),
    };

    opts.apply(&VadOptionsPatch {
        silence_threshold: params.silence_threshold,
        silence_duration: params.silence_duration,
        min_speech_duration: params.min_speech_duration,
    });

    Ok(opts)
}

fn open_trace(path: &str) -> Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let file = File::open(path).with_context(|| format!("failed to open trace {path}"))?;
    Ok(Box::new(BufReader::new(file)))
}
