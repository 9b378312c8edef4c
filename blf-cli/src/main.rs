//! BLF Trace CLI Application
//!
//! Command-line interface over the blf-codec library:
//! - Print file-header information and the discovered interface table
//! - Dump decoded records as text or JSON lines
//! - Produce a per-interface summary report
//! - Rewrite (decode and re-encode) a trace to exercise the write path

use anyhow::{Context, Result};
use blf_codec::{BlfReader, BlfWriter, BusRecord, Direction, ReaderConfig};
use clap::Parser;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod report;

/// BLF Trace Tool - inspect, dump and rewrite Vector BLF trace files
#[derive(Parser, Debug)]
#[command(name = "blf-cli")]
#[command(about = "Inspect, dump and rewrite BLF trace files", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the BLF trace file to read
    #[arg(value_name = "FILE")]
    log: PathBuf,

    /// Print file header and interface table only
    #[arg(long)]
    info: bool,

    /// Dump decoded records to stdout
    #[arg(long)]
    dump: bool,

    /// Dump records as JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Print a per-interface summary after reading
    #[arg(long)]
    summary: bool,

    /// Re-encode all decoded records into a new BLF file
    #[arg(long, value_name = "FILE")]
    rewrite: Option<PathBuf>,

    /// Maximum number of records to process
    #[arg(long, value_name = "COUNT")]
    max_records: Option<u64>,

    /// Path to a reader configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("BLF Trace Tool v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using codec library v{}", blf_codec::VERSION);

    let reader_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => ReaderConfig::default(),
    };

    let file = File::open(&args.log)
        .with_context(|| format!("failed to open {:?}", args.log))?;
    let mut reader = BlfReader::with_config(BufReader::new(file), reader_config)
        .with_context(|| format!("failed to parse {:?}", args.log))?;

    print_header(&reader, &args);
    if args.info {
        return Ok(());
    }

    let mut writer = match &args.rewrite {
        Some(path) => {
            let out = File::create(path)
                .with_context(|| format!("failed to create {:?}", path))?;
            Some(BlfWriter::create(BufWriter::new(out))?)
        }
        None => None,
    };

    let mut stats = report::SummaryStats::new();
    let mut processed: u64 = 0;
    loop {
        if let Some(max) = args.max_records {
            if processed >= max {
                log::info!("stopping after {} records (--max-records)", max);
                break;
            }
        }
        let (offset, record) = match reader.next_record() {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(e) => {
                // records decoded so far are already out; report the
                // trailing failure instead of dropping it silently
                eprintln!("error after {} records: {}", processed, e);
                break;
            }
        };
        processed += 1;

        if args.dump {
            dump_record(&args, &reader, offset, &record)?;
        }
        stats.add(&record);
        if let Some(writer) = writer.as_mut() {
            writer.write_record(&record, reader.interfaces())?;
        }
    }

    if let Some(mut writer) = writer {
        let header = writer.finish()?;
        if !args.quiet {
            println!(
                "\nRewrote {} records ({} objects) to {:?}",
                processed,
                header.object_count,
                args.rewrite.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
            );
        }
    }

    if args.summary && !args.quiet {
        report::print_summary(&stats, reader.interfaces());
    }
    if reader.skipped_containers() > 0 {
        log::warn!(
            "{} corrupt log containers were skipped",
            reader.skipped_containers()
        );
    }
    if !args.quiet {
        println!("\n{} records decoded", processed);
    }
    Ok(())
}

fn print_header<R>(reader: &BlfReader<R>, args: &Args) {
    if args.quiet {
        return;
    }
    let header = reader.header();
    println!("═══════════════════════════════════════════════");
    println!("  BLF Trace Tool");
    println!("═══════════════════════════════════════════════");
    println!("File:            {:?}", args.log);
    println!(
        "Application:     {} v{}.{}.{}",
        header.application_id,
        header.application_version.0,
        header.application_version.1,
        header.application_version.2
    );
    println!("API version:     {}", header.api_version);
    println!("Declared objects: {}", header.object_count);
    println!(
        "Sizes:           {} compressed / {} uncompressed",
        header.len_compressed, header.len_uncompressed
    );
    if let Some(start) = header.start_date.to_epoch_ns() {
        let secs = (start / 1_000_000_000) as i64;
        if let Some(dt) = chrono::DateTime::from_timestamp(secs, 0) {
            println!("Measurement:     {}", dt.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }
    println!();
}

#[derive(serde::Serialize)]
struct RecordDump<'a> {
    offset: u64,
    encap: String,
    interface: &'a str,
    timestamp_ns: u64,
    direction: &'a str,
    cap_len: u32,
    wire_len: u32,
    data: String,
}

fn dump_record<R>(
    args: &Args,
    reader: &BlfReader<R>,
    offset: u64,
    record: &BusRecord,
) -> Result<()> {
    let iface_name = reader
        .interfaces()
        .get(record.iface_id)
        .map(|i| i.name.as_str())
        .unwrap_or("?");
    let direction = match record.direction {
        Direction::Rx => "rx",
        Direction::Tx => "tx",
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        let dump = RecordDump {
            offset,
            encap: record.encap.to_string(),
            interface: iface_name,
            timestamp_ns: record.timestamp_ns,
            direction,
            cap_len: record.cap_len,
            wire_len: record.wire_len,
            data: hex_string(&record.data),
        };
        serde_json::to_writer(&mut out, &dump)?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "{} {:>5} {} {} {:>4}B  {}",
            record.timestamp(),
            record.encap.to_string(),
            iface_name,
            direction,
            record.cap_len,
            hex_string(&record.data)
        )?;
    }
    Ok(())
}

fn hex_string(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
