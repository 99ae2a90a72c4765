//! Command-line front end for the container format: encrypt a file, inspect
//! a container's header, stream its plaintext to stdout, or list its info
//! records.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use evc::header::Header;
use evc::info::{InfoRecord, PayloadSource};
use evc::stream::DecryptingStream;
use evc::writer::write_encrypted;
use evc::{ContainerError, KEY_LEN};

#[derive(Parser)]
#[command(name = "evc", version = "1.0.0", about = "Encrypted video container format CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a plaintext file into a container.
    Encrypt {
        source: PathBuf,
        dest: PathBuf,
        /// 64 hex characters (32 bytes).
        #[arg(long)]
        key: String,
        #[arg(long, default_value_t = evc::DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        /// Repeatable `name=path` pairs attached as info records.
        #[arg(long = "info", value_name = "NAME=PATH")]
        info: Vec<String>,
    },
    /// Print a container's header without decrypting any content.
    Info { path: PathBuf },
    /// Stream a container's decrypted plaintext to stdout.
    Cat {
        path: PathBuf,
        #[arg(long)]
        key: String,
    },
    /// List the names of a container's info records.
    ListInfo {
        path: PathBuf,
        #[arg(long)]
        key: String,
    },
}

fn parse_key(hex_str: &str) -> Result<[u8; KEY_LEN], String> {
    let bytes = hex::decode(hex_str).map_err(|e| format!("invalid hex key: {e}"))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| format!("key must be {KEY_LEN} bytes, got {}", v.len()))
}

fn parse_info_arg(arg: &str) -> Result<(String, PathBuf), String> {
    arg.split_once('=')
        .map(|(name, path)| (name.to_string(), PathBuf::from(path)))
        .ok_or_else(|| format!("expected NAME=PATH, got {arg:?}"))
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Encrypt { source, dest, key, block_size, info } => {
            let key = parse_key(&key)?;
            let mut records = Vec::with_capacity(info.len());
            for arg in &info {
                let (name, path) = parse_info_arg(arg)?;
                records.push(InfoRecord::single(name, PayloadSource::Path(path)).map_err(|e| e.to_string())?);
            }
            write_encrypted(&source, &dest, &key, block_size, &records).map_err(|e| e.to_string())?;
            log::info!("wrote container {} from {}", dest.display(), source.display());
            println!("wrote {}", dest.display());
            Ok(())
        }

        Commands::Info { path } => {
            let mut file = File::open(&path).map_err(|e| e.to_string())?;
            let header_bytes = Header::read_header_block(&mut file).map_err(|e| e.to_string())?;
            let header = Header::from_bytes(&header_bytes).map_err(|e| e.to_string())?;
            println!("── container header ─────────────────────────────────────");
            println!("  file_size       {}", header.file_size);
            println!("  raw_file_size   {}", header.raw_file_size);
            println!("  head_size       {}", header.head_size());
            println!("  content blocks  {}", header.block_index.len());
            println!("  info records    {}", header.info_index.len());
            Ok(())
        }

        Commands::Cat { path, key } => {
            let key = parse_key(&key)?;
            let mut stream = DecryptingStream::open(&path, key).map_err(|e| e.to_string())?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = stream.read(&mut buf).map_err(|e| e.to_string())?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n]).map_err(|e| e.to_string())?;
            }
            Ok(())
        }

        Commands::ListInfo { path, key } => {
            let key = parse_key(&key)?;
            let stream = DecryptingStream::open(&path, key).map_err(|e| e.to_string())?;
            for result in stream.info_records().map_err(|e| e.to_string())? {
                match result {
                    Ok(record) => {
                        for (name, data) in record.into_entries().map_err(|e| e.to_string())? {
                            println!("{}\t{} bytes", String::from_utf8_lossy(&name), data.len());
                        }
                    }
                    Err(ContainerError::CryptoError(msg)) => {
                        eprintln!("skipping unreadable info record: {msg}");
                    }
                    Err(e) => return Err(e.to_string()),
                }
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("evc: {msg}");
            ExitCode::FAILURE
        }
    }
}
