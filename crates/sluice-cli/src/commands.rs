use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use sluice_codec::{BincodeCodec, ContractRegistry};
use sluice_transport::{
    DirectoryBlobContainer, DirectoryQueue, HybridReader, HybridWriter, Route, TransportConfig,
};
use tracing::{info, warn};

use crate::cli::*;

/// Contract name of [`FilePayload`] messages.
pub const FILE_PAYLOAD_CONTRACT: &str = "sluice.file-payload";

/// A file sent through the spool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct SentReport {
    pub file: String,
    pub message_id: String,
    pub size: usize,
    pub reference_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReceivedReport {
    pub file: String,
    pub message_id: String,
    pub sender: String,
    pub created_at: String,
    pub bytes: usize,
    pub reference_id: Option<String>,
    pub written_to: Option<PathBuf>,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Config(args) => cmd_config(&config, args, &cli.format),
        Command::Send(args) => cmd_send(&config, args, &cli.format),
        Command::Receive(args) => cmd_receive(&config, args, &cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TransportConfig> {
    match path {
        Some(path) => Ok(TransportConfig::load(path)?),
        None => Ok(TransportConfig::default()),
    }
}

fn codec() -> anyhow::Result<Arc<BincodeCodec>> {
    let registry = ContractRegistry::new().with::<FilePayload>(FILE_PAYLOAD_CONTRACT)?;
    Ok(Arc::new(BincodeCodec::new(registry)))
}

struct Spool {
    queue: Arc<DirectoryQueue>,
    blobs: Arc<DirectoryBlobContainer>,
}

/// Queue and blob directories for `config.queue_name` under `dir`.
fn open_spool(dir: &Path, config: &TransportConfig) -> anyhow::Result<Spool> {
    let root = dir.join(&config.queue_name);
    let queue = DirectoryQueue::open(root.join("queue"), config.channel_max_message)
        .with_context(|| format!("opening spool queue in {}", root.display()))?;
    Ok(Spool {
        queue: Arc::new(queue),
        blobs: Arc::new(DirectoryBlobContainer::new(root.join("blobs"))),
    })
}

fn cmd_config(config: &TransportConfig, args: ConfigArgs, format: &OutputFormat) -> anyhow::Result<()> {
    if args.toml {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => {
            println!("Queue: {}", config.queue_name.bold());
            println!("  Overflow threshold: {} bytes", config.overflow_threshold.to_string().yellow());
            println!("  Channel ceiling:    {} bytes", config.channel_max_message);
            println!("  Headroom:           {} bytes", config.headroom());
            println!(
                "  Reference format:   {} (+{} fraction digits)",
                config.reference_format.date_pattern.cyan(),
                config.reference_format.fraction_digits
            );
        }
    }
    Ok(())
}

fn cmd_send(config: &TransportConfig, args: SendArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let reports = send_files(config, &args.spool, &args.files)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            for r in &reports {
                let route = match &r.reference_id {
                    Some(reference) => format!("overflow {}", reference).yellow(),
                    None => "inline".green(),
                };
                println!("{} {} ({} bytes, {})", "✓".green().bold(), r.file.bold(), r.size, route);
            }
        }
    }
    Ok(())
}

fn cmd_receive(config: &TransportConfig, args: ReceiveArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let reports = receive_all(config, &args.spool, args.out.as_deref(), args.limit)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            if reports.is_empty() {
                println!("No messages.");
            }
            for r in &reports {
                println!("{} {}  {}", "▸".cyan(), r.message_id.dimmed(), r.file.bold());
                println!("  From: {}  at {}", r.sender, r.created_at);
                println!("  Size: {} bytes", r.bytes);
                if let Some(reference) = &r.reference_id {
                    println!("  Via blob: {}", reference.yellow());
                }
                if let Some(path) = &r.written_to {
                    println!("  Wrote: {}", path.display());
                }
            }
        }
    }
    Ok(())
}

/// Send every file as one [`FilePayload`] message.
pub fn send_files(
    config: &TransportConfig,
    spool_dir: &Path,
    files: &[PathBuf],
) -> anyhow::Result<Vec<SentReport>> {
    let mut payloads = Vec::with_capacity(files.len());
    for path in files {
        let content = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?;
        payloads.push(FilePayload { file_name, content });
    }

    let spool = open_spool(spool_dir, config)?;
    let writer = HybridWriter::new(config.clone(), codec()?, spool.queue, spool.blobs)?;
    writer.ensure_exists()?;

    let deliveries = writer.send(&payloads).map_err(|failure| {
        let sent: Vec<&str> = payloads[..failure.delivered.len()]
            .iter()
            .map(|p| p.file_name.as_str())
            .collect();
        anyhow::Error::new(failure).context(format!("sent before failure: {:?}", sent))
    })?;

    let reports = payloads
        .iter()
        .zip(deliveries)
        .map(|(payload, delivery)| SentReport {
            file: payload.file_name.clone(),
            message_id: delivery.message_id.to_string(),
            size: delivery.size,
            reference_id: match delivery.route {
                Route::Inline => None,
                Route::Overflow { reference_id } => Some(reference_id.to_string()),
            },
        })
        .collect::<Vec<_>>();
    info!(count = reports.len(), spool = %spool_dir.display(), "files sent");
    Ok(reports)
}

/// Drain up to `limit` messages, optionally writing payloads to `out`.
///
/// A message leaves the queue only after it was decoded and written, so a
/// failure stops the drain with the failing message still queued.
pub fn receive_all(
    config: &TransportConfig,
    spool_dir: &Path,
    out: Option<&Path>,
    limit: Option<usize>,
) -> anyhow::Result<Vec<ReceivedReport>> {
    let spool = open_spool(spool_dir, config)?;
    let codec = codec()?;
    let reader = HybridReader::new(spool.blobs);
    if let Some(out) = out {
        fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    }

    let mut reports = Vec::new();
    while limit.map_or(true, |limit| reports.len() < limit) {
        let Some(message) = spool.queue.peek()? else {
            break;
        };
        let received = reader
            .open(&message.bytes)
            .with_context(|| format!("opening queued message {}", message.seq))?;
        let payload: FilePayload = received
            .decode(codec.as_ref())
            .with_context(|| format!("decoding message {}", received.envelope.message_id()))?;

        let written_to = match out {
            Some(out) => {
                let name = Path::new(&payload.file_name)
                    .file_name()
                    .filter(|n| *n == payload.file_name.as_str())
                    .map(PathBuf::from);
                let Some(name) = name else {
                    bail!("refusing to write unsafe file name {:?}", payload.file_name);
                };
                let path = out.join(name);
                fs::write(&path, &payload.content)
                    .with_context(|| format!("writing {}", path.display()))?;
                Some(path)
            }
            None => None,
        };

        if !spool.queue.ack(message.seq)? {
            warn!(
                seq = message.seq,
                message_id = %received.envelope.message_id(),
                "message was also taken by another receiver"
            );
        }
        reports.push(ReceivedReport {
            file: payload.file_name,
            message_id: received.envelope.message_id().to_string(),
            sender: received.envelope.sender().to_string(),
            created_at: received.envelope.created_at().to_rfc3339(),
            bytes: payload.content.len(),
            reference_id: received
                .reference
                .as_ref()
                .map(|r| r.reference_id.to_string()),
            written_to,
        });
    }
    info!(count = reports.len(), spool = %spool_dir.display(), "messages received");
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_codec::Codec;

    fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        let content: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn codec_knows_file_payload() {
        let codec = codec().unwrap();
        assert_eq!(codec.contract_name_of::<FilePayload>(), Some(FILE_PAYLOAD_CONTRACT));
    }

    #[test]
    fn send_then_receive_restores_files() {
        let work = tempfile::tempdir().unwrap();
        let spool = work.path().join("spool");
        let out = work.path().join("out");
        let config = TransportConfig::default();

        let small = write_file(work.path(), "small.txt", 64);
        let large = write_file(work.path(), "large.bin", 50_000);

        let sent = send_files(&config, &spool, &[small.clone(), large.clone()]).unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].reference_id.is_none());
        assert!(sent[1].reference_id.is_some());

        let received = receive_all(&config, &spool, Some(&out), None).unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].file, "small.txt");
        assert_eq!(received[1].file, "large.bin");
        assert_eq!(received[1].reference_id, sent[1].reference_id);
        assert_eq!(fs::read(out.join("small.txt")).unwrap(), fs::read(&small).unwrap());
        assert_eq!(fs::read(out.join("large.bin")).unwrap(), fs::read(&large).unwrap());

        assert!(receive_all(&config, &spool, None, None).unwrap().is_empty());
    }

    #[test]
    fn receive_respects_limit() {
        let work = tempfile::tempdir().unwrap();
        let spool = work.path().join("spool");
        let config = TransportConfig::default();
        let files: Vec<PathBuf> = (0..3)
            .map(|i| write_file(work.path(), &format!("f{i}"), 10))
            .collect();
        send_files(&config, &spool, &files).unwrap();

        assert_eq!(receive_all(&config, &spool, None, Some(2)).unwrap().len(), 2);
        assert_eq!(receive_all(&config, &spool, None, None).unwrap().len(), 1);
    }

    #[test]
    fn failed_receive_keeps_message_queued() {
        let work = tempfile::tempdir().unwrap();
        let spool = work.path().join("spool");
        let out = work.path().join("out");
        let config = TransportConfig::default();
        let large = write_file(work.path(), "large.bin", 50_000);
        send_files(&config, &spool, &[large]).unwrap();

        let blob_dir = spool.join(&config.queue_name).join("blobs");
        let blobs: Vec<PathBuf> = fs::read_dir(&blob_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(blobs.len(), 1);
        let saved = fs::read(&blobs[0]).unwrap();
        fs::remove_file(&blobs[0]).unwrap();

        assert!(receive_all(&config, &spool, Some(&out), None).is_err());
        let queue_dir = spool.join(&config.queue_name).join("queue");
        let queue = DirectoryQueue::open(queue_dir, config.channel_max_message).unwrap();
        assert_eq!(queue.len().unwrap(), 1);

        // Once the blob is back the same message is delivered.
        fs::write(&blobs[0], saved).unwrap();
        let received = receive_all(&config, &spool, Some(&out), None).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].file, "large.bin");
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn queue_name_selects_spool_subdirectory() {
        let work = tempfile::tempdir().unwrap();
        let spool = work.path().join("spool");
        let file = write_file(work.path(), "a", 1);
        let config = TransportConfig {
            queue_name: "audit".into(),
            ..Default::default()
        };
        send_files(&config, &spool, &[file]).unwrap();
        assert!(spool.join("audit").join("queue").is_dir());
        assert!(receive_all(&TransportConfig::default(), &spool, None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_input_file_sends_nothing() {
        let work = tempfile::tempdir().unwrap();
        let spool = work.path().join("spool");
        let err = send_files(
            &TransportConfig::default(),
            &spool,
            &[work.path().join("nope")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("reading"));
        assert!(!spool.exists());
    }
}
