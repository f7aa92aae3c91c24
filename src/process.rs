use std::{
    path::Path,
    thread::{self, ScopedJoinHandle},
};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use super::{codec, config::Config, metrics::ExtractedRecord, output, registry};

/// An extracted record tagged with its source file (basename) and the
/// matched variant's class name, ready for the output stage.
pub struct SourceRecord {
    source: String,
    class_name: &'static str,
    record: ExtractedRecord,
}

impl SourceRecord {
    pub(super) fn new(source: String, class_name: &'static str, record: ExtractedRecord) -> Self {
        Self {
            source,
            class_name,
            record,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }
    pub fn record(&self) -> &ExtractedRecord {
        &self.record
    }
}

/// Process all input files.
///
/// Threading model
///
/// Each file is parsed, dispatched and extracted independently, so the batch
/// is handled by a small pool of process threads fed file paths over a
/// channel from the main thread.  Extracted records go to an output thread
/// which owns the TSV writers.  A file that fails to parse or dispatch is
/// logged and counted; the remaining files are still processed, and the run
/// exits with an error if any file failed.
pub fn process_inputs(cfg: &Config) -> anyhow::Result<()> {
    let n_files = cfg.inputs().len();
    info!("Processing {} Picard metrics file(s)", n_files);

    let n_proc = cfg.threads().min(n_files).max(1);

    // Channel for sending input paths to the process threads
    let (path_send, path_recv) = unbounded();
    // Channel for sending extracted records to the output thread
    let (rec_send, rec_recv) = bounded(n_proc * 4);

    let mut n_failed = 0;
    let mut out_err = false;

    thread::scope(|s| {
        // Spawn output thread
        let output = s.spawn(|| output::output_thread(cfg, rec_recv));

        // Spawn process threads
        let workers: Vec<_> = (0..n_proc)
            .map(|ix| {
                let rc = path_recv.clone();
                let sc = rec_send.clone();
                s.spawn(move || process_thread(ix, rc, sc))
            })
            .collect();

        // We do this so that when the process threads exit the channel will be
        // disconnected and the output thread will exit
        drop(rec_send);
        drop(path_recv);

        // Send files to the process threads
        for p in cfg.inputs() {
            path_send
                .send(p.as_path())
                .expect("Error sending input path to process threads");
        }

        // Signal that no more files are coming so the process threads will exit
        drop(path_send);

        // Note we must join the process threads before the output thread
        // otherwise we will have a deadlock
        for (ix, jh) in workers.into_iter().enumerate() {
            match jh.join() {
                Ok(n) => n_failed += n,
                Err(_) => {
                    error!("Process thread {} panicked", ix);
                    out_err = true
                }
            }
        }
        out_err = join_output_thread(output) || out_err;
    });

    if out_err {
        Err(anyhow!("Error - failed to write output"))
    } else if n_failed > 0 {
        Err(anyhow!(
            "{} of {} input file(s) could not be processed",
            n_failed,
            n_files
        ))
    } else {
        info!("Finished processing input");
        Ok(())
    }
}

/// Joins the output thread and recovers any error.  Returns true on error.
fn join_output_thread(h: ScopedJoinHandle<anyhow::Result<()>>) -> bool {
    match h.join() {
        Ok(Ok(())) => false,
        Ok(Err(e)) => {
            error!("Output thread returned an error: {}", e);
            true
        }
        Err(_) => {
            error!("Output thread panicked");
            true
        }
    }
}

/// Pulls paths from r until the channel is closed.  Returns the number of
/// files that could not be processed.
fn process_thread(ix: usize, r: Receiver<&Path>, snd: Sender<SourceRecord>) -> usize {
    debug!("Process thread {} starting up", ix);
    let mut failed = 0;
    for path in r.iter() {
        match handle_file(path) {
            Ok(rec) => {
                if snd.send(rec).is_err() {
                    // Output thread has gone; stop pulling work
                    error!("Record channel disconnected");
                    failed += 1;
                    break;
                }
            }
            Err(e) => {
                error!("{}", e);
                failed += 1
            }
        }
    }
    debug!("Process thread {} shutting down", ix);
    failed
}

fn handle_file(path: &Path) -> anyhow::Result<SourceRecord> {
    debug!("Processing {}", path.display());

    let pf = codec::read_metrics_file(path)?;
    trace!(
        "Parsed {} (tool {})",
        path.display(),
        pf.tool_name().unwrap_or("unknown")
    );

    let metrics = registry::dispatch(pf)?;
    info!("{} matched {}", path.display(), metrics.class_name());

    let source = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(SourceRecord::new(
        source,
        metrics.class_name(),
        metrics.extract(),
    ))
}
