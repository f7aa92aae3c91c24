use std::io::{BufWriter, Write};

use anyhow::Context;
use compress_io::{
    compress::{CompressIo, Writer},
    compress_type::CompressType,
};
use crossbeam_channel::Receiver;

use super::{config::Config, process::SourceRecord, value::TypedValue};

/// Receives extracted records and writes the long-format metrics and
/// histogram TSV tables.  One output row per metric cell, and one per
/// (bin, column) pair for histograms, following the flattening the
/// downstream loaders expect.
pub(super) fn output_thread(cfg: &Config, r: Receiver<SourceRecord>) -> anyhow::Result<()> {
    debug!("Output thread starting up");

    let metrics_wrt = open_output(cfg, "metrics")?;
    let hist_wrt = open_output(cfg, "histograms")?;

    // The provenance column is filled with the basename of the derived-from
    // file when one was supplied
    let derived_from = cfg.derived_from().map(|p| {
        p.file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.display().to_string())
    });

    write_tables(
        metrics_wrt,
        hist_wrt,
        r.iter(),
        derived_from.as_deref().unwrap_or(""),
    )?;

    debug!("Output thread shutting down");
    Ok(())
}

fn open_output(cfg: &Config, what: &str) -> anyhow::Result<BufWriter<Writer>> {
    let name = if cfg.compress() {
        format!("{}_{}.tsv.gz", cfg.output_prefix(), what)
    } else {
        format!("{}_{}.tsv", cfg.output_prefix(), what)
    };
    let wrt = if cfg.compress() {
        CompressIo::new()
            .path(&name)
            .ctype(CompressType::Gzip)
            .bufwriter()
    } else {
        CompressIo::new().path(&name).bufwriter()
    };
    wrt.with_context(|| format!("Error opening output file {}", name))
}

/// Write both tables and flush.  Flushing explicitly matters here: the
/// writers otherwise flush on drop where errors are lost, and a failed tail
/// write must fail the run, not leave a silently truncated file.
fn write_tables<W: Write>(
    mut mw: W,
    mut hw: W,
    records: impl Iterator<Item = SourceRecord>,
    derived: &str,
) -> anyhow::Result<()> {
    writeln!(
        mw,
        "source\tclass\trow\tcolumn\tvalue\tderived_from_key\tderived_from"
    )?;
    writeln!(
        hw,
        "source\tclass\tbin\tcolumn\tvalue\tderived_from_key\tderived_from"
    )?;

    for sr in records {
        write_record(&mut mw, &mut hw, &sr, derived)
            .with_context(|| format!("Error writing records for {}", sr.source()))?;
    }

    mw.flush().with_context(|| "Error flushing metrics output")?;
    hw.flush().with_context(|| "Error flushing histogram output")?;
    Ok(())
}

fn write_record<W: Write>(
    mw: &mut W,
    hw: &mut W,
    sr: &SourceRecord,
    derived: &str,
) -> anyhow::Result<()> {
    let rec = sr.record();
    let key = rec.derived_from_key.unwrap_or("");

    if let Some(t) = rec.metric.as_ref() {
        for (row_ix, row) in t.rows().iter().enumerate() {
            for (col, val) in t.colnames().iter().zip(row.iter()) {
                writeln!(
                    mw,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    sr.source(),
                    sr.class_name(),
                    row_ix,
                    col,
                    val,
                    key,
                    derived
                )?;
            }
        }
    }

    if let Some(t) = rec.histogram.as_ref() {
        for row in t.rows() {
            let bin = row.first().cloned().unwrap_or(TypedValue::Null);
            // Skip the bin column itself
            for (col, val) in t.colnames().iter().zip(row.iter()).skip(1) {
                writeln!(
                    hw,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    sr.source(),
                    sr.class_name(),
                    bin,
                    col,
                    val,
                    key,
                    derived
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::parse_reader, metrics::PicardMetrics};
    use std::{io, iter, path::Path};

    const RNASEQ: &str = "\
## hdr
# CollectRnaSeqMetrics INPUT=test.bam

## METRICS CLASS\tpicard.analysis.RnaSeqMetrics
PF_BASES\tPF_ALIGNED_BASES
1000000\t950000

## HISTOGRAM\tjava.lang.Integer
normalized_position\tAll_Reads.normalized_coverage
0\t0.133152
";

    fn rnaseq_record() -> SourceRecord {
        let pf = parse_reader(Path::new("sample.rnaseqmetrics.txt"), io::Cursor::new(RNASEQ))
            .unwrap();
        let m = PicardMetrics::rna_seq(pf);
        SourceRecord::new("sample.rnaseqmetrics.txt".to_owned(), m.class_name(), m.extract())
    }

    #[test]
    fn long_format_rows() {
        let mut mw = Vec::new();
        let mut hw = Vec::new();
        write_tables(&mut mw, &mut hw, iter::once(rnaseq_record()), "test.bam").unwrap();

        let metrics = String::from_utf8(mw).unwrap();
        let lines: Vec<_> = metrics.lines().collect();
        assert_eq!(
            lines[0],
            "source\tclass\trow\tcolumn\tvalue\tderived_from_key\tderived_from"
        );
        assert_eq!(
            lines[1],
            "sample.rnaseqmetrics.txt\tRnaSeqMetrics\t0\tPF_BASES\t1000000\tbam\ttest.bam"
        );
        assert_eq!(lines.len(), 3);

        let hist = String::from_utf8(hw).unwrap();
        let lines: Vec<_> = hist.lines().collect();
        assert_eq!(
            lines[1],
            "sample.rnaseqmetrics.txt\tRnaSeqMetrics\t0\tAll_Reads.normalized_coverage\t0.133152\tbam\ttest.bam"
        );
        assert_eq!(lines.len(), 2);
    }

    // Writer whose flush always fails, as a closed pipe to an external
    // compressor would
    struct FailFlush;

    impl io::Write for FailFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "flush failed"))
        }
    }

    #[test]
    fn flush_failure_is_reported() {
        let res = write_tables(FailFlush, FailFlush, iter::empty(), "");
        assert!(res.is_err());
    }
}
