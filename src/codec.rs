use std::{
    io::BufRead,
    path::{Path, PathBuf},
};

use compress_io::compress::CompressIo;

use crate::{
    error::{CodecError, StructuralError},
    value::TypedValue,
};

const CLASS_PREFIX: &str = "## ";
const VALUE_PREFIX: &str = "# ";
const METRIC_MARKER: &str = "## METRICS CLASS\t";
const HISTO_MARKER: &str = "## HISTOGRAM\t";
const SEP: char = '\t';

/// Tokenized representation of one Picard metrics file: the header pairs plus
/// at most one metric block and at most one histogram block.  Immutable once
/// built.
#[derive(Debug)]
pub struct ParsedFile {
    path: PathBuf,
    tool_name: Option<String>,
    headers: Vec<(String, String)>,
    metric_block: Option<MetricBlock>,
    histogram_block: Option<HistogramBlock>,
}

impl ParsedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn metric_block(&self) -> Option<&MetricBlock> {
        self.metric_block.as_ref()
    }

    pub fn histogram_block(&self) -> Option<&HistogramBlock> {
        self.histogram_block.as_ref()
    }

    /// Consume the file, releasing the captured blocks to a variant builder.
    pub fn into_blocks(self) -> (Option<MetricBlock>, Option<HistogramBlock>) {
        (self.metric_block, self.histogram_block)
    }
}

/// The tabular section introduced by `## METRICS CLASS`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBlock {
    class_name: String,
    field_names: Vec<String>,
    rows: Vec<Vec<TypedValue>>,
}

impl MetricBlock {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn rows(&self) -> &[Vec<TypedValue>] {
        &self.rows
    }
}

/// The tabular section introduced by `## HISTOGRAM`.  The first column label
/// is the bin label.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBlock {
    class_name: String,
    bin_label: String,
    column_labels: Vec<String>,
    rows: Vec<Vec<TypedValue>>,
}

impl HistogramBlock {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn bin_label(&self) -> &str {
        &self.bin_label
    }

    pub fn column_labels(&self) -> &[String] {
        &self.column_labels
    }

    pub fn rows(&self) -> &[Vec<TypedValue>] {
        &self.rows
    }
}

/// Read and tokenize a (possibly compressed) Picard metrics file.
pub fn read_metrics_file(path: &Path) -> Result<ParsedFile, CodecError> {
    let rdr = CompressIo::new()
        .path(path)
        .bufreader()
        .map_err(|source| CodecError::Open {
            path: path.to_owned(),
            source,
        })?;
    parse_reader(path, rdr)
}

/// Tokenize a metrics file from an already open reader.  `path` is used for
/// error context and carried into the [ParsedFile].
pub fn parse_reader<R: BufRead>(path: &Path, rdr: R) -> Result<ParsedFile, CodecError> {
    SectionReader::new(path, rdr).parse()
}

struct SectionReader<'a, R> {
    path: &'a Path,
    line: usize,
    buf: String,
    rdr: R,
}

impl<'a, R: BufRead> SectionReader<'a, R> {
    fn new(path: &'a Path, rdr: R) -> Self {
        Self {
            path,
            line: 0,
            buf: String::new(),
            rdr,
        }
    }

    // Get next line from the input, trimmed of the line terminator.
    // Returns true on EOF
    fn get_line(&mut self) -> Result<bool, CodecError> {
        self.buf.clear();
        self.line += 1;
        let n = self
            .rdr
            .read_line(&mut self.buf)
            .map_err(|source| CodecError::Read {
                path: self.path.to_owned(),
                line: self.line,
                source,
            })?;
        while self.buf.ends_with(['\r', '\n']) {
            self.buf.pop();
        }
        Ok(n == 0)
    }

    // Get next non-blank line, or None at EOF
    fn next_nonblank_line(&mut self) -> Result<Option<String>, CodecError> {
        loop {
            if self.get_line()? {
                return Ok(None);
            }
            if !self.buf.is_empty() {
                return Ok(Some(self.buf.clone()));
            }
        }
    }

    fn unexpected(&self, content: &str) -> StructuralError {
        StructuralError::UnexpectedLine {
            path: self.path.to_owned(),
            line: self.line,
            content: content.to_owned(),
        }
    }

    fn malformed(&self, detail: &str) -> StructuralError {
        StructuralError::MalformedBlock {
            path: self.path.to_owned(),
            line: self.line,
            detail: detail.to_owned(),
        }
    }

    /// Single forward pass: the header section, then an optional metric
    /// block, then an optional histogram block.
    fn parse(mut self) -> Result<ParsedFile, CodecError> {
        let mut headers = Vec::new();
        let mut tool_name = None;
        let mut open_class: Option<String> = None;

        // Header section.  Terminates at a block marker or EOF.
        let mut marker = loop {
            if self.get_line()? {
                break None;
            }
            if self.buf.is_empty() {
                continue;
            }
            if self.buf.starts_with(METRIC_MARKER) || self.buf.starts_with(HISTO_MARKER) {
                break Some(self.buf.clone());
            }
            if let Some(rest) = self.buf.strip_prefix(CLASS_PREFIX) {
                if open_class.is_some() {
                    return Err(StructuralError::ConsecutiveClassHeaders {
                        path: self.path.to_owned(),
                        line: self.line,
                    }
                    .into());
                }
                open_class = Some(rest.trim().to_owned());
            } else if let Some(rest) = self.buf.strip_prefix(VALUE_PREFIX) {
                let Some(cls) = open_class.take() else {
                    return Err(StructuralError::ValueWithoutClass {
                        path: self.path.to_owned(),
                        line: self.line,
                    }
                    .into());
                };
                // The first token of the first value header names the tool
                if headers.is_empty() {
                    tool_name = rest.split_whitespace().next().map(str::to_owned);
                }
                headers.push((cls, rest.to_owned()));
            } else {
                return Err(self.unexpected(&self.buf).into());
            }
        };

        let mut metric_block = None;
        if let Some(l) = marker.as_deref() {
            if l.starts_with(METRIC_MARKER) {
                metric_block = Some(self.read_metric_block(l)?);
                marker = self.next_nonblank_line()?;
            }
        }

        let mut histogram_block = None;
        if let Some(l) = marker.as_deref() {
            if !l.starts_with(HISTO_MARKER) {
                return Err(self.unexpected(l).into());
            }
            histogram_block = Some(self.read_histogram_block(l)?);
            marker = self.next_nonblank_line()?;
        }

        // Only blank lines may follow the blocks
        if let Some(l) = marker {
            return Err(self.unexpected(&l).into());
        }

        Ok(ParsedFile {
            path: self.path.to_owned(),
            tool_name,
            headers,
            metric_block,
            histogram_block,
        })
    }

    fn read_metric_block(&mut self, marker: &str) -> Result<MetricBlock, CodecError> {
        let class_name = self.block_class_name(marker)?;
        if self.get_line()? || self.buf.is_empty() {
            return Err(self.malformed("missing field name line").into());
        }
        let field_names: Vec<_> = self.buf.split(SEP).map(str::to_owned).collect();
        let rows = self.read_rows()?;
        Ok(MetricBlock {
            class_name,
            field_names,
            rows,
        })
    }

    fn read_histogram_block(&mut self, marker: &str) -> Result<HistogramBlock, CodecError> {
        let class_name = self.block_class_name(marker)?;
        if self.get_line()? || self.buf.is_empty() {
            return Err(self.malformed("missing histogram label line").into());
        }
        let column_labels: Vec<_> = self.buf.split(SEP).map(str::to_owned).collect();
        let bin_label = column_labels[0].clone();
        let rows = self.read_rows()?;
        Ok(HistogramBlock {
            class_name,
            bin_label,
            column_labels,
            rows,
        })
    }

    // Class name is the second tab field of the block marker line
    fn block_class_name(&self, marker: &str) -> Result<String, CodecError> {
        match marker.split(SEP).nth(1).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_owned()),
            _ => Err(self.malformed("missing class name in block marker").into()),
        }
    }

    // Tab-split data lines, coerced cell by cell, until a blank line or EOF
    fn read_rows(&mut self) -> Result<Vec<Vec<TypedValue>>, CodecError> {
        let mut rows = Vec::new();
        loop {
            if self.get_line()? || self.buf.is_empty() {
                break;
            }
            rows.push(self.buf.split(SEP).map(TypedValue::coerce).collect());
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_str(s: &str) -> Result<ParsedFile, CodecError> {
        parse_reader(Path::new("test.txt"), Cursor::new(s))
    }

    const RNASEQ: &str = "\
## htsjdk.samtools.metrics.StringHeader
# CollectRnaSeqMetrics REF_FLAT=ref.txt INPUT=test.bam OUTPUT=out.txt
## htsjdk.samtools.metrics.StringHeader
# Started on: Mon Jun 04 10:22:06 UTC 2018

## METRICS CLASS\tpicard.analysis.RnaSeqMetrics
PF_BASES\tPF_ALIGNED_BASES\tMEDIAN_CV_COVERAGE\tSAMPLE
1000000\t950000\t0.508261\t

## HISTOGRAM\tjava.lang.Integer
normalized_position\tAll_Reads.normalized_coverage
0\t0.133152
1\t0.180372
2\t0.226844
";

    #[test]
    fn parse_full_file() {
        let pf = parse_str(RNASEQ).unwrap();
        assert_eq!(pf.tool_name(), Some("CollectRnaSeqMetrics"));
        assert_eq!(pf.headers().len(), 2);
        assert_eq!(
            pf.headers()[0].0,
            "htsjdk.samtools.metrics.StringHeader"
        );

        let m = pf.metric_block().unwrap();
        assert_eq!(m.class_name(), "picard.analysis.RnaSeqMetrics");
        assert_eq!(
            m.field_names(),
            ["PF_BASES", "PF_ALIGNED_BASES", "MEDIAN_CV_COVERAGE", "SAMPLE"]
        );
        assert_eq!(m.rows().len(), 1);
        assert_eq!(
            m.rows()[0],
            vec![
                TypedValue::Int(1000000),
                TypedValue::Int(950000),
                TypedValue::Float(0.508261),
                TypedValue::Null
            ]
        );

        let h = pf.histogram_block().unwrap();
        assert_eq!(h.class_name(), "java.lang.Integer");
        assert_eq!(h.bin_label(), "normalized_position");
        assert_eq!(h.column_labels()[0], "normalized_position");
        assert_eq!(h.rows().len(), 3);
        // first cell of each row is the bin value
        assert_eq!(h.rows()[0][0], TypedValue::Int(0));
        assert_eq!(h.rows()[2][0], TypedValue::Int(2));
    }

    #[test]
    fn parse_headers_only() {
        let pf = parse_str(
            "## htsjdk.samtools.metrics.StringHeader\n# CollectRnaSeqMetrics INPUT=x\n",
        )
        .unwrap();
        assert_eq!(pf.tool_name(), Some("CollectRnaSeqMetrics"));
        assert!(pf.metric_block().is_none());
        assert!(pf.histogram_block().is_none());
    }

    #[test]
    fn parse_histogram_only() {
        let s = "\
## hdr
# CollectQualityByCycleMetrics I=test.bam

## HISTOGRAM\tjava.lang.Integer
CYCLE\tMEAN_QUALITY
1\t31.8
2\t31.9
";
        let pf = parse_str(s).unwrap();
        assert!(pf.metric_block().is_none());
        let h = pf.histogram_block().unwrap();
        assert_eq!(h.bin_label(), "CYCLE");
        assert_eq!(h.column_labels()[1], "MEAN_QUALITY");
        assert_eq!(h.rows().len(), 2);
    }

    #[test]
    fn bare_value_header_leaves_tool_unset() {
        let pf = parse_str("## hdr\n# \n").unwrap();
        assert!(pf.tool_name().is_none());
        // the header pair is still recorded, with an empty value
        assert_eq!(pf.headers().len(), 1);
        assert_eq!(pf.headers()[0], ("hdr".to_owned(), String::new()));
    }

    #[test]
    fn crlf_line_endings() {
        let s = "## hdr\r\n# Tool arg\r\n";
        let pf = parse_str(s).unwrap();
        assert_eq!(pf.tool_name(), Some("Tool"));
        assert_eq!(pf.headers()[0].1, "Tool arg");
    }

    #[test]
    fn value_without_class_fails() {
        let e = parse_str("# CollectRnaSeqMetrics INPUT=x\n").unwrap_err();
        assert!(matches!(
            e,
            CodecError::Structural(StructuralError::ValueWithoutClass { line: 1, .. })
        ));
    }

    #[test]
    fn consecutive_class_headers_fail() {
        let e = parse_str("## first\n## second\n# value\n").unwrap_err();
        assert!(matches!(
            e,
            CodecError::Structural(StructuralError::ConsecutiveClassHeaders { line: 2, .. })
        ));
    }

    #[test]
    fn unexpected_header_line_fails() {
        let e = parse_str("## hdr\n# Tool arg\nstray text\n").unwrap_err();
        assert!(matches!(
            e,
            CodecError::Structural(StructuralError::UnexpectedLine { line: 3, .. })
        ));
    }

    #[test]
    fn trailing_content_after_histogram_fails() {
        let s = "\
## hdr
# Tool arg

## HISTOGRAM\tjava.lang.Integer
QUALITY\tCOUNT_OF_Q
2\t100

stray
";
        let e = parse_str(s).unwrap_err();
        assert!(matches!(
            e,
            CodecError::Structural(StructuralError::UnexpectedLine { .. })
        ));
    }

    #[test]
    fn second_metric_block_fails() {
        let s = "\
## hdr
# Tool arg

## METRICS CLASS\tFoo
A\tB
1\t2

## METRICS CLASS\tBar
A\tB
1\t2
";
        let e = parse_str(s).unwrap_err();
        assert!(matches!(
            e,
            CodecError::Structural(StructuralError::UnexpectedLine { .. })
        ));
    }

    #[test]
    fn metric_block_missing_fields_fails() {
        let e = parse_str("## hdr\n# Tool arg\n## METRICS CLASS\tFoo\n").unwrap_err();
        assert!(matches!(
            e,
            CodecError::Structural(StructuralError::MalformedBlock { .. })
        ));
    }

    #[test]
    fn block_marker_missing_class_fails() {
        let e = parse_str("## METRICS CLASS\t\nA\tB\n1\t2\n").unwrap_err();
        assert!(matches!(
            e,
            CodecError::Structural(StructuralError::MalformedBlock { .. })
        ));
    }

    #[test]
    fn dangling_class_header_at_eof_tolerated() {
        let pf = parse_str("## hdr\n# Tool arg\n## dangling\n").unwrap();
        assert_eq!(pf.headers().len(), 1);
    }

    #[test]
    fn empty_input_gives_empty_parse() {
        let pf = parse_str("").unwrap();
        assert!(pf.tool_name().is_none());
        assert!(pf.headers().is_empty());
        assert!(pf.metric_block().is_none());
        assert!(pf.histogram_block().is_none());
    }
}
