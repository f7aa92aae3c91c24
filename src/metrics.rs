use crate::{
    codec::{HistogramBlock, ParsedFile},
    value::TypedValue,
};

/// Normalized table handed to the export sink: ordered column names plus
/// rows of typed cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    colnames: Vec<String>,
    rows: Vec<Vec<TypedValue>>,
}

impl Table {
    pub fn colnames(&self) -> &[String] {
        &self.colnames
    }

    pub fn rows(&self) -> &[Vec<TypedValue>] {
        &self.rows
    }
}

/// The normalized record crossing into the export sink.  `derived_from_key`
/// names the provenance column the sink must populate from caller context
/// (e.g. the source alignment file); the codec only knows the column name.
#[derive(Debug)]
pub struct ExtractedRecord {
    pub derived_from_key: Option<&'static str>,
    pub metric: Option<Table>,
    pub histogram: Option<Table>,
}

/// Data extracted from a matched file, common to all variants.  Containers
/// are allocated fresh per construction.
#[derive(Debug)]
pub struct MetricData {
    class_name: &'static str,
    derived_from_key: Option<&'static str>,
    field_names: Vec<String>,
    values: Vec<Vec<TypedValue>>,
    histogram: Option<HistogramBlock>,
}

/// One arm per supported Picard tool.  The variant set is closed, so a
/// tagged enum rather than a trait object.
#[derive(Debug)]
pub enum PicardMetrics {
    QualityByCycle(MetricData),
    QualityDistribution(MetricData),
    RnaSeq(MetricData),
}

impl PicardMetrics {
    /// Build from a file matched by the MeanQualityByCycle fingerprint
    /// (histogram only, CYCLE bins).
    pub(crate) fn quality_by_cycle(pf: ParsedFile) -> Self {
        let (_, hist) = pf.into_blocks();
        Self::QualityByCycle(MetricData::histogram_only("QualityByCycleMetrics", hist))
    }

    /// Build from a file matched by the QualityScoreDistribution fingerprint
    /// (histogram only, QUALITY bins).
    pub(crate) fn quality_distribution(pf: ParsedFile) -> Self {
        let (_, hist) = pf.into_blocks();
        Self::QualityDistribution(MetricData::histogram_only(
            "QualityDistributionMetrics",
            hist,
        ))
    }

    /// Build from a file matched by the CollectRnaSeqMetrics fingerprint
    /// (metric block with an RnaSeqMetrics class).  A file without a metric
    /// block yields fresh empty containers rather than panicking.
    pub(crate) fn rna_seq(pf: ParsedFile) -> Self {
        let (metric, hist) = pf.into_blocks();
        let (field_names, values) = metric
            .map(|m| (m.field_names().to_vec(), m.rows().to_vec()))
            .unwrap_or_default();
        Self::RnaSeq(MetricData {
            class_name: "RnaSeqMetrics",
            derived_from_key: Some("bam"),
            field_names,
            values,
            histogram: hist,
        })
    }

    fn data(&self) -> &MetricData {
        match self {
            Self::QualityByCycle(d) | Self::QualityDistribution(d) | Self::RnaSeq(d) => d,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.data().class_name
    }

    /// Uniform extraction contract: the metric table is present iff both
    /// field names and values were captured; the histogram table is present
    /// iff a histogram block was captured.
    pub fn extract(&self) -> ExtractedRecord {
        let d = self.data();
        let metric = if d.field_names.is_empty() || d.values.is_empty() {
            None
        } else {
            Some(Table {
                colnames: d.field_names.clone(),
                rows: d.values.clone(),
            })
        };
        let histogram = d.histogram.as_ref().map(|h| Table {
            colnames: h.column_labels().to_vec(),
            rows: h.rows().to_vec(),
        });
        ExtractedRecord {
            derived_from_key: d.derived_from_key,
            metric,
            histogram,
        }
    }
}

impl MetricData {
    fn histogram_only(class_name: &'static str, histogram: Option<HistogramBlock>) -> Self {
        Self {
            class_name,
            derived_from_key: Some("bam"),
            field_names: Vec::new(),
            values: Vec::new(),
            histogram,
        }
    }
}
