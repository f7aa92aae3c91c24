use crate::{codec::ParsedFile, error::DispatchError, metrics::PicardMetrics};

/// One entry in the variant registry: a structural-match predicate over the
/// parsed file plus a builder for the matched variant.
pub struct VariantDescriptor {
    name: &'static str,
    matches: fn(&ParsedFile) -> bool,
    build: fn(ParsedFile) -> PicardMetrics,
}

/// The registry.  Built once, never mutated; the order below is the explicit
/// registration order.
pub const REGISTRY: &[VariantDescriptor] = &[
    VariantDescriptor {
        name: "QualityByCycleMetrics",
        matches: match_quality_by_cycle,
        build: PicardMetrics::quality_by_cycle,
    },
    VariantDescriptor {
        name: "QualityDistributionMetrics",
        matches: match_quality_distribution,
        build: PicardMetrics::quality_distribution,
    },
    VariantDescriptor {
        name: "RnaSeqMetrics",
        matches: match_rna_seq,
        build: PicardMetrics::rna_seq,
    },
];

/// Map a parsed file to exactly one variant instance.  Every predicate is
/// evaluated; more than one match is an error rather than a silent
/// first-match-wins.
pub fn dispatch(pf: ParsedFile) -> Result<PicardMetrics, DispatchError> {
    dispatch_with(REGISTRY, pf)
}

pub fn dispatch_with(
    registry: &[VariantDescriptor],
    pf: ParsedFile,
) -> Result<PicardMetrics, DispatchError> {
    let matched: Vec<_> = registry.iter().filter(|d| (d.matches)(&pf)).collect();
    match matched.as_slice() {
        [] => Err(DispatchError::UnrecognizedFormat {
            path: pf.path().to_owned(),
        }),
        [d] => Ok((d.build)(pf)),
        _ => Err(DispatchError::AmbiguousMatch {
            path: pf.path().to_owned(),
            variants: matched.iter().map(|d| d.name).collect(),
        }),
    }
}

// Histogram only, CYCLE bins with MEAN_QUALITY in the second column
fn match_quality_by_cycle(pf: &ParsedFile) -> bool {
    pf.metric_block().is_none()
        && pf.histogram_block().is_some_and(|h| {
            h.bin_label() == "CYCLE" && h.column_labels().get(1).map(String::as_str) == Some("MEAN_QUALITY")
        })
}

// Histogram only, QUALITY bins with COUNT_OF_Q in the second column
fn match_quality_distribution(pf: &ParsedFile) -> bool {
    pf.metric_block().is_none()
        && pf.histogram_block().is_some_and(|h| {
            h.bin_label() == "QUALITY" && h.column_labels().get(1).map(String::as_str) == Some("COUNT_OF_Q")
        })
}

// Metric block whose class name contains "rnaseqmetrics" (case-insensitive)
fn match_rna_seq(pf: &ParsedFile) -> bool {
    pf.metric_block()
        .is_some_and(|m| m.class_name().to_lowercase().contains("rnaseqmetrics"))
}
