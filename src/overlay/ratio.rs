use std::collections::BTreeMap;

use crate::model::{LinkId, QueryId, StatisticsRecord};

/// Normalizes a host's query count into `[0, 2]`; `NaN` when the query has
/// no counts at all.
pub fn host_ratio(count: u64, max: u64) -> f32 {
    if max == 0 {
        return f32::NAN;
    }
    2.0 * count as f32 / max as f32
}

/// Halo opacity for a host ratio. Below 1 the opacity grows linearly up to
/// `0.25 * damping`; from 1 upward it follows
/// `damping * ((1 - floor) * (x - 1)^2 + floor)`.
pub fn halo_opacity(ratio: f32, damping: f32, floor: f32) -> f32 {
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0.0;
    }
    let opacity = if ratio < 1.0 {
        ratio * 0.25 * damping
    } else {
        let excess = ratio - 1.0;
        damping * ((1.0 - floor) * excess * excess + floor)
    };
    opacity.clamp(0.0, 1.0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LinkRatioPolicy {
    Absolute,
    #[default]
    RelativeSum,
    RelativeMax,
    /// Like `RelativeSum`, but the link thickness follows the baseline only.
    RelativeStat,
}

impl LinkRatioPolicy {
    pub const ALL: [Self; 4] = [
        Self::Absolute,
        Self::RelativeSum,
        Self::RelativeMax,
        Self::RelativeStat,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Absolute => "Absolute",
            Self::RelativeSum => "Relative (sum)",
            Self::RelativeMax => "Relative (max)",
            Self::RelativeStat => "Relative (baseline thickness)",
        }
    }

    /// `NaN` when the denominator is zero.
    pub fn ratio(self, count: u64, sum: u64, max: u64) -> f32 {
        let denominator = match self {
            Self::Absolute => return count as f32,
            Self::RelativeSum | Self::RelativeStat => sum,
            Self::RelativeMax => max,
        };
        if denominator == 0 {
            f32::NAN
        } else {
            count as f32 / denominator as f32
        }
    }
}

/// Where a band's counts come from. Baseline sorts before every query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BandSource {
    Baseline,
    Query(QueryId),
}

/// Folded link counts of one source with its aggregate sum and maximum.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceCounts {
    links: BTreeMap<LinkId, u64>,
    sum: u64,
    max: u64,
}

impl SourceCounts {
    pub fn from_record(record: &StatisticsRecord) -> Self {
        let links = record.link_counts();
        let sum = links.values().sum();
        let max = links.values().copied().max().unwrap_or(0);
        Self { links, sum, max }
    }

    pub fn count(&self, link: LinkId) -> u64 {
        self.links.get(&link).copied().unwrap_or(0)
    }

    pub fn sum(&self) -> u64 {
        self.sum
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    fn ratio(&self, link: LinkId, policy: LinkRatioPolicy) -> f32 {
        policy.ratio(self.count(link), self.sum, self.max)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkBand {
    pub source: BandSource,
    /// Distance of the band's near edge from the link center line.
    pub offset: f32,
    pub width: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkLayout {
    pub thickness: f32,
    pub bands: Vec<LinkBand>,
}

/// Inputs for one layout pass. `queries` holds only visible query sources.
pub struct BandInputs<'a> {
    pub baseline: &'a SourceCounts,
    pub show_baseline: bool,
    pub queries: Vec<(QueryId, &'a SourceCounts)>,
    pub policy: LinkRatioPolicy,
    pub max_thickness: f32,
}

fn usable(ratio: f32) -> Option<f32> {
    (ratio.is_finite() && ratio > 0.0).then_some(ratio)
}

/// Computes the thickness and stacked bands of every link.
///
/// Band widths on a link always add up to its thickness. Links with no
/// usable source ratio get an empty layout.
pub fn layout_links(links: &[LinkId], inputs: &BandInputs<'_>) -> BTreeMap<LinkId, LinkLayout> {
    let mut queries = inputs.queries.clone();
    queries.sort_by_key(|(id, _)| *id);

    let per_link: Vec<(LinkId, Vec<(BandSource, f32)>, f32)> = links
        .iter()
        .map(|&link| {
            let mut ratios = Vec::with_capacity(queries.len() + 1);
            if inputs.show_baseline {
                if let Some(ratio) = usable(inputs.baseline.ratio(link, inputs.policy)) {
                    ratios.push((BandSource::Baseline, ratio));
                }
            }
            for (id, counts) in &queries {
                if let Some(ratio) = usable(counts.ratio(link, inputs.policy)) {
                    ratios.push((BandSource::Query(*id), ratio));
                }
            }

            let raw_thickness = match inputs.policy {
                LinkRatioPolicy::RelativeStat => {
                    usable(inputs.baseline.ratio(link, inputs.policy)).unwrap_or(0.0)
                }
                _ => ratios.iter().map(|(_, ratio)| ratio).sum(),
            };
            (link, ratios, raw_thickness)
        })
        .collect();

    let thickest = per_link
        .iter()
        .map(|(_, _, raw)| *raw)
        .fold(0.0_f32, f32::max);

    per_link
        .into_iter()
        .map(|(link, ratios, raw)| {
            let total: f32 = ratios.iter().map(|(_, ratio)| ratio).sum();
            if thickest <= 0.0 || raw <= 0.0 || total <= 0.0 {
                return (link, LinkLayout::default());
            }

            let thickness = raw / thickest * inputs.max_thickness;
            let mut offset = -thickness / 2.0;
            let bands = ratios
                .into_iter()
                .map(|(source, ratio)| {
                    let width = ratio / total * thickness;
                    let band = LinkBand {
                        source,
                        offset,
                        width,
                    };
                    offset += width;
                    band
                })
                .collect();
            (link, LinkLayout { thickness, bands })
        })
        .collect()
}
