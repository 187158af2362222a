//! Filled-bubble classification over a one-column question grid.

use std::collections::BTreeMap;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use optiform_core::filter::gaussian_blur;
use optiform_core::{DebugSink, GrayImage, Mark, NullSink};

use crate::hough::{hough_circles, Circle, HoughCircleConfig};

/// One detected circle with its sampled intensity statistics and grid
/// assignment.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct MarkCandidate {
    pub center: Point2<f32>,
    pub radius: f32,
    /// Mean intensity inside the disk (0 = black).
    pub mean: f32,
    /// Intensity standard deviation inside the disk.
    pub std_dev: f32,
    /// Darkest sampled pixel.
    pub min: u8,
    /// 1-based grid row.
    pub row: usize,
    /// 0-based grid column (used by letter grids; 0 for answer columns).
    pub col: usize,
}

/// Thresholds for mark detection and the classification votes. Defaults
/// suit answer columns; [`MarkDetectConfig::identity`] tightens the
/// darkness and gap requirements for the smaller letter-grid bubbles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarkDetectConfig {
    /// Expected bubble radius = row_height / this divisor.
    pub radius_divisor: f32,
    /// Search window around the expected radius.
    pub radius_min_frac: f32,
    pub radius_max_frac: f32,
    /// Absolute floor for the search window.
    pub min_radius_px: usize,
    /// Minimum distance between circle centres, relative to the expected
    /// radius.
    pub min_dist_frac: f32,
    /// Intensity statistics are sampled on a disk of this fraction of the
    /// detected radius, keeping the rim and paper bleed out of the mean
    /// when the radius estimate runs a pixel large.
    pub sample_radius_frac: f32,
    /// Pre-smoothing sigma.
    pub smooth_sigma: f32,
    pub hough: HoughCircleConfig,
    /// Reject radii above `median + outlier_sigma * std`, once at least
    /// `outlier_min_samples` circles were found.
    pub outlier_sigma: f32,
    pub outlier_min_samples: usize,
    /// Vote 1: candidate mean must be below this.
    pub fill_threshold: f32,
    /// Vote 2: candidate must be darker than *every* other candidate in
    /// the row by at least this. Two dark bubbles closer than the gap make
    /// the row ambiguous and it reads blank.
    pub min_gap: f32,
    /// Vote 3: candidate mean over the row-average mean must be below this
    /// ratio.
    pub max_mean_ratio: f32,
    /// Vote 4: intensity spread inside the disk must stay below this
    /// (rules out half-shaded bubbles and shadows).
    pub max_std_dev: f32,
    /// Vote 5: the darkest sampled pixel must be below this (confirms
    /// genuine ink rather than a uniformly grey smudge).
    pub max_min_intensity: u8,
}

impl Default for MarkDetectConfig {
    fn default() -> Self {
        Self {
            radius_divisor: 2.5,
            radius_min_frac: 0.7,
            radius_max_frac: 1.3,
            min_radius_px: 8,
            min_dist_frac: 0.8,
            sample_radius_frac: 0.7,
            smooth_sigma: 1.0,
            hough: HoughCircleConfig::default(),
            outlier_sigma: 2.0,
            outlier_min_samples: 10,
            fill_threshold: 150.0,
            min_gap: 20.0,
            max_mean_ratio: 0.85,
            max_std_dev: 70.0,
            max_min_intensity: 130,
        }
    }
}

impl MarkDetectConfig {
    /// Stricter variant for identity letter grids: smaller targets make a
    /// false positive costlier than a skipped column.
    pub fn identity() -> Self {
        Self {
            min_radius_px: 5,
            radius_min_frac: 0.6,
            radius_max_frac: 1.4,
            fill_threshold: 120.0,
            min_gap: 35.0,
            ..Self::default()
        }
    }
}

pub struct MarkDetector {
    cfg: MarkDetectConfig,
}

impl MarkDetector {
    pub fn new(cfg: MarkDetectConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &MarkDetectConfig {
        &self.cfg
    }

    /// Classify every row of an answer column. The result always holds
    /// exactly `rows` entries keyed 1..=rows; a section with no detected
    /// circles is fully blank, which is a valid outcome, not an error.
    pub fn read_section(
        &self,
        section: &GrayImage,
        rows: usize,
        choices: &[char],
    ) -> BTreeMap<usize, Mark> {
        self.read_section_with(section, rows, choices, &mut NullSink)
    }

    pub fn read_section_with(
        &self,
        section: &GrayImage,
        rows: usize,
        choices: &[char],
        sink: &mut dyn DebugSink,
    ) -> BTreeMap<usize, Mark> {
        let mut result: BTreeMap<usize, Mark> = (1..=rows).map(|q| (q, Mark::Blank)).collect();
        if rows == 0 || choices.is_empty() || section.is_empty() {
            return result;
        }

        let row_height = section.height as f32 / rows as f32;
        let candidates = self.collect_candidates(section, row_height, 1, sink);
        if candidates.is_empty() {
            log::debug!("no circles detected, section reported blank");
            return result;
        }

        let mut by_row: BTreeMap<usize, Vec<MarkCandidate>> = BTreeMap::new();
        for c in candidates {
            let row = c.row.min(rows).max(1);
            by_row.entry(row).or_default().push(MarkCandidate { row, ..c });
        }

        for (row, mut row_candidates) in by_row {
            row_candidates.sort_by(|a, b| a.center.x.total_cmp(&b.center.x));
            row_candidates.truncate(choices.len());
            if let Some((index, _)) = self.vote(&row_candidates) {
                result.insert(row, Mark::Letter(choices[index]));
            }
        }
        result
    }

    /// Detect, sample and grid-assign circles. `columns` > 1 switches on
    /// column binning for letter grids.
    pub(crate) fn collect_candidates(
        &self,
        section: &GrayImage,
        row_height: f32,
        columns: usize,
        sink: &mut dyn DebugSink,
    ) -> Vec<MarkCandidate> {
        let smoothed = gaussian_blur(section, self.cfg.smooth_sigma);
        sink.record("detect/smoothed", &smoothed);

        let column_width = section.width as f32 / columns.max(1) as f32;
        let expected_radius = if columns > 1 {
            row_height.min(column_width) / self.cfg.radius_divisor
        } else {
            row_height / self.cfg.radius_divisor
        };
        let min_r = ((expected_radius * self.cfg.radius_min_frac) as usize)
            .max(self.cfg.min_radius_px);
        let max_r = (expected_radius * self.cfg.radius_max_frac).ceil() as usize;
        if max_r < min_r {
            return Vec::new();
        }

        let hough_cfg = HoughCircleConfig {
            min_center_distance: (expected_radius * self.cfg.min_dist_frac).max(2.0),
            ..self.cfg.hough
        };
        let circles = hough_circles(&smoothed, min_r, max_r, &hough_cfg);
        log::debug!(
            "{} circles in {}x{} section (r {}..{})",
            circles.len(),
            section.width,
            section.height,
            min_r,
            max_r
        );

        let mut candidates: Vec<MarkCandidate> = circles
            .iter()
            .filter_map(|c| self.sample(section, c, row_height, column_width, columns))
            .collect();

        // spurious merged detections (adjacent glyphs, ink blots) come out
        // oversized; drop radii beyond median + k sigma
        if candidates.len() > self.cfg.outlier_min_samples {
            let mut radii: Vec<f32> = candidates.iter().map(|c| c.radius).collect();
            radii.sort_by(f32::total_cmp);
            let median = radii[radii.len() / 2];
            let mean = radii.iter().sum::<f32>() / radii.len() as f32;
            let var =
                radii.iter().map(|r| (r - mean) * (r - mean)).sum::<f32>() / radii.len() as f32;
            let cutoff = median + self.cfg.outlier_sigma * var.sqrt();
            let before = candidates.len();
            candidates.retain(|c| c.radius <= cutoff);
            if candidates.len() < before {
                log::debug!(
                    "dropped {} oversized circles (r > {:.1})",
                    before - candidates.len(),
                    cutoff
                );
            }
        }
        candidates
    }

    fn sample(
        &self,
        section: &GrayImage,
        circle: &Circle,
        row_height: f32,
        column_width: f32,
        columns: usize,
    ) -> Option<MarkCandidate> {
        let sample_r = (circle.r * self.cfg.sample_radius_frac).max(2.0);
        let stats = disk_stats(section, circle.cx, circle.cy, sample_r)?;

        let row = (circle.cy / row_height) as usize + 1;
        let col = (circle.cx / column_width) as usize;
        if columns > 1 && col >= columns {
            return None;
        }

        Some(MarkCandidate {
            center: Point2::new(circle.cx, circle.cy),
            radius: circle.r,
            mean: stats.0,
            std_dev: stats.1,
            min: stats.2,
            row,
            col,
        })
    }

    /// The five-signal acceptance test. Returns the index of the winning
    /// candidate (within the given slice) when all votes pass.
    pub(crate) fn vote(&self, candidates: &[MarkCandidate]) -> Option<(usize, MarkCandidate)> {
        let (index, darkest) = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.mean.total_cmp(&b.mean))?;

        // runner-up mean: the gap vote compares against the second-darkest
        // candidate, so a second dark bubble in the row forces a blank
        let runner_up = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, c)| c.mean)
            .fold(f32::INFINITY, f32::min);
        let runner_up = if runner_up.is_finite() { runner_up } else { 255.0 };

        let row_average =
            candidates.iter().map(|c| c.mean).sum::<f32>() / candidates.len() as f32;

        let dark_enough = darkest.mean < self.cfg.fill_threshold;
        let gap_ok = runner_up - darkest.mean > self.cfg.min_gap;
        let ratio_ok = row_average > 0.0 && darkest.mean / row_average < self.cfg.max_mean_ratio;
        let homogeneous = darkest.std_dev < self.cfg.max_std_dev;
        let has_ink = darkest.min < self.cfg.max_min_intensity;

        if dark_enough && gap_ok && ratio_ok && homogeneous && has_ink {
            Some((index, *darkest))
        } else {
            None
        }
    }
}

/// Mean, standard deviation and minimum intensity inside a disk mask.
fn disk_stats(gray: &GrayImage, cx: f32, cy: f32, r: f32) -> Option<(f32, f32, u8)> {
    let x1 = (cx - r).floor().max(0.0) as usize;
    let y1 = (cy - r).floor().max(0.0) as usize;
    let x2 = ((cx + r).ceil() as usize + 1).min(gray.width);
    let y2 = ((cy + r).ceil() as usize + 1).min(gray.height);
    if x1 >= x2 || y1 >= y2 {
        return None;
    }

    let r2 = r * r;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut min = u8::MAX;
    let mut n = 0u32;
    for y in y1..y2 {
        for x in x1..x2 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = gray.get(x, y);
            sum += v as f64;
            sum_sq += (v as f64) * (v as f64);
            min = min.min(v);
            n += 1;
        }
    }
    if n == 0 {
        return None;
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    Some((mean as f32, var.sqrt() as f32, min))
}
