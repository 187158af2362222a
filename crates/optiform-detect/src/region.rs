//! Region extraction: resolve every template section to a sub-image of
//! the canonical page.
//!
//! Auto-detection binarizes the page, takes connected-component bounding
//! boxes and filters them by the printed boxes' known shape: identity
//! grids are tall-ish rectangles on the left half, answer columns are
//! tall and narrow on the right half. When the expected count does not
//! come out, the template's fractional coordinates take over — every
//! declared section always resolves, possibly to an empty region.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use optiform_core::binary::{adaptive_mean_inv, connected_components, Component};
use optiform_core::filter::gaussian_blur;
use optiform_core::{DebugSink, NullSink, RgbImage};
use optiform_template::FormTemplate;

/// A section sub-image plus its origin in canonical coordinates. May be
/// empty when extraction failed; downstream stages treat that as a fully
/// blank section.
#[derive(Clone, Debug)]
pub struct Region {
    pub origin: (usize, usize),
    pub image: RgbImage,
}

impl Region {
    pub fn empty() -> Self {
        Self {
            origin: (0, 0),
            image: RgbImage::new(0, 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

/// Shape filters for one group of printed boxes, all fractions of the
/// canonical page dimensions unless stated otherwise.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SectionBoxRules {
    /// Horizontal placement gate: boxes must start left (identity) or
    /// right (answers) of this fraction of the page width.
    pub x_limit_frac: f32,
    pub left_of_limit: bool,
    /// Maximum width/height ratio (printed boxes are upright rectangles).
    pub max_aspect: f32,
    pub min_height_frac: f32,
    pub min_width_frac: f32,
    pub max_width_frac: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Binarization window and offset for box detection.
    pub adaptive_block: usize,
    pub adaptive_c: i16,
    pub smooth_sigma: f32,
    /// Minimum component pixel count to be a box candidate.
    pub min_component_area: usize,
    pub identity: SectionBoxRules,
    pub answers: SectionBoxRules,
    /// Identity pairing: max horizontal offset (px), min width/height
    /// similarity ratio, min vertical separation (fraction of page
    /// height).
    pub pair_x_tolerance: usize,
    pub pair_dim_ratio: f32,
    pub pair_min_y_gap_frac: f32,
    /// Minimum horizontal spacing between accepted answer columns.
    pub answer_min_spacing_frac: f32,
    /// Top-margin crop removing printed section titles: auto-detected
    /// identity boxes, fallback identity boxes, auto-detected answer
    /// columns.
    pub identity_title_crop: f32,
    pub identity_fallback_crop: f32,
    pub answer_title_crop: f32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            adaptive_block: 15,
            adaptive_c: 5,
            smooth_sigma: 0.8,
            min_component_area: 3000,
            identity: SectionBoxRules {
                x_limit_frac: 0.35,
                left_of_limit: true,
                max_aspect: 0.60,
                min_height_frac: 0.35,
                min_width_frac: 0.10,
                max_width_frac: 0.25,
            },
            answers: SectionBoxRules {
                x_limit_frac: 0.25,
                left_of_limit: false,
                max_aspect: 0.30,
                min_height_frac: 0.40,
                min_width_frac: 0.06,
                max_width_frac: 0.22,
            },
            pair_x_tolerance: 30,
            pair_dim_ratio: 0.80,
            pair_min_y_gap_frac: 0.10,
            answer_min_spacing_frac: 0.12,
            identity_title_crop: 0.065,
            identity_fallback_crop: 0.05,
            answer_title_crop: 0.02,
        }
    }
}

pub struct RegionLocator {
    cfg: RegionConfig,
}

impl Default for RegionLocator {
    fn default() -> Self {
        Self::new(RegionConfig::default())
    }
}

impl RegionLocator {
    pub fn new(cfg: RegionConfig) -> Self {
        Self { cfg }
    }

    pub fn locate(&self, canonical: &RgbImage, template: &FormTemplate) -> BTreeMap<String, Region> {
        self.locate_with(canonical, template, &mut NullSink)
    }

    /// Resolve every identity and answer section of the template.
    pub fn locate_with(
        &self,
        canonical: &RgbImage,
        template: &FormTemplate,
        sink: &mut dyn DebugSink,
    ) -> BTreeMap<String, Region> {
        let mut regions = BTreeMap::new();
        if canonical.is_empty() {
            for s in &template.identity_sections {
                regions.insert(s.id.clone(), Region::empty());
            }
            for s in &template.answer_sections {
                regions.insert(s.id.clone(), Region::empty());
            }
            return regions;
        }

        let gray = gaussian_blur(&canonical.to_gray(), self.cfg.smooth_sigma);
        let ink = adaptive_mean_inv(&gray, self.cfg.adaptive_block, self.cfg.adaptive_c);
        sink.record("regions/ink-mask", &ink);

        let components = connected_components(&ink).components;

        // identity group
        let identity_boxes = self.identity_pair(&components, canonical.width, canonical.height);
        match identity_boxes {
            Some(pair) if template.identity_sections.len() == 2 => {
                log::info!("identity boxes auto-detected");
                for (section, b) in template.identity_sections.iter().zip(pair) {
                    regions.insert(
                        section.id.clone(),
                        crop_with_title_margin(canonical, b, self.cfg.identity_title_crop),
                    );
                }
            }
            _ => {
                log::info!("identity auto-detection failed, using template coordinates");
                for section in &template.identity_sections {
                    let (x, y, w, h) =
                        section
                            .bounds
                            .to_pixels(canonical.width, canonical.height);
                    let b = BoxPx { x, y, w, h };
                    regions.insert(
                        section.id.clone(),
                        crop_with_title_margin(canonical, b, self.cfg.identity_fallback_crop),
                    );
                }
            }
        }

        // answer columns
        let expected = template.answer_sections.len();
        match self.answer_columns(&components, canonical.width, canonical.height, expected) {
            Some(boxes) => {
                log::info!("{expected} answer columns auto-detected");
                for (section, b) in template.answer_sections.iter().zip(boxes) {
                    regions.insert(
                        section.id.clone(),
                        crop_with_title_margin(canonical, b, self.cfg.answer_title_crop),
                    );
                }
            }
            None => {
                log::info!("answer auto-detection failed, using template coordinates");
                for section in &template.answer_sections {
                    let (x, y, w, h) =
                        section
                            .bounds
                            .to_pixels(canonical.width, canonical.height);
                    regions.insert(
                        section.id.clone(),
                        Region {
                            origin: (x, y),
                            image: canonical.crop(x, y, w, h),
                        },
                    );
                }
            }
        }

        regions
    }

    fn shape_candidates(
        &self,
        components: &[Component],
        rules: &SectionBoxRules,
        width: usize,
        height: usize,
    ) -> Vec<BoxPx> {
        let x_limit = (rules.x_limit_frac * width as f32) as usize;
        let min_h = (rules.min_height_frac * height as f32) as usize;
        let min_w = (rules.min_width_frac * width as f32) as usize;
        let max_w = (rules.max_width_frac * width as f32) as usize;

        components
            .iter()
            .filter(|c| c.area >= self.cfg.min_component_area)
            .filter(|c| {
                if rules.left_of_limit {
                    c.x <= x_limit
                } else {
                    c.x >= x_limit
                }
            })
            .filter(|c| c.aspect() <= rules.max_aspect)
            .filter(|c| c.h >= min_h && c.w >= min_w && c.w <= max_w)
            .map(|c| BoxPx {
                x: c.x,
                y: c.y,
                w: c.w,
                h: c.h,
            })
            .collect()
    }

    /// Identity boxes: shape-filtered candidates, overlapping duplicates
    /// dropped, then the first vertically stacked pair of similar size
    /// and x-alignment (name above surname).
    fn identity_pair(
        &self,
        components: &[Component],
        width: usize,
        height: usize,
    ) -> Option<[BoxPx; 2]> {
        let mut boxes = self.shape_candidates(components, &self.cfg.identity, width, height);
        dedup_overlapping(&mut boxes, Axis::Vertical, self.cfg.pair_x_tolerance);

        let min_y_gap = (self.cfg.pair_min_y_gap_frac * height as f32) as usize;
        for i in 0..boxes.len() {
            for j in i + 1..boxes.len() {
                let (a, b) = (boxes[i], boxes[j]);
                if a.x.abs_diff(b.x) > self.cfg.pair_x_tolerance {
                    continue;
                }
                let w_ratio = a.w.min(b.w) as f32 / a.w.max(b.w) as f32;
                let h_ratio = a.h.min(b.h) as f32 / a.h.max(b.h) as f32;
                if w_ratio < self.cfg.pair_dim_ratio || h_ratio < self.cfg.pair_dim_ratio {
                    continue;
                }
                if a.y.abs_diff(b.y) < min_y_gap {
                    continue;
                }
                return Some(if a.y < b.y { [a, b] } else { [b, a] });
            }
        }
        None
    }

    /// Answer columns: shape-filtered candidates, overlap dedup, sorted
    /// left to right, near-duplicate neighbours removed by a minimum
    /// spacing, and the expected count required.
    fn answer_columns(
        &self,
        components: &[Component],
        width: usize,
        height: usize,
        expected: usize,
    ) -> Option<Vec<BoxPx>> {
        let mut boxes = self.shape_candidates(components, &self.cfg.answers, width, height);
        dedup_overlapping(&mut boxes, Axis::Horizontal, 30);
        boxes.sort_by_key(|b| b.x);

        let min_spacing = (self.cfg.answer_min_spacing_frac * width as f32) as usize;
        let mut spaced: Vec<BoxPx> = Vec::new();
        for b in boxes {
            if spaced
                .iter()
                .all(|s| b.x.abs_diff(s.x) >= min_spacing)
            {
                spaced.push(b);
            } else {
                log::debug!("answer column at x={} too close to a neighbour, skipped", b.x);
            }
        }

        if spaced.len() >= expected {
            spaced.truncate(expected);
            Some(spaced)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct BoxPx {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl BoxPx {
    fn area(&self) -> usize {
        self.w * self.h
    }
}

enum Axis {
    /// Boxes stacked vertically (identity): duplicates overlap in y and
    /// sit at nearly the same x.
    Vertical,
    /// Boxes side by side (answers): duplicates overlap in x and sit at
    /// nearly the same y.
    Horizontal,
}

/// Drop near-duplicate boxes (nested borders detected twice), keeping the
/// larger of each overlapping pair.
fn dedup_overlapping(boxes: &mut Vec<BoxPx>, axis: Axis, tolerance: usize) {
    let mut unique: Vec<BoxPx> = Vec::new();
    for b in boxes.drain(..) {
        let mut duplicate = false;
        for existing in unique.iter_mut() {
            let clash = match axis {
                Axis::Vertical => {
                    let y_overlap = b.y < existing.y + existing.h && b.y + b.h > existing.y;
                    y_overlap && b.x.abs_diff(existing.x) < tolerance
                }
                Axis::Horizontal => {
                    let x_overlap = b.x < existing.x + existing.w && b.x + b.w > existing.x;
                    x_overlap && b.y.abs_diff(existing.y) < tolerance
                }
            };
            if clash {
                if b.area() > existing.area() {
                    *existing = b;
                }
                duplicate = true;
                break;
            }
        }
        if !duplicate {
            unique.push(b);
        }
    }
    *boxes = unique;
}

/// Crop a box with its top margin removed so printed section titles stay
/// out of the circle search area.
fn crop_with_title_margin(canonical: &RgbImage, b: BoxPx, crop_frac: f32) -> Region {
    let trim = (b.h as f32 * crop_frac) as usize;
    let y = b.y + trim;
    let h = b.h.saturating_sub(trim);
    Region {
        origin: (b.x, y),
        image: canonical.crop(b.x, y, b.w, h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiform_template::get_template;

    /// Canonical-page mock with dark box frames drawn at the template's
    /// own fractional coordinates.
    fn page_with_frames(w: usize, h: usize) -> RgbImage {
        let template = get_template("ygs").unwrap();
        let mut img = RgbImage::filled(w, h, [240, 240, 238]);
        let mut frame = |x: usize, y: usize, bw: usize, bh: usize| {
            for t in 0..3usize {
                for xx in x..(x + bw).min(w) {
                    img.set(xx, (y + t).min(h - 1), [30, 30, 30]);
                    img.set(xx, (y + bh - 1 - t).min(h - 1), [30, 30, 30]);
                }
                for yy in y..(y + bh).min(h) {
                    img.set((x + t).min(w - 1), yy, [30, 30, 30]);
                    img.set((x + bw - 1 - t).min(w - 1), yy, [30, 30, 30]);
                }
            }
        };
        for s in &template.identity_sections {
            let (x, y, bw, bh) = s.bounds.to_pixels(w, h);
            frame(x, y, bw, bh);
        }
        for s in &template.answer_sections {
            let (x, y, bw, bh) = s.bounds.to_pixels(w, h);
            frame(x, y, bw, bh);
        }
        img
    }

    #[test]
    fn every_declared_section_resolves() {
        let template = get_template("ygs").unwrap();
        let page = page_with_frames(800, 1132);
        let cfg = RegionConfig {
            min_component_area: 1000, // scaled-down page in this test
            ..RegionConfig::default()
        };
        let regions = RegionLocator::new(cfg).locate(&page, template);

        assert_eq!(regions.len(), 6);
        for s in &template.identity_sections {
            assert!(regions.contains_key(&s.id));
        }
        for s in &template.answer_sections {
            let r = &regions[&s.id];
            assert!(!r.is_empty(), "section {} empty", s.id);
        }
    }

    #[test]
    fn auto_detected_columns_match_drawn_frames() {
        let template = get_template("ygs").unwrap();
        let page = page_with_frames(800, 1132);
        let cfg = RegionConfig {
            min_component_area: 1000,
            ..RegionConfig::default()
        };
        let regions = RegionLocator::new(cfg).locate(&page, template);

        let turkce = &regions["turkce"];
        let (x, y, _, _) = template.answer_section("turkce").unwrap().bounds.to_pixels(800, 1132);
        assert!(turkce.origin.0.abs_diff(x) <= 4);
        // origin sits below the drawn frame top because of the title crop
        assert!(turkce.origin.1 >= y);
    }

    #[test]
    fn blank_page_falls_back_to_template_coordinates() {
        let template = get_template("ygs").unwrap();
        let page = RgbImage::filled(800, 1132, [240, 240, 238]);
        let regions = RegionLocator::default().locate(&page, template);

        let (x, y, w, _h) = template
            .answer_section("matematik")
            .unwrap()
            .bounds
            .to_pixels(800, 1132);
        let m = &regions["matematik"];
        assert_eq!(m.origin, (x, y));
        assert_eq!(m.image.width, w);

        // identity fallback still trims the title margin
        let (nx, ny, _, nh) = template
            .identity_section("name")
            .unwrap()
            .bounds
            .to_pixels(800, 1132);
        let name = &regions["name"];
        assert_eq!(name.origin.0, nx);
        assert_eq!(name.origin.1, ny + (nh as f32 * 0.05) as usize);
    }

    #[test]
    fn empty_canvas_resolves_every_section_as_empty() {
        let template = get_template("ygs").unwrap();
        let regions = RegionLocator::default().locate(&RgbImage::new(0, 0), template);
        assert_eq!(regions.len(), 6);
        assert!(regions.values().all(Region::is_empty));
    }
}
