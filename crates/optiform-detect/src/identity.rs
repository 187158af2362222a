//! Name/surname decoding over a two-dimensional letter grid.
//!
//! One column per character position, one alphabet letter per row. The
//! detection and voting machinery is the mark detector's, keyed by column
//! instead of row and run with the stricter identity thresholds — on
//! these small bubbles a false letter costs more than a skipped one.

use std::collections::BTreeMap;

use optiform_core::{DebugSink, GrayImage, NullSink};

use crate::marks::{MarkCandidate, MarkDetectConfig, MarkDetector};

pub struct IdentityReader {
    detector: MarkDetector,
}

impl Default for IdentityReader {
    fn default() -> Self {
        Self::new(MarkDetectConfig::identity())
    }
}

impl IdentityReader {
    pub fn new(cfg: MarkDetectConfig) -> Self {
        Self {
            detector: MarkDetector::new(cfg),
        }
    }

    pub fn read(&self, section: &GrayImage, columns: usize, alphabet: &[char]) -> String {
        self.read_with(section, columns, alphabet, &mut NullSink)
    }

    /// Decode the grid into a string. Columns with no confident winner are
    /// skipped, not padded; an empty string is a valid outcome.
    pub fn read_with(
        &self,
        section: &GrayImage,
        columns: usize,
        alphabet: &[char],
        sink: &mut dyn DebugSink,
    ) -> String {
        if section.is_empty() || columns == 0 || alphabet.is_empty() {
            return String::new();
        }

        let row_height = section.height as f32 / alphabet.len() as f32;
        let candidates = self
            .detector
            .collect_candidates(section, row_height, columns, sink);
        if candidates.is_empty() {
            log::debug!("identity grid: no circles detected");
            return String::new();
        }

        let mut by_column: BTreeMap<usize, Vec<MarkCandidate>> = BTreeMap::new();
        for c in candidates {
            if c.row >= 1 && c.row <= alphabet.len() {
                by_column.entry(c.col).or_default().push(c);
            }
        }

        let mut name = String::new();
        for (_, column_candidates) in by_column {
            let Some((_, winner)) = self.detector.vote(&column_candidates) else {
                continue;
            };
            name.push(alphabet[winner.row - 1]);
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_ring(img: &mut GrayImage, cx: f32, cy: f32, r: f32) {
        for y in 0..img.height {
            for x in 0..img.width {
                let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
                if (d - r).abs() <= 1.0 {
                    img.set(x, y, 70);
                }
            }
        }
    }

    fn draw_disk(img: &mut GrayImage, cx: f32, cy: f32, r: f32, value: u8) {
        for y in 0..img.height {
            for x in 0..img.width {
                let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
                if d <= r {
                    img.set(x, y, value);
                }
            }
        }
    }

    const ALPHABET: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

    /// Letter grid: `columns` character positions, 6 letter rows, with
    /// `selected[col]` filled when `Some`.
    fn render_grid(columns: usize, selected: &[Option<usize>]) -> GrayImage {
        let cell = 24usize;
        let mut img = GrayImage::filled(columns * cell, ALPHABET.len() * cell, 235);
        for col in 0..columns {
            let cx = col as f32 * cell as f32 + cell as f32 / 2.0;
            for row in 0..ALPHABET.len() {
                let cy = row as f32 * cell as f32 + cell as f32 / 2.0;
                draw_ring(&mut img, cx, cy, 7.0);
                if selected[col] == Some(row) {
                    draw_disk(&mut img, cx, cy, 7.0, 20);
                }
            }
        }
        img
    }

    #[test]
    fn decodes_a_short_name() {
        // "FACE" over 4 columns
        let img = render_grid(4, &[Some(5), Some(0), Some(2), Some(4)]);
        let reader = IdentityReader::default();
        assert_eq!(reader.read(&img, 4, &ALPHABET), "FACE");
    }

    #[test]
    fn unmarked_columns_are_skipped_not_padded() {
        let img = render_grid(5, &[Some(1), None, None, Some(3), None]);
        let reader = IdentityReader::default();
        assert_eq!(reader.read(&img, 5, &ALPHABET), "BD");
    }

    #[test]
    fn grid_with_no_confident_letter_reads_empty() {
        let img = render_grid(3, &[None, None, None]);
        let reader = IdentityReader::default();
        assert_eq!(reader.read(&img, 3, &ALPHABET), "");
    }

    #[test]
    fn zero_size_region_reads_empty() {
        let reader = IdentityReader::default();
        assert_eq!(reader.read(&GrayImage::new(0, 0), 10, &ALPHABET), "");
    }
}
