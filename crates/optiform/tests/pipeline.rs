//! End-to-end pipeline tests over synthetically rendered sheets.

use optiform::core::RgbImage;
use optiform::scoring::{AnswerKey, Subject};
use optiform::template::{get_template, FormTemplate};
use optiform::{FormReader, FormReaderConfig, Mark};

const PAGE_W: usize = 800;
const PAGE_H: usize = 1132;
const MARGIN_X: usize = 40;
const MARGIN_Y: usize = 50;

const PAPER: [u8; 3] = [238, 236, 233];
const FRAME_INK: [u8; 3] = [30, 30, 30];
const RING_INK: [u8; 3] = [70, 70, 70];
const FILL_INK: [u8; 3] = [25, 25, 25];

struct SheetPainter {
    photo: RgbImage,
}

impl SheetPainter {
    fn new() -> Self {
        let mut photo = RgbImage::filled(PAGE_W + 2 * MARGIN_X, PAGE_H + 2 * MARGIN_Y, [45, 48, 52]);
        for y in 0..PAGE_H {
            for x in 0..PAGE_W {
                photo.set(MARGIN_X + x, MARGIN_Y + y, PAPER);
            }
        }
        Self { photo }
    }

    fn set_page(&mut self, px: f32, py: f32, rgb: [u8; 3]) {
        let x = px.round() as i64 + MARGIN_X as i64;
        let y = py.round() as i64 + MARGIN_Y as i64;
        if x >= 0 && y >= 0 && (x as usize) < self.photo.width && (y as usize) < self.photo.height {
            self.photo.set(x as usize, y as usize, rgb);
        }
    }

    fn frame(&mut self, x: usize, y: usize, w: usize, h: usize) {
        for t in 0..3usize {
            for xx in x..x + w {
                self.set_page(xx as f32, (y + t) as f32, FRAME_INK);
                self.set_page(xx as f32, (y + h - 1 - t) as f32, FRAME_INK);
            }
            for yy in y..y + h {
                self.set_page((x + t) as f32, yy as f32, FRAME_INK);
                self.set_page((x + w - 1 - t) as f32, yy as f32, FRAME_INK);
            }
        }
    }

    fn ring(&mut self, cx: f32, cy: f32, r: f32) {
        self.disk_impl(cx, cy, r, RING_INK, false);
    }

    fn fill(&mut self, cx: f32, cy: f32, r: f32) {
        self.disk_impl(cx, cy, r, FILL_INK, true);
    }

    fn disk_impl(&mut self, cx: f32, cy: f32, r: f32, rgb: [u8; 3], solid: bool) {
        let reach = (r + 2.0) as i32;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let d = ((dx * dx + dy * dy) as f32).sqrt();
                let hit = if solid { d <= r } else { (d - r).abs() <= 1.0 };
                if hit {
                    self.set_page(cx + dx as f32, cy + dy as f32, rgb);
                }
            }
        }
    }
}

/// Render a complete YGS-style sheet. `answer_for(global_q)` picks the
/// filled choice (None = left blank); `name`/`surname` fill the identity
/// grids column by column.
fn render_sheet(
    template: &FormTemplate,
    name: &str,
    surname: &str,
    answer_for: impl Fn(u32) -> Option<usize>,
) -> RgbImage {
    let mut painter = SheetPainter::new();

    for (section, text) in template.identity_sections.iter().zip([name, surname]) {
        let (bx, by, bw, bh) = section.bounds.to_pixels(PAGE_W, PAGE_H);
        painter.frame(bx, by, bw, bh);

        // mirror the locator's title crop so bubble rows line up with the
        // detector's uniform grid over the cropped region
        let trim = bh as f32 * 0.065;
        let gy = by as f32 + trim;
        let gh = bh as f32 - trim;
        let rows = section.rows();
        let row_h = gh / rows as f32;

        let selected: Vec<Option<usize>> = (0..section.columns)
            .map(|col| {
                text.chars()
                    .nth(col)
                    .and_then(|c| section.alphabet.iter().position(|&a| a == c))
            })
            .collect();

        // keep bubbles clear of the printed frame lines
        let inset = 4.0;
        let col_w = (bw as f32 - 2.0 * inset) / section.columns as f32;
        for col in 0..section.columns {
            let cx = bx as f32 + inset + (col as f32 + 0.5) * col_w;
            for row in 0..rows {
                let cy = gy + (row as f32 + 0.5) * row_h;
                painter.ring(cx, cy, 5.0);
                if selected[col] == Some(row) {
                    painter.fill(cx, cy, 5.0);
                }
            }
        }
    }

    for section in &template.answer_sections {
        let (bx, by, bw, bh) = section.bounds.to_pixels(PAGE_W, PAGE_H);
        painter.frame(bx, by, bw, bh);

        let trim = bh as f32 * 0.02;
        let gy = by as f32 + trim;
        let gh = bh as f32 - trim;
        let rows = section.question_count();
        let row_h = gh / rows as f32;
        let inset = 4.0;
        let choice_w = (bw as f32 - 2.0 * inset) / section.choices.len() as f32;

        for row in 0..rows {
            let cy = gy + (row as f32 + 0.5) * row_h;
            let q = section.start_question + row as u32;
            for choice in 0..section.choices.len() {
                let cx = bx as f32 + inset + (choice as f32 + 0.5) * choice_w;
                painter.ring(cx, cy, 5.5);
                if answer_for(q) == Some(choice) {
                    painter.fill(cx, cy, 5.5);
                }
            }
        }
    }

    painter.photo
}

fn reader() -> (&'static FormTemplate, FormReader) {
    let template = get_template("ygs").expect("builtin template");
    let reader = FormReader::new(template.clone(), FormReaderConfig::for_template(template));
    (template, reader)
}

/// Every 10th question blank, the rest cycling A..E.
fn cycling_answers(q: u32) -> Option<usize> {
    if q % 10 == 0 {
        None
    } else {
        Some(((q - 1) % 5) as usize)
    }
}

#[test]
fn full_sheet_round_trips_answers_and_identity() {
    let (template, reader) = reader();
    let photo = render_sheet(template, "AYŞE", "AK", cycling_answers);
    let result = reader.read_image(&photo);

    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(result.answers.len(), 160);
    assert_eq!(result.sections.len(), 4);

    for q in 1..=160u32 {
        let expected = match cycling_answers(q) {
            Some(choice) => Mark::Letter(['A', 'B', 'C', 'D', 'E'][choice]),
            None => Mark::Blank,
        };
        assert_eq!(result.answers[&q], expected, "question {q}");
    }

    assert_eq!(result.identity.name, "AYŞE");
    assert_eq!(result.identity.surname, "AK");

    // section maps carry the same marks under global numbering
    assert_eq!(result.sections["matematik"][&41], result.answers[&41]);
    assert_eq!(result.sections["sosyal"][&160], result.answers[&160]);
}

#[test]
fn round_trip_result_scores_cleanly() {
    let (template, reader) = reader();
    let photo = render_sheet(template, "ALİ", "CAN", cycling_answers);
    let result = reader.read_image(&photo);

    // key agrees with the rendered pattern, so only blanks cost points
    let pattern: Vec<char> = (1..=40u32)
        .map(|q| ['A', 'B', 'C', 'D', 'E'][((q - 1) % 5) as usize])
        .collect();
    let key = AnswerKey {
        exam_name: "deneme".into(),
        subjects: template
            .answer_sections
            .iter()
            .map(|s| Subject::uniform(&s.label, &pattern, 1.0))
            .collect(),
    };

    let report = result.score_against(&key);
    assert_eq!(report.total_questions, 160);
    // 16 questions left blank by the renderer (every 10th)
    assert_eq!(report.correct_count, 144);
    assert_eq!(report.blank_count, 16);
    assert_eq!(report.wrong_count, 0);
    assert_eq!(report.total_score, 144.0);
    assert_eq!(report.success_rate, 90.0);
}

#[test]
fn unreadable_scene_still_yields_a_full_blank_map() {
    let (template, reader) = reader();
    // dark frame with no page at all: every strategy fails, the resize
    // fallback runs, regions fall back to template coordinates, and all
    // sections read blank
    let photo = RgbImage::filled(400, 500, [45, 48, 52]);
    let result = reader.read_image(&photo);

    assert!(result.success);
    assert_eq!(result.answers.len(), template.total_questions());
    assert!(result.answers.values().all(Mark::is_blank));
    assert_eq!(result.identity.name, "");
    assert_eq!(result.identity.surname, "");
}

#[test]
fn pipeline_output_is_deterministic() {
    let (template, reader) = reader();
    let photo = render_sheet(template, "EMEL", "SU", |q| Some((q as usize * 3) % 5));
    let a = reader.read_image(&photo);
    let b = reader.read_image(&photo);
    assert_eq!(a.answers, b.answers);
    assert_eq!(a.identity.name, b.identity.name);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[cfg(feature = "image")]
#[test]
fn missing_file_is_the_only_fatal_error() {
    let (_, reader) = reader();
    let err = reader.read_path("/no/such/sheet.jpg");
    assert!(matches!(err, Err(optiform::PipelineError::ImageLoad(_))));
}
