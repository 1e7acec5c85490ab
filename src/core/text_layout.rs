//! Turns text show events into positioned runs, lines and blocks.
//!
//! Grouping is a geometric heuristic over consecutive runs in paint order.
//! Every tolerance lives in [`LayoutConfig`] and is relative to font size.

use super::content_stream::TextShowEvent;
use super::graphics_state::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Grouping tolerances, all relative to font size unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    /// Maximum baseline difference within a line
    pub baseline_tolerance: f64,
    /// How far a run may start left of the previous run's end and still
    /// continue the line
    pub line_overlap_tolerance: f64,
    /// Horizontal gap that inserts a space when joining a line's text
    pub word_gap: f64,
    /// Maximum distance between consecutive baselines within a block
    pub block_gap: f64,
    /// Maximum font size change within a block, in points
    pub font_size_tolerance: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            baseline_tolerance: 0.3,
            line_overlap_tolerance: 0.5,
            word_gap: 0.25,
            block_gap: 1.5,
            font_size_tolerance: 1.0,
        }
    }
}

/// One shown string, positioned in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub text: String,
    /// Baseline start of the run
    pub origin: Point,
    pub bbox: Rect,
    /// Distance from the origin to the pen position after the run
    pub advance: f64,
    /// Nominal font size scaled by the text-to-page transform
    pub font_size: f64,
    pub font_name: String,
    pub page: usize,
}

impl TextRun {
    pub fn from_event(event: &TextShowEvent, page: usize) -> TextRun {
        let m = &event.matrix;
        let size = event.font_size;
        let rise = event.rise;

        let origin = m.transform_point(0.0, rise);
        let end = m.transform_point(event.advance.x, rise + event.advance.y);

        let extent = if event.font.is_vertical() {
            Rect::new(-size / 2.0, rise + event.advance.y, size / 2.0, rise)
        } else {
            Rect::new(
                0.0,
                rise + event.font.descent() * size,
                event.advance.x,
                rise + event.font.ascent() * size,
            )
        };

        TextRun {
            text: event.text(),
            origin,
            bbox: m.transform_rect(&extent),
            advance: (end.x - origin.x).hypot(end.y - origin.y),
            font_size: (size * m.vertical_scale()).abs(),
            font_name: event.font.name().to_string(),
            page,
        }
    }

    fn end_x(&self) -> f64 {
        self.origin.x + self.advance
    }
}

/// Runs sharing a baseline, in paint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    /// Indices into the page's runs
    pub runs: Vec<usize>,
    pub text: String,
    pub bbox: Rect,
    pub baseline: f64,
    /// Largest run font size on the line
    pub font_size: f64,
}

/// Consecutive lines with regular spacing and similar size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    /// Indices into the page's lines
    pub lines: Vec<usize>,
    pub text: String,
    pub bbox: Rect,
}

/// The text content of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextLayout {
    pub runs: Vec<TextRun>,
    pub lines: Vec<TextLine>,
    pub blocks: Vec<TextBlock>,
}

impl TextLayout {
    /// Groups runs into lines and lines into blocks.
    pub fn assemble(runs: Vec<TextRun>, config: &LayoutConfig) -> TextLayout {
        let lines = group_lines(&runs, config);
        let blocks = group_blocks(&lines, config);
        TextLayout {
            runs,
            lines,
            blocks,
        }
    }

    /// Block texts separated by blank lines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn continues_line(prev: &TextRun, run: &TextRun, config: &LayoutConfig) -> bool {
    let size = prev.font_size.max(run.font_size);
    let same_baseline = (prev.origin.y - run.origin.y).abs() <= config.baseline_tolerance * size;
    let advancing = run.origin.x >= prev.end_x() - config.line_overlap_tolerance * size;
    same_baseline && advancing
}

fn group_lines(runs: &[TextRun], config: &LayoutConfig) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();

    for (index, run) in runs.iter().enumerate() {
        if let Some(line) = lines.last_mut() {
            let prev = &runs[line.runs[line.runs.len() - 1]];
            if continues_line(prev, run, config) {
                let size = prev.font_size.max(run.font_size);
                let gap = run.origin.x - prev.end_x();
                if gap > config.word_gap * size
                    && !line.text.ends_with(char::is_whitespace)
                    && !run.text.starts_with(char::is_whitespace)
                {
                    line.text.push(' ');
                }
                line.text.push_str(&run.text);
                line.runs.push(index);
                line.bbox = line.bbox.union(&run.bbox);
                line.font_size = line.font_size.max(run.font_size);
                continue;
            }
        }
        lines.push(TextLine {
            runs: vec![index],
            text: run.text.clone(),
            bbox: run.bbox,
            baseline: run.origin.y,
            font_size: run.font_size,
        });
    }
    lines
}

fn continues_block(prev: &TextLine, line: &TextLine, config: &LayoutConfig) -> bool {
    let size = prev.font_size.max(line.font_size);
    let drop = prev.baseline - line.baseline;
    drop >= 0.0
        && drop <= config.block_gap * size
        && (prev.font_size - line.font_size).abs() <= config.font_size_tolerance
}

fn group_blocks(lines: &[TextLine], config: &LayoutConfig) -> Vec<TextBlock> {
    let mut blocks: Vec<TextBlock> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if let Some(block) = blocks.last_mut() {
            let prev = &lines[block.lines[block.lines.len() - 1]];
            if continues_block(prev, line, config) {
                block.text.push('\n');
                block.text.push_str(&line.text);
                block.lines.push(index);
                block.bbox = block.bbox.union(&line.bbox);
                continue;
            }
        }
        blocks.push(TextBlock {
            lines: vec![index],
            text: line.text.clone(),
            bbox: line.bbox,
        });
    }
    blocks
}
