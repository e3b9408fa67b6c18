//! Ordered filter-stage description.
//!
//! A render is described as a list of stages that is independent of how the
//! encoder executes it. `FfmpegEncoder` maps `Trim` onto input-side seeking
//! and every other stage onto one link of a `-vf` chain.

use std::fmt::Write as _;

/// Characters escaped when a value is embedded in a filter option.
const OPTION_SPECIALS: &[char] = &['\'', ':'];

/// Characters escaped when a filter is embedded in a filtergraph.
const GRAPH_SPECIALS: &[char] = &['\'', '[', ']', ',', ';'];

/// One parameterized media-transformation step.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterStage {
    /// Seek to `start` seconds; keep `duration` seconds or run to the end
    Trim { start: f64, duration: Option<f64> },
    /// Resample to a fixed frame rate
    FrameRate { fps: u32 },
    /// Scale to `width`, height follows the aspect ratio (rounded to even)
    Scale { width: u32 },
    /// Text overlay
    DrawText(DrawText),
}

impl FilterStage {
    pub fn name(&self) -> &'static str {
        match self {
            FilterStage::Trim { .. } => "trim",
            FilterStage::FrameRate { .. } => "fps",
            FilterStage::Scale { .. } => "scale",
            FilterStage::DrawText(_) => "drawtext",
        }
    }

    /// Render as an FFmpeg video filter. `Trim` has no filter form.
    pub fn to_filter(&self) -> Option<String> {
        match self {
            FilterStage::Trim { .. } => None,
            FilterStage::FrameRate { fps } => Some(format!("fps={}", fps)),
            FilterStage::Scale { width } => Some(format!("scale={}:-2", width)),
            FilterStage::DrawText(text) => Some(text.to_filter()),
        }
    }

    pub fn as_draw_text(&self) -> Option<&DrawText> {
        match self {
            FilterStage::DrawText(text) => Some(text),
            _ => None,
        }
    }
}

/// A caption overlay, visible while `enable_start <= t <= enable_end`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawText {
    pub text: String,
    /// Horizontal position expression
    pub x: String,
    /// Vertical position expression
    pub y: String,
    pub font_file: String,
    pub font_size: u32,
    pub font_color: String,
    pub border_width: u32,
    pub border_color: String,
    pub enable_start: f64,
    pub enable_end: f64,
}

impl DrawText {
    /// Visibility predicate in FFmpeg expression syntax.
    pub fn enable_expr(&self) -> String {
        format!("between(t,{:.6},{:.6})", self.enable_start, self.enable_end)
    }

    fn to_filter(&self) -> String {
        // drawtext expands %{...} sequences, so % is escaped before the two
        // generic levels.
        let text = escape(&escape(&escape(&self.text, &['%']), OPTION_SPECIALS), GRAPH_SPECIALS);

        let mut filter = String::from("drawtext=");
        let _ = write!(
            filter,
            "text={}:x={}:y={}:fontfile={}:fontsize={}:fontcolor={}:borderw={}:bordercolor={}:enable={}",
            text,
            option_value(&self.x),
            option_value(&self.y),
            option_value(&self.font_file),
            self.font_size,
            option_value(&self.font_color),
            self.border_width,
            option_value(&self.border_color),
            option_value(&self.enable_expr()),
        );
        filter
    }
}

/// Escape a plain option value for use inside a `-vf` chain.
fn option_value(value: &str) -> String {
    escape(&escape(value, OPTION_SPECIALS), GRAPH_SPECIALS)
}

/// Backslash-escape every backslash and every character in `specials`.
fn escape(value: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Join the filter form of `stages` into one `-vf` chain, in order.
pub fn filter_chain(stages: &[FilterStage]) -> Option<String> {
    let filters: Vec<String> = stages.iter().filter_map(FilterStage::to_filter).collect();
    (!filters.is_empty()).then(|| filters.join(","))
}

/// The trim stage of a stage list, if any.
pub fn trim_of(stages: &[FilterStage]) -> Option<(f64, Option<f64>)> {
    stages.iter().find_map(|s| match s {
        FilterStage::Trim { start, duration } => Some((*start, *duration)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caption(text: &str) -> DrawText {
        DrawText {
            text: text.to_string(),
            x: "(w-text_w)/2".to_string(),
            y: "h-th-10".to_string(),
            font_file: "/fonts/Impact.ttf".to_string(),
            font_size: 16,
            font_color: "white".to_string(),
            border_width: 2,
            border_color: "black".to_string(),
            enable_start: 0.416659,
            enable_end: 1.425548,
        }
    }

    #[test]
    fn test_simple_filters() {
        assert_eq!(FilterStage::FrameRate { fps: 15 }.to_filter().unwrap(), "fps=15");
        assert_eq!(FilterStage::Scale { width: 240 }.to_filter().unwrap(), "scale=240:-2");
        assert!(FilterStage::Trim { start: 1.0, duration: None }.to_filter().is_none());
    }

    #[test]
    fn test_enable_expression() {
        assert_eq!(caption("x").enable_expr(), "between(t,0.416659,1.425548)");
    }

    #[test]
    fn test_drawtext_filter() {
        let filter = FilterStage::DrawText(caption("we went from that")).to_filter().unwrap();

        assert!(filter.starts_with("drawtext=text=we went from that:"));
        assert!(filter.contains(":x=(w-text_w)/2:y=h-th-10:"));
        assert!(filter.contains(":fontsize=16:fontcolor=white:borderw=2:bordercolor=black:"));
        assert!(filter.ends_with(":enable=between(t\\,0.416659\\,1.425548)"));
    }

    #[test]
    fn test_drawtext_escaping() {
        let filter = caption("it's 100%, ok: [yes]").to_filter();

        // quote and colon: option level then graph level
        assert!(filter.contains("it\\\\\\'s"));
        assert!(filter.contains("100\\\\\\\\%"));
        assert!(filter.contains("\\,"));
        assert!(filter.contains("ok\\\\:"));
        assert!(filter.contains("\\[yes\\]"));
    }

    #[test]
    fn test_filter_chain_order() {
        let stages = vec![
            FilterStage::Trim { start: 709.0, duration: Some(2.4) },
            FilterStage::FrameRate { fps: 15 },
            FilterStage::Scale { width: 240 },
        ];
        assert_eq!(filter_chain(&stages).unwrap(), "fps=15,scale=240:-2");
        assert_eq!(trim_of(&stages), Some((709.0, Some(2.4))));
        assert_eq!(filter_chain(&stages[..1]), None);
    }
}
