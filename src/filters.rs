//! Per-representation video filters
//!
//! Each representation gets its own labelled chain inside one shared
//! `-filter_complex` graph: `[0:v]` feeds the first filter, filter `n` of
//! representation `k` writes `[v{k}_{n}]`, and the last label is what the
//! output maps.

use std::path::{Path, PathBuf};

/// Capability handed to a filter callback
pub trait FilterOps {
    /// Append a raw filter expression, e.g. `hflip` or `eq=contrast=1.2`
    fn add_filter(&mut self, filter: &str);

    /// Overlay an image on the video
    fn add_watermark(&mut self, watermark: &Watermark);

    /// Scale the video to the given size
    fn resize(&mut self, width: u32, height: u32);

    /// Number of filters applied so far
    fn count(&self) -> usize;
}

/// Callback registered alongside a representation
pub type FilterCallback = Box<dyn Fn(&mut dyn FilterOps)>;

/// An image overlay and its position expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub path: PathBuf,
    pub x: String,
    pub y: String,
}

impl Watermark {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            x: "0".to_string(),
            y: "0".to_string(),
        }
    }

    pub fn at(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x = x.into();
        self.y = y.into();
        self
    }

    /// Bottom-right corner with a margin in pixels
    pub fn bottom_right(self, margin: u32) -> Self {
        self.at(format!("main_w-overlay_w-{}", margin), format!("main_h-overlay_h-{}", margin))
    }
}

/// Filter chains and extra inputs for a whole encoder invocation
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    chains: Vec<String>,
    extra_inputs: Vec<PathBuf>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// The `-filter_complex` value, if any filter was added
    pub fn render(&self) -> Option<String> {
        if self.chains.is_empty() {
            None
        } else {
            Some(self.chains.join(";"))
        }
    }

    /// Inputs added after the source (watermark images), in input order
    pub fn extra_inputs(&self) -> &[PathBuf] {
        &self.extra_inputs
    }

    fn add_input(&mut self, path: &Path) -> usize {
        self.extra_inputs.push(path.to_path_buf());
        self.extra_inputs.len()
    }
}

/// Filter builder for one representation
pub struct VideoFilters<'a> {
    graph: &'a mut FilterGraph,
    key: usize,
    count: usize,
}

impl<'a> VideoFilters<'a> {
    pub fn new(graph: &'a mut FilterGraph, key: usize) -> Self {
        Self {
            graph,
            key,
            count: 0,
        }
    }

    /// Label written by filter `n` of representation `key`
    pub fn label(key: usize, n: usize) -> String {
        format!("[v{}_{}]", key, n)
    }

    /// Stream the output should map: the last filter label, or the raw
    /// source video when no filter was applied.
    pub fn output_map(&self) -> String {
        if self.count == 0 {
            "0:v".to_string()
        } else {
            Self::label(self.key, self.count)
        }
    }

    fn input_label(&self) -> String {
        if self.count == 0 {
            "[0:v]".to_string()
        } else {
            Self::label(self.key, self.count)
        }
    }

    fn push_chain(&mut self, body: String) {
        let input = self.input_label();
        self.count += 1;
        let output = Self::label(self.key, self.count);
        self.graph.chains.push(format!("{}{}{}", input, body, output));
    }
}

impl FilterOps for VideoFilters<'_> {
    fn add_filter(&mut self, filter: &str) {
        self.push_chain(filter.to_string());
    }

    fn add_watermark(&mut self, watermark: &Watermark) {
        let input_index = self.graph.add_input(&watermark.path);
        self.push_chain(format!(
            "[{}:v]overlay={}:{}",
            input_index, watermark.x, watermark.y
        ));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.push_chain(format!("scale={}:{}", width, height));
    }

    fn count(&self) -> usize {
        self.count
    }
}
