//! Resolution fallback ladder.

/// Ordered resolutions to try for one item: preferred first, then fallback.
///
/// Blank entries are skipped. When both are blank the ladder holds a single
/// empty rung, which every display text contains, so matching is
/// unconstrained.
#[derive(Debug, Clone)]
pub struct ResolutionLadder {
    rungs: Vec<String>,
    position: usize,
}

impl ResolutionLadder {
    pub fn new(preferred: &str, fallback: &str) -> Self {
        let mut rungs: Vec<String> = Vec::with_capacity(2);
        for resolution in [preferred, fallback] {
            let resolution = resolution.trim();
            if resolution.is_empty() {
                continue;
            }
            if rungs.iter().any(|r| r.eq_ignore_ascii_case(resolution)) {
                continue;
            }
            rungs.push(resolution.to_string());
        }

        if rungs.is_empty() {
            rungs.push(String::new());
        }

        Self { rungs, position: 0 }
    }

    /// True when no resolution was configured at all.
    pub fn is_unconstrained(&self) -> bool {
        self.rungs.len() == 1 && self.rungs[0].is_empty()
    }

    /// Whether another rung is left to try.
    pub fn has_more(&self) -> bool {
        self.position < self.rungs.len()
    }

    /// All rungs in order, regardless of position.
    pub fn rungs(&self) -> &[String] {
        &self.rungs
    }
}

impl Iterator for ResolutionLadder {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let rung = self.rungs.get(self.position).cloned();
        if rung.is_some() {
            self.position += 1;
        }
        rung
    }
}
