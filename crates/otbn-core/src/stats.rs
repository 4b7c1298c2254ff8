//! Insertion-ordered opcode histogram.

/// Maps opcode mnemonic to hit count, preserving first-seen order so
/// `histogram()` reads like a profile sorted by introduction rather than
/// alphabetically.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    order: Vec<String>,
    counts: std::collections::HashMap<String, u64>,
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the opcode mnemonic (first whitespace-separated token,
    /// trimmed) from an assembly string and bump its count.
    pub fn record(&mut self, asm_text: &str) {
        let Some(opcode) = asm_text.trim().split_whitespace().next() else {
            return;
        };
        if let Some(count) = self.counts.get_mut(opcode) {
            *count += 1;
        } else {
            self.order.push(opcode.to_string());
            self.counts.insert(opcode.to_string(), 1);
        }
    }

    /// Iterate `(opcode, count)` pairs in first-seen order.
    pub fn histogram(&self) -> impl Iterator<Item = (&str, u64)> {
        self.order.iter().map(|op| (op.as_str(), self.counts[op]))
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.counts.clear();
    }
}
