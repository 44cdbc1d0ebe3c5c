//! An offset-preserving string editor, in the spirit of MagicString:
//! collect non-overlapping byte-range overwrites against an immutable source
//! and flatten them in one pass. Keeping edits as `(start, end, replacement)`
//! triples rather than mutating the source in place is what keeps rewrites
//! source-map-friendly (every edit still remembers the original span it
//! replaced).

#[derive(Debug, Clone)]
struct Overwrite {
    start: usize,
    end: usize,
    replacement: String,
}

#[derive(Debug)]
pub struct SourceEditor<'a> {
    source: &'a str,
    overwrites: Vec<Overwrite>,
    prepends: Vec<String>,
}

impl<'a> SourceEditor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            overwrites: Vec::new(),
            prepends: Vec::new(),
        }
    }

    /// Replaces the byte range `[start, end)` with `replacement`. Ranges must
    /// not overlap a previously registered overwrite.
    pub fn overwrite(&mut self, start: usize, end: usize, replacement: impl Into<String>) {
        debug_assert!(start <= end && end <= self.source.len());
        self.overwrites.push(Overwrite {
            start,
            end,
            replacement: replacement.into(),
        });
    }

    /// Inserts a statement block before the rest of the source (used for the
    /// `import.meta.hot` / `import.meta.env` preambles).
    pub fn prepend(&mut self, text: impl Into<String>) {
        self.prepends.push(text.into());
    }

    pub fn is_empty(&self) -> bool {
        self.overwrites.is_empty() && self.prepends.is_empty()
    }

    /// Flattens all edits into the final rewritten source. Overwrites are
    /// applied in ascending offset order; overlap-free by construction since
    /// AST spans for sibling specifiers never overlap.
    pub fn to_string(mut self) -> String {
        self.overwrites.sort_by_key(|o| o.start);

        let mut out = String::with_capacity(self.source.len() + 128);
        for prepend in &self.prepends {
            out.push_str(prepend);
        }

        let mut cursor = 0;
        for ow in &self.overwrites {
            if ow.start < cursor {
                // Overlapping edit: keep the earlier one, drop this one rather
                // than corrupt the output.
                continue;
            }
            out.push_str(&self.source[cursor..ow.start]);
            out.push_str(&ow.replacement);
            cursor = ow.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}
