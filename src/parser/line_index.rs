//! Precomputed offset-to-line-number and line-begin tables (§4.1).

pub struct LineIndex {
    /// `line_no_of_offset[off]` is the 0-based line number containing
    /// byte `off`. One entry past the buffer end repeats the last
    /// line's number so lookups at `buffer.len()` don't panic.
    line_no_of_offset: Vec<usize>,
    /// Offset of the first byte of each line.
    line_begins: Vec<usize>,
}

impl LineIndex {
    pub fn build(input: &str) -> Self {
        let bytes = input.as_bytes();
        let mut line_no_of_offset = Vec::with_capacity(bytes.len() + 1);
        let mut line_begins = vec![0usize];
        let mut line = 0usize;
        for (i, &b) in bytes.iter().enumerate() {
            line_no_of_offset.push(line);
            if b == b'\n' {
                line += 1;
                line_begins.push(i + 1);
            }
        }
        line_no_of_offset.push(line);
        Self { line_no_of_offset, line_begins }
    }

    pub fn line_number_of(&self, offset: usize) -> usize {
        let idx = offset.min(self.line_no_of_offset.len() - 1);
        self.line_no_of_offset[idx]
    }

    /// Offset of the `\n` terminating `off`'s line, or the buffer end
    /// if that line has no trailing newline.
    pub fn find_next_line_end(&self, input: &str, off: usize) -> usize {
        let line = self.line_number_of(off);
        if line + 1 < self.line_begins.len() {
            self.line_begins[line + 1] - 1
        } else {
            input.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_lines_and_finds_ends() {
        let input = "abc\nde\nf";
        let idx = LineIndex::build(input);
        assert_eq!(idx.line_number_of(0), 0);
        assert_eq!(idx.line_number_of(4), 1);
        assert_eq!(idx.line_number_of(7), 2);
        assert_eq!(idx.find_next_line_end(input, 0), 3);
        assert_eq!(idx.find_next_line_end(input, 4), 6);
        assert_eq!(idx.find_next_line_end(input, 7), 8);
    }
}
