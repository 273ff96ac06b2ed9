use crate::ast::Loc;
use memchr::memchr_iter;

/// Line-indexed view over source text, addressed with [`Loc`] positions.
pub struct SourceText<'a> {
  text: &'a str,
  line_starts: Vec<usize>,
}

impl<'a> SourceText<'a> {
  pub fn new(text: &'a str) -> SourceText<'a> {
    let mut line_starts = vec![0];
    line_starts.extend(memchr_iter(b'\n', text.as_bytes()).map(|i| i + 1));
    SourceText { text, line_starts }
  }

  /// Text of a 1-based line, without its line terminator.
  pub fn line(&self, line: u32) -> Option<&'a str> {
    let idx = (line as usize).checked_sub(1)?;
    let start = *self.line_starts.get(idx)?;
    let end = self
      .line_starts
      .get(idx + 1)
      .map_or(self.text.len(), |next| next - 1);
    let line = &self.text[start..end];
    Some(line.strip_suffix('\r').unwrap_or(line))
  }

  /// Byte offset of a position whose column counts UTF-16 code units; `None`
  /// if it lies outside the text or inside a surrogate pair.
  pub fn offset(&self, loc: Loc) -> Option<usize> {
    let idx = (loc.line as usize).checked_sub(1)?;
    let start = *self.line_starts.get(idx)?;
    let end = self
      .line_starts
      .get(idx + 1)
      .map_or(self.text.len(), |next| next - 1);
    let line = &self.text[start..end];
    let column = loc.column as usize;
    let mut units = 0;
    for (i, c) in line.char_indices() {
      if units == column {
        return Some(start + i);
      }
      if units > column {
        return None;
      }
      units += c.len_utf16();
    }
    (units == column).then_some(end)
  }

  pub fn slice(&self, start: Loc, end: Loc) -> Option<&'a str> {
    let start = self.offset(start)?;
    let end = self.offset(end)?;
    self.text.get(start..end)
  }
}
