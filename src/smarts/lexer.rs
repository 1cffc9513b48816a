/// Cursor over a window of the input characters.
///
/// Positions are absolute indices into the full input so that errors from a
/// recursive `$(...)` sub-pattern point into the original string.
#[derive(Debug, Clone)]
pub(crate) struct Lexer<'a> {
    chars: &'a [char],
    pos: usize,
    end: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(chars: &'a [char], start: usize, end: usize) -> Self {
        let end = end.min(chars.len());
        Self {
            chars,
            pos: start.min(end),
            end,
        }
    }

    pub(crate) fn chars(&self) -> &'a [char] {
        self.chars
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<char> {
        let i = self.pos + offset;
        if i < self.end {
            Some(self.chars[i])
        } else {
            None
        }
    }

    pub(crate) fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    /// Steps back over the last consumed character.
    pub(crate) fn unget(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }

    pub(crate) fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.end);
    }

    pub(crate) fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.end);
    }

    pub(crate) fn peek_is_digit(&self) -> bool {
        self.peek().is_some_and(|c| c.is_ascii_digit())
    }

    /// Reads a run of decimal digits, saturating at `i32::MAX`.
    pub(crate) fn number(&mut self) -> Option<i32> {
        if !self.peek_is_digit() {
            return None;
        }
        let mut value: i32 = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(d as i32);
            self.pos += 1;
        }
        Some(value)
    }

    /// Index of the `)` balancing an already consumed `(`.
    pub(crate) fn find_closing_paren(&self) -> Option<usize> {
        let mut depth = 1usize;
        for i in self.pos..self.end {
            match self.chars[i] {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn peek_next_unget() {
        let c = chars("CN");
        let mut lex = Lexer::new(&c, 0, c.len());
        assert_eq!(lex.peek(), Some('C'));
        assert_eq!(lex.next(), Some('C'));
        lex.unget();
        assert_eq!(lex.next(), Some('C'));
        assert_eq!(lex.next(), Some('N'));
        assert_eq!(lex.next(), None);
        assert_eq!(lex.peek(), None);
    }

    #[test]
    fn number_stops_at_non_digit() {
        let c = chars("123a");
        let mut lex = Lexer::new(&c, 0, c.len());
        assert_eq!(lex.number(), Some(123));
        assert_eq!(lex.peek(), Some('a'));
        assert_eq!(lex.number(), None);
    }

    #[test]
    fn number_saturates() {
        let c = chars("99999999999999");
        let mut lex = Lexer::new(&c, 0, c.len());
        assert_eq!(lex.number(), Some(i32::MAX));
        assert_eq!(lex.peek(), None);
    }

    #[test]
    fn window_limits_reads() {
        let c = chars("$(CC)O");
        let mut lex = Lexer::new(&c, 2, 4);
        assert_eq!(lex.pos(), 2);
        assert_eq!(lex.next(), Some('C'));
        assert_eq!(lex.next(), Some('C'));
        assert_eq!(lex.next(), None);
        assert_eq!(lex.pos(), 4);
    }

    #[test]
    fn closing_paren_is_balanced() {
        let c = chars("C(C)C)O");
        let lex = Lexer::new(&c, 0, c.len());
        assert_eq!(lex.find_closing_paren(), Some(5));
        let c = chars("C(C");
        let lex = Lexer::new(&c, 0, c.len());
        assert_eq!(lex.find_closing_paren(), None);
    }
}
