use std::cell::RefCell;

use thiserror::Error;

use super::expr::ExprType;

/// Errors produced when parsing a SMARTS pattern string.
///
/// Positions are character indices into the original input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmartsError {
    #[error("empty SMARTS string")]
    EmptyInput,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("unexpected end of input at position {pos}")]
    UnexpectedEnd { pos: usize },
    #[error("unclosed bracket atom starting at position {pos}")]
    UnclosedBracket { pos: usize },
    #[error("unclosed ring {ring} opened at position {pos}")]
    UnclosedRing { pos: usize, ring: u8 },
    #[error("unclosed branch at position {pos}")]
    UnclosedBranch { pos: usize },
    #[error("closing unopened branch at position {pos}")]
    UnopenedBranch { pos: usize },
    #[error("unclosed component group at position {pos}")]
    UnclosedComponent { pos: usize },
    #[error("ring open/close bond expressions are not equivalent at position {pos}")]
    RingBondMismatch { pos: usize },
    #[error("invalid ring bond at position {pos}: {msg}")]
    InvalidRingBond { pos: usize, msg: &'static str },
    #[error("invalid atomic number at position {pos}")]
    InvalidAtomicNumber { pos: usize },
    #[error("'{ch}' at position {pos} is not supported by the selected SMARTS flavor")]
    UnsupportedPrimitive { pos: usize, ch: char },
    #[error("bond at position {pos} has no atom to attach to")]
    DanglingBond { pos: usize },
    #[error("recursive SMARTS nested too deeply at position {pos}")]
    RecursionTooDeep { pos: usize },
    #[error("invalid SMARTS at position {pos}: {msg}")]
    Syntax { pos: usize, msg: String },
}

impl SmartsError {
    pub(crate) fn syntax(pos: usize, msg: impl Into<String>) -> Self {
        Self::Syntax {
            pos,
            msg: msg.into(),
        }
    }

    /// Character position the error refers to.
    pub fn pos(&self) -> usize {
        match self {
            Self::EmptyInput => 0,
            Self::UnexpectedChar { pos, .. }
            | Self::UnexpectedEnd { pos }
            | Self::UnclosedBracket { pos }
            | Self::UnclosedRing { pos, .. }
            | Self::UnclosedBranch { pos }
            | Self::UnopenedBranch { pos }
            | Self::UnclosedComponent { pos }
            | Self::RingBondMismatch { pos }
            | Self::InvalidRingBond { pos, .. }
            | Self::InvalidAtomicNumber { pos }
            | Self::UnsupportedPrimitive { pos, .. }
            | Self::DanglingBond { pos }
            | Self::RecursionTooDeep { pos }
            | Self::Syntax { pos, .. } => *pos,
        }
    }

    /// The input followed by a line with a caret under the error position.
    ///
    /// ```
    /// let err = smartcrab::from_smarts("C1CC").unwrap_err();
    /// assert_eq!(err.location_display("C1CC"), "C1CC\n ^");
    /// ```
    pub fn location_display(&self, input: &str) -> String {
        let pos = self.pos().min(input.chars().count());
        format!("{input}\n{}^", " ".repeat(pos))
    }
}

/// Errors produced when writing a query graph as SMARTS.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("atom expression {kind:?}({value}) has no SMARTS form")]
    UnsupportedAtomExpr { kind: ExprType, value: i32 },
    #[error("bond expression {kind:?}({value}) has no SMARTS form")]
    UnsupportedBondExpr { kind: ExprType, value: i32 },
    #[error("atomic number {0} is out of range")]
    InvalidAtomicNumber(i32),
    #[error("more than 99 ring closures open at once")]
    TooManyRings,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<(SmartsError, String)>> = const { RefCell::new(None) };
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

pub(crate) fn set_last_error(err: &SmartsError, input: &str) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some((err.clone(), input.to_string())));
}

/// Message of the last parse error on this thread, if the last parse failed.
pub fn last_error_message() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map(|(err, _)| err.to_string()))
}

/// Input and caret line of the last parse error on this thread.
pub fn last_error_location_display() -> Option<String> {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|(err, input)| err.location_display(input))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display_places_caret() {
        let err = SmartsError::UnexpectedChar { pos: 3, ch: 'Q' };
        assert_eq!(err.location_display("CCCQ"), "CCCQ\n   ^");
    }

    #[test]
    fn location_display_clamps_position() {
        let err = SmartsError::UnexpectedEnd { pos: 40 };
        assert_eq!(err.location_display("C("), "C(\n  ^");
    }

    #[test]
    fn last_error_slot_round_trip() {
        clear_last_error();
        assert!(last_error_message().is_none());
        set_last_error(&SmartsError::UnopenedBranch { pos: 1 }, "C)");
        assert_eq!(
            last_error_message().as_deref(),
            Some("closing unopened branch at position 1")
        );
        assert_eq!(last_error_location_display().as_deref(), Some("C)\n ^"));
        clear_last_error();
        assert!(last_error_location_display().is_none());
    }

    #[test]
    fn last_error_is_per_thread() {
        use std::sync::Barrier;

        let failed = Barrier::new(2);
        let parsed = Barrier::new(2);
        std::thread::scope(|scope| {
            let failing = scope.spawn(|| {
                assert!(crate::smarts::from_smarts("C)C").is_err());
                failed.wait();
                parsed.wait();
                last_error_message()
            });
            let passing = scope.spawn(|| {
                failed.wait();
                assert!(crate::smarts::from_smarts("CC").is_ok());
                parsed.wait();
                last_error_message()
            });
            assert_eq!(
                failing.join().unwrap().as_deref(),
                Some("closing unopened branch at position 1")
            );
            assert_eq!(passing.join().unwrap(), None);
        });
    }
}
