//! Yes/no confirmation on arbitrary reader/writer pairs.

#![allow(missing_docs)]

use std::io::{self, BufRead, Write};

/// Ask `question` and read one line. Only `y`/`yes` (any case) confirm; end of
/// input declines.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(input: &str) -> (bool, String) {
        let mut reader = io::Cursor::new(input.as_bytes().to_vec());
        let mut out = Vec::new();
        let answer = confirm(&mut reader, &mut out, "Proceed?").unwrap();
        (answer, String::from_utf8(out).unwrap())
    }

    #[test]
    fn accepts_yes_variants() {
        assert!(ask("y\n").0);
        assert!(ask("YES\n").0);
        assert!(ask("  Yes  \n").0);
    }

    #[test]
    fn declines_everything_else() {
        assert!(!ask("\n").0);
        assert!(!ask("n\n").0);
        assert!(!ask("yep\n").0);
        assert!(!ask("").0);
    }

    #[test]
    fn prints_question_with_default_hint() {
        let (_, out) = ask("n\n");
        assert_eq!(out, "Proceed? [y/N] ");
    }
}
