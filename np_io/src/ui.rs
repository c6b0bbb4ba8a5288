//! Prompt implementations.

use std::io::{BufRead, BufReader, Write};
use std::sync::Mutex;

use np_core::Error;

use crate::traits::Prompt;

/// Reads answers line by line from `R`, writing questions to `W`.
pub struct InteractivePrompt<R, W> {
    io: Mutex<(R, W)>,
}

impl<R, W> InteractivePrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }
}

impl InteractivePrompt<BufReader<std::io::Stdin>, std::io::Stderr> {
    /// Questions go to stderr.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

fn prompt_failure(err: std::io::Error) -> Error {
    Error::PromptFailure {
        message: err.to_string(),
    }
}

impl<R, W> Prompt for InteractivePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn prompt(&self, question: &str, default: &str) -> Result<String, Error> {
        let mut guard = self.io.lock().unwrap_or_else(|e| e.into_inner());
        let (reader, writer) = &mut *guard;

        write!(writer, "{} [{}]: ", question, default).map_err(prompt_failure)?;
        writer.flush().map_err(prompt_failure)?;

        let mut line = String::new();
        let read = reader.read_line(&mut line).map_err(prompt_failure)?;
        if read == 0 {
            return Err(Error::PromptFailure {
                message: format!("no answer to '{}': end of input", question),
            });
        }

        let answer = line.trim_end_matches(['\n', '\r']);
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}

/// Always answers with the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractivePrompt;

impl Prompt for NonInteractivePrompt {
    fn prompt(&self, _question: &str, default: &str) -> Result<String, Error> {
        Ok(default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn returns_typed_answer() {
        let prompt = InteractivePrompt::new(Cursor::new(b"yes\n".to_vec()), Vec::new());
        assert_eq!(prompt.prompt("enable x?", "no").unwrap(), "yes");
    }

    #[test]
    fn empty_answer_takes_default() {
        let prompt = InteractivePrompt::new(Cursor::new(b"\r\n".to_vec()), Vec::new());
        assert_eq!(prompt.prompt("enable x?", "no").unwrap(), "no");
    }

    #[test]
    fn writes_question_with_default() {
        let prompt = InteractivePrompt::new(Cursor::new(b"/opt/lzf\n".to_vec()), Vec::new());
        prompt.prompt("path to liblzf", "yes").unwrap();

        let io = prompt.io.lock().unwrap();
        assert_eq!(String::from_utf8_lossy(&io.1), "path to liblzf [yes]: ");
    }

    #[test]
    fn answers_are_consumed_in_order() {
        let prompt = InteractivePrompt::new(Cursor::new(b"a\n\nc".to_vec()), Vec::new());

        assert_eq!(prompt.prompt("one", "1").unwrap(), "a");
        assert_eq!(prompt.prompt("two", "2").unwrap(), "2");
        assert_eq!(prompt.prompt("three", "3").unwrap(), "c");
    }

    #[test]
    fn end_of_input_is_prompt_failure() {
        let prompt = InteractivePrompt::new(Cursor::new(Vec::new()), Vec::new());
        let err = prompt.prompt("enable x?", "no").unwrap_err();

        assert!(matches!(err, Error::PromptFailure { .. }));
    }

    #[test]
    fn non_interactive_prompt_uses_default() {
        assert_eq!(
            NonInteractivePrompt.prompt("enable x?", "autodetect").unwrap(),
            "autodetect"
        );
    }
}
