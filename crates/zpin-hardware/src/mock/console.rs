//! Operator-driven board bus.
//!
//! Every frame sent to a board is printed, and the operator types what the
//! board answers:
//!
//! | Input              | Simulated board behavior                         |
//! |--------------------|--------------------------------------------------|
//! | `53 2` / `0x35 2`  | READY, then these reply bytes with their checksum |
//! | (empty line)       | READY with an empty reply                        |
//! | `L 10`             | length mismatch, board wanted 10 bytes           |
//! | `C`                | frame checksum rejected                          |
//! | `T`                | board never answers (handshake timeout)          |

use crate::{BusTransport, HardwareError, Result};
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use zpin_core::{
    BoardSlot,
    constants::{MAX_PAYLOAD_LEN, STATUS_CHECKSUM_FAIL, STATUS_LENGTH_MISMATCH, STATUS_READY},
};
use zpin_protocol::{CommandFrame, encode_reply};

/// Translate one operator line into the bytes a board would clock out.
///
/// # Errors
/// Returns an error if the line is neither a directive nor a list of bytes,
/// or lists more bytes than the one-byte reply count can announce.
///
/// # Examples
///
/// ```
/// use zpin_hardware::mock::parse_reply_line;
///
/// assert_eq!(parse_reply_line("0x35 2").unwrap(), vec![b'R', 2, 0x35, 0x02, 0x37]);
/// assert_eq!(parse_reply_line("").unwrap(), vec![b'R', 0]);
/// assert_eq!(parse_reply_line("L 10").unwrap(), vec![b'L', 10]);
/// assert_eq!(parse_reply_line("T").unwrap(), Vec::<u8>::new());
/// ```
pub fn parse_reply_line(line: &str) -> Result<Vec<u8>> {
    let mut tokens = line.split_whitespace().peekable();

    match tokens.peek().map(|t| t.to_ascii_uppercase()).as_deref() {
        Some("T") => return Ok(Vec::new()),
        Some("C") => return Ok(vec![STATUS_CHECKSUM_FAIL]),
        Some("L") => {
            tokens.next();
            let wanted = tokens
                .next()
                .ok_or_else(|| HardwareError::other("expected a length after 'L'"))
                .and_then(parse_byte)?;
            return Ok(vec![STATUS_LENGTH_MISMATCH, wanted]);
        }
        _ => {}
    }

    let payload = tokens.map(parse_byte).collect::<Result<Vec<u8>>>()?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(HardwareError::other(format!(
            "a reply carries at most {MAX_PAYLOAD_LEN} bytes, got {}",
            payload.len()
        )));
    }
    let mut response = vec![STATUS_READY];
    response.extend(encode_reply(&payload));
    Ok(response)
}

fn parse_byte(token: &str) -> Result<u8> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => token.parse::<u8>(),
    };
    parsed.map_err(|_| HardwareError::other(format!("'{token}' is not a byte")))
}

/// Board bus simulated by an operator at a console.
pub struct ConsoleTransport<R, W> {
    input: R,
    output: W,
    selected: Option<BoardSlot>,
    response: VecDeque<u8>,
}

impl ConsoleTransport<BufReader<Stdin>, Stdout> {
    /// Prompt on stdout and read replies from stdin.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleTransport<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            selected: None,
            response: VecDeque::new(),
        }
    }

    fn prompt(&mut self, slot: BoardSlot, bytes: &[u8]) -> Result<Vec<u8>> {
        match CommandFrame::decode(bytes) {
            Ok(frame) => writeln!(self.output, "board {slot} <- {:?}", frame.payload())?,
            Err(_) => writeln!(self.output, "board {slot} <- raw {bytes:?}")?,
        }
        write!(self.output, "> ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(Vec::new());
        }

        loop {
            match parse_reply_line(&line) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    writeln!(self.output, "{e}")?;
                    write!(self.output, "> ")?;
                    self.output.flush()?;
                    line.clear();
                    if self.input.read_line(&mut line)? == 0 {
                        return Ok(Vec::new());
                    }
                }
            }
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> BusTransport for ConsoleTransport<R, W> {
    fn select(&mut self, slot: Option<BoardSlot>) -> Result<()> {
        self.selected = slot;
        self.response.clear();
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.response.clear();
        let Some(slot) = self.selected else {
            writeln!(self.output, "no board selected, {} bytes dropped", bytes.len())?;
            return Ok(());
        };
        let response = self.prompt(slot, bytes)?;
        self.response.extend(response);
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok((0..len)
            .map(|_| self.response.pop_front().unwrap_or(0))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("c", vec![b'C'])]
    #[case("  C  ", vec![b'C'])]
    #[case("l 0x0a", vec![b'L', 10])]
    #[case("1 2 3", vec![b'R', 3, 1, 2, 3, 6])]
    #[case("255 1", vec![b'R', 2, 255, 1, 0])]
    fn test_parse_reply_line(#[case] line: &str, #[case] expected: Vec<u8>) {
        assert_eq!(parse_reply_line(line).unwrap(), expected);
    }

    #[rstest]
    #[case("256")]
    #[case("x")]
    #[case("L")]
    #[case("L 300")]
    fn test_parse_reply_line_rejects(#[case] line: &str) {
        assert!(parse_reply_line(line).is_err());
    }

    #[test]
    fn test_reply_longer_than_count_byte_rejected() {
        let full = vec!["7"; MAX_PAYLOAD_LEN].join(" ");
        let response = parse_reply_line(&full).unwrap();
        assert_eq!(response[1], 255);
        assert_eq!(response.len(), MAX_PAYLOAD_LEN + 3);

        let too_long = format!("{full} 7");
        assert!(parse_reply_line(&too_long).is_err());
    }

    #[test]
    fn test_prompts_and_queues_reply() {
        let input = io::Cursor::new(b"oops\n0x35 2\n".to_vec());
        let mut output = Vec::new();
        {
            let mut transport = ConsoleTransport::new(input, &mut output);
            transport.select(BoardSlot::new(0).ok()).unwrap();
            let frame = CommandFrame::encode(&[0xFE]).unwrap();
            transport.write(frame.as_bytes()).unwrap();
            assert_eq!(transport.read(5).unwrap(), vec![b'R', 2, 0x35, 0x02, 0x37]);
            assert_eq!(transport.read(1).unwrap(), vec![0]);
        }
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("board 0 <- [254]"));
        assert!(printed.contains("'oops' is not a byte"));
    }

    #[test]
    fn test_end_of_input_is_silence() {
        let mut transport = ConsoleTransport::new(io::Cursor::new(Vec::new()), Vec::new());
        transport.select(BoardSlot::new(1).ok()).unwrap();
        transport.write(CommandFrame::encode(&[0x00]).unwrap().as_bytes()).unwrap();
        assert_eq!(transport.read(3).unwrap(), vec![0, 0, 0]);
    }
}
