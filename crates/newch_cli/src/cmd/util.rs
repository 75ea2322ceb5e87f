use std::io::{self, Write};

use crate::cmd::error::{CliError, Result};

/// Parse whitespace-separated hex text with `#` line comments into bytes.
pub(crate) fn parse_hex(text: &str) -> Result<Vec<u8>> {
	let mut out = Vec::new();
	for (index, line) in text.lines().enumerate() {
		let line_no = index + 1;
		let content = line.split('#').next().unwrap_or("");
		let digits: Vec<u8> = content.bytes().filter(|byte| !byte.is_ascii_whitespace()).collect();
		if digits.len() % 2 != 0 {
			return Err(CliError::InvalidHex {
				line: line_no,
				detail: "odd number of hex digits".to_owned(),
			});
		}
		for pair in digits.chunks_exact(2) {
			let (Some(high), Some(low)) = (hex_value(pair[0]), hex_value(pair[1])) else {
				return Err(CliError::InvalidHex {
					line: line_no,
					detail: format!("not a hex byte: {}", String::from_utf8_lossy(pair)),
				});
			};
			out.push((high << 4) | low);
		}
	}
	Ok(out)
}

fn hex_value(digit: u8) -> Option<u8> {
	char::from(digit).to_digit(16).map(|value| value as u8)
}

/// Render bytes as lowercase hex.
pub(crate) fn hex_string(bytes: &[u8]) -> String {
	bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Print a value as pretty JSON on stdout.
pub(crate) fn emit_json<T: serde::Serialize>(value: &T) -> Result<()> {
	let mut stdout = io::stdout().lock();
	serde_json::to_writer_pretty(&mut stdout, value)?;
	writeln!(stdout)?;
	Ok(())
}
