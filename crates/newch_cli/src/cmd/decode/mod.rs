use std::path::PathBuf;

use newch::nsof::{DecodeOptions, Object, decode_root_with, decode_with};
use serde::Serialize;

use crate::cmd::error::{CliError, Result};
use crate::cmd::print::{ObjectJson, PrintOptions, render_tree};
use crate::cmd::util::{emit_json, parse_hex};

#[derive(clap::Args)]
pub struct Args {
	pub path: PathBuf,
	/// Input is hex text (whitespace and `#` comments allowed).
	#[arg(long)]
	pub hex: bool,
	/// Objects carry no leading version byte.
	#[arg(long)]
	pub bare: bool,
	#[arg(long)]
	pub json: bool,
}

/// Decode every object in a file and print them.
pub fn run(args: Args) -> Result<()> {
	let Args { path, hex, bare, json } = args;

	let raw = std::fs::read(&path).map_err(|source| CliError::ReadInput { path: path.clone(), source })?;
	let bytes = if hex { parse_hex(&String::from_utf8_lossy(&raw))? } else { raw };
	let objects = decode_all(&bytes, bare)?;

	if json {
		return emit_json(&DecodeJson {
			path: path.display().to_string(),
			bytes: bytes.len(),
			objects: objects.iter().map(|(offset, object)| DecodedJson {
				offset: *offset,
				object: ObjectJson::from(object),
			})
			.collect(),
		});
	}

	let options = PrintOptions::default();
	println!("path: {}", path.display());
	println!("bytes: {}", bytes.len());
	println!("objects: {}", objects.len());
	for (offset, object) in &objects {
		println!();
		println!("@{offset}:");
		print!("{}", render_tree(object, &options));
	}
	Ok(())
}

/// Decode objects back to back until the input is used up, with their byte offsets.
pub(crate) fn decode_all(bytes: &[u8], bare: bool) -> Result<Vec<(usize, Object)>> {
	if bytes.is_empty() {
		return Err(CliError::EmptyInput);
	}

	let options = DecodeOptions::for_inspection();
	let mut objects = Vec::new();
	let mut offset = 0;
	while offset < bytes.len() {
		let rest = &bytes[offset..];
		let decoded = if bare { decode_with(rest, &options) } else { decode_root_with(rest, &options) };
		let (object, used) = decoded.map_err(|source| CliError::DecodeAt { offset, source })?;
		objects.push((offset, object));
		offset += used;
	}
	Ok(objects)
}

#[derive(Serialize)]
struct DecodeJson {
	path: String,
	bytes: usize,
	objects: Vec<DecodedJson>,
}

#[derive(Serialize)]
struct DecodedJson {
	offset: usize,
	object: ObjectJson,
}

#[cfg(test)]
mod tests;
