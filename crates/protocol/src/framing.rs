//! Request and response framing for the command socket.
//!
//! Requests are a single line terminated by `\n`. Responses are an arbitrary
//! byte stream terminated by the ASCII marker `youiend`, which is stripped
//! before the payload is handed back.
//!
//! The marker is only looked for at the tail of the chunk that was just
//! received. A marker split across two reads is not recognised and the
//! exchange runs into the socket idle timeout instead.

/// Response terminator.
pub const END_MARKER: &[u8] = b"youiend";

/// Encodes a command line for the wire.
pub fn encode_command(command: &str) -> Vec<u8> {
	let mut line = Vec::with_capacity(command.len() + 1);
	line.extend_from_slice(command.as_bytes());
	line.push(b'\n');
	line
}

/// Accumulates response chunks until one of them ends with [`END_MARKER`].
#[derive(Debug, Default)]
pub struct ResponseFrame {
	chunks: Vec<Vec<u8>>,
}

impl ResponseFrame {
	pub fn new() -> Self {
		Self::default()
	}

	/// Feeds one received chunk.
	///
	/// Returns the complete payload once `chunk` itself ends with the marker.
	pub fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
		match chunk.strip_suffix(END_MARKER) {
			Some(rest) => {
				self.chunks.push(rest.to_vec());
				Some(std::mem::take(&mut self.chunks).concat())
			}
			None => {
				self.chunks.push(chunk.to_vec());
				None
			}
		}
	}

	/// Bytes buffered so far.
	pub fn buffered_len(&self) -> usize {
		self.chunks.iter().map(Vec::len).sum()
	}

	pub fn clear(&mut self) {
		self.chunks.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encode_appends_newline() {
		assert_eq!(encode_command("ping"), b"ping\n");
	}

	#[test]
	fn single_chunk_with_marker_completes() {
		let mut frame = ResponseFrame::new();
		assert_eq!(frame.push(b"{\"status\":0}youiend"), Some(b"{\"status\":0}".to_vec()));
	}

	#[test]
	fn chunks_are_concatenated_until_marker() {
		let mut frame = ResponseFrame::new();
		assert_eq!(frame.push(b"hello "), None);
		assert_eq!(frame.push(b"wor"), None);
		assert_eq!(frame.buffered_len(), 9);
		assert_eq!(frame.push(b"ldyouiend"), Some(b"hello world".to_vec()));
		assert_eq!(frame.buffered_len(), 0);
	}

	#[test]
	fn marker_alone_in_last_chunk_completes() {
		let mut frame = ResponseFrame::new();
		assert_eq!(frame.push(b"payload"), None);
		assert_eq!(frame.push(b"youiend"), Some(b"payload".to_vec()));
	}

	#[test]
	fn marker_split_across_chunks_is_not_detected() {
		let mut frame = ResponseFrame::new();
		assert_eq!(frame.push(b"payload you"), None);
		assert_eq!(frame.push(b"iend"), None);
		assert_eq!(frame.buffered_len(), b"payload youiend".len());
	}

	#[test]
	fn marker_in_the_middle_is_payload() {
		let mut frame = ResponseFrame::new();
		assert_eq!(frame.push(b"youiend and more"), None);
	}
}
