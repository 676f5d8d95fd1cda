//! Protobuf text-format reader.
//!
//! p4c writes P4Info in protobuf text format (`--p4runtime-files x.txt`).
//! Documents are parsed against the descriptor set compiled from the same
//! protos as the generated messages, so every field of the schema is kept,
//! including `Any` values written in expanded `[type.googleapis.com/...]`
//! form. The parsed message is then re-encoded into the generated type.

use crate::error::{TextFormatError, TextFormatResult};
use crate::p4info::P4Info;
use once_cell::sync::Lazy;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage};
use tracing::debug;

/// Descriptors for every message generated by this crate.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("p4runtime_descriptor");

/// Deepest `{ }` / `< >` nesting accepted in a document.
pub const MAX_NESTING_DEPTH: usize = 100;

const P4INFO_MESSAGE: &str = "p4.config.v1.P4Info";

static POOL: Lazy<Result<DescriptorPool, String>> =
    Lazy::new(|| DescriptorPool::decode(FILE_DESCRIPTOR_SET).map_err(|e| e.to_string()));

fn pool() -> TextFormatResult<&'static DescriptorPool> {
    POOL.as_ref()
        .map_err(|e| TextFormatError::Descriptor(e.clone()))
}

/// Parses a text-format P4Info document.
pub fn parse_p4info(input: &str) -> TextFormatResult<P4Info> {
    parse_message(P4INFO_MESSAGE, input)
}

/// Parses `input` as the message named `full_name` and converts it into `T`.
///
/// `T` must be the generated type for `full_name`.
pub fn parse_message<T>(full_name: &str, input: &str) -> TextFormatResult<T>
where
    T: Message + Default,
{
    check_nesting(input)?;

    let descriptor = pool()?
        .get_message_by_name(full_name)
        .ok_or_else(|| TextFormatError::UnknownMessage(full_name.to_string()))?;
    let message = DynamicMessage::parse_text_format(descriptor, input)
        .map_err(|e| TextFormatError::Syntax(e.to_string()))?;

    let encoded = message.encode_to_vec();
    debug!(
        message = full_name,
        encoded_len = encoded.len(),
        "text-format document parsed"
    );
    T::decode(encoded.as_slice()).map_err(|e| TextFormatError::Decode(e.to_string()))
}

/// Rejects documents nested deeper than [`MAX_NESTING_DEPTH`] before they
/// reach the recursive parser. Braces inside strings and comments are not
/// counted.
fn check_nesting(input: &str) -> TextFormatResult<()> {
    let mut depth = 0usize;
    let mut line = 1usize;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        match quote {
            Some(q) => match c {
                '\\' => {
                    if chars.next() == Some('\n') {
                        line += 1;
                    }
                }
                '\n' => quote = None,
                _ if c == q => quote = None,
                _ => {}
            },
            None => match c {
                '"' | '\'' => quote = Some(c),
                '#' => {
                    // Comment runs to end of line
                    if chars.by_ref().any(|c| c == '\n') {
                        line += 1;
                    }
                }
                '{' | '<' => {
                    depth += 1;
                    if depth > MAX_NESTING_DEPTH {
                        return Err(TextFormatError::TooDeep {
                            line,
                            limit: MAX_NESTING_DEPTH,
                        });
                    }
                }
                '}' | '>' => depth = depth.saturating_sub(1),
                _ => {}
            },
        }
    }
    Ok(())
}
