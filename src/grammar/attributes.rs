//! Attribute grammar: `{{key1, key2=val2, key3:val3}}`.
//!
//! Whitespace is discarded in keys but preserved in values. `,`
//! separates entries; `:` or `=` separates key and value. `\` escapes
//! the next byte. A key with no value becomes `(key -> "")`. If the
//! closing `}` isn't found before end of line, or the block never
//! contained a real key (`{{}}`, `{{:}}`), the whole block is
//! rejected and an empty map is returned with the cursor left where
//! it was passed in.
//!
//! A `}` is always the terminator, even if it appears while scanning
//! a value that itself looks like a nested attribute block — i.e.
//! `{{k={{inner}}}}` closes at the first unescaped `}` (leaving
//! `inner}}}` unconsumed, per the spec's resolution of this case).

use crate::model::Attributes;
use crate::grammar::lexical::is_whitespace;

/// `*off` must point at the byte immediately after the opening `{{`.
/// On success, attributes are returned and `*off` is advanced past the
/// matching `}}`. On failure, an empty map is returned and `*off` is
/// left untouched.
pub fn parse_attributes(input: &str, off: &mut usize) -> Attributes {
    let bytes = input.as_bytes();
    let start = *off;
    let mut attributes = Attributes::new();
    let mut start_collection = false;
    let mut is_key = true;
    let mut is_complete = false;
    let mut acc = String::new();
    let mut prev_key = String::new();

    let mut i = *off;
    while i < bytes.len() && bytes[i] != b'\n' {
        let ch = bytes[i];
        if ch == b'\\' {
            i += 1;
            if i < bytes.len() && bytes[i] != b'\n' {
                acc.push(bytes[i] as char);
                i += 1;
            }
            continue;
        }
        if ch == b'}' {
            commit(&mut attributes, is_key, &acc, &prev_key);
            if start_collection {
                is_complete = true;
            }
            i += 1;
            break;
        }
        let is_assignment = ch == b':' || ch == b'=';
        if !start_collection && !is_assignment {
            start_collection = true;
        }
        if ch == b',' {
            commit(&mut attributes, is_key, &acc, &prev_key);
            is_key = true;
            prev_key.clear();
            acc.clear();
            i += 1;
            continue;
        } else if is_assignment {
            is_key = false;
            attributes.insert(acc.clone(), String::new());
            prev_key = acc.clone();
            acc.clear();
            i += 1;
            continue;
        } else if is_whitespace(ch) && is_key {
            i += 1;
            continue;
        } else {
            acc.push(ch as char);
            i += 1;
        }
    }

    if !is_complete {
        return Attributes::new();
    }
    // Consume the second closing brace of `}}`. If it isn't there the
    // block is malformed and rejected.
    if i < bytes.len() && bytes[i] == b'}' {
        *off = i + 1;
        attributes
    } else {
        *off = start;
        Attributes::new()
    }
}

fn commit(attributes: &mut Attributes, is_key: bool, acc: &str, prev_key: &str) {
    if is_key {
        attributes.insert(acc.to_string(), String::new());
    } else {
        attributes.insert(prev_key.to_string(), acc.to_string());
    }
}
