//! Tolerant extraction of form field values from the device's status page.
//!
//! The generator answers every request with an HTML page whose form inputs
//! carry the currently programmed values, one `name="<r>_ch<n>_in"
//! value="<v>"` pair per register. Field order and the surrounding markup
//! are unspecified, so extraction is a single pattern-matching pass over
//! the raw body.

use std::sync::OnceLock;

use regex::Regex;

/// Channel register encoded in a form field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Frequency,
    Amplitude,
    Phase,
}

impl Register {
    /// Map the single-letter wire prefix to a register.
    fn from_wire(letter: &str) -> Option<Self> {
        match letter {
            "f" => Some(Register::Frequency),
            "a" => Some(Register::Amplitude),
            "p" => Some(Register::Phase),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Register::Frequency => "frequency",
            Register::Amplitude => "amplitude",
            Register::Phase => "phase",
        }
    }
}

/// One form field recovered from a response page, still in wire units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldValue {
    pub register: Register,
    pub channel: usize,
    pub value: f64,
}

fn field_regex() -> &'static Regex {
    static FIELD_RE: OnceLock<Regex> = OnceLock::new();
    FIELD_RE.get_or_init(|| {
        Regex::new(r#"name="([fap])_ch(\d+)_in"\s*value="([0-9.]+)""#)
            .expect("field pattern is a valid regex")
    })
}

/// Extract every channel register field from a response page.
///
/// Unrecognized markup is skipped; a field whose number or value does not
/// parse is dropped rather than failing the whole page. Completeness is
/// judged by the caller, which knows how many channels to expect.
pub fn extract_fields(page: &str) -> Vec<FieldValue> {
    field_regex()
        .captures_iter(page)
        .filter_map(|caps| {
            let register = Register::from_wire(caps.get(1)?.as_str())?;
            let channel = caps.get(2)?.as_str().parse().ok()?;
            let value = caps.get(3)?.as_str().parse().ok()?;
            Some(FieldValue {
                register,
                channel,
                value,
            })
        })
        .collect()
}
