//! Multipart form body model.
//!
//! The transport performs the actual `multipart/form-data` encoding; this
//! type captures field order and file parts so the protocol client can be
//! exercised against a mock without any HTTP in the loop.

use super::constants::{
    HALT_FIELD, HALT_VALUE, SET_OUTPUTS_FIELD, SET_OUTPUTS_VALUE, UPLOAD_AND_RUN_FIELD,
    UPLOAD_AND_RUN_VALUE,
};

/// One of the device's submit buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Apply manual channel settings.
    SetOutputs,
    /// Store the uploaded program and start executing it.
    UploadAndRun,
    /// Stop a running program.
    Halt,
}

impl Trigger {
    pub fn field(&self) -> &'static str {
        match self {
            Trigger::SetOutputs => SET_OUTPUTS_FIELD,
            Trigger::UploadAndRun => UPLOAD_AND_RUN_FIELD,
            Trigger::Halt => HALT_FIELD,
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            Trigger::SetOutputs => SET_OUTPUTS_VALUE,
            Trigger::UploadAndRun => UPLOAD_AND_RUN_VALUE,
            Trigger::Halt => HALT_VALUE,
        }
    }
}

/// File attachment within a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub content: Vec<u8>,
}

/// An ordered multipart form: text fields first, then file parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormBody {
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Append a file part with verbatim content.
    pub fn add_file(
        &mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content: Vec<u8>,
    ) {
        self.files.push(FilePart {
            name: name.into(),
            filename: filename.into(),
            content,
        });
    }

    /// Append a trigger button as a text field.
    pub fn add_trigger(&mut self, trigger: Trigger) {
        self.add_field(trigger.field(), trigger.value());
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    /// Look up the first text field with the given name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a file part by name.
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.iter().find(|p| p.name == name)
    }

    /// Check whether a trigger button is present.
    pub fn has_trigger(&self, trigger: Trigger) -> bool {
        self.field(trigger.field()) == Some(trigger.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_is_preserved() {
        let mut form = FormBody::new();
        form.add_field("a_ch0_in", "50");
        form.add_field("f_ch0_in", "80");
        form.add_trigger(Trigger::SetOutputs);

        let names: Vec<&str> = form.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a_ch0_in", "f_ch0_in", "set_dds"]);
    }

    #[test]
    fn test_trigger_lookup() {
        let mut form = FormBody::new();
        form.add_trigger(Trigger::Halt);
        assert!(form.has_trigger(Trigger::Halt));
        assert!(!form.has_trigger(Trigger::SetOutputs));
        assert_eq!(form.field("halt"), Some("Halt execution"));
    }

    #[test]
    fn test_file_part() {
        let mut form = FormBody::new();
        form.add_file("pulse_ch0", "output_ch0.bin", vec![0xDE, 0xAD]);
        let part = form.file("pulse_ch0").unwrap();
        assert_eq!(part.filename, "output_ch0.bin");
        assert_eq!(part.content, vec![0xDE, 0xAD]);
    }
}
