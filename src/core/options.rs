// Codec configuration: text encoding, line endings, append policy.

/// UTF-8 with or without a byte-order mark.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf8Bom,
}

pub(crate) const BOM: &str = "\u{feff}";

impl TextEncoding {
    /// Bytes written at the start of a freshly created or truncated file.
    pub fn preamble(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "",
            TextEncoding::Utf8Bom => BOM,
        }
    }
}

/// Line terminator emitted by writers. Readers accept both forms.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LineEnding {
    Lf,
    CrLf,
    #[default]
    Platform,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Platform if cfg!(windows) => "\r\n",
            LineEnding::Platform => "\n",
        }
    }
}

/// How `write` treats an existing destination.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

impl WriteMode {
    pub fn from_append(append: bool) -> Self {
        if append {
            WriteMode::Append
        } else {
            WriteMode::Overwrite
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CodecOptions {
    pub encoding: TextEncoding,
    pub line_ending: LineEnding,
    /// Compare an existing file's header with the schema before appending.
    pub verify_append_header: bool,
}

impl CodecOptions {
    pub fn new() -> Self {
        Self {
            encoding: TextEncoding::Utf8,
            line_ending: LineEnding::Platform,
            verify_append_header: true,
        }
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn with_verify_append_header(mut self, verify: bool) -> Self {
        self.verify_append_header = verify;
        self
    }
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{CodecOptions, LineEnding, TextEncoding, WriteMode};

    #[test]
    fn defaults_are_utf8_without_bom() {
        let options = CodecOptions::default();
        assert_eq!(options.encoding, TextEncoding::Utf8);
        assert_eq!(options.encoding.preamble(), "");
        assert!(options.verify_append_header);
    }

    #[test]
    fn explicit_line_endings() {
        assert_eq!(LineEnding::Lf.as_str(), "\n");
        assert_eq!(LineEnding::CrLf.as_str(), "\r\n");
        let platform = LineEnding::Platform.as_str();
        assert!(platform == "\n" || platform == "\r\n");
    }

    #[test]
    fn append_flag_maps_to_mode() {
        assert_eq!(WriteMode::from_append(true), WriteMode::Append);
        assert_eq!(WriteMode::from_append(false), WriteMode::Overwrite);
    }
}
