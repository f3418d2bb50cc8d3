//! Input line parsing
//!
//! A line is a number followed by one or more spaces and the label; the label
//! is everything after the first run of spaces and may itself contain spaces.

/// Why a line could not be split into `(value, label)`
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The line has no label after the number
    MissingElement(String),
    /// The first field is not a number
    InvalidNumber(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MissingElement(line) => {
                write!(f, "Cannot split line into number and element: <{}>", line)
            }
            ParseError::InvalidNumber(line) => write!(f, "Invalid number in line: <{}>", line),
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    /// The trimmed line the error refers to
    pub fn line(&self) -> &str {
        match self {
            ParseError::MissingElement(line) | ParseError::InvalidNumber(line) => line,
        }
    }
}

fn trim_line(line: &str) -> &str {
    line.trim_matches(|c| c == ' ' || c == '\n' || c == '\r')
}

/// Split `"<number> <label>"` into its parts
pub fn split_line(line: &str) -> Result<(f64, String), ParseError> {
    let line = trim_line(line);

    let (number, element) = match line.split_once(' ') {
        Some((number, rest)) => (number, rest.trim_start_matches(' ')),
        None => return Err(ParseError::MissingElement(line.to_string())),
    };
    if element.is_empty() {
        return Err(ParseError::MissingElement(line.to_string()));
    }

    let value = number
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber(line.to_string()))?;

    Ok((value, element.to_string()))
}

/// How raw lines become observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineParser {
    /// The whole line is the label; every observation has value 0
    pub only_element: bool,
    /// Malformed lines are errors instead of being counted under the raw line
    pub strict: bool,
}

impl LineParser {
    /// Parse one line according to the mode
    ///
    /// In lenient mode a malformed line is still counted: value 0, the trimmed
    /// line as the label.
    pub fn parse(&self, line: &str) -> Result<(f64, String), ParseError> {
        if self.only_element {
            return Ok((0.0, trim_line(line).to_string()));
        }

        match split_line(line) {
            Ok(parsed) => Ok(parsed),
            Err(e) if self.strict => Err(e),
            Err(e) => {
                log::warn!("{}", e);
                Ok((0.0, e.line().to_string()))
            }
        }
    }
}
