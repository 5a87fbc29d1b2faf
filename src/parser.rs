// parser.rs

use std::ffi::CString;
use std::fmt;

use itertools::Itertools;

use crate::error::ParseError;

/// One command of a pipeline: program name followed by its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stage {
    tokens: Vec<String>,
    argv: Vec<CString>,
}

impl Stage {
    fn new(position: usize, tokens: Vec<String>) -> Result<Self, ParseError> {
        let Some(program) = tokens.first() else {
            return Err(ParseError::EmptyStage { position });
        };
        let argv = tokens
            .iter()
            .map(|t| CString::new(t.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseError::NulByte {
                program: program.clone(),
            })?;
        Ok(Self { tokens, argv })
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The argument vector handed to `execvp`, checked for NUL bytes when parsed.
    pub fn argv(&self) -> &[CString] {
        &self.argv
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens().iter().join(" "))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn first(&self) -> &Stage {
        &self.stages[0]
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stages.iter().join(" | "))
    }
}

/// Splits `line` on `|`, then each piece on runs of whitespace.
///
/// No quoting or escaping is recognised. Callers are expected to skip blank
/// lines; a blank line here is reported as an empty first stage.
pub fn parse_pipeline(line: &str) -> Result<Pipeline, ParseError> {
    let stages = line
        .split('|')
        .enumerate()
        .map(|(position, piece)| {
            let tokens = piece.split_whitespace().map(str::to_string).collect_vec();
            Stage::new(position, tokens)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Pipeline { stages })
}
