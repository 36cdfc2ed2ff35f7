//! Command-line tokenizer.
//!
//! Turns one raw input line into a [`Request`]: the argument vector, optional
//! redirection targets, a background marker and the builtin classification.
//! Quoting is deliberately simple: a token may be wrapped in single or double
//! quotes to include whitespace verbatim, with no escape sequences.

use std::{fmt, path::PathBuf};

/// Parsing stops silently once this many arguments have been collected.
pub(crate) const MAX_ARGS: usize = 128;

const DELIMITERS: &[char] = &[' ', '\t', '\r', '\n'];

/// Which builtin, if any, the first argument names.
///
/// Deciding this once at parse time keeps string comparison out of the
/// evaluator's control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    None,
    Quit,
    Jobs,
    Bg,
    Fg,
}

impl Builtin {
    fn classify(name: &str) -> Self {
        match name {
            "quit" => Self::Quit,
            "jobs" => Self::Jobs,
            "bg" => Self::Bg,
            "fg" => Self::Fg,
            _ => Self::None,
        }
    }
}

/// One tokenized command line, owned by the evaluator for a single evaluation.
#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub(crate) struct Request {
    raw: String,
    pub(crate) argv: Vec<String>,
    pub(crate) infile: Option<PathBuf>,
    pub(crate) outfile: Option<PathBuf>,
    pub(crate) background: bool,
    pub(crate) builtin: Builtin,
}

impl Request {
    /// The original line, for job-table display.
    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    pub(crate) fn parse(line: &str) -> Result<Self, ParseError> {
        #[derive(PartialEq)]
        enum Pending {
            Argument,
            Infile,
            Outfile,
        }

        let mut argv: Vec<String> = Vec::new();
        let mut infile = None;
        let mut outfile = None;
        let mut pending = Pending::Argument;

        let mut rest = line;
        loop {
            rest = rest.trim_start_matches(DELIMITERS);
            let Some(first) = rest.chars().next() else {
                break;
            };

            // Redirection markers; a marker directly followed by its file
            // name (`<infile`) is accepted, the next token is the name.
            if first == '<' || first == '>' {
                let taken = if first == '<' { &infile } else { &outfile };
                if taken.is_some() || pending != Pending::Argument {
                    return Err(ParseError::AmbiguousRedirect);
                }
                pending = if first == '<' {
                    Pending::Infile
                } else {
                    Pending::Outfile
                };
                rest = &rest[1..];
                continue;
            }

            let token;
            if first == '\'' || first == '"' {
                let body = &rest[1..];
                let Some(close) = body.find(first) else {
                    return Err(ParseError::UnmatchedQuote(first));
                };
                token = &body[..close];
                rest = &body[close + first.len_utf8()..];
            } else {
                let end = rest.find(DELIMITERS).unwrap_or(rest.len());
                token = &rest[..end];
                rest = &rest[end..];
            }

            match pending {
                Pending::Argument => argv.push(token.to_string()),
                Pending::Infile => infile = Some(PathBuf::from(token)),
                Pending::Outfile => outfile = Some(PathBuf::from(token)),
            }
            pending = Pending::Argument;

            if argv.len() >= MAX_ARGS {
                break;
            }
        }

        if pending != Pending::Argument {
            return Err(ParseError::MissingRedirectFile);
        }

        let builtin = argv.first().map_or(Builtin::None, |arg| Builtin::classify(arg));

        let background = argv.last().is_some_and(|arg| arg == "&");
        if background {
            argv.pop();
        }

        Ok(Request {
            raw: line.to_string(),
            argv,
            infile,
            outfile,
            background,
            builtin,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ParseError {
    UnmatchedQuote(char),
    AmbiguousRedirect,
    MissingRedirectFile,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnmatchedQuote(quote) => write!(f, "unmatched {quote}"),
            ParseError::AmbiguousRedirect => f.write_str("ambiguous I/O redirection"),
            ParseError::MissingRedirectFile => {
                f.write_str("must provide file name for redirection")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Builtin, ParseError, Request, MAX_ARGS};

    fn args(request: &Request) -> Vec<&str> {
        request.argv.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn plain_command() {
        let request = Request::parse("ls -l /tmp").unwrap();
        assert_eq!(args(&request), ["ls", "-l", "/tmp"]);
        assert_eq!(request.builtin, Builtin::None);
        assert!(!request.background);
        assert_eq!(request.infile, None);
        assert_eq!(request.outfile, None);
    }

    #[test]
    fn empty_line_yields_empty_request() {
        assert!(Request::parse("").unwrap().is_empty());
        assert!(Request::parse("   \t ").unwrap().is_empty());
    }

    #[test]
    fn quoted_arguments_keep_whitespace() {
        let request = Request::parse("echo 'hello  world' \"a b\"").unwrap();
        assert_eq!(args(&request), ["echo", "hello  world", "a b"]);
    }

    #[test]
    fn empty_quotes_make_an_empty_argument() {
        let request = Request::parse("echo ''").unwrap();
        assert_eq!(args(&request), ["echo", ""]);
    }

    #[test]
    fn unmatched_quote_is_an_error() {
        assert_eq!(
            Request::parse("echo 'oops").unwrap_err(),
            ParseError::UnmatchedQuote('\'')
        );
        assert_eq!(
            Request::parse("echo \"oops").unwrap_err(),
            ParseError::UnmatchedQuote('"')
        );
    }

    #[test]
    fn redirection_targets() {
        let request = Request::parse("sort < in.txt > out.txt").unwrap();
        assert_eq!(args(&request), ["sort"]);
        assert_eq!(request.infile.as_deref(), Some("in.txt".as_ref()));
        assert_eq!(request.outfile.as_deref(), Some("out.txt".as_ref()));
    }

    #[test]
    fn redirection_marker_may_be_glued_to_its_file() {
        let request = Request::parse("sort <in.txt >out.txt").unwrap();
        assert_eq!(request.infile.as_deref(), Some("in.txt".as_ref()));
        assert_eq!(request.outfile.as_deref(), Some("out.txt".as_ref()));
    }

    #[test]
    fn duplicate_redirection_is_ambiguous() {
        assert_eq!(
            Request::parse("cat < a < b").unwrap_err(),
            ParseError::AmbiguousRedirect
        );
        assert_eq!(
            Request::parse("cat > a > b").unwrap_err(),
            ParseError::AmbiguousRedirect
        );
        assert_eq!(
            Request::parse("cat < > a").unwrap_err(),
            ParseError::AmbiguousRedirect
        );
    }

    #[test]
    fn trailing_marker_without_file_is_an_error() {
        assert_eq!(
            Request::parse("cat <").unwrap_err(),
            ParseError::MissingRedirectFile
        );
        assert_eq!(
            Request::parse("cat >").unwrap_err(),
            ParseError::MissingRedirectFile
        );
    }

    #[test]
    fn trailing_ampersand_marks_background() {
        let request = Request::parse("sleep 5 &").unwrap();
        assert!(request.background);
        assert_eq!(args(&request), ["sleep", "5"]);
        // the raw line keeps the marker for display
        assert_eq!(request.raw(), "sleep 5 &");
    }

    #[test]
    fn ampersand_must_be_its_own_final_token() {
        let request = Request::parse("echo a&b").unwrap();
        assert!(!request.background);
        assert_eq!(args(&request), ["echo", "a&b"]);
    }

    #[test]
    fn builtin_classification_is_case_sensitive() {
        assert_eq!(Request::parse("quit").unwrap().builtin, Builtin::Quit);
        assert_eq!(Request::parse("jobs").unwrap().builtin, Builtin::Jobs);
        assert_eq!(Request::parse("bg %1").unwrap().builtin, Builtin::Bg);
        assert_eq!(Request::parse("fg 123").unwrap().builtin, Builtin::Fg);
        assert_eq!(Request::parse("Quit").unwrap().builtin, Builtin::None);
        assert_eq!(Request::parse("JOBS").unwrap().builtin, Builtin::None);
    }

    #[test]
    fn argument_list_truncates_at_capacity() {
        let line = vec!["x"; MAX_ARGS + 20].join(" ");
        let request = Request::parse(&line).unwrap();
        assert_eq!(request.argv.len(), MAX_ARGS);
    }
}
