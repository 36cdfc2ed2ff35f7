//! Command-line options for the shell itself.

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub(crate) struct ShellOptions {
    // -h
    pub(crate) help: bool,
    // -v
    pub(crate) verbose: bool,
    // -p suppresses the prompt, handy for driving the shell from scripts
    pub(crate) prompt: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            help: false,
            verbose: false,
            prompt: true,
        }
    }
}

impl ShellOptions {
    pub(crate) fn from_env() -> Result<Self, String> {
        Self::parse_arguments(std::env::args())
    }

    fn parse_arguments(arguments: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut options = Self::default();

        for argument in arguments.into_iter().skip(1) {
            let Some(flags) = argument.strip_prefix('-') else {
                return Err(format!("unexpected argument '{argument}'"));
            };
            if flags.is_empty() {
                return Err("unexpected argument '-'".to_string());
            }
            // short flags may be clustered, getopt style: `-vp`
            for flag in flags.chars() {
                match flag {
                    'h' => options.help = true,
                    'v' => options.verbose = true,
                    'p' => options.prompt = false,
                    _ => return Err(format!("invalid option -- '{flag}'")),
                }
            }
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::ShellOptions;

    fn parse(args: &[&str]) -> Result<ShellOptions, String> {
        let args = std::iter::once("jobsh".to_string())
            .chain(args.iter().map(|s| s.to_string()));
        ShellOptions::parse_arguments(args)
    }

    #[test]
    fn no_arguments() {
        assert_eq!(parse(&[]).unwrap(), ShellOptions::default());
    }

    #[test]
    fn individual_flags() {
        assert!(parse(&["-h"]).unwrap().help);
        assert!(parse(&["-v"]).unwrap().verbose);
        assert!(!parse(&["-p"]).unwrap().prompt);
    }

    #[test]
    fn clustered_flags() {
        let options = parse(&["-vp"]).unwrap();
        assert!(options.verbose);
        assert!(!options.prompt);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(parse(&["-x"]).is_err());
        assert!(parse(&["--verbose-ish"]).is_err());
        assert!(parse(&["command"]).is_err());
    }
}
