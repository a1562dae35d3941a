//! Minimal CLI parsing for one-shot runs.

use std::env;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Run the pipeline once and exit
    pub once: bool,
    /// Dispatch an action token once and exit
    pub trigger: Option<String>,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--once" => options.once = true,
                "--trigger" => options.trigger = args.next(),
                _ if arg.starts_with("--trigger=") => {
                    options.trigger = arg.split_once('=').map(|(_, v)| v.to_string());
                }
                _ => {}
            }
        }
        options
    }
}
