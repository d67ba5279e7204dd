use std::ffi::OsString;
use std::path::PathBuf;

/// Help text printed for `--help` and after usage errors.
pub const USAGE_TEXT: &str = "\
Usage: fabric-map <command> [options]

Commands:
  describe <config> | --reference         Print peripheral descriptors as JSON
  check    <config> | --reference         Validate a fabric description
  run      <config> | --reference --channel <name> --code <n> [--cycles <n>]
                                          Drive a delta-sigma channel and count ones

Options:
  --reference          Use the built-in reference SoC instead of a file
  --channel <name>     Delta-sigma instance to drive (run only)
  --code <n>           Code written to the channel's outval register (run only)
  --cycles <n>         Cycles to sample the output for (default: 1024)
  -h, --help           Show this help message

Examples:
  fabric-map describe soc.toml
  fabric-map check --reference
  fabric-map run --reference --channel PDM0 --code 0x3FF
";

/// Cycles sampled by `run` unless `--cycles` says otherwise.
pub const DEFAULT_RUN_CYCLES: u64 = 1024;

/// Where the fabric description comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A TOML file.
    File(PathBuf),
    /// The built-in reference SoC.
    Reference,
}

/// Arguments of the `run` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Fabric description.
    pub source: ConfigSource,
    /// Delta-sigma instance name.
    pub channel: String,
    /// Code written to `outval`.
    pub code: u32,
    /// Sampled cycles.
    pub cycles: u64,
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the peripheral descriptor list.
    Describe(ConfigSource),
    /// Build the fabric and report its shape.
    Check(ConfigSource),
    /// Drive one delta-sigma channel.
    Run(RunArgs),
}

/// Outcome of argument parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A command to execute.
    Command(Command),
    /// `--help` was requested.
    Help,
}

/// Parses the arguments following the program name.
///
/// # Errors
///
/// Returns a one-line message for a missing or unknown command, an unknown option, a
/// missing option value, or a malformed number.
pub fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command = first.to_string_lossy().to_string();
    let options = parse_options(args)?;
    if options.help {
        return Ok(ParseResult::Help);
    }

    let command = match command.as_str() {
        "describe" => {
            options.reject_run_options(&command)?;
            Command::Describe(options.source()?)
        }
        "check" => {
            options.reject_run_options(&command)?;
            Command::Check(options.source()?)
        }
        "run" => {
            let source = options.source()?;
            Command::Run(RunArgs {
                source,
                channel: options
                    .channel
                    .ok_or_else(|| "missing value for --channel".to_string())?,
                code: options
                    .code
                    .ok_or_else(|| "missing value for --code".to_string())?,
                cycles: options.cycles.unwrap_or(DEFAULT_RUN_CYCLES),
            })
        }
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(ParseResult::Command(command))
}

#[derive(Debug, Default)]
struct Options {
    input: Option<PathBuf>,
    reference: bool,
    channel: Option<String>,
    code: Option<u32>,
    cycles: Option<u64>,
    help: bool,
}

impl Options {
    fn source(&self) -> Result<ConfigSource, String> {
        match (&self.input, self.reference) {
            (Some(_), true) => Err("--reference cannot be combined with an input path".to_string()),
            (Some(path), false) => Ok(ConfigSource::File(path.clone())),
            (None, true) => Ok(ConfigSource::Reference),
            (None, false) => Err("missing input path".to_string()),
        }
    }

    fn reject_run_options(&self, command: &str) -> Result<(), String> {
        if self.channel.is_some() || self.code.is_some() || self.cycles.is_some() {
            return Err(format!("{command} does not take run options"));
        }
        Ok(())
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_options(mut args: impl Iterator<Item = OsString>) -> Result<Options, String> {
    let mut options = Options::default();

    while let Some(arg) = args.next() {
        let arg = arg.to_string_lossy().to_string();
        match arg.as_str() {
            "--help" | "-h" => options.help = true,
            "--reference" => options.reference = true,
            "--channel" => options.channel = Some(value_of(&mut args, &arg)?),
            "--code" => options.code = Some(parse_number(&value_of(&mut args, &arg)?)?),
            "--cycles" => {
                options.cycles = Some(parse_number(&value_of(&mut args, &arg)?)?);
            }
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            _ => {
                if options.input.is_some() {
                    return Err("multiple input paths provided".to_string());
                }
                options.input = Some(PathBuf::from(&arg));
            }
        }
    }

    Ok(options)
}

fn value_of(args: &mut impl Iterator<Item = OsString>, option: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().to_string())
        .ok_or_else(|| format!("missing value for {option}"))
}

fn parse_number<T>(text: &str) -> Result<T, String>
where
    T: TryFrom<u64>,
{
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse::<u64>(),
    };
    parsed
        .ok()
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| format!("invalid number: {text}"))
}
